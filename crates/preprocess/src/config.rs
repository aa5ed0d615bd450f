/// Square input size Ultralytics exports YOLO detectors with by default.
pub const DEFAULT_INPUT_SIZE: (u32, u32) = (640, 640);

/// Grey used by the YOLO letterbox for padding.
pub const LETTERBOX_COLOR: u8 = 114;
