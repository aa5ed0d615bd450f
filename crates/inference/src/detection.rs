use crate::backend::RawBox;
use crate::names::ClassNames;
use serde::{Deserialize, Serialize};

/// One detected object as returned by `/detect`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub class_id: u32,
    pub conf: f32,
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl Detection {
    /// Coordinates are truncated toward zero, not rounded.
    pub fn from_raw(raw: &RawBox, names: &ClassNames) -> Self {
        let [x1, y1, x2, y2] = raw.xyxy;
        Self {
            label: names.label(raw.class_id),
            class_id: raw.class_id,
            conf: raw.confidence,
            x1: x1 as i32,
            y1: y1 as i32,
            x2: x2 as i32,
            y2: y2 as i32,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResponse {
    pub boxes: Vec<Detection>,
}
