use crate::names::ClassNames;
use image::RgbImage;
use std::fmt;

pub mod ort;

/// Compute device bound to the generic backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    /// Apple GPU through CoreML. Always full precision.
    AppleGpu,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
            Device::AppleGpu => "mps",
        }
    }
}

/// Backend bound to the model for the lifetime of the process.
///
/// Displayed with the same vocabulary `BACKEND` accepts: `openvino` for the
/// accelerated backend and `torch:<device>` for the generic one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendChoice {
    Accelerated,
    Generic(Device),
}

impl BackendChoice {
    pub fn is_generic(&self) -> bool {
        matches!(self, BackendChoice::Generic(_))
    }
}

impl fmt::Display for BackendChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendChoice::Accelerated => f.write_str("openvino"),
            BackendChoice::Generic(device) => write!(f, "torch:{}", device.as_str()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictParams {
    pub conf: f32,
    pub iou: f32,
    /// Square input size, fixed at startup
    pub imgsz: u32,
}

/// A box as produced by the model, in original-image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawBox {
    pub xyxy: [f32; 4],
    pub confidence: f32,
    pub class_id: u32,
}

/// Result set for one submitted image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prediction {
    pub boxes: Vec<RawBox>,
}

pub trait InferenceBackend: Send {
    /// Run detection on one image. Returns one [`Prediction`] per image in the
    /// batch the model produced, which is normally exactly one.
    fn predict(
        &mut self,
        image: &RgbImage,
        params: &PredictParams,
    ) -> anyhow::Result<Vec<Prediction>>;

    /// Class-id to label table the model was exported with.
    fn class_names(&self) -> &ClassNames;
}
