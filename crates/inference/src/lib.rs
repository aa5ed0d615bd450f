pub mod backend;
pub mod config;
pub mod detection;
pub mod errors;
pub mod export;
pub mod names;
pub mod platform;
pub mod postprocessing;
pub mod resolver;
pub mod service;

// Re-export commonly used types for convenience
pub use backend::{BackendChoice, Device, InferenceBackend, PredictParams, Prediction, RawBox};
pub use config::{BackendSelection, DetectorConfig};
pub use detection::{Detection, DetectionResponse};
pub use errors::DetectorError;
pub use names::ClassNames;
pub use platform::{Os, Platform};
pub use resolver::{BackendLoader, resolve};
pub use service::{HealthReport, HostInfo, ModelContext};
