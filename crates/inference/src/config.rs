use crate::errors::DetectorError;
use std::env;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

pub use common::Environment;

/// Backend requested through `BACKEND`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendSelection {
    /// Accelerated backend on Linux, generic everywhere else
    Auto,
    /// Generic backend only
    Torch,
    /// Accelerated backend first, generic as fallback
    OpenVino,
}

impl BackendSelection {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendSelection::Auto => "auto",
            BackendSelection::Torch => "torch",
            BackendSelection::OpenVino => "openvino",
        }
    }

    /// Anything that does not name the accelerated backend runs the generic
    /// one, so an unknown value degrades to [`BackendSelection::Torch`].
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_else(|e: DetectorError| {
            tracing::warn!(error = %e, "Unknown BACKEND, using the generic backend");
            BackendSelection::Torch
        })
    }
}

impl fmt::Display for BackendSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendSelection {
    type Err = DetectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "torch" => Ok(Self::Torch),
            "openvino" => Ok(Self::OpenVino),
            other => Err(DetectorError::Config(format!(
                "{} is not a supported backend. Use `auto`, `torch` or `openvino`.",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub environment: Environment,
    pub backend: BackendSelection,
    pub model_path: PathBuf,
    /// Square inference input size in pixels
    pub imgsz: u32,
    pub conf_threshold: f32,
    pub iou_threshold: f32,
    /// Pre-exported accelerated artifact; exported on demand when unset
    pub openvino_model: Option<PathBuf>,
    /// Intra-op threads for the generic backend, 0 keeps the library default
    pub num_threads: usize,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl DetectorConfig {
    /// Load configuration from environment variables with sensible defaults
    pub fn from_env() -> Result<Self, DetectorError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DetectorError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let environment = Environment::parse(&get("ENVIRONMENT").unwrap_or_default());

        let backend = get("BACKEND")
            .map(|value| BackendSelection::parse_lenient(&value))
            .unwrap_or(BackendSelection::Auto);

        let model_path = PathBuf::from(get("YOLO_MODEL").unwrap_or_else(|| "yolov8n.onnx".to_string()));

        let imgsz: u32 = parse_or(&get, "YOLO_IMGSZ", 640)?;
        if imgsz == 0 {
            return Err(DetectorError::Config(
                "YOLO_IMGSZ must be a positive number of pixels".to_string(),
            ));
        }
        if imgsz % 32 != 0 {
            tracing::warn!(imgsz, "YOLO_IMGSZ is not a multiple of the model stride (32)");
        }

        let conf_threshold = parse_or(&get, "CONF_THRESHOLD", 0.25)?;
        let iou_threshold = parse_or(&get, "IOU_THRESHOLD", 0.45)?;

        let openvino_model = get("OPENVINO_MODEL").map(PathBuf::from);

        let num_threads = get("TORCH_NUM_THREADS")
            .map(|raw| parse_thread_count(&raw))
            .unwrap_or(0);
        let port = parse_or(&get, "DETECTOR_PORT", 9000)?;
        let max_upload_bytes = parse_or(&get, "MAX_UPLOAD_BYTES", 16 * 1024 * 1024)?;

        Ok(Self {
            environment,
            backend,
            model_path,
            imgsz,
            conf_threshold,
            iou_threshold,
            openvino_model,
            num_threads,
            port,
            max_upload_bytes,
        })
    }

    /// The service only ever listens on loopback.
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::LOCALHOST, self.port))
    }

    /// Model identifier as reported by `/health`.
    pub fn model_id(&self) -> String {
        self.model_path.display().to_string()
    }
}

/// Thread count is best effort: an unusable value keeps the library default.
fn parse_thread_count(raw: &str) -> usize {
    match raw.trim().parse::<usize>() {
        Ok(threads) => threads,
        Err(e) => {
            tracing::warn!(
                value = raw,
                error = %e,
                "Ignoring TORCH_NUM_THREADS, using library default"
            );
            0
        }
    }
}

fn parse_or<T, F>(get: &F, key: &str, default: T) -> Result<T, DetectorError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| DetectorError::Config(format!("{}={:?}: {}", key, raw, e))),
        None => Ok(default),
    }
}
