//! Startup backend resolution.
//!
//! The fallback chain is an ordered list of [`Strategy`] values built by
//! [`plan`]. [`resolve`] walks it and keeps the first backend that initialises.
//! Accelerated failures are logged and skipped; a generic failure is fatal.

use crate::backend::{BackendChoice, Device, InferenceBackend};
use crate::config::{BackendSelection, DetectorConfig};
use crate::errors::DetectorError;
use crate::export::{self, AcceleratedArtifact};
use crate::platform::{Os, Platform};
use crate::service::{HostInfo, ModelContext};
use anyhow::Context;
use std::path::Path;

/// Creates inference handles. Implemented by the ONNX Runtime loader and by
/// substitutes in tests.
pub trait BackendLoader {
    fn load_accelerated(
        &self,
        artifact: &AcceleratedArtifact,
    ) -> anyhow::Result<Box<dyn InferenceBackend>>;

    fn load_generic(
        &self,
        model: &Path,
        device: Device,
        intra_threads: usize,
    ) -> anyhow::Result<Box<dyn InferenceBackend>>;

    /// Whether the Apple GPU device reports available.
    fn gpu_available(&self) -> bool;

    fn library_version(&self) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Accelerated,
    Generic,
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Accelerated => "openvino",
            Strategy::Generic => "torch",
        }
    }

    /// Failures of a fallible strategy move resolution on to the next one.
    fn allows_fallback(&self) -> bool {
        matches!(self, Strategy::Accelerated)
    }

    fn init(
        &self,
        config: &DetectorConfig,
        platform: &Platform,
        loader: &dyn BackendLoader,
    ) -> anyhow::Result<(BackendChoice, Box<dyn InferenceBackend>)> {
        match self {
            Strategy::Accelerated => {
                let artifact = accelerated_artifact(config)?;
                let handle = loader.load_accelerated(&artifact)?;
                tracing::info!(model = %artifact.model.display(), "OpenVINO model loaded");
                Ok((BackendChoice::Accelerated, handle))
            }
            Strategy::Generic => {
                let device = select_device(platform.os, loader);
                let choice = BackendChoice::Generic(device);
                let handle = loader
                    .load_generic(&config.model_path, device, config.num_threads)
                    .with_context(|| {
                        format!(
                            "Failed to load YOLO model {} with {}",
                            config.model_path.display(),
                            choice
                        )
                    })?;
                Ok((choice, handle))
            }
        }
    }
}

/// Ordered strategies for `selection` on `os`.
///
/// `auto` only tries the accelerated backend on Linux. An explicit `openvino`
/// request tries it on every OS and relies on the fallback when it fails.
pub fn plan(selection: BackendSelection, os: Os) -> Vec<Strategy> {
    let wants_accelerated = match selection {
        BackendSelection::OpenVino => true,
        BackendSelection::Auto => os == Os::Linux,
        BackendSelection::Torch => false,
    };

    let mut strategies = Vec::with_capacity(2);
    if wants_accelerated {
        strategies.push(Strategy::Accelerated);
    }
    strategies.push(Strategy::Generic);
    strategies
}

/// Apple GPU on macOS when available, CPU otherwise.
pub fn select_device(os: Os, loader: &dyn BackendLoader) -> Device {
    if os == Os::MacOs && loader.gpu_available() {
        Device::AppleGpu
    } else {
        Device::Cpu
    }
}

fn accelerated_artifact(config: &DetectorConfig) -> Result<AcceleratedArtifact, DetectorError> {
    match config.openvino_model.as_deref() {
        Some(path) if path.exists() => {
            tracing::info!(path = %path.display(), "Loading pre-exported OpenVINO model");
            AcceleratedArtifact::open(path)
        }
        configured => {
            if let Some(path) = configured {
                tracing::warn!(
                    path = %path.display(),
                    "OPENVINO_MODEL does not exist, exporting base model instead"
                );
            }
            export::export(&config.model_path, config.imgsz)
        }
    }
}

/// Choose and initialise the process-wide backend. Called once, before serving.
pub fn resolve(
    config: &DetectorConfig,
    platform: &Platform,
    loader: &dyn BackendLoader,
) -> Result<ModelContext, DetectorError> {
    let strategies = plan(config.backend, platform.os);

    tracing::info!(
        requested = %config.backend,
        os = ?platform.os,
        strategies = ?strategies,
        "Resolving inference backend"
    );

    for strategy in &strategies {
        match strategy.init(config, platform, loader) {
            Ok((choice, handle)) => {
                let host = HostInfo {
                    platform: platform.description.clone(),
                    library_version: loader.library_version(),
                    gpu_available: platform.os == Os::MacOs && loader.gpu_available(),
                };
                tracing::info!(backend = %choice, "Inference backend ready");
                return Ok(ModelContext::new(choice, handle, config, host));
            }
            Err(source) if strategy.allows_fallback() => {
                let err = DetectorError::BackendInit {
                    backend: strategy.name(),
                    source,
                };
                tracing::warn!(error = %err, "Falling back to next backend");
            }
            Err(source) => return Err(DetectorError::NoBackend { source }),
        }
    }

    Err(DetectorError::NoBackend {
        source: anyhow::anyhow!("no backend strategy applies to {}", config.backend),
    })
}
