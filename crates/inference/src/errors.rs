use preprocess::PreprocessError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    ImageDecode(#[from] PreprocessError),

    #[error("{backend} backend initialization failed: {source:#}")]
    BackendInit {
        backend: &'static str,
        source: anyhow::Error,
    },

    #[error("failed to load detection model: {source:#}")]
    NoBackend { source: anyhow::Error },

    #[error("failed to export {}: {source}", path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("inference failed: {0:#}")]
    Inference(anyhow::Error),
}

impl DetectorError {
    /// Whether the error was caused by the caller's input rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, DetectorError::ImageDecode(_))
    }

    pub(crate) fn export(path: impl Into<PathBuf>, source: io::Error) -> Self {
        DetectorError::Export {
            path: path.into(),
            source,
        }
    }
}
