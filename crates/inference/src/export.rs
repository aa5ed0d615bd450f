//! One-time export of the base model into the accelerated (OpenVINO) layout.
//!
//! The export directory sits next to the base model as
//! `<stem>_openvino_model/` and holds a copy of the graph, a `metadata.json`
//! describing what it was exported from, and a `cache/` directory the OpenVINO
//! execution provider fills with compiled blobs on first load. Exports are keyed
//! by source path and image size; a matching export is reused as-is.

use crate::errors::DetectorError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const EXPORT_FORMAT: &str = "openvino";
const METADATA_FILE: &str = "metadata.json";
const CACHE_DIR: &str = "cache";

/// Model file the accelerated backend loads, plus its compiled-blob cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceleratedArtifact {
    pub model: PathBuf,
    pub cache_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ExportMetadata {
    source: PathBuf,
    imgsz: u32,
    format: String,
}

impl AcceleratedArtifact {
    /// Open a pre-exported artifact: either a model file or an export directory
    /// containing one `.onnx` graph.
    pub fn open(path: &Path) -> Result<Self, DetectorError> {
        if !path.is_dir() {
            return Ok(Self {
                model: path.to_path_buf(),
                cache_dir: None,
            });
        }

        let mut graphs = fs::read_dir(path)
            .map_err(|e| DetectorError::export(path, e))?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "onnx"))
            .collect::<Vec<_>>();
        graphs.sort();

        let model = graphs.into_iter().next().ok_or_else(|| {
            DetectorError::export(
                path,
                io::Error::new(io::ErrorKind::NotFound, "no .onnx graph in export directory"),
            )
        })?;

        let cache_dir = path.join(CACHE_DIR);
        let cache_dir = match fs::create_dir_all(&cache_dir) {
            Ok(()) => Some(cache_dir),
            Err(e) => {
                tracing::warn!(error = %e, path = %cache_dir.display(), "Compiled-blob cache disabled");
                None
            }
        };

        Ok(Self { model, cache_dir })
    }
}

/// Export directory used for `model_path`.
pub fn export_dir_for(model_path: &Path) -> PathBuf {
    let stem = model_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string());
    model_path
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(format!("{}_{}_model", stem, EXPORT_FORMAT))
}

/// Export `model_path` for `imgsz`, reusing a previous export when it matches.
pub fn export(model_path: &Path, imgsz: u32) -> Result<AcceleratedArtifact, DetectorError> {
    let source = fs::canonicalize(model_path).map_err(|e| DetectorError::export(model_path, e))?;
    let file_name = source.file_name().map(|n| n.to_os_string()).ok_or_else(|| {
        DetectorError::export(
            model_path,
            io::Error::new(io::ErrorKind::InvalidInput, "model path has no file name"),
        )
    })?;

    let export_dir = export_dir_for(&source);
    let expected = ExportMetadata {
        source: source.clone(),
        imgsz,
        format: EXPORT_FORMAT.to_string(),
    };

    let artifact = AcceleratedArtifact {
        model: export_dir.join(&file_name),
        cache_dir: Some(export_dir.join(CACHE_DIR)),
    };

    if read_metadata(&export_dir).as_ref() == Some(&expected) && artifact.model.is_file() {
        tracing::info!(path = %export_dir.display(), "Reusing cached accelerated export");
        return Ok(artifact);
    }

    tracing::info!(
        source = %source.display(),
        imgsz,
        path = %export_dir.display(),
        "Exporting model to accelerated format (one-time)"
    );

    write_export(&source, &export_dir, &file_name, &expected)
        .map_err(|e| DetectorError::export(&export_dir, e))?;

    Ok(artifact)
}

fn read_metadata(export_dir: &Path) -> Option<ExportMetadata> {
    let raw = fs::read(export_dir.join(METADATA_FILE)).ok()?;
    serde_json::from_slice(&raw).ok()
}

/// Build the export in a sibling directory and rename it into place, so an
/// interrupted export never leaves a directory that looks complete.
fn write_export(
    source: &Path,
    export_dir: &Path,
    file_name: &std::ffi::OsStr,
    metadata: &ExportMetadata,
) -> io::Result<()> {
    let staging = export_dir.with_extension(format!("tmp-{}", std::process::id()));
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }

    fs::create_dir_all(staging.join(CACHE_DIR))?;
    fs::copy(source, staging.join(file_name))?;
    fs::write(
        staging.join(METADATA_FILE),
        serde_json::to_vec_pretty(metadata).map_err(io::Error::other)?,
    )?;

    if export_dir.exists() {
        fs::remove_dir_all(export_dir)?;
    }
    fs::rename(&staging, export_dir)
}
