#![allow(dead_code)]

use image::{ImageFormat, Rgb, RgbImage};
use inference::export::AcceleratedArtifact;
use inference::{
    BackendLoader, ClassNames, DetectorConfig, Device, InferenceBackend, PredictParams,
    Prediction, RawBox,
};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Backend returning a fixed set of result sets regardless of the image.
pub struct FakeBackend {
    pub predictions: Vec<Prediction>,
    pub names: ClassNames,
    pub calls: Arc<Mutex<Vec<PredictParams>>>,
    pub fail: bool,
}

impl FakeBackend {
    pub fn with_boxes(boxes: Vec<RawBox>) -> Self {
        Self {
            predictions: vec![Prediction { boxes }],
            names: [(0, "person"), (16, "dog")].into_iter().collect(),
            calls: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    pub fn empty() -> Self {
        Self {
            predictions: Vec::new(),
            ..Self::with_boxes(Vec::new())
        }
    }
}

impl InferenceBackend for FakeBackend {
    fn predict(
        &mut self,
        _image: &RgbImage,
        params: &PredictParams,
    ) -> anyhow::Result<Vec<Prediction>> {
        self.calls.lock().unwrap().push(*params);
        if self.fail {
            anyhow::bail!("session run failed");
        }
        Ok(self.predictions.clone())
    }

    fn class_names(&self) -> &ClassNames {
        &self.names
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoaderCall {
    Accelerated(AcceleratedArtifact),
    Generic(PathBuf, Device, usize),
}

/// Loader recording every attempt, with switchable failures per backend.
#[derive(Default)]
pub struct FakeLoader {
    pub accelerated_fails: bool,
    pub generic_fails: bool,
    pub gpu: bool,
    pub calls: Mutex<Vec<LoaderCall>>,
}

impl FakeLoader {
    pub fn calls(&self) -> Vec<LoaderCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl BackendLoader for FakeLoader {
    fn load_accelerated(
        &self,
        artifact: &AcceleratedArtifact,
    ) -> anyhow::Result<Box<dyn InferenceBackend>> {
        self.calls
            .lock()
            .unwrap()
            .push(LoaderCall::Accelerated(artifact.clone()));
        if self.accelerated_fails {
            anyhow::bail!("OpenVINO runtime not available");
        }
        Ok(Box::new(FakeBackend::empty()))
    }

    fn load_generic(
        &self,
        model: &Path,
        device: Device,
        intra_threads: usize,
    ) -> anyhow::Result<Box<dyn InferenceBackend>> {
        self.calls.lock().unwrap().push(LoaderCall::Generic(
            model.to_path_buf(),
            device,
            intra_threads,
        ));
        if self.generic_fails {
            anyhow::bail!("No such file: {}", model.display());
        }
        Ok(Box::new(FakeBackend::empty()))
    }

    fn gpu_available(&self) -> bool {
        self.gpu
    }

    fn library_version(&self) -> String {
        "ort test".to_string()
    }
}

pub fn config_from(pairs: &[(&str, &str)]) -> DetectorConfig {
    DetectorConfig::from_lookup(|key| {
        pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string())
    })
    .unwrap()
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([200, 30, 30]));
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
}
