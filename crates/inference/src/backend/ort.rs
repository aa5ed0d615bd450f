use super::{BackendChoice, Device, InferenceBackend, PredictParams, Prediction};
use crate::export::AcceleratedArtifact;
use crate::names::ClassNames;
use crate::postprocessing::PostProcessor;
use crate::resolver::BackendLoader;
use image::RgbImage;
use ort::{
    session::{
        Session,
        builder::{GraphOptimizationLevel, SessionBuilder},
    },
    value::TensorRef,
};
use preprocess::CpuPreProcessor;
use std::path::{Path, PathBuf};

/// Version of the `ort` bindings this crate is built against, reported by `/health`.
pub const ORT_VERSION: &str = "2.0.0-rc.11";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionProvider {
    Cpu,
    CoreMl,
    OpenVino {
        /// Directory OpenVINO persists compiled blobs to
        cache_dir: Option<PathBuf>,
    },
}

impl ExecutionProvider {
    pub fn for_choice(choice: BackendChoice, cache_dir: Option<PathBuf>) -> Self {
        match choice {
            BackendChoice::Accelerated => ExecutionProvider::OpenVino { cache_dir },
            BackendChoice::Generic(Device::Cpu) => ExecutionProvider::Cpu,
            BackendChoice::Generic(Device::AppleGpu) => ExecutionProvider::CoreMl,
        }
    }
}

pub struct OrtBackend {
    session: Session,
    preprocessor: CpuPreProcessor,
    postprocessor: PostProcessor,
    names: ClassNames,
}

impl OrtBackend {
    /// Load model with specified execution provider
    pub fn load_model_with_provider(
        path: &Path,
        provider: &ExecutionProvider,
        intra_threads: usize,
        imgsz: u32,
    ) -> anyhow::Result<Self> {
        // Initialize ORT environment (idempotent)
        let _ = ort::init().commit();

        let mut builder = session_builder(intra_threads)?;

        match provider {
            ExecutionProvider::Cpu => {
                tracing::info!("Initializing ONNX Runtime with CPU execution provider");
            }
            ExecutionProvider::CoreMl => {
                tracing::info!("Initializing ONNX Runtime with CoreML execution provider");
                builder = with_coreml(builder)?;
            }
            ExecutionProvider::OpenVino { cache_dir } => {
                tracing::info!(
                    cache_dir = ?cache_dir,
                    "Initializing ONNX Runtime with OpenVINO execution provider"
                );
                builder = with_openvino(builder, cache_dir.as_deref())?;
            }
        }

        let session = builder.commit_from_file(path)?;
        let names = read_class_names(&session);

        let mut postprocessor = PostProcessor::default();
        if !names.is_empty() {
            postprocessor = postprocessor.with_num_classes(names.len());
        }

        tracing::info!(
            path = %path.display(),
            classes = names.len(),
            "Model loaded"
        );

        Ok(Self {
            session,
            preprocessor: CpuPreProcessor::square(imgsz),
            postprocessor,
            names,
        })
    }
}

impl InferenceBackend for OrtBackend {
    fn predict(
        &mut self,
        image: &RgbImage,
        params: &PredictParams,
    ) -> anyhow::Result<Vec<Prediction>> {
        if self.preprocessor.input_size != (params.imgsz, params.imgsz) {
            self.preprocessor = CpuPreProcessor::square(params.imgsz);
        }

        let input = self.preprocessor.preprocess_image(image)?;

        let _s = common::span!("session_run");
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(
            input.tensor.view()
        )?])?;
        drop(_s);

        let head = outputs[0].try_extract_array::<f32>()?;

        self.postprocessor
            .parse_detections(&head, params.conf, params.iou, &input.letterbox)
    }

    fn class_names(&self) -> &ClassNames {
        &self.names
    }
}

/// [`BackendLoader`] creating [`OrtBackend`] sessions.
#[derive(Debug, Clone, Copy)]
pub struct OrtLoader {
    pub imgsz: u32,
}

impl OrtLoader {
    pub fn new(imgsz: u32) -> Self {
        Self { imgsz }
    }
}

impl BackendLoader for OrtLoader {
    fn load_accelerated(
        &self,
        artifact: &AcceleratedArtifact,
    ) -> anyhow::Result<Box<dyn InferenceBackend>> {
        let provider = ExecutionProvider::for_choice(
            BackendChoice::Accelerated,
            artifact.cache_dir.clone(),
        );
        let backend = OrtBackend::load_model_with_provider(&artifact.model, &provider, 0, self.imgsz)?;
        Ok(Box::new(backend))
    }

    fn load_generic(
        &self,
        model: &Path,
        device: Device,
        intra_threads: usize,
    ) -> anyhow::Result<Box<dyn InferenceBackend>> {
        let provider = ExecutionProvider::for_choice(BackendChoice::Generic(device), None);
        let backend =
            OrtBackend::load_model_with_provider(model, &provider, intra_threads, self.imgsz)?;
        Ok(Box::new(backend))
    }

    fn gpu_available(&self) -> bool {
        coreml_available()
    }

    fn library_version(&self) -> String {
        format!("ort {}", ORT_VERSION)
    }
}

/// Session builder with full graph optimisation. A thread count the runtime
/// refuses is logged and the library default is kept instead.
fn session_builder(intra_threads: usize) -> anyhow::Result<SessionBuilder> {
    let builder = Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?;

    if intra_threads == 0 {
        return Ok(builder);
    }

    match builder.with_intra_threads(intra_threads) {
        Ok(builder) => Ok(builder),
        Err(e) => {
            tracing::warn!(
                error = %e,
                intra_threads,
                "Could not set intra-op thread count, using library default"
            );
            Ok(Session::builder()?.with_optimization_level(GraphOptimizationLevel::Level3)?)
        }
    }
}

fn read_class_names(session: &Session) -> ClassNames {
    let metadata = match session.metadata() {
        Ok(metadata) => metadata,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read model metadata");
            return ClassNames::default();
        }
    };

    let Some(raw) = metadata.custom("names") else {
        tracing::warn!("Model has no class names metadata, labels will be class ids");
        return ClassNames::default();
    };

    ClassNames::parse(&raw).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Unparseable class names metadata, labels will be class ids");
        ClassNames::default()
    })
}

#[cfg(feature = "openvino")]
fn with_openvino(
    builder: SessionBuilder,
    cache_dir: Option<&Path>,
) -> anyhow::Result<SessionBuilder> {
    let mut provider =
        ort::execution_providers::OpenVINOExecutionProvider::default().with_device_type("CPU");
    if let Some(dir) = cache_dir {
        provider = provider.with_cache_dir(dir.display().to_string());
    }
    Ok(builder.with_execution_providers([provider.build().error_on_failure()])?)
}

#[cfg(not(feature = "openvino"))]
fn with_openvino(
    _builder: SessionBuilder,
    _cache_dir: Option<&Path>,
) -> anyhow::Result<SessionBuilder> {
    anyhow::bail!("OpenVINO execution provider requested but openvino feature is not enabled")
}

#[cfg(feature = "coreml")]
fn with_coreml(builder: SessionBuilder) -> anyhow::Result<SessionBuilder> {
    Ok(builder.with_execution_providers([
        ort::execution_providers::CoreMLExecutionProvider::default()
            .build()
            .error_on_failure(),
    ])?)
}

#[cfg(not(feature = "coreml"))]
fn with_coreml(_builder: SessionBuilder) -> anyhow::Result<SessionBuilder> {
    anyhow::bail!("CoreML execution provider requested but coreml feature is not enabled")
}

#[cfg(feature = "coreml")]
fn coreml_available() -> bool {
    use ort::execution_providers::ExecutionProvider as _;

    ort::execution_providers::CoreMLExecutionProvider::default()
        .is_available()
        .unwrap_or(false)
}

#[cfg(not(feature = "coreml"))]
fn coreml_available() -> bool {
    false
}
