use crate::backend::{BackendChoice, InferenceBackend, PredictParams};
use crate::config::DetectorConfig;
use crate::detection::Detection;
use crate::errors::DetectorError;
use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

/// Host facts captured when the backend is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInfo {
    pub platform: String,
    pub library_version: String,
    pub gpu_available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub backend: String,
    pub model: String,
    pub imgsz: u32,
    pub platform: String,
    #[serde(
        rename = "torch_version",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub library_version: Option<String>,
    #[serde(
        rename = "mps_available",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub gpu_available: Option<bool>,
}

struct DetectorMetrics {
    requests: Counter<u64>,
    detections: Counter<u64>,
    duration: Histogram<f64>,
}

impl DetectorMetrics {
    fn new(meter_name: &'static str) -> Self {
        let meter = global::meter(meter_name);
        let latency_buckets = [
            0.005, 0.01, 0.02, 0.03, 0.05, 0.075, 0.1, 0.15, 0.2, 0.3, 0.5, 1.0, 2.0,
        ];
        Self {
            requests: meter
                .u64_counter("detector_requests_total")
                .with_description("Detection requests by outcome")
                .build(),
            detections: meter
                .u64_counter("detector_detections_total")
                .with_description("Total detections returned")
                .build(),
            duration: meter
                .f64_histogram("detector_inference_duration_seconds")
                .with_description("Time spent in the inference call (preprocess + infer + postprocess)")
                .with_unit("s")
                .with_boundaries(latency_buckets.to_vec())
                .build(),
        }
    }
}

/// Process-wide detection context: the resolved backend and its model handle.
///
/// Built once by [`crate::resolve`] and shared read-only by every request. The
/// handle sits behind a mutex because a session run needs exclusive access, so
/// concurrent requests are served one inference at a time.
pub struct ModelContext {
    choice: BackendChoice,
    handle: Mutex<Box<dyn InferenceBackend>>,
    model_id: String,
    imgsz: u32,
    default_conf: f32,
    default_iou: f32,
    host: HostInfo,
    metrics: DetectorMetrics,
}

impl ModelContext {
    pub fn new(
        choice: BackendChoice,
        handle: Box<dyn InferenceBackend>,
        config: &DetectorConfig,
        host: HostInfo,
    ) -> Self {
        Self {
            choice,
            handle: Mutex::new(handle),
            model_id: config.model_id(),
            imgsz: config.imgsz,
            default_conf: config.conf_threshold,
            default_iou: config.iou_threshold,
            host,
            metrics: DetectorMetrics::new("detector"),
        }
    }

    pub fn backend(&self) -> BackendChoice {
        self.choice
    }

    pub fn imgsz(&self) -> u32 {
        self.imgsz
    }

    /// `(conf, iou)` used when a request does not override them.
    pub fn default_thresholds(&self) -> (f32, f32) {
        (self.default_conf, self.default_iou)
    }

    /// Decode `image_bytes`, run the model and flatten the first result set.
    ///
    /// Thresholds are forwarded to the backend as given. Blocks the calling
    /// thread for the whole inference.
    pub fn detect(
        &self,
        image_bytes: &[u8],
        conf: f32,
        iou: f32,
    ) -> Result<Vec<Detection>, DetectorError> {
        let result = self.run_detection(image_bytes, conf, iou);

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) if e.is_client_error() => "client_error",
            Err(_) => "error",
        };
        self.metrics
            .requests
            .add(1, &[KeyValue::new("outcome", outcome)]);

        result
    }

    fn run_detection(
        &self,
        image_bytes: &[u8],
        conf: f32,
        iou: f32,
    ) -> Result<Vec<Detection>, DetectorError> {
        let image = preprocess::decode_rgb(image_bytes)?;

        let params = PredictParams {
            conf,
            iou,
            imgsz: self.imgsz,
        };

        // A panicking predict leaves no half-updated state in the session
        let mut handle = self.handle.lock().unwrap_or_else(PoisonError::into_inner);

        let start = Instant::now();
        let predictions = handle
            .predict(&image, &params)
            .map_err(DetectorError::Inference)?;
        self.metrics
            .duration
            .record(start.elapsed().as_secs_f64(), &[]);

        let Some(first) = predictions.into_iter().next() else {
            tracing::debug!("Backend returned no result sets");
            return Ok(Vec::new());
        };

        let names = handle.class_names();
        let detections: Vec<Detection> = first
            .boxes
            .iter()
            .map(|raw| Detection::from_raw(raw, names))
            .collect();

        self.metrics.detections.add(detections.len() as u64, &[]);
        tracing::debug!(
            width = image.width(),
            height = image.height(),
            detections = detections.len(),
            conf,
            iou,
            "Detection complete"
        );

        Ok(detections)
    }

    pub fn health(&self) -> HealthReport {
        let generic = self.choice.is_generic();
        HealthReport {
            backend: self.choice.to_string(),
            model: self.model_id.clone(),
            imgsz: self.imgsz,
            platform: self.host.platform.clone(),
            library_version: generic.then(|| self.host.library_version.clone()),
            gpu_available: generic.then_some(self.host.gpu_available),
        }
    }
}
