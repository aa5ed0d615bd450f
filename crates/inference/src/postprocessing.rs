use crate::backend::{Prediction, RawBox};
use ndarray::{ArrayView2, ArrayViewD, Axis, Ix2};
use preprocess::Letterbox;
use std::cmp::Ordering;

/// Upper bound on boxes returned per image.
pub const MAX_DETECTIONS: usize = 300;

/// Upper bound on candidates entering NMS.
pub const MAX_NMS_CANDIDATES: usize = 30_000;

#[derive(Debug, Clone, Copy)]
struct Candidate {
    xyxy: [f32; 4],
    confidence: f32,
    class_id: u32,
}

pub struct PostProcessor {
    pub max_detections: usize,
    /// Class count from the model metadata, used to tell the output layout apart
    pub num_classes: Option<usize>,
}

impl Default for PostProcessor {
    fn default() -> Self {
        Self::new(MAX_DETECTIONS)
    }
}

impl PostProcessor {
    pub fn new(max_detections: usize) -> Self {
        Self {
            max_detections,
            num_classes: None,
        }
    }

    pub fn with_num_classes(mut self, num_classes: usize) -> Self {
        self.num_classes = Some(num_classes);
        self
    }

    /// Decode a YOLOv8-style head output into one [`Prediction`] per batch entry.
    ///
    /// `output` is `[batch, 4 + classes, anchors]` (or the transposed
    /// `[batch, anchors, 4 + classes]`). Each anchor holds `cx, cy, w, h` in
    /// model-input pixels followed by per-class scores.
    #[tracing::instrument(skip(self, output, letterbox))]
    pub fn parse_detections(
        &self,
        output: &ArrayViewD<f32>,
        conf: f32,
        iou: f32,
        letterbox: &Letterbox,
    ) -> anyhow::Result<Vec<Prediction>> {
        let output = match output.ndim() {
            2 => output.clone().insert_axis(Axis(0)),
            3 => output.clone(),
            n => anyhow::bail!("Expected a 3-D detection output, got {} dimensions", n),
        };

        output
            .axis_iter(Axis(0))
            .map(|batch| {
                let batch = batch.into_dimensionality::<Ix2>()?;
                let batch = if self.is_channels_first(batch.shape()) {
                    batch
                } else {
                    batch.reversed_axes()
                };
                self.parse_batch(&batch, conf, iou, letterbox)
            })
            .collect()
    }

    fn is_channels_first(&self, shape: &[usize]) -> bool {
        match self.num_classes.map(|nc| nc + 4) {
            Some(attrs) if shape[0] == attrs => true,
            Some(attrs) if shape[1] == attrs => false,
            // Attributes are the short axis: 84 vs 8400 for a COCO model at 640
            _ => shape[0] <= shape[1],
        }
    }

    fn parse_batch(
        &self,
        attrs: &ArrayView2<f32>,
        conf: f32,
        iou: f32,
        letterbox: &Letterbox,
    ) -> anyhow::Result<Prediction> {
        let num_attrs = attrs.shape()[0];
        let num_anchors = attrs.shape()[1];

        if num_attrs <= 4 {
            anyhow::bail!(
                "Detection output has {} attributes per anchor, expected box + class scores",
                num_attrs
            );
        }

        let mut candidates = Vec::new();

        for i in 0..num_anchors {
            let mut class_id = 0usize;
            let mut confidence = f32::NEG_INFINITY;
            for c in 4..num_attrs {
                let score = attrs[[c, i]];
                if score > confidence {
                    confidence = score;
                    class_id = c - 4;
                }
            }

            if confidence.is_nan() || confidence <= conf {
                continue;
            }

            let cx = attrs[[0, i]];
            let cy = attrs[[1, i]];
            let w = attrs[[2, i]];
            let h = attrs[[3, i]];

            candidates.push(Candidate {
                xyxy: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
                confidence,
                class_id: class_id as u32,
            });
        }

        tracing::trace!(candidates = candidates.len(), "Candidates above threshold");

        candidates.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
        });
        candidates.truncate(MAX_NMS_CANDIDATES);

        let kept = non_max_suppression(&candidates, iou, self.max_detections);

        let boxes = kept
            .into_iter()
            .map(|candidate| {
                let (x1, y1) = letterbox.to_original(candidate.xyxy[0], candidate.xyxy[1]);
                let (x2, y2) = letterbox.to_original(candidate.xyxy[2], candidate.xyxy[3]);
                RawBox {
                    xyxy: [x1, y1, x2, y2],
                    confidence: candidate.confidence,
                    class_id: candidate.class_id,
                }
            })
            .collect();

        Ok(Prediction { boxes })
    }
}

/// Greedy per-class NMS over candidates sorted by descending confidence.
fn non_max_suppression(sorted: &[Candidate], iou_threshold: f32, limit: usize) -> Vec<Candidate> {
    let mut kept: Vec<Candidate> = Vec::new();

    for candidate in sorted {
        if kept.len() >= limit {
            break;
        }

        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && iou(&k.xyxy, &candidate.xyxy) > iou_threshold
        });

        if !suppressed {
            kept.push(*candidate);
        }
    }

    kept
}

pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - intersection;

    if union > 0.0 { intersection / union } else { 0.0 }
}
