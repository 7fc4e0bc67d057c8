use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Axis-aligned box as `[x1, y1, x2, y2]`.
pub type BBox = [f64; 4];

/// Confidence assigned to ground-truth boxes.
pub const GROUND_TRUTH_CONFIDENCE: f64 = 1.0;

/// One geometric observation, either a model prediction or a ground-truth annotation.
///
/// `image_id` is the grouping key for matching: boxes only ever compete with boxes
/// of the same image.
#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone, PartialEq)]
pub struct Detection {
    pub class_id: usize,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    pub bbox: BBox,
    pub image_id: String,
}

fn default_confidence() -> f64 {
    GROUND_TRUTH_CONFIDENCE
}

impl Detection {
    /// Create a model prediction
    pub fn prediction(
        image_id: impl Into<String>,
        class_id: usize,
        confidence: f64,
        bbox: BBox,
    ) -> Self {
        Self {
            class_id,
            confidence,
            bbox,
            image_id: image_id.into(),
        }
    }

    /// Create a ground-truth annotation
    ///
    /// Confidence is fixed at `GROUND_TRUTH_CONFIDENCE`.
    pub fn ground_truth(image_id: impl Into<String>, class_id: usize, bbox: BBox) -> Self {
        Self {
            class_id,
            confidence: GROUND_TRUTH_CONFIDENCE,
            bbox,
            image_id: image_id.into(),
        }
    }
}
