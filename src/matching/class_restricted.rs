use crate::matching::MatchPolicy;
use crate::schema::Detection;

/// Candidates must share the prediction's class. Used for AP and precision/recall.
///
/// The threshold is per instance because AP evaluation re-runs this policy fresh for
/// every IoU threshold; no state carries over between runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassRestricted {
    iou_threshold: f64,
}

impl ClassRestricted {
    pub fn new(iou_threshold: f64) -> Self {
        Self { iou_threshold }
    }
}

impl MatchPolicy for ClassRestricted {
    fn name(&self) -> &'static str {
        "class-restricted"
    }

    fn iou_threshold(&self) -> f64 {
        self.iou_threshold
    }

    fn is_candidate(&self, prediction: &Detection, ground_truth: &Detection) -> bool {
        prediction.class_id == ground_truth.class_id
    }
}
