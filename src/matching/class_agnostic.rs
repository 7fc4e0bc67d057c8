use crate::matching::MatchPolicy;
use crate::schema::Detection;

/// Fixed IoU threshold for confusion-matrix matching
pub const CONFUSION_IOU_THRESHOLD: f64 = 0.5;

/// Any unmatched ground truth in the image is a candidate, whatever its class.
///
/// Feeds the confusion matrix: a match here means the box was localized, and the
/// class pair records whether it was also classified correctly.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClassAgnostic;

impl ClassAgnostic {
    pub fn new() -> Self {
        Self
    }
}

impl MatchPolicy for ClassAgnostic {
    fn name(&self) -> &'static str {
        "class-agnostic"
    }

    fn iou_threshold(&self) -> f64 {
        CONFUSION_IOU_THRESHOLD
    }

    fn is_candidate(&self, _prediction: &Detection, _ground_truth: &Detection) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::match_detections;
    use crate::test_utils::{gt, pred};

    #[test]
    fn matches_across_classes() {
        let preds = [pred("a", 1, 0.9, [0.0, 0.0, 10.0, 10.0])];
        let gts = [gt("a", 0, [0.0, 0.0, 10.0, 10.0])];
        let p: Vec<&Detection> = preds.iter().collect();
        let g: Vec<&Detection> = gts.iter().collect();

        let outcome = match_detections(&ClassAgnostic::new(), &p, &g);
        assert_eq!(outcome.pairs().collect::<Vec<_>>(), vec![(0, 0)]);
    }

    #[test]
    fn uses_fixed_threshold() {
        assert_eq!(ClassAgnostic::new().iou_threshold(), 0.5);

        // IoU 1/3 stays unmatched
        let preds = [pred("a", 0, 0.9, [0.0, 0.0, 10.0, 10.0])];
        let gts = [gt("a", 0, [5.0, 0.0, 15.0, 10.0])];
        let p: Vec<&Detection> = preds.iter().collect();
        let g: Vec<&Detection> = gts.iter().collect();
        assert_eq!(match_detections(&ClassAgnostic::new(), &p, &g).true_positives(), 0);
    }
}
