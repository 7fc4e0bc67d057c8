//! Greedy, confidence-ordered assignment of predictions to ground truths.
//!
//! Matching runs independently per image. Within an image, predictions are visited
//! in descending confidence and each one claims the unmatched candidate ground truth
//! with the highest IoU, provided that IoU reaches the policy threshold. Which ground
//! truths count as candidates is the only thing a `MatchPolicy` decides.

use crate::geometry::iou;
use crate::schema::Detection;
use std::collections::BTreeMap;

pub mod class_agnostic;
pub mod class_restricted;

pub use class_agnostic::{CONFUSION_IOU_THRESHOLD, ClassAgnostic};
pub use class_restricted::ClassRestricted;

pub trait MatchPolicy: Sync {
    fn name(&self) -> &'static str;
    fn iou_threshold(&self) -> f64;
    fn is_candidate(&self, prediction: &Detection, ground_truth: &Detection) -> bool;
}

/// Per-record result of one matching pass
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MatchOutcome {
    /// Indexed like the prediction input; the matched ground-truth index, if any
    pub prediction_matches: Vec<Option<usize>>,
    /// Indexed like the ground-truth input
    pub ground_truth_matched: Vec<bool>,
    /// Distinct image ids seen on either side
    pub num_images: usize,
}

impl MatchOutcome {
    pub fn true_positives(&self) -> usize {
        self.prediction_matches.iter().filter(|m| m.is_some()).count()
    }

    pub fn false_positives(&self) -> usize {
        self.prediction_matches.len() - self.true_positives()
    }

    pub fn false_negatives(&self) -> usize {
        self.ground_truth_matched.iter().filter(|m| !**m).count()
    }

    pub fn is_true_positive(&self, prediction: usize) -> bool {
        self.prediction_matches
            .get(prediction)
            .is_some_and(|m| m.is_some())
    }

    /// `(prediction_index, ground_truth_index)` for every match, in prediction order
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.prediction_matches
            .iter()
            .enumerate()
            .filter_map(|(p, m)| m.map(|g| (p, g)))
    }
}

#[derive(Debug, Default)]
struct ImageGroup {
    predictions: Vec<usize>,
    ground_truths: Vec<usize>,
}

/// Bucket record indices by image id. Keys come from both sides.
fn group_by_image<'a>(
    predictions: &[&'a Detection],
    ground_truths: &[&'a Detection],
) -> BTreeMap<&'a str, ImageGroup> {
    let mut images: BTreeMap<&str, ImageGroup> = BTreeMap::new();
    for (i, det) in predictions.iter().enumerate() {
        images
            .entry(det.image_id.as_str())
            .or_default()
            .predictions
            .push(i);
    }
    for (i, det) in ground_truths.iter().enumerate() {
        images
            .entry(det.image_id.as_str())
            .or_default()
            .ground_truths
            .push(i);
    }
    images
}

/// Indices of `indices` reordered by descending confidence; ties keep input order.
pub fn confidence_order(predictions: &[&Detection], indices: &mut [usize]) {
    indices.sort_by(|&a, &b| {
        predictions[b]
            .confidence
            .total_cmp(&predictions[a].confidence)
    });
}

/// Match every prediction against the ground truths of its own image under `policy`.
pub fn match_detections<P: MatchPolicy + ?Sized>(
    policy: &P,
    predictions: &[&Detection],
    ground_truths: &[&Detection],
) -> MatchOutcome {
    let threshold = policy.iou_threshold();
    let mut outcome = MatchOutcome {
        prediction_matches: vec![None; predictions.len()],
        ground_truth_matched: vec![false; ground_truths.len()],
        num_images: 0,
    };

    let images = group_by_image(predictions, ground_truths);
    outcome.num_images = images.len();

    for (_, mut group) in images {
        if group.predictions.is_empty() || group.ground_truths.is_empty() {
            continue;
        }
        confidence_order(predictions, &mut group.predictions);

        for &p in &group.predictions {
            let pred = predictions[p];
            let mut best_iou = 0.0;
            let mut best_gt = None;

            for &g in &group.ground_truths {
                if outcome.ground_truth_matched[g] || !policy.is_candidate(pred, ground_truths[g])
                {
                    continue;
                }
                let overlap = iou(&pred.bbox, &ground_truths[g].bbox);
                // strict: the earliest ground truth keeps exact ties
                if overlap > best_iou {
                    best_iou = overlap;
                    best_gt = Some(g);
                }
            }

            if let Some(g) = best_gt
                && best_iou >= threshold
            {
                outcome.ground_truth_matched[g] = true;
                outcome.prediction_matches[p] = Some(g);
            }
        }
    }

    log::debug!(
        "{} matching at IoU {:.2}: {} predictions, {} ground truths, {} matched",
        policy.name(),
        threshold,
        predictions.len(),
        ground_truths.len(),
        outcome.true_positives()
    );

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{gt, pred};

    fn run(policy: &dyn MatchPolicy, preds: &[Detection], gts: &[Detection]) -> MatchOutcome {
        let p: Vec<&Detection> = preds.iter().collect();
        let g: Vec<&Detection> = gts.iter().collect();
        match_detections(policy, &p, &g)
    }

    #[test]
    fn single_exact_match() {
        let outcome = run(
            &ClassRestricted::new(0.5),
            &[pred("a", 0, 0.9, [0.0, 0.0, 10.0, 10.0])],
            &[gt("a", 0, [0.0, 0.0, 10.0, 10.0])],
        );
        assert_eq!(outcome.true_positives(), 1);
        assert_eq!(outcome.false_positives(), 0);
        assert_eq!(outcome.false_negatives(), 0);
        assert_eq!(outcome.pairs().collect::<Vec<_>>(), vec![(0, 0)]);
    }

    #[test]
    fn higher_confidence_claims_first() {
        // Both predictions overlap the single ground truth; only the confident one wins
        // even though it appears second in the input.
        let outcome = run(
            &ClassRestricted::new(0.5),
            &[
                pred("a", 0, 0.3, [0.0, 0.0, 10.0, 10.0]),
                pred("a", 0, 0.8, [1.0, 0.0, 11.0, 10.0]),
            ],
            &[gt("a", 0, [0.0, 0.0, 10.0, 10.0])],
        );
        assert_eq!(outcome.prediction_matches, vec![None, Some(0)]);
    }

    #[test]
    fn exact_iou_tie_goes_to_earliest_ground_truth() {
        // Prediction sits exactly between two identical ground truths.
        let outcome = run(
            &ClassRestricted::new(0.1),
            &[pred("a", 0, 0.9, [0.0, 0.0, 10.0, 10.0])],
            &[
                gt("a", 0, [5.0, 0.0, 15.0, 10.0]),
                gt("a", 0, [-5.0, 0.0, 5.0, 10.0]),
            ],
        );
        assert_eq!(outcome.prediction_matches, vec![Some(0)]);
        assert_eq!(outcome.ground_truth_matched, vec![true, false]);
    }

    #[test]
    fn picks_highest_iou_candidate() {
        let outcome = run(
            &ClassRestricted::new(0.3),
            &[pred("a", 0, 0.9, [0.0, 0.0, 10.0, 10.0])],
            &[
                gt("a", 0, [4.0, 0.0, 14.0, 10.0]),
                gt("a", 0, [1.0, 0.0, 11.0, 10.0]),
            ],
        );
        assert_eq!(outcome.prediction_matches, vec![Some(1)]);
    }

    #[test]
    fn below_threshold_is_false_positive() {
        let outcome = run(
            &ClassRestricted::new(0.5),
            &[pred("a", 0, 0.9, [0.0, 0.0, 10.0, 10.0])],
            &[gt("a", 0, [6.0, 0.0, 16.0, 10.0])],
        );
        assert_eq!(outcome.true_positives(), 0);
        assert_eq!(outcome.false_positives(), 1);
        assert_eq!(outcome.false_negatives(), 1);
    }

    #[test]
    fn images_do_not_mix() {
        let outcome = run(
            &ClassAgnostic::new(),
            &[pred("a", 0, 0.9, [0.0, 0.0, 10.0, 10.0])],
            &[gt("b", 0, [0.0, 0.0, 10.0, 10.0])],
        );
        assert_eq!(outcome.true_positives(), 0);
        assert_eq!(outcome.num_images, 2);
    }

    #[test]
    fn ground_truth_matched_at_most_once() {
        let outcome = run(
            &ClassAgnostic::new(),
            &[
                pred("a", 0, 0.9, [0.0, 0.0, 10.0, 10.0]),
                pred("a", 1, 0.8, [0.0, 0.0, 10.0, 10.0]),
            ],
            &[gt("a", 0, [0.0, 0.0, 10.0, 10.0])],
        );
        assert_eq!(outcome.true_positives(), 1);
        assert_eq!(outcome.false_positives(), 1);
    }

    #[test]
    fn empty_inputs() {
        let outcome = run(&ClassRestricted::new(0.5), &[], &[]);
        assert_eq!(outcome, MatchOutcome::default());

        let outcome = run(&ClassRestricted::new(0.5), &[], &[gt("a", 0, [0.0, 0.0, 1.0, 1.0])]);
        assert_eq!(outcome.false_negatives(), 1);
        assert_eq!(outcome.num_images, 1);
    }

    #[test]
    fn confidence_order_is_stable() {
        let dets = [
            pred("a", 0, 0.5, [0.0, 0.0, 1.0, 1.0]),
            pred("a", 0, 0.9, [0.0, 0.0, 1.0, 1.0]),
            pred("a", 0, 0.5, [0.0, 0.0, 1.0, 1.0]),
        ];
        let refs: Vec<&Detection> = dets.iter().collect();
        let mut order = vec![0, 1, 2];
        confidence_order(&refs, &mut order);
        assert_eq!(order, vec![1, 0, 2]);
    }
}
