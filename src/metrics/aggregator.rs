//! Per-class, per-threshold and corpus-level metric aggregation.
//!
//! Every IoU threshold is an independent evaluation: matching is re-run from scratch
//! for each one, so the ten COCO thresholds can be computed in any order (or in
//! parallel) and combined afterwards.

use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

use super::ap::{PrCurve, average_precision, f1, ratio};
use crate::matching::{ClassRestricted, confidence_order, match_detections};
use crate::schema::{ClassMetrics, Detection, GroupSummary, OverallMetrics, ThresholdMap};

/// Number of COCO IoU thresholds, 0.50 through 0.95 inclusive
pub const COCO_THRESHOLD_COUNT: usize = 10;

/// Threshold behind AP50 / mAP50
pub const AP50_THRESHOLD: f64 = 0.5;

/// Mean recall below which a class group is flagged critical
pub const CRITICAL_RECALL: f64 = 0.5;

/// 0.50, 0.55, ..., 0.95 built from an integer step so 0.95 is always present
pub fn coco_thresholds() -> [f64; COCO_THRESHOLD_COUNT] {
    std::array::from_fn(|i| (50 + 5 * i) as f64 / 100.0)
}

/// Valid detections bucketed by class id
#[derive(Debug, Clone)]
pub struct ClassSlices<'a> {
    pub predictions: Vec<Vec<&'a Detection>>,
    pub ground_truths: Vec<Vec<&'a Detection>>,
}

impl<'a> ClassSlices<'a> {
    /// Records with `class_id >= num_classes` are dropped; callers validate first.
    pub fn new(
        predictions: &[&'a Detection],
        ground_truths: &[&'a Detection],
        num_classes: usize,
    ) -> Self {
        let mut slices = Self {
            predictions: vec![Vec::new(); num_classes],
            ground_truths: vec![Vec::new(); num_classes],
        };
        for &det in predictions {
            if let Some(bucket) = slices.predictions.get_mut(det.class_id) {
                bucket.push(det);
            }
        }
        for &det in ground_truths {
            if let Some(bucket) = slices.ground_truths.get_mut(det.class_id) {
                bucket.push(det);
            }
        }
        slices
    }

    pub fn num_classes(&self) -> usize {
        self.ground_truths.len()
    }

    pub fn support(&self, class_id: usize) -> usize {
        self.ground_truths.get(class_id).map_or(0, Vec::len)
    }
}

/// One class evaluated at one IoU threshold
#[derive(Debug, Clone, PartialEq)]
pub struct ClassEvaluation {
    pub class_id: usize,
    pub support: usize,
    pub ap: f64,
    pub curve: PrCurve,
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

/// Match one class's detections and integrate its AP
pub fn evaluate_class(
    class_id: usize,
    predictions: &[&Detection],
    ground_truths: &[&Detection],
    iou_threshold: f64,
) -> ClassEvaluation {
    let outcome = match_detections(
        &ClassRestricted::new(iou_threshold),
        predictions,
        ground_truths,
    );

    let mut order: Vec<usize> = (0..predictions.len()).collect();
    confidence_order(predictions, &mut order);
    let curve = PrCurve::from_outcomes(
        order.iter().map(|&p| outcome.is_true_positive(p)),
        ground_truths.len(),
    );

    ClassEvaluation {
        class_id,
        support: ground_truths.len(),
        ap: average_precision(&curve),
        curve,
        true_positives: outcome.true_positives(),
        false_positives: outcome.false_positives(),
        false_negatives: outcome.false_negatives(),
    }
}

/// All classes evaluated at one IoU threshold
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdEvaluation {
    pub iou_threshold: f64,
    pub classes: Vec<ClassEvaluation>,
}

impl ThresholdEvaluation {
    /// Mean AP over classes with at least one ground truth
    pub fn map(&self) -> f64 {
        mean(
            self.classes
                .iter()
                .filter(|c| c.support > 0)
                .map(|c| c.ap),
        )
    }
}

pub fn evaluate_threshold(
    slices: &ClassSlices<'_>,
    iou_threshold: f64,
    parallel: bool,
) -> ThresholdEvaluation {
    let run = |class_id: usize| {
        evaluate_class(
            class_id,
            &slices.predictions[class_id],
            &slices.ground_truths[class_id],
            iou_threshold,
        )
    };

    let classes = if parallel {
        (0..slices.num_classes()).into_par_iter().map(run).collect()
    } else {
        (0..slices.num_classes()).map(run).collect()
    };

    ThresholdEvaluation {
        iou_threshold,
        classes,
    }
}

/// Arithmetic mean, 0 for an empty sequence
pub fn mean<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    ratio(sum, count as f64)
}

/// Inputs for one aggregation run; detections must already be validated
pub struct AggregateRequest<'a> {
    pub predictions: &'a [&'a Detection],
    pub ground_truths: &'a [&'a Detection],
    pub class_names: &'a [String],
    pub iou_threshold: f64,
    pub parallel: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub per_class: BTreeMap<usize, ClassMetrics>,
    pub overall: OverallMetrics,
}

pub fn aggregate(request: &AggregateRequest<'_>) -> Aggregate {
    let num_classes = request.class_names.len();
    let slices = ClassSlices::new(request.predictions, request.ground_truths, num_classes);
    let thresholds = coco_thresholds();

    let sweep: Vec<ThresholdEvaluation> = if request.parallel {
        thresholds
            .par_iter()
            .map(|&t| evaluate_threshold(&slices, t, true))
            .collect()
    } else {
        thresholds
            .iter()
            .map(|&t| evaluate_threshold(&slices, t, false))
            .collect()
    };

    // single-point metrics reuse the sweep when the threshold is one of its points
    let single_point = match thresholds
        .iter()
        .position(|&t| t == request.iou_threshold)
    {
        Some(i) => sweep[i].clone(),
        None => evaluate_threshold(&slices, request.iou_threshold, request.parallel),
    };
    let ap50_index = thresholds
        .iter()
        .position(|&t| t == AP50_THRESHOLD)
        .unwrap_or(0);

    let mut per_class = BTreeMap::new();
    for class_id in 0..num_classes {
        let point = &single_point.classes[class_id];
        let (precision, recall) = point.curve.final_point();
        let ap_per_threshold: Vec<f64> = sweep.iter().map(|t| t.classes[class_id].ap).collect();

        per_class.insert(
            class_id,
            ClassMetrics {
                class_id,
                name: request.class_names[class_id].clone(),
                precision,
                recall,
                f1: f1(precision, recall),
                ap50: ap_per_threshold[ap50_index],
                ap50_95: mean(ap_per_threshold.iter().copied()),
                support: point.support,
                true_positives: point.true_positives,
                false_positives: point.false_positives,
                false_negatives: point.false_negatives,
                ap_per_threshold,
            },
        );
    }

    let supported: Vec<&ClassMetrics> = per_class.values().filter(|c| c.support > 0).collect();

    // one global pass, deliberately not derived from the per-class numbers
    let global = match_detections(
        &ClassRestricted::new(request.iou_threshold),
        request.predictions,
        request.ground_truths,
    );
    let tp = global.true_positives();
    let fp = global.false_positives();
    let fn_ = global.false_negatives();
    let precision = ratio(tp as f64, (tp + fp) as f64);
    let recall = ratio(tp as f64, (tp + fn_) as f64);

    let overall = OverallMetrics {
        map50: mean(supported.iter().map(|c| c.ap50)),
        map50_95: mean(supported.iter().map(|c| c.ap50_95)),
        precision,
        recall,
        f1: f1(precision, recall),
        true_positives: tp,
        false_positives: fp,
        false_negatives: fn_,
        num_images: global.num_images,
        num_predictions: request.predictions.len(),
        num_ground_truths: request.ground_truths.len(),
        classes_evaluated: supported.len(),
        map_per_threshold: sweep
            .iter()
            .map(|t| ThresholdMap {
                iou_threshold: t.iou_threshold,
                map: t.map(),
            })
            .collect(),
    };

    log::debug!(
        "aggregated {} classes ({} with support): mAP50 {:.4}, mAP50-95 {:.4}",
        num_classes,
        overall.classes_evaluated,
        overall.map50,
        overall.map50_95
    );

    Aggregate { per_class, overall }
}

/// Mean metrics over `class_ids`; ids without metrics are ignored
pub fn summarize_group(
    per_class: &BTreeMap<usize, ClassMetrics>,
    class_ids: &[usize],
) -> GroupSummary {
    let ids: BTreeSet<usize> = class_ids
        .iter()
        .copied()
        .filter(|id| per_class.contains_key(id))
        .collect();
    let members: Vec<&ClassMetrics> = ids.iter().filter_map(|id| per_class.get(id)).collect();

    let recall = mean(members.iter().map(|c| c.recall));
    GroupSummary {
        class_ids: ids.into_iter().collect(),
        precision: mean(members.iter().map(|c| c.precision)),
        recall,
        f1: mean(members.iter().map(|c| c.f1)),
        ap50: mean(members.iter().map(|c| c.ap50)),
        ap50_95: mean(members.iter().map(|c| c.ap50_95)),
        critical: !members.is_empty() && recall < CRITICAL_RECALL,
    }
}
