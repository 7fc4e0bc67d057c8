//! Precision/recall, Average Precision and their aggregation across classes,
//! IoU thresholds and class groups.

pub mod aggregator;
pub mod ap;

pub use aggregator::{
    AP50_THRESHOLD, Aggregate, AggregateRequest, COCO_THRESHOLD_COUNT, CRITICAL_RECALL,
    ClassEvaluation, ClassSlices, ThresholdEvaluation, aggregate, coco_thresholds,
    evaluate_class, evaluate_threshold, summarize_group,
};
pub use ap::{PrCurve, average_precision, f1, monotone_envelope, ratio};
