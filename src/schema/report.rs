use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::SCHEMA_VERSION;
use crate::validation::RejectionSummary;

/// Per-class summary for one evaluation run
#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone, PartialEq, Default)]
pub struct ClassMetrics {
    pub class_id: usize,
    pub name: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub ap50: f64,
    pub ap50_95: f64,
    /// Number of ground-truth boxes of this class
    pub support: usize,
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    /// AP at each COCO threshold, in ascending threshold order
    #[serde(default)]
    pub ap_per_threshold: Vec<f64>,
}

/// Mean AP at a single IoU threshold
#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone, PartialEq)]
pub struct ThresholdMap {
    pub iou_threshold: f64,
    pub map: f64,
}

/// Corpus-level aggregate
#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone, PartialEq, Default)]
pub struct OverallMetrics {
    pub map50: f64,
    pub map50_95: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub num_images: usize,
    pub num_predictions: usize,
    pub num_ground_truths: usize,
    /// Classes with at least one ground truth, i.e. the ones averaged into the mAP values
    pub classes_evaluated: usize,
    #[serde(default)]
    pub map_per_threshold: Vec<ThresholdMap>,
}

/// Means over one partition of the class set
#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone, PartialEq, Default)]
pub struct GroupSummary {
    pub class_ids: Vec<usize>,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub ap50: f64,
    pub ap50_95: f64,
    /// Mean recall below the safety threshold. Never set for an empty partition.
    pub critical: bool,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone, PartialEq, Default)]
pub struct GroupMetrics {
    pub normal: GroupSummary,
    pub warning: GroupSummary,
    /// Domain alarm: the warning group's mean recall is below the safety threshold
    pub warning_critical: bool,
}

/// One ranked misclassification
#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone, PartialEq)]
pub struct ConfusedPair {
    pub true_class: usize,
    pub predicted_class: usize,
    pub true_name: String,
    pub predicted_name: String,
    /// Row-normalized share of `true_class` matches predicted as `predicted_class`
    pub rate: f64,
    pub advice: String,
}

/// Thresholds and counts describing how a run was configured
#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone, PartialEq, Default)]
pub struct RunMetadata {
    pub num_classes: usize,
    pub iou_threshold: f64,
    pub ap_thresholds: Vec<f64>,
    pub confusion_iou_threshold: f64,
    pub top_k: usize,
    pub rejected: RejectionSummary,
}

/// Immutable snapshot handed to reporting layers
#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone, PartialEq)]
pub struct EvaluationResult {
    pub version: String,
    pub metadata: RunMetadata,
    pub overall: OverallMetrics,
    pub per_class: BTreeMap<usize, ClassMetrics>,
    pub groups: GroupMetrics,
    /// Row-normalized, `[true_class][predicted_class]`
    pub confusion_matrix: Vec<Vec<f64>>,
    /// Raw match counts behind `confusion_matrix`
    pub confusion_counts: Vec<Vec<u64>>,
    pub top_confusions: Vec<ConfusedPair>,
}

impl Default for EvaluationResult {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            metadata: RunMetadata::default(),
            overall: OverallMetrics::default(),
            per_class: BTreeMap::new(),
            groups: GroupMetrics::default(),
            confusion_matrix: Vec::new(),
            confusion_counts: Vec::new(),
            top_confusions: Vec::new(),
        }
    }
}

impl EvaluationResult {
    /// Metrics for one class, if it is inside the evaluated range
    pub fn class(&self, class_id: usize) -> Option<&ClassMetrics> {
        self.per_class.get(&class_id)
    }
}
