use crate::config::{ClassGroups, ConfigError, EvalConfig};
use crate::confusion::{AdvisoryTable, build_confusion_matrix};
use crate::matching::CONFUSION_IOU_THRESHOLD;
use crate::metrics::{
    AggregateRequest, ClassSlices, ThresholdEvaluation, aggregate, coco_thresholds,
    evaluate_threshold, summarize_group,
};
use crate::schema::{Detection, EvaluationResult, GroupMetrics, RunMetadata, SCHEMA_VERSION};
use crate::validation::{RejectionSummary, Side, filter_valid};

/// Stateless evaluation pipeline over a fixed, validated configuration.
///
/// Each call to [`Evaluator::evaluate`] is a pure function of its inputs.
#[derive(Debug, Clone)]
pub struct Evaluator {
    class_names: Vec<String>,
    groups: ClassGroups,
    advisories: AdvisoryTable,
    iou_threshold: f64,
    top_k: usize,
    parallel: bool,
}

impl Evaluator {
    pub fn new(config: &EvalConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            class_names: config.class_names(),
            groups: config.groups.clone(),
            advisories: config.advisory_table(),
            iou_threshold: config.evaluation.iou_threshold,
            top_k: config.evaluation.top_k_confusions,
            parallel: config.evaluation.parallel,
        })
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    /// Validate both sides, then compute every metric of the result.
    ///
    /// Never fails: invalid records are skipped and counted in
    /// `metadata.rejected`, and empty input yields an all-zero result.
    pub fn evaluate(
        &self,
        predictions: &[Detection],
        ground_truths: &[Detection],
    ) -> EvaluationResult {
        self.evaluate_with_rejections(predictions, ground_truths, RejectionSummary::default())
    }

    /// Same as [`Evaluator::evaluate`], continuing from records already rejected
    /// upstream (for example while decoding input files).
    pub fn evaluate_with_rejections(
        &self,
        predictions: &[Detection],
        ground_truths: &[Detection],
        mut rejected: RejectionSummary,
    ) -> EvaluationResult {
        let num_classes = self.num_classes();
        let predictions = filter_valid(predictions, num_classes, Side::Prediction, &mut rejected);
        let ground_truths =
            filter_valid(ground_truths, num_classes, Side::GroundTruth, &mut rejected);
        if rejected.total() > 0 {
            log::warn!(
                "rejected {} malformed records ({} predictions, {} ground truths)",
                rejected.total(),
                rejected.predictions,
                rejected.ground_truths
            );
        }

        log::debug!(
            "evaluating {} predictions against {} ground truths over {} classes",
            predictions.len(),
            ground_truths.len(),
            num_classes
        );

        let aggregate = aggregate(&AggregateRequest {
            predictions: &predictions,
            ground_truths: &ground_truths,
            class_names: &self.class_names,
            iou_threshold: self.iou_threshold,
            parallel: self.parallel,
        });

        let normal = summarize_group(&aggregate.per_class, &self.groups.normal);
        let warning = summarize_group(&aggregate.per_class, &self.groups.warning);
        if warning.critical {
            log::warn!(
                "warning-group recall {:.3} is below the safety threshold",
                warning.recall
            );
        }
        let groups = GroupMetrics {
            warning_critical: warning.critical,
            normal,
            warning,
        };

        let confusion = build_confusion_matrix(&predictions, &ground_truths, num_classes);
        let top_confusions = confusion.top_confusions(self.top_k, &self.class_names, &self.advisories);

        EvaluationResult {
            version: SCHEMA_VERSION.to_string(),
            metadata: RunMetadata {
                num_classes,
                iou_threshold: self.iou_threshold,
                ap_thresholds: coco_thresholds().to_vec(),
                confusion_iou_threshold: CONFUSION_IOU_THRESHOLD,
                top_k: self.top_k,
                rejected,
            },
            overall: aggregate.overall,
            per_class: aggregate.per_class,
            groups,
            confusion_matrix: confusion.normalized(),
            confusion_counts: confusion.counts().to_vec(),
            top_confusions,
        }
    }

    /// Per-class AP at a single IoU threshold, independent of any other threshold,
    /// along with the records skipped by validation
    pub fn evaluate_at_threshold(
        &self,
        predictions: &[Detection],
        ground_truths: &[Detection],
        iou_threshold: f64,
    ) -> (ThresholdEvaluation, RejectionSummary) {
        let num_classes = self.num_classes();
        let mut rejected = RejectionSummary::default();
        let predictions = filter_valid(predictions, num_classes, Side::Prediction, &mut rejected);
        let ground_truths =
            filter_valid(ground_truths, num_classes, Side::GroundTruth, &mut rejected);
        let slices = ClassSlices::new(&predictions, &ground_truths, num_classes);
        (
            evaluate_threshold(&slices, iou_threshold, self.parallel),
            rejected,
        )
    }
}
