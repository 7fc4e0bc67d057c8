use crate::geometry::is_well_formed;
use crate::schema::Detection;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Why a single detection record was skipped
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, thiserror::Error)]
pub enum RejectReason {
    #[error("confidence is not a finite value in [0, 1]")]
    ConfidenceOutOfRange,
    #[error("bbox must be finite with x1 < x2 and y1 < y2")]
    DegenerateBox,
    #[error("class id outside [0, num_classes)")]
    ClassOutOfRange,
    #[error("record does not decode as a detection")]
    Malformed,
    #[error("prediction has no confidence")]
    MissingConfidence,
}

impl RejectReason {
    /// Stable key used in `RejectionSummary::by_reason`
    pub fn key(&self) -> &'static str {
        match self {
            RejectReason::ConfidenceOutOfRange => "confidence_out_of_range",
            RejectReason::DegenerateBox => "degenerate_box",
            RejectReason::ClassOutOfRange => "class_out_of_range",
            RejectReason::Malformed => "malformed",
            RejectReason::MissingConfidence => "missing_confidence",
        }
    }
}

/// Which input list a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Prediction,
    GroundTruth,
}

/// Counts of records skipped during ingestion
#[derive(Debug, Serialize, Deserialize, JsonSchema, Clone, PartialEq, Eq, Default)]
pub struct RejectionSummary {
    pub predictions: usize,
    pub ground_truths: usize,
    #[serde(default)]
    pub by_reason: BTreeMap<String, usize>,
}

impl RejectionSummary {
    pub fn total(&self) -> usize {
        self.predictions + self.ground_truths
    }

    pub fn record(&mut self, side: Side, reason: RejectReason) {
        match side {
            Side::Prediction => self.predictions += 1,
            Side::GroundTruth => self.ground_truths += 1,
        }
        *self.by_reason.entry(reason.key().to_string()).or_insert(0) += 1;
    }
}

/// Check one record against the detection invariants
pub fn validate(det: &Detection, num_classes: usize) -> Result<(), RejectReason> {
    if !det.confidence.is_finite() || !(0.0..=1.0).contains(&det.confidence) {
        return Err(RejectReason::ConfidenceOutOfRange);
    }
    if !is_well_formed(&det.bbox) {
        return Err(RejectReason::DegenerateBox);
    }
    if det.class_id >= num_classes {
        return Err(RejectReason::ClassOutOfRange);
    }
    Ok(())
}

/// Decode raw JSON records one at a time, skipping and tallying the ones that fail.
///
/// Predictions must carry an explicit, non-null `confidence`; only ground truths fall
/// back to the default.
pub fn decode_records(
    records: Vec<serde_json::Value>,
    side: Side,
    summary: &mut RejectionSummary,
) -> Vec<Detection> {
    let mut decoded = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        if side == Side::Prediction
            && record.as_object().is_some_and(|fields| {
                fields
                    .get("confidence")
                    .is_none_or(serde_json::Value::is_null)
            })
        {
            log::warn!(
                "skipping {:?} #{}: {}",
                side,
                index,
                RejectReason::MissingConfidence
            );
            summary.record(side, RejectReason::MissingConfidence);
            continue;
        }
        match serde_json::from_value::<Detection>(record) {
            Ok(det) => decoded.push(det),
            Err(e) => {
                log::warn!(
                    "skipping {:?} #{}: {}: {}",
                    side,
                    index,
                    RejectReason::Malformed,
                    e
                );
                summary.record(side, RejectReason::Malformed);
            }
        }
    }
    decoded
}

/// Keep the valid records of one side, tallying the rest into `summary`
pub fn filter_valid<'a>(
    detections: &'a [Detection],
    num_classes: usize,
    side: Side,
    summary: &mut RejectionSummary,
) -> Vec<&'a Detection> {
    let mut kept = Vec::with_capacity(detections.len());
    for (index, det) in detections.iter().enumerate() {
        match validate(det, num_classes) {
            Ok(()) => kept.push(det),
            Err(reason) => {
                log::warn!(
                    "skipping {:?} #{} (image {:?}, class {}): {}",
                    side,
                    index,
                    det.image_id,
                    det.class_id,
                    reason
                );
                summary.record(side, reason);
            }
        }
    }
    kept
}
