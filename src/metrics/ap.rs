//! Precision/recall curves and interpolated Average Precision.
//!
//! AP follows the discrete PASCAL VOC scheme: sentinel points close the curve at
//! recall 0 and recall 1, precision is replaced by its monotone non-increasing
//! envelope, and the area is summed over the steps where recall changes.

/// `numerator / denominator`, or 0 when the denominator is 0
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Harmonic mean of precision and recall, 0 when both are 0
pub fn f1(precision: f64, recall: f64) -> f64 {
    ratio(2.0 * precision * recall, precision + recall)
}

/// Running precision and recall, one point per consumed prediction
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PrCurve {
    pub precision: Vec<f64>,
    pub recall: Vec<f64>,
}

impl PrCurve {
    /// Build the curve from match outcomes ordered by descending confidence.
    ///
    /// `true` marks a true positive. Recall is 0 throughout when there are no ground truths.
    pub fn from_outcomes<I>(outcomes: I, num_ground_truths: usize) -> Self
    where
        I: IntoIterator<Item = bool>,
    {
        let mut curve = PrCurve::default();
        let mut tp = 0usize;
        let mut fp = 0usize;
        for is_tp in outcomes {
            if is_tp {
                tp += 1;
            } else {
                fp += 1;
            }
            curve.precision.push(ratio(tp as f64, (tp + fp) as f64));
            curve
                .recall
                .push(ratio(tp as f64, num_ground_truths as f64));
        }
        curve
    }

    pub fn len(&self) -> usize {
        self.precision.len()
    }

    pub fn is_empty(&self) -> bool {
        self.precision.is_empty()
    }

    /// Precision and recall after every prediction has been consumed
    pub fn final_point(&self) -> (f64, f64) {
        match (self.precision.last(), self.recall.last()) {
            (Some(&p), Some(&r)) => (p, r),
            _ => (0.0, 0.0),
        }
    }
}

/// Replace each value with the max of itself and everything after it
pub fn monotone_envelope(precision: &mut [f64]) {
    for i in (1..precision.len()).rev() {
        precision[i - 1] = precision[i - 1].max(precision[i]);
    }
}

/// Interpolated area under `curve`
pub fn average_precision(curve: &PrCurve) -> f64 {
    let mut recall = Vec::with_capacity(curve.len() + 2);
    recall.push(0.0);
    recall.extend_from_slice(&curve.recall);
    recall.push(1.0);

    let mut precision = Vec::with_capacity(curve.len() + 2);
    precision.push(0.0);
    precision.extend_from_slice(&curve.precision);
    precision.push(0.0);

    monotone_envelope(&mut precision);

    let mut ap = 0.0;
    for i in 0..recall.len() - 1 {
        if recall[i + 1] != recall[i] {
            ap += (recall[i + 1] - recall[i]) * precision[i + 1];
        }
    }
    ap
}
