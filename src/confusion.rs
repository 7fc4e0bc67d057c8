//! Confusion matrix over class-agnostic matches and ranked misclassifications.
//!
//! Only localized pairs are counted: a ground truth with no class-agnostic match
//! (a missed detection) never enters the matrix. Misses are reported through recall
//! instead, so the matrix measures classification error given correct localization.

use std::collections::HashMap;

use crate::matching::{ClassAgnostic, MatchOutcome, match_detections};
use crate::schema::{ConfusedPair, Detection};

/// Advisory text keyed by `(true_class, predicted_class)`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdvisoryTable {
    entries: HashMap<(usize, usize), String>,
}

impl AdvisoryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = ((usize, usize), String)>,
    {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, true_class: usize, predicted_class: usize) -> Option<&str> {
        self.entries
            .get(&(true_class, predicted_class))
            .map(String::as_str)
    }

    /// Configured advice for the pair, or the generic message naming both classes
    pub fn advice(
        &self,
        true_class: usize,
        predicted_class: usize,
        true_name: &str,
        predicted_name: &str,
    ) -> String {
        match self.lookup(true_class, predicted_class) {
            Some(text) => text.to_string(),
            None => fallback_advice(true_name, predicted_name),
        }
    }
}

pub fn fallback_advice(true_name: &str, predicted_name: &str) -> String {
    format!(
        "'{}' is often predicted as '{}'; review the labels of both classes and add training samples that separate them",
        true_name, predicted_name
    )
}

/// Square `[true_class][predicted_class]` match counts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    counts: Vec<Vec<u64>>,
}

impl ConfusionMatrix {
    pub fn new(num_classes: usize) -> Self {
        Self {
            counts: vec![vec![0; num_classes]; num_classes],
        }
    }

    pub fn num_classes(&self) -> usize {
        self.counts.len()
    }

    /// Count one localized pair; ids outside the matrix are ignored
    pub fn record(&mut self, true_class: usize, predicted_class: usize) {
        if let Some(cell) = self
            .counts
            .get_mut(true_class)
            .and_then(|row| row.get_mut(predicted_class))
        {
            *cell += 1;
        }
    }

    /// Fill the matrix from the matched pairs of a class-agnostic pass
    pub fn from_outcome(
        outcome: &MatchOutcome,
        predictions: &[&Detection],
        ground_truths: &[&Detection],
        num_classes: usize,
    ) -> Self {
        let mut matrix = Self::new(num_classes);
        for (p, g) in outcome.pairs() {
            matrix.record(ground_truths[g].class_id, predictions[p].class_id);
        }
        matrix
    }

    pub fn counts(&self) -> &[Vec<u64>] {
        &self.counts
    }

    pub fn row_total(&self, true_class: usize) -> u64 {
        self.counts.get(true_class).map_or(0, |row| row.iter().sum())
    }

    /// Each row divided by its sum; empty rows stay all zero
    pub fn normalized(&self) -> Vec<Vec<f64>> {
        self.counts
            .iter()
            .map(|row| {
                let total: u64 = row.iter().sum();
                row.iter()
                    .map(|&c| if total == 0 { 0.0 } else { c as f64 / total as f64 })
                    .collect()
            })
            .collect()
    }

    /// Off-diagonal cells by descending rate, at most `k` of them.
    ///
    /// Equal rates keep row-major order.
    pub fn top_confusions(
        &self,
        k: usize,
        class_names: &[String],
        advisories: &AdvisoryTable,
    ) -> Vec<ConfusedPair> {
        let normalized = self.normalized();
        let mut cells: Vec<(usize, usize, f64)> = Vec::new();
        for (t, row) in normalized.iter().enumerate() {
            for (p, &rate) in row.iter().enumerate() {
                if t != p && rate > 0.0 {
                    cells.push((t, p, rate));
                }
            }
        }
        cells.sort_by(|a, b| b.2.total_cmp(&a.2));

        cells
            .into_iter()
            .take(k)
            .map(|(t, p, rate)| {
                let true_name = class_name(class_names, t);
                let predicted_name = class_name(class_names, p);
                ConfusedPair {
                    true_class: t,
                    predicted_class: p,
                    advice: advisories.advice(t, p, &true_name, &predicted_name),
                    true_name,
                    predicted_name,
                    rate,
                }
            })
            .collect()
    }
}

fn class_name(class_names: &[String], class_id: usize) -> String {
    class_names
        .get(class_id)
        .cloned()
        .unwrap_or_else(|| format!("class_{}", class_id))
}

/// Class-agnostic matching at the fixed confusion threshold, tallied into a matrix
pub fn build_confusion_matrix(
    predictions: &[&Detection],
    ground_truths: &[&Detection],
    num_classes: usize,
) -> ConfusionMatrix {
    let outcome = match_detections(&ClassAgnostic::new(), predictions, ground_truths);
    ConfusionMatrix::from_outcome(&outcome, predictions, ground_truths, num_classes)
}
