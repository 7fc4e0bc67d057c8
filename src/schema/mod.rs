pub mod detection;
pub mod report;

// Re-export commonly used types
pub use detection::{BBox, Detection, GROUND_TRUTH_CONFIDENCE};
pub use report::{
    ClassMetrics, ConfusedPair, EvaluationResult, GroupMetrics, GroupSummary, OverallMetrics,
    RunMetadata, ThresholdMap,
};

pub const SCHEMA_VERSION: &str = "0.1.0";
