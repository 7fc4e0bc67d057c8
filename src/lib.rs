pub mod config;
pub mod confusion;
pub mod engine;
pub mod geometry;
pub mod matching;
pub mod metrics;
pub mod schema;
pub mod test_utils;
pub mod validation;

pub use config::{ConfigError, EvalConfig};
pub use engine::Evaluator;
pub use schema::{Detection, EvaluationResult};
