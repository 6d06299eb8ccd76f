pub mod config;
pub mod result;
pub mod evaluator;

pub use config::ClosureConfig;
pub use result::{ClosureResult, SubsetOutcome, SubsetTrace, TraceEntry};
pub use evaluator::{check_parameters, closed_test};
