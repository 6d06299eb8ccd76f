pub mod error;
pub mod weight;
pub mod graph;
pub mod entangled;
pub mod subsets;
pub mod propagation;
pub mod strategy;

// Core types
pub type F = f64;
pub type NodeId = usize;

/// Largest hypothesis count accepted by the engine.
///
/// A weight table over `n` hypotheses holds two dense `(2^n - 1) × n`
/// matrices of `f64` (membership and weights). At `n = 20` that is about
/// 335 MB, plus the per-row vectors held while the table is built.
pub const MAX_HYPOTHESES: usize = 20;

pub use error::{ClosureError, Result, Warning};
pub use weight::Weight;
pub use graph::{Edge, Graph, GraphSpec};
pub use entangled::{EntangledGraph, GraphModel};
pub use subsets::{Subset, SubsetEnumerator};
pub use propagation::{local_weights, WeightTable};
pub use strategy::{
    ParamValue, TestContext, TestOutcome, TestParams, WeightedTest, RESERVED_PARAMETERS,
};

/// Default node names `H1..Hn`.
pub fn default_names(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("H{}", i)).collect()
}
