use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClosureError>;

/// Configuration errors. Any of these aborts a closed-test run before a
/// single intersection hypothesis is evaluated.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClosureError {
    // === Graph shape ===
    #[error("transition matrix must be square, got {rows}x{cols}")]
    NonSquareTransition { rows: usize, cols: usize },

    #[error("expected {expected} node weights, got {actual}")]
    WeightLengthMismatch { expected: usize, actual: usize },

    #[error("expected {expected} node names, got {actual}")]
    NameLengthMismatch { expected: usize, actual: usize },

    #[error("duplicate node name '{name}'")]
    DuplicateName { name: String },

    #[error("edge {from} -> {to} is out of range for a graph with {nodes} nodes")]
    EdgeOutOfRange { from: usize, to: usize, nodes: usize },

    #[error("edge {from} -> {to} is declared twice")]
    DuplicateEdge { from: usize, to: usize },

    #[error("weight {value} at {location} is negative")]
    NegativeWeight { location: String, value: f64 },

    #[error("weight at {location} is not finite")]
    NonFiniteWeight { location: String },

    #[error("node weights sum to {total}, more than 1")]
    WeightSumExceedsOne { total: f64 },

    #[error("graph has no nodes")]
    EmptyGraph,

    #[error("{n} hypotheses exceed the supported maximum of {max}")]
    TooManyHypotheses { n: usize, max: usize },

    #[error("invalid entangled graph: {reason}")]
    InvalidMixture { reason: String },

    #[error("expected {expected} rejection flags, got {actual}")]
    FlagLengthMismatch { expected: usize, actual: usize },

    #[error("no node named '{name}'")]
    UnknownNode { name: String },

    #[error("cannot parse weight '{input}': {reason}")]
    WeightParse { input: String, reason: String },

    // === Run inputs ===
    #[error("expected {expected} p-values, got {actual}")]
    PValueLengthMismatch { expected: usize, actual: usize },

    #[error("p-value {value} at position {index} is outside [0, 1]")]
    InvalidPValue { index: usize, value: f64 },

    #[error("alpha {0} must lie in (0, 1]")]
    InvalidAlpha(f64),

    #[error("epsilon {0} must lie in [0, 1)")]
    InvalidEpsilon(f64),

    // === Test strategy ===
    #[error("test '{test}' requires parameter '{parameter}'")]
    MissingParameter { test: String, parameter: String },

    #[error("test '{test}': invalid parameter '{parameter}': {reason}")]
    InvalidParameter { test: String, parameter: String, reason: String },

    #[error("test '{test}' cannot produce adjusted p-values")]
    AdjustedUnsupported { test: String },
}

/// Degenerate input that was repaired in place, or an informational notice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// A non-zero self loop was dropped from the transition matrix.
    SelfLoopRemoved { node: String, weight: String },
    /// An intersection's weights summed to zero during upscaling; the row is left at 0.
    ZeroWeightNormalization { subset: String },
    /// A caller-supplied parameter that the selected test does not read.
    UnusedParameter { test: String, parameter: String },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::SelfLoopRemoved { node, weight } => {
                write!(f, "self loop on {} with weight {} set to 0", node, weight)
            }
            Warning::ZeroWeightNormalization { subset } => {
                write!(f, "weights of intersection {} sum to 0, left unscaled", subset)
            }
            Warning::UnusedParameter { test, parameter } => {
                write!(f, "parameter '{}' is not used by test '{}'", parameter, test)
            }
        }
    }
}

impl Warning {
    /// Log the warning and hand it back, so call sites can `push(w.emit())`.
    pub fn emit(self) -> Self {
        tracing::warn!(target: "graphmcp", "{}", self);
        self
    }
}
