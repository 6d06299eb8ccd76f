use graphmcp_core::{GraphModel, Subset, Warning, WeightTable, F};
use serde::Serialize;
use std::fmt;

/// Result of the weighted test on one intersection hypothesis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SubsetOutcome {
    pub subset: Subset,
    pub rejected: bool,
    /// `None` in decision mode.
    pub adjusted_pvalue: Option<F>,
}

/// One member of a traced intersection.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TraceEntry {
    pub name: String,
    pub pvalue: F,
    pub weight: F,
}

/// Human-readable account of how one intersection was tested.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubsetTrace {
    pub label: String,
    pub subset: Subset,
    pub members: Vec<TraceEntry>,
    pub rejected: bool,
    pub adjusted_pvalue: Option<F>,
}

impl fmt::Display for SubsetTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} (", self.label, if self.rejected { "rejected" } else { "not rejected" })?;
        for (k, m) in self.members.iter().enumerate() {
            if k > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: p = {:.4}, w = {:.4}", m.name, m.pvalue, m.weight)?;
        }
        if let Some(adj) = self.adjusted_pvalue {
            write!(f, "; adj p = {:.4}", adj)?;
        }
        write!(f, ")")
    }
}

/// Outcome of a closed test. Built once by [`crate::closed_test`].
#[derive(Clone, Debug, Serialize)]
pub struct ClosureResult {
    pub(crate) graph_before: GraphModel,
    pub(crate) graph_after: GraphModel,
    pub(crate) alpha: F,
    pub(crate) pvalues: Vec<F>,
    pub(crate) rejected: Vec<bool>,
    pub(crate) adjusted_pvalues: Vec<Option<F>>,
    pub(crate) table: WeightTable,
    pub(crate) outcomes: Vec<SubsetOutcome>,
    pub(crate) warnings: Vec<Warning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) trace: Option<Vec<SubsetTrace>>,
}

impl ClosureResult {
    /// The model as supplied, ε-weights unevaluated.
    pub fn graph_before(&self) -> &GraphModel {
        &self.graph_before
    }

    /// The model after removing every rejected hypothesis.
    pub fn graph_after(&self) -> &GraphModel {
        &self.graph_after
    }

    pub fn alpha(&self) -> F {
        self.alpha
    }

    pub fn pvalues(&self) -> &[F] {
        &self.pvalues
    }

    pub fn names(&self) -> &[String] {
        self.table.names()
    }

    pub fn rejected(&self) -> &[bool] {
        &self.rejected
    }

    /// Per-hypothesis adjusted p-values; all `None` in decision mode.
    pub fn adjusted_pvalues(&self) -> &[Option<F>] {
        &self.adjusted_pvalues
    }

    /// Intersection weights actually tested (after upscaling, if enabled).
    pub fn weight_table(&self) -> &WeightTable {
        &self.table
    }

    /// One entry per row of [`Self::weight_table`], same order.
    pub fn outcomes(&self) -> &[SubsetOutcome] {
        &self.outcomes
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn trace(&self) -> Option<&[SubsetTrace]> {
        self.trace.as_deref()
    }

    pub fn is_rejected(&self, name: &str) -> Option<bool> {
        self.names().iter().position(|n| n == name).map(|i| self.rejected[i])
    }

    pub fn rejected_names(&self) -> Vec<&str> {
        self.names()
            .iter()
            .zip(&self.rejected)
            .filter(|&(_, &r)| r)
            .map(|(n, _)| n.as_str())
            .collect()
    }

    pub fn num_rejected(&self) -> usize {
        self.rejected.iter().filter(|&&r| r).count()
    }
}
