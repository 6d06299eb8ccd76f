use crate::subsets::{indicator_matrix, SubsetEnumerator};
use crate::{ClosureError, Graph, NodeId, Result, Subset, Warning, F, MAX_HYPOTHESES};
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Remove node `j` from a numeric graph in place.
///
/// Update rule, for l, k ≠ j:
/// w_k ← w_k + w_j · g_jk
/// g_lk ← (g_lk + g_lj · g_jk) / (1 − g_lj · g_jl), with 0/0 taken as 0
///
/// Row and column `j` end up zero, as does `w_j`.
pub fn redistribute(weights: &mut [F], transition: &mut DMatrix<F>, j: NodeId) {
    let n = weights.len();
    let wj = weights[j];
    for k in 0..n {
        if k != j {
            weights[k] += wj * transition[(j, k)];
        }
    }
    weights[j] = 0.0;

    let mut next = DMatrix::zeros(n, n);
    for l in 0..n {
        if l == j {
            continue;
        }
        let glj = transition[(l, j)];
        let denom = 1.0 - glj * transition[(j, l)];
        for k in 0..n {
            if k == j || k == l {
                continue;
            }
            let num = transition[(l, k)] + glj * transition[(j, k)];
            // Two nodes passing everything to each other leave nothing to pass on
            next[(l, k)] = if denom > 1e-12 { num / denom } else { 0.0 };
        }
    }
    *transition = next;
}

/// Local weights of the intersection hypothesis `subset`: every excluded
/// hypothesis is removed from the graph, its level flowing along the edges
/// to the hypotheses that remain. Entries outside `subset` are 0.
pub fn local_weights(weights: &[F], transition: &DMatrix<F>, subset: Subset) -> Vec<F> {
    let n = weights.len();
    let mut w = weights.to_vec();
    if subset == Subset::full(n) {
        return w;
    }

    let mut g = transition.clone();
    for j in subset.excluded(n) {
        redistribute(&mut w, &mut g, j);
    }
    for v in w.iter_mut() {
        if v.is_nan() || *v < 0.0 {
            *v = 0.0;
        }
    }
    w
}

/// Intersection-hypothesis table: one row per non-empty subset in
/// [`SubsetEnumerator`] order, membership and local weights side by side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightTable {
    names: Vec<String>,
    subsets: Vec<Subset>,
    membership: DMatrix<F>,
    weights: DMatrix<F>,
}

impl WeightTable {
    /// Weights of every intersection hypothesis of `graph`, ε evaluated at `eps`.
    pub fn for_graph(graph: &Graph, eps: F, parallel: bool) -> Result<Self> {
        let n = graph.num_nodes();
        if n > MAX_HYPOTHESES {
            return Err(ClosureError::TooManyHypotheses { n, max: MAX_HYPOTHESES });
        }

        let w0: Vec<F> = graph.weights().iter().map(|w| w.value(eps)).collect();
        let g0 = graph.transition_matrix(eps);
        let subsets: Vec<Subset> = SubsetEnumerator::new(n).collect();

        let rows: Vec<Vec<F>> = if parallel {
            subsets.par_iter().map(|&s| local_weights(&w0, &g0, s)).collect()
        } else {
            subsets.iter().map(|&s| local_weights(&w0, &g0, s)).collect()
        };

        tracing::debug!(
            target: "graphmcp",
            nodes = n,
            rows = subsets.len(),
            parallel,
            "weight table built"
        );

        Ok(Self {
            names: graph.names().to_vec(),
            membership: indicator_matrix(n),
            weights: DMatrix::from_fn(subsets.len(), n, |r, c| rows[r][c]),
            subsets,
        })
    }

    /// Mixture of tables over the same hypotheses: weights and membership
    /// are combined with `split`, then membership is binarised back to 0/1.
    pub fn mix(tables: &[WeightTable], split: &[F]) -> Result<Self> {
        let first = tables.first().ok_or_else(|| ClosureError::InvalidMixture {
            reason: "no tables to mix".to_string(),
        })?;
        if tables.len() != split.len() {
            return Err(ClosureError::InvalidMixture {
                reason: format!("{} tables but {} split weights", tables.len(), split.len()),
            });
        }
        if tables.iter().any(|t| t.names != first.names || t.subsets != first.subsets) {
            return Err(ClosureError::InvalidMixture {
                reason: "tables cover different hypotheses".to_string(),
            });
        }

        let shape = first.weights.shape();
        let mut membership = DMatrix::zeros(shape.0, shape.1);
        let mut weights = DMatrix::zeros(shape.0, shape.1);
        for (t, &s) in tables.iter().zip(split) {
            membership += &t.membership * s;
            weights += &t.weights * s;
        }
        membership.apply(|v| *v = if *v > 0.0 { 1.0 } else { 0.0 });

        Ok(Self {
            names: first.names.clone(),
            subsets: first.subsets.clone(),
            membership,
            weights,
        })
    }

    /// Rescale each row to sum to 1. Rows summing to 0 stay 0 and are reported.
    pub fn upscale(&mut self) -> Vec<Warning> {
        let mut warnings = Vec::new();
        for r in 0..self.len() {
            let sum = self.row_sum(r);
            if sum > 0.0 {
                self.weights.row_mut(r).apply(|v| *v /= sum);
            } else {
                self.weights.row_mut(r).fill(0.0);
                let subset = self.subsets[r].label(&self.names);
                warnings.push(Warning::ZeroWeightNormalization { subset }.emit());
            }
        }
        warnings
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn num_hypotheses(&self) -> usize {
        self.names.len()
    }

    /// Number of intersection hypotheses (rows).
    pub fn len(&self) -> usize {
        self.subsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subsets.is_empty()
    }

    pub fn subsets(&self) -> &[Subset] {
        &self.subsets
    }

    pub fn membership(&self) -> &DMatrix<F> {
        &self.membership
    }

    pub fn weights(&self) -> &DMatrix<F> {
        &self.weights
    }

    pub fn row_weights(&self, r: usize) -> Vec<F> {
        self.weights.row(r).iter().copied().collect()
    }

    pub fn row_sum(&self, r: usize) -> F {
        self.weights.row(r).sum()
    }
}
