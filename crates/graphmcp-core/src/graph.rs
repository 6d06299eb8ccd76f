use crate::propagation::redistribute;
use crate::{default_names, ClosureError, NodeId, Result, Warning, Weight, F};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

const WEIGHT_SUM_TOLERANCE: F = 1e-9;

/// Directed weighted edge: share of `from`'s local level passed to `to`
/// once `from` is rejected.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub weight: Weight,
}

impl Edge {
    pub fn new(from: NodeId, to: NodeId, weight: impl Into<Weight>) -> Self {
        Self { from, to, weight: weight.into() }
    }
}

/// Matrix form of a graph, used for (de)serialisation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub names: Option<Vec<String>>,
    pub weights: Vec<Weight>,
    pub transition: Vec<Vec<Weight>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected: Option<Vec<bool>>,
}

/// Graph of elementary hypotheses: initial level allocation plus the
/// transition edges used when a hypothesis is rejected.
///
/// Read-only once built. Self loops are repaired at construction and
/// reported through [`Graph::diagnostics`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "GraphSpec", into = "GraphSpec")]
pub struct Graph {
    names: Vec<String>,
    weights: Vec<Weight>,
    edges: Vec<Edge>,
    rejected: Vec<bool>,
    adjacency: Vec<Vec<(NodeId, Weight)>>, // cached outgoing edges
    diagnostics: Vec<Warning>,
}

impl Graph {
    /// Build from node weights and an edge list. `names` defaults to `H1..Hn`.
    pub fn new(names: Option<Vec<String>>, weights: Vec<Weight>, edges: Vec<Edge>) -> Result<Self> {
        let n = weights.len();
        if n == 0 {
            return Err(ClosureError::EmptyGraph);
        }

        let names = match names {
            Some(names) if names.len() != n => {
                return Err(ClosureError::NameLengthMismatch { expected: n, actual: names.len() });
            }
            Some(names) => names,
            None => default_names(n),
        };
        let mut seen = HashSet::with_capacity(n);
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(ClosureError::DuplicateName { name: name.clone() });
            }
        }

        for (i, w) in weights.iter().enumerate() {
            check_weight(w, || format!("node {}", names[i]))?;
        }
        let total: F = weights.iter().map(|w| w.value(0.0)).sum();
        if total > 1.0 + WEIGHT_SUM_TOLERANCE {
            return Err(ClosureError::WeightSumExceedsOne { total });
        }

        let mut diagnostics = Vec::new();
        let mut kept = Vec::with_capacity(edges.len());
        for edge in edges {
            if edge.from >= n || edge.to >= n {
                return Err(ClosureError::EdgeOutOfRange { from: edge.from, to: edge.to, nodes: n });
            }
            check_weight(&edge.weight, || {
                format!("edge {} -> {}", names[edge.from], names[edge.to])
            })?;
            if edge.weight.is_zero() {
                continue;
            }
            if edge.from == edge.to {
                diagnostics.push(
                    Warning::SelfLoopRemoved {
                        node: names[edge.from].clone(),
                        weight: edge.weight.to_string(),
                    }
                    .emit(),
                );
                continue;
            }
            kept.push(edge);
        }

        kept.sort_by_key(|e| (e.from, e.to));
        if let Some(pair) = kept.windows(2).find(|p| (p[0].from, p[0].to) == (p[1].from, p[1].to)) {
            return Err(ClosureError::DuplicateEdge { from: pair[0].from, to: pair[0].to });
        }

        Ok(Self::from_parts(names, weights, kept, vec![false; n], diagnostics))
    }

    /// Build from a square row-major transition table.
    pub fn from_transition(
        names: Option<Vec<String>>,
        weights: Vec<Weight>,
        transition: Vec<Vec<Weight>>,
    ) -> Result<Self> {
        let n = transition.len();
        if let Some(row) = transition.iter().find(|row| row.len() != n) {
            return Err(ClosureError::NonSquareTransition { rows: n, cols: row.len() });
        }
        if weights.len() != n {
            return Err(ClosureError::WeightLengthMismatch { expected: n, actual: weights.len() });
        }

        let edges = transition
            .into_iter()
            .enumerate()
            .flat_map(|(i, row)| {
                row.into_iter()
                    .enumerate()
                    .map(move |(j, w)| Edge::new(i, j, w))
            })
            .collect();
        Self::new(names, weights, edges)
    }

    /// Build from a numeric weight vector and transition matrix.
    pub fn from_matrix(
        names: Option<Vec<String>>,
        weights: &[F],
        transition: &DMatrix<F>,
    ) -> Result<Self> {
        if transition.nrows() != transition.ncols() {
            return Err(ClosureError::NonSquareTransition {
                rows: transition.nrows(),
                cols: transition.ncols(),
            });
        }
        let rows = transition
            .row_iter()
            .map(|row| row.iter().map(|&v| Weight::Value(v)).collect())
            .collect();
        Self::from_transition(names, weights.iter().map(|&v| Weight::Value(v)).collect(), rows)
    }

    /// Plain-number convenience constructor, rows of the transition matrix given in order.
    pub fn from_numeric(weights: Vec<F>, transition: Vec<Vec<F>>) -> Result<Self> {
        Self::from_transition(
            None,
            weights.into_iter().map(Weight::Value).collect(),
            transition
                .into_iter()
                .map(|row| row.into_iter().map(Weight::Value).collect())
                .collect(),
        )
    }

    fn from_parts(
        names: Vec<String>,
        weights: Vec<Weight>,
        edges: Vec<Edge>,
        rejected: Vec<bool>,
        diagnostics: Vec<Warning>,
    ) -> Self {
        let mut g = Self {
            names,
            weights,
            edges,
            rejected,
            adjacency: Vec::new(),
            diagnostics,
        };
        g.build_adjacency();
        g
    }

    fn build_adjacency(&mut self) {
        let mut adj = vec![Vec::new(); self.names.len()];
        for edge in &self.edges {
            adj[edge.from].push((edge.to, edge.weight));
        }
        self.adjacency = adj;
    }

    pub fn num_nodes(&self) -> usize {
        self.names.len()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn index_of(&self, name: &str) -> Result<NodeId> {
        self.names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| ClosureError::UnknownNode { name: name.to_string() })
    }

    pub fn weights(&self) -> &[Weight] {
        &self.weights
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Outgoing edges of node `u`.
    pub fn neighbors(&self, u: NodeId) -> &[(NodeId, Weight)] {
        self.adjacency.get(u).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Weight of edge `from -> to`, zero when absent.
    pub fn edge(&self, from: NodeId, to: NodeId) -> Weight {
        self.neighbors(from)
            .iter()
            .find(|(v, _)| *v == to)
            .map(|(_, w)| *w)
            .unwrap_or(Weight::ZERO)
    }

    pub fn rejected(&self) -> &[bool] {
        &self.rejected
    }

    pub fn is_rejected(&self, node: NodeId) -> bool {
        self.rejected.get(node).copied().unwrap_or(false)
    }

    /// Repairs applied while building this graph.
    pub fn diagnostics(&self) -> &[Warning] {
        &self.diagnostics
    }

    pub fn has_epsilon(&self) -> bool {
        self.weights.iter().any(Weight::is_epsilon)
            || self.edges.iter().any(|e| e.weight.is_epsilon())
    }

    pub fn weight_vector(&self, eps: F) -> DVector<F> {
        DVector::from_iterator(self.num_nodes(), self.weights.iter().map(|w| w.value(eps)))
    }

    pub fn transition_matrix(&self, eps: F) -> DMatrix<F> {
        let n = self.num_nodes();
        let mut m = DMatrix::zeros(n, n);
        for edge in &self.edges {
            m[(edge.from, edge.to)] = edge.weight.value(eps);
        }
        m
    }

    /// Replace every ε-weight by its value at `eps`. Applying this twice
    /// gives the same graph as applying it once.
    pub fn substitute_eps(&self, eps: F) -> Graph {
        let weights = self.weights.iter().map(|w| w.substitute(eps)).collect();
        let edges = self
            .edges
            .iter()
            .map(|e| Edge::new(e.from, e.to, e.weight.substitute(eps)))
            .filter(|e| !e.weight.is_zero())
            .collect();
        Self::from_parts(
            self.names.clone(),
            weights,
            edges,
            self.rejected.clone(),
            self.diagnostics.clone(),
        )
    }

    /// Graph after rejecting `node`: its level is passed along its outgoing
    /// edges and the edges among the remaining nodes are reconnected.
    /// The result is numeric (ε forms evaluated at `eps`).
    pub fn reject_node(&self, node: NodeId, eps: F) -> Result<Graph> {
        let n = self.num_nodes();
        if node >= n {
            return Err(ClosureError::UnknownNode { name: format!("#{}", node) });
        }

        let mut weights: Vec<F> = self.weights.iter().map(|w| w.value(eps)).collect();
        let mut transition = self.transition_matrix(eps);
        redistribute(&mut weights, &mut transition, node);

        let edges = (0..n)
            .flat_map(|i| (0..n).map(move |j| (i, j)))
            .filter(|&(i, j)| i != j && transition[(i, j)] != 0.0)
            .map(|(i, j)| Edge::new(i, j, transition[(i, j)]))
            .collect();
        let mut rejected = self.rejected.clone();
        rejected[node] = true;

        Ok(Self::from_parts(
            self.names.clone(),
            weights.into_iter().map(Weight::Value).collect(),
            edges,
            rejected,
            self.diagnostics.clone(),
        ))
    }

    /// Reject several nodes in sequence.
    pub fn reject_nodes(&self, nodes: &[NodeId], eps: F) -> Result<Graph> {
        let mut g = self.substitute_eps(eps);
        for &node in nodes {
            g = g.reject_node(node, eps)?;
        }
        Ok(g)
    }
}

impl PartialEq for Graph {
    fn eq(&self, other: &Self) -> bool {
        self.names == other.names
            && self.weights == other.weights
            && self.edges == other.edges
            && self.rejected == other.rejected
    }
}

fn check_weight(w: &Weight, location: impl Fn() -> String) -> Result<()> {
    if !w.is_finite() {
        return Err(ClosureError::NonFiniteWeight { location: location() });
    }
    if w.is_negative() {
        return Err(ClosureError::NegativeWeight { location: location(), value: w.value(0.0) });
    }
    Ok(())
}

impl TryFrom<GraphSpec> for Graph {
    type Error = ClosureError;

    fn try_from(spec: GraphSpec) -> Result<Self> {
        let mut g = Graph::from_transition(spec.names, spec.weights, spec.transition)?;
        if let Some(rejected) = spec.rejected {
            if rejected.len() != g.num_nodes() {
                return Err(ClosureError::FlagLengthMismatch {
                    expected: g.num_nodes(),
                    actual: rejected.len(),
                });
            }
            g.rejected = rejected;
        }
        Ok(g)
    }
}

impl From<Graph> for GraphSpec {
    fn from(g: Graph) -> Self {
        let n = g.num_nodes();
        let mut transition = vec![vec![Weight::ZERO; n]; n];
        for edge in &g.edges {
            transition[edge.from][edge.to] = edge.weight;
        }
        let rejected = if g.rejected.iter().any(|&r| r) { Some(g.rejected) } else { None };
        GraphSpec {
            names: Some(g.names),
            weights: g.weights,
            transition,
            rejected,
        }
    }
}
