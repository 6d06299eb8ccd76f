use crate::{ClosureError, Graph, NodeId, Result, Warning, WeightTable, F};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Randomised choice among several graphs over the same hypotheses.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EntangledSpec")]
pub struct EntangledGraph {
    graphs: Vec<Graph>,
    split: Vec<F>,
}

#[derive(Deserialize)]
struct EntangledSpec {
    graphs: Vec<Graph>,
    split: Vec<F>,
}

impl TryFrom<EntangledSpec> for EntangledGraph {
    type Error = ClosureError;

    fn try_from(spec: EntangledSpec) -> Result<Self> {
        EntangledGraph::new(spec.graphs, spec.split)
    }
}

impl EntangledGraph {
    pub fn new(graphs: Vec<Graph>, split: Vec<F>) -> Result<Self> {
        let invalid = |reason: String| Err(ClosureError::InvalidMixture { reason });

        let Some(first) = graphs.first() else {
            return invalid("at least one graph is required".to_string());
        };
        if split.len() != graphs.len() {
            return invalid(format!("{} graphs but {} split weights", graphs.len(), split.len()));
        }
        if let Some(g) = graphs.iter().find(|g| g.names() != first.names()) {
            return invalid(format!(
                "node names differ: {:?} vs {:?}",
                first.names(),
                g.names()
            ));
        }
        if split.iter().any(|s| !s.is_finite() || *s < 0.0) {
            return invalid("split weights must be finite and non-negative".to_string());
        }
        let total: F = split.iter().sum();
        if (total - 1.0).abs() > 1e-9 {
            return invalid(format!("split weights sum to {}, not 1", total));
        }

        Ok(Self { graphs, split })
    }

    pub fn graphs(&self) -> &[Graph] {
        &self.graphs
    }

    pub fn split(&self) -> &[F] {
        &self.split
    }

    pub fn num_nodes(&self) -> usize {
        self.graphs[0].num_nodes()
    }

    pub fn names(&self) -> &[String] {
        self.graphs[0].names()
    }

    fn map_graphs(&self, f: impl Fn(&Graph) -> Result<Graph>) -> Result<Self> {
        let graphs = self.graphs.iter().map(f).collect::<Result<Vec<_>>>()?;
        Ok(Self { graphs, split: self.split.clone() })
    }
}

/// A single graph or an entangled mixture; weight propagation dispatches on this.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphModel {
    Simple(Graph),
    Entangled(EntangledGraph),
}

impl GraphModel {
    pub fn num_nodes(&self) -> usize {
        match self {
            GraphModel::Simple(g) => g.num_nodes(),
            GraphModel::Entangled(e) => e.num_nodes(),
        }
    }

    pub fn names(&self) -> &[String] {
        match self {
            GraphModel::Simple(g) => g.names(),
            GraphModel::Entangled(e) => e.names(),
        }
    }

    /// Component graphs (one for a simple model).
    pub fn graphs(&self) -> &[Graph] {
        match self {
            GraphModel::Simple(g) => std::slice::from_ref(g),
            GraphModel::Entangled(e) => e.graphs(),
        }
    }

    /// Hypotheses flagged rejected in any component graph, ascending.
    pub fn rejected_nodes(&self) -> Vec<NodeId> {
        (0..self.num_nodes())
            .filter(|&i| self.graphs().iter().any(|g| g.is_rejected(i)))
            .collect()
    }

    /// Repairs applied while building the component graphs.
    pub fn diagnostics(&self) -> Vec<Warning> {
        self.graphs().iter().flat_map(|g| g.diagnostics().iter().cloned()).collect()
    }

    pub fn substitute_eps(&self, eps: F) -> GraphModel {
        match self {
            GraphModel::Simple(g) => GraphModel::Simple(g.substitute_eps(eps)),
            GraphModel::Entangled(e) => GraphModel::Entangled(EntangledGraph {
                graphs: e.graphs.iter().map(|g| g.substitute_eps(eps)).collect(),
                split: e.split.clone(),
            }),
        }
    }

    /// Every component graph with `nodes` rejected in order.
    pub fn reject_nodes(&self, nodes: &[NodeId], eps: F) -> Result<GraphModel> {
        match self {
            GraphModel::Simple(g) => Ok(GraphModel::Simple(g.reject_nodes(nodes, eps)?)),
            GraphModel::Entangled(e) => Ok(GraphModel::Entangled(
                e.map_graphs(|g| g.reject_nodes(nodes, eps))?,
            )),
        }
    }

    /// Intersection-hypothesis weights. Entangled models propagate per
    /// component graph and mix the tables with the split weights.
    pub fn weight_table(&self, eps: F, parallel: bool) -> Result<WeightTable> {
        match self {
            GraphModel::Simple(g) => WeightTable::for_graph(g, eps, parallel),
            GraphModel::Entangled(e) => {
                let tables = if parallel {
                    e.graphs
                        .par_iter()
                        .map(|g| WeightTable::for_graph(g, eps, parallel))
                        .collect::<Result<Vec<_>>>()?
                } else {
                    e.graphs
                        .iter()
                        .map(|g| WeightTable::for_graph(g, eps, parallel))
                        .collect::<Result<Vec<_>>>()?
                };
                WeightTable::mix(&tables, &e.split)
            }
        }
    }
}

impl From<Graph> for GraphModel {
    fn from(g: Graph) -> Self {
        GraphModel::Simple(g)
    }
}

impl From<EntangledGraph> for GraphModel {
    fn from(e: EntangledGraph) -> Self {
        GraphModel::Entangled(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn chain(n: usize) -> Graph {
        let rows = (0..n)
            .map(|i| (0..n).map(|j| if j == (i + 1) % n { 1.0 } else { 0.0 }).collect())
            .collect();
        let mut w = vec![0.0; n];
        w[0] = 1.0;
        Graph::from_numeric(w, rows).unwrap()
    }

    fn holm(n: usize) -> Graph {
        let share = 1.0 / (n - 1) as F;
        let rows = (0..n)
            .map(|i| (0..n).map(|j| if i == j { 0.0 } else { share }).collect())
            .collect();
        Graph::from_numeric(vec![1.0 / n as F; n], rows).unwrap()
    }

    #[test]
    fn test_validation() {
        assert!(EntangledGraph::new(vec![], vec![]).is_err());
        assert!(EntangledGraph::new(vec![holm(3)], vec![0.5, 0.5]).is_err());
        assert!(EntangledGraph::new(vec![holm(3), holm(4)], vec![0.5, 0.5]).is_err());
        assert!(EntangledGraph::new(vec![holm(3), chain(3)], vec![0.6, 0.6]).is_err());
        assert!(EntangledGraph::new(vec![holm(3), chain(3)], vec![1.5, -0.5]).is_err());
        assert!(EntangledGraph::new(vec![holm(3), chain(3)], vec![0.25, 0.75]).is_ok());
    }

    #[test]
    fn test_entangled_table_is_split_mixture() {
        let e = EntangledGraph::new(vec![holm(3), chain(3)], vec![0.5, 0.5]).unwrap();
        let model = GraphModel::from(e);
        let table = model.weight_table(0.0, false).unwrap();
        let a = WeightTable::for_graph(&holm(3), 0.0, false).unwrap();
        let b = WeightTable::for_graph(&chain(3), 0.0, false).unwrap();
        for r in 0..table.len() {
            for c in 0..3 {
                assert_abs_diff_eq!(
                    table.weights()[(r, c)],
                    0.5 * a.weights()[(r, c)] + 0.5 * b.weights()[(r, c)],
                    epsilon = 1e-12
                );
                let m = table.membership()[(r, c)];
                assert!(m == 0.0 || m == 1.0);
            }
        }
    }

    #[test]
    fn test_serde_tagged_model() {
        let json = r#"{"entangled": {
            "graphs": [
                {"weights": [1, 0], "transition": [[0, 1], [1, 0]]},
                {"weights": [0, 1], "transition": [[0, 1], [1, 0]]}
            ],
            "split": [0.5, 0.5]
        }}"#;
        let model: GraphModel = serde_json::from_str(json).unwrap();
        assert_eq!(model.num_nodes(), 2);
        assert_eq!(model.graphs().len(), 2);

        let bad = json.replace("[0.5, 0.5]", "[0.5, 0.4]");
        assert!(serde_json::from_str::<GraphModel>(&bad).is_err());

        let text = serde_json::to_string(&model).unwrap();
        let back: GraphModel = serde_json::from_str(&text).unwrap();
        assert_eq!(back, model);
    }

    #[test]
    fn test_reject_nodes_applies_to_every_component() {
        let e = EntangledGraph::new(vec![holm(3), chain(3)], vec![0.5, 0.5]).unwrap();
        let after = GraphModel::from(e).reject_nodes(&[0], 0.0).unwrap();
        for g in after.graphs() {
            assert_eq!(g.rejected(), &[true, false, false]);
            assert_eq!(g.weight_vector(0.0)[0], 0.0);
        }
        assert_eq!(after.rejected_nodes(), vec![0]);
        assert!(GraphModel::from(holm(3)).rejected_nodes().is_empty());
    }
}
