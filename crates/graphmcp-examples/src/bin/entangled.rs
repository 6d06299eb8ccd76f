use graphmcp_closure::{closed_test, ClosureConfig};
use graphmcp_core::{Edge, EntangledGraph, Graph, GraphModel, TestParams, Weight};
use graphmcp_tests::Bonferroni;

/// Fixed sequence through `order`, closed into a loop by ε-edges.
fn sequence(order: &[usize]) -> anyhow::Result<Graph> {
    let n = order.len();
    let mut weights = vec![Weight::ZERO; n];
    weights[order[0]] = Weight::Value(1.0);
    let mut edges = Vec::new();
    for k in 0..n - 1 {
        edges.push(Edge::new(order[k], order[k + 1], Weight::linear(1.0, -1.0)));
        edges.push(Edge::new(order[k], order[(k + 2) % n], Weight::eps()));
    }
    edges.push(Edge::new(order[n - 1], order[0], 1.0));
    Ok(Graph::new(None, weights, edges)?)
}

fn main() -> anyhow::Result<()> {
    // Two candidate testing orders, chosen with equal probability
    let first = sequence(&[0, 1, 2, 3, 4])?;
    let second = sequence(&[1, 0, 3, 2, 4])?;
    let model = GraphModel::from(EntangledGraph::new(vec![first, second], vec![0.5, 0.5])?);

    let pvalues = [0.012, 0.02, 0.03, 0.2, 0.01];
    let config = ClosureConfig::new(0.05).with_epsilon(1e-4);
    let result = closed_test(&model, &pvalues, &Bonferroni, &TestParams::new(), &config)?;

    println!("Entangled graph: 2 orders over 5 hypotheses, split 0.5/0.5");
    println!("p-values: {:?}", pvalues);
    println!();
    let table = result.weight_table();
    println!("Full intersection weights: {:?}", table.row_weights(0));
    println!();
    for (i, name) in result.names().iter().enumerate() {
        let adj = result.adjusted_pvalues()[i].map_or("NA".to_string(), |p| format!("{:.4}", p));
        println!("{}: adjusted p = {}, rejected = {}", name, adj, result.rejected()[i]);
    }
    println!("\nRejected: {:?}", result.rejected_names());
    for w in result.warnings() {
        println!("warning: {}", w);
    }
    Ok(())
}
