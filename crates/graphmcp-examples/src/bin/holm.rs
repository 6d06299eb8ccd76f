use graphmcp_closure::{closed_test, ClosureConfig};
use graphmcp_core::{Graph, GraphModel, TestParams, F};
use graphmcp_tests::Bonferroni;

fn main() -> anyhow::Result<()> {
    // Holm procedure: equal weights, each node passes its level evenly to the rest
    let n = 4;
    let weights = vec![1.0 / n as F; n];
    let transition = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 0.0 } else { 1.0 / (n - 1) as F }).collect())
        .collect();
    let graph = Graph::from_numeric(weights, transition)?;
    let model = GraphModel::from(graph);

    let pvalues = [0.01, 0.02, 0.04, 0.04];
    let alpha = 0.05;

    println!("Holm graph with {} hypotheses, alpha = {}", n, alpha);
    println!("p-values: {:?}", pvalues);
    println!();

    let config = ClosureConfig::new(alpha).with_verbose(true);
    let result = closed_test(&model, &pvalues, &Bonferroni, &TestParams::new(), &config)?;

    for (i, name) in result.names().iter().enumerate() {
        println!(
            "{}: adjusted p = {:.4}, {}",
            name,
            result.adjusted_pvalues()[i].unwrap_or(F::NAN),
            if result.rejected()[i] { "rejected" } else { "not rejected" }
        );
    }

    println!("\nIntersections:");
    for t in result.trace().unwrap_or_default() {
        println!("  {}", t);
    }

    println!("\nGraph after rejection:");
    let after = &result.graph_after().graphs()[0];
    for (i, name) in after.names().iter().enumerate() {
        println!("  {}: weight {}", name, after.weights()[i]);
    }
    Ok(())
}
