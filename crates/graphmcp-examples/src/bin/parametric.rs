use graphmcp_closure::{closed_test, ClosureConfig};
use graphmcp_core::{Graph, GraphModel, ParamValue, TestParams, F};
use graphmcp_tests::{Bonferroni, Parametric};
use nalgebra::DMatrix;

fn main() -> anyhow::Result<()> {
    // Two doses against one control on two endpoints; endpoints within a dose
    // are correlated 0.5, correlation across doses unknown
    let weights = vec![0.5, 0.5, 0.0, 0.0];
    let transition = vec![
        vec![0.0, 0.5, 0.5, 0.0],
        vec![0.5, 0.0, 0.0, 0.5],
        vec![0.0, 1.0, 0.0, 0.0],
        vec![1.0, 0.0, 0.0, 0.0],
    ];
    let model = GraphModel::from(Graph::from_numeric(weights, transition)?);

    let rho = 0.5;
    let corr = DMatrix::from_fn(4, 4, |i, j| {
        if i == j {
            1.0
        } else if i % 2 == j % 2 {
            rho
        } else {
            F::NAN
        }
    });
    let params = TestParams::new()
        .with("correlation", ParamValue::from_matrix(&corr))
        .with("samples", ParamValue::Scalar(100_000.0));

    let pvalues = [0.024, 0.3, 0.026, 0.6];
    let config = ClosureConfig::new(0.05);

    let parametric = closed_test(&model, &pvalues, &Parametric::default(), &params, &config)?;
    let bonferroni = closed_test(&model, &pvalues, &Bonferroni, &TestParams::new(), &config)?;

    println!("{:<4} {:>8} {:>12} {:>12}", "", "p", "parametric", "bonferroni");
    for (i, name) in parametric.names().iter().enumerate() {
        println!(
            "{:<4} {:>8.4} {:>12.4} {:>12.4}",
            name,
            pvalues[i],
            parametric.adjusted_pvalues()[i].unwrap_or(F::NAN),
            bonferroni.adjusted_pvalues()[i].unwrap_or(F::NAN)
        );
    }
    println!("\nRejected (parametric): {:?}", parametric.rejected_names());
    println!("Rejected (bonferroni): {:?}", bonferroni.rejected_names());
    Ok(())
}
