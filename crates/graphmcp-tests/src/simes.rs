use graphmcp_core::{Result, TestContext, WeightedTest, F};

/// Weighted Simes test.
///
/// The intersection is rejected if for some `j` with positive weight
/// `p_j ≤ α · Σ_{i: p_i ≤ p_j} w_i`, the sum running over positively
/// weighted hypotheses (ties included).
#[derive(Clone, Copy, Debug, Default)]
pub struct Simes;

impl WeightedTest for Simes {
    fn name(&self) -> &str {
        "simes"
    }

    fn adjusted_pvalue(&self, ctx: &TestContext<'_>) -> Result<F> {
        let members: Vec<usize> = ctx.weighted().collect();
        let mut best = F::INFINITY;
        for &j in &members {
            let pj = ctx.pvalues[j];
            let mass: F = members
                .iter()
                .filter(|&&i| ctx.pvalues[i] <= pj)
                .map(|&i| ctx.weights[i])
                .sum();
            best = best.min(pj / mass);
        }
        Ok(best.min(1.0))
    }
}
