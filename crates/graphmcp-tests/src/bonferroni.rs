use graphmcp_core::{Result, TestContext, WeightedTest, F};

/// Weighted Bonferroni test: reject if some `p_i ≤ α·w_i`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Bonferroni;

impl WeightedTest for Bonferroni {
    fn name(&self) -> &str {
        "bonferroni"
    }

    /// `min(1, min p_i / w_i)` over hypotheses with positive weight; 1 when there are none.
    fn adjusted_pvalue(&self, ctx: &TestContext<'_>) -> Result<F> {
        let q = ctx
            .weighted()
            .map(|i| ctx.pvalues[i] / ctx.weights[i])
            .fold(F::INFINITY, F::min);
        Ok(q.min(1.0))
    }

    fn rejects(&self, ctx: &TestContext<'_>) -> Result<bool> {
        Ok(ctx.weighted().any(|i| ctx.pvalues[i] <= ctx.alpha * ctx.weights[i]))
    }
}
