use crate::normal::normal_quantile;
use graphmcp_core::{ClosureError, ParamValue, Result, TestContext, TestParams, WeightedTest, F};
use nalgebra::{Cholesky, DMatrix, DVector};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rand_distr::{Distribution, StandardNormal};

const NAME: &str = "parametric";

/// Weighted parametric test for one-sided z-statistics with a partially
/// known correlation matrix (`NaN`/`null` = unknown).
///
/// Positively weighted hypotheses are grouped into connected components of
/// the known-correlation graph. With `q = min p_i / w_i`, the adjusted
/// p-value of the intersection is
///
/// min(1, Σ_C P(∃ i ∈ C: P_i ≤ q·w_i) / Σ_i w_i)
///
/// Singletons contribute `q·w_i` exactly; larger components are estimated
/// by Monte-Carlo. Each intersection draws from its own stream, seeded by
/// the test seed and the subset, so results do not depend on scheduling.
#[derive(Clone, Debug)]
pub struct Parametric {
    pub samples: usize,
    pub seed: u64,
}

impl Default for Parametric {
    fn default() -> Self {
        Self { samples: 50_000, seed: 42 }
    }
}

impl Parametric {
    pub fn new(samples: usize, seed: u64) -> Self {
        Self { samples: samples.max(1), seed }
    }

    fn invalid(reason: impl Into<String>) -> ClosureError {
        ClosureError::InvalidParameter {
            test: NAME.to_string(),
            parameter: "correlation".to_string(),
            reason: reason.into(),
        }
    }

    /// The `correlation` parameter as an `n × n` matrix.
    fn correlation(params: &TestParams, n: usize) -> Result<DMatrix<F>> {
        let value = params.get("correlation").ok_or_else(|| ClosureError::MissingParameter {
            test: NAME.to_string(),
            parameter: "correlation".to_string(),
        })?;
        let corr = value
            .as_matrix()
            .ok_or_else(|| Self::invalid("expected a square matrix"))?;
        if corr.nrows() != n {
            return Err(Self::invalid(format!(
                "matrix is {}x{} but there are {} hypotheses",
                corr.nrows(),
                corr.ncols(),
                n
            )));
        }
        Ok(corr)
    }

    fn samples(&self, params: &TestParams) -> Result<usize> {
        match params.get("samples") {
            None => Ok(self.samples),
            Some(ParamValue::Scalar(s)) if *s >= 1.0 && s.is_finite() => Ok(*s as usize),
            Some(_) => Err(ClosureError::InvalidParameter {
                test: NAME.to_string(),
                parameter: "samples".to_string(),
                reason: "expected a positive number".to_string(),
            }),
        }
    }

    fn seed(&self, ctx: &TestContext<'_>) -> u64 {
        ctx.params
            .get("seed")
            .and_then(ParamValue::as_scalar)
            .map(|s| s as u64)
            .unwrap_or(self.seed)
    }
}

/// Connected components of `members` under "correlation known".
fn known_components(corr: &DMatrix<F>, members: &[usize]) -> Vec<Vec<usize>> {
    let mut component = vec![usize::MAX; members.len()];
    let mut out = Vec::new();
    for start in 0..members.len() {
        if component[start] != usize::MAX {
            continue;
        }
        let id = out.len();
        let mut stack = vec![start];
        let mut nodes = Vec::new();
        component[start] = id;
        while let Some(a) = stack.pop() {
            nodes.push(members[a]);
            for b in 0..members.len() {
                if component[b] == usize::MAX && !corr[(members[a], members[b])].is_nan() {
                    component[b] = id;
                    stack.push(b);
                }
            }
        }
        nodes.sort_unstable();
        out.push(nodes);
    }
    out
}

/// P(∃ i: Z_i ≥ c_i) for Z ~ N(0, R), estimated from `samples` draws.
fn union_probability(chol: &DMatrix<F>, cutoffs: &[F], samples: usize, rng: &mut ChaCha20Rng) -> F {
    let k = cutoffs.len();
    let mut e = DVector::<F>::zeros(k);
    let mut hits = 0usize;
    for _ in 0..samples {
        for v in e.iter_mut() {
            *v = StandardNormal.sample(rng);
        }
        let z = chol * &e;
        if z.iter().zip(cutoffs).any(|(zi, ci)| zi >= ci) {
            hits += 1;
        }
    }
    hits as F / samples as F
}

impl WeightedTest for Parametric {
    fn name(&self) -> &str {
        NAME
    }

    fn required_parameters(&self) -> &[&'static str] {
        &["correlation"]
    }

    fn optional_parameters(&self) -> &[&'static str] {
        &["samples", "seed"]
    }

    fn validate(&self, params: &TestParams, n: usize) -> Result<()> {
        Self::correlation(params, n)?;
        self.samples(params)?;
        Ok(())
    }

    fn adjusted_pvalue(&self, ctx: &TestContext<'_>) -> Result<F> {
        let corr = Self::correlation(ctx.params, ctx.pvalues.len())?;
        let samples = self.samples(ctx.params)?;
        let members: Vec<usize> = ctx.weighted().collect();
        if members.is_empty() {
            return Ok(1.0);
        }

        let q = members
            .iter()
            .map(|&i| ctx.pvalues[i] / ctx.weights[i])
            .fold(F::INFINITY, F::min);
        let total_weight: F = members.iter().map(|&i| ctx.weights[i]).sum();

        let mut rng = ChaCha20Rng::seed_from_u64(
            self.seed(ctx)
                .wrapping_add(ctx.subset.mask().wrapping_mul(0x9e37_79b9_7f4a_7c15)),
        );

        let mut mass = 0.0;
        for comp in known_components(&corr, &members) {
            let tails: Vec<F> = comp.iter().map(|&i| (q * ctx.weights[i]).min(1.0)).collect();
            if comp.len() == 1 {
                mass += tails[0];
                continue;
            }
            if tails.iter().any(|&t| t >= 1.0) {
                mass += 1.0;
                continue;
            }

            let k = comp.len();
            let block = DMatrix::from_fn(k, k, |a, b| corr[(comp[a], comp[b])]);
            if block.iter().any(|v| v.is_nan()) {
                return Err(Self::invalid(format!(
                    "correlations inside the block {:?} are only partly known",
                    comp
                )));
            }
            if (0..k).any(|a| (block[(a, a)] - 1.0).abs() > 1e-9) {
                return Err(Self::invalid("diagonal entries must be 1"));
            }
            let chol = Cholesky::new(block)
                .ok_or_else(|| Self::invalid("matrix is not positive definite"))?
                .l();
            let cutoffs: Vec<F> = tails.iter().map(|&t| normal_quantile(1.0 - t)).collect();
            mass += union_probability(&chol, &cutoffs, samples, &mut rng);
        }

        let adjusted = (mass / total_weight).min(1.0);
        tracing::trace!(
            target: "graphmcp",
            subset = ctx.subset.mask(),
            q,
            adjusted,
            "parametric intersection"
        );
        Ok(adjusted)
    }
}
