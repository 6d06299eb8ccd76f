use crate::{ClosureError, Result, Subset, F};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Names the engine always supplies itself; tests may not declare them and
/// callers may not pass them as extra parameters.
pub const RESERVED_PARAMETERS: [&str; 6] =
    ["pvalues", "weights", "alpha", "adjusted", "verbose", "subset"];

/// Extra parameter value handed to a weighted test.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Flag(bool),
    Scalar(F),
    Vector(Vec<F>),
    Matrix(Vec<Vec<Option<F>>>),
}

impl ParamValue {
    pub fn as_scalar(&self) -> Option<F> {
        match self {
            ParamValue::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            ParamValue::Flag(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&[F]> {
        match self {
            ParamValue::Vector(v) => Some(v),
            _ => None,
        }
    }

    /// Square matrix with `null`/`NaN` entries read as unknown (`NaN`).
    pub fn as_matrix(&self) -> Option<DMatrix<F>> {
        match self {
            ParamValue::Matrix(rows) => {
                let n = rows.len();
                if rows.iter().any(|r| r.len() != n) {
                    return None;
                }
                Some(DMatrix::from_fn(n, n, |i, j| rows[i][j].unwrap_or(F::NAN)))
            }
            _ => None,
        }
    }

    pub fn from_matrix(m: &DMatrix<F>) -> Self {
        ParamValue::Matrix(
            m.row_iter()
                .map(|row| row.iter().map(|&v| if v.is_nan() { None } else { Some(v) }).collect())
                .collect(),
        )
    }
}

/// Caller-supplied extra parameters, by name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TestParams(BTreeMap<String, ParamValue>);

impl TestParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything a weighted test sees for one intersection hypothesis.
/// `pvalues` and `weights` are full length; hypotheses outside `subset`
/// carry weight 0.
#[derive(Clone, Copy, Debug)]
pub struct TestContext<'a> {
    pub pvalues: &'a [F],
    pub weights: &'a [F],
    pub alpha: F,
    pub adjusted: bool,
    pub verbose: bool,
    pub subset: Subset,
    pub params: &'a TestParams,
}

impl<'a> TestContext<'a> {
    /// Indices with positive weight.
    pub fn weighted(&self) -> impl Iterator<Item = usize> + 'a {
        let weights = self.weights;
        (0..weights.len()).filter(move |&i| weights[i] > 0.0)
    }

    pub fn total_weight(&self) -> F {
        self.weights.iter().sum()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestOutcome {
    AdjustedP(F),
    Decision(bool),
}

/// Weighted test of a single intersection hypothesis.
pub trait WeightedTest: Send + Sync {
    fn name(&self) -> &str;

    /// Parameters that must be present in [`TestParams`].
    fn required_parameters(&self) -> &[&'static str] {
        &[]
    }

    /// Parameters read when present.
    fn optional_parameters(&self) -> &[&'static str] {
        &[]
    }

    fn supports_adjusted(&self) -> bool {
        true
    }

    /// Check parameter values against a family of `n` hypotheses. Called
    /// once per run, before any intersection is tested.
    fn validate(&self, _params: &TestParams, _n: usize) -> Result<()> {
        Ok(())
    }

    /// Smallest α at which the intersection hypothesis is rejected, in [0, 1].
    fn adjusted_pvalue(&self, _ctx: &TestContext<'_>) -> Result<F> {
        Err(ClosureError::AdjustedUnsupported { test: self.name().to_string() })
    }

    /// Rejection at `ctx.alpha`; ties reject.
    fn rejects(&self, ctx: &TestContext<'_>) -> Result<bool> {
        Ok(self.adjusted_pvalue(ctx)? <= ctx.alpha)
    }

    fn evaluate(&self, ctx: &TestContext<'_>) -> Result<TestOutcome> {
        if ctx.adjusted {
            if !self.supports_adjusted() {
                return Err(ClosureError::AdjustedUnsupported { test: self.name().to_string() });
            }
            self.adjusted_pvalue(ctx).map(TestOutcome::AdjustedP)
        } else {
            self.rejects(ctx).map(TestOutcome::Decision)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MinP;

    impl WeightedTest for MinP {
        fn name(&self) -> &str {
            "min-p"
        }

        fn adjusted_pvalue(&self, ctx: &TestContext<'_>) -> Result<F> {
            Ok(ctx.weighted().map(|i| ctx.pvalues[i]).fold(1.0, F::min))
        }
    }

    struct DecisionOnly;

    impl WeightedTest for DecisionOnly {
        fn name(&self) -> &str {
            "decision-only"
        }

        fn supports_adjusted(&self) -> bool {
            false
        }

        fn rejects(&self, _ctx: &TestContext<'_>) -> Result<bool> {
            Ok(true)
        }
    }

    fn ctx<'a>(p: &'a [F], w: &'a [F], params: &'a TestParams, adjusted: bool) -> TestContext<'a> {
        TestContext {
            pvalues: p,
            weights: w,
            alpha: 0.05,
            adjusted,
            verbose: false,
            subset: Subset::full(p.len()),
            params,
        }
    }

    #[test]
    fn test_default_rejects_uses_adjusted_p() {
        let params = TestParams::new();
        let c = ctx(&[0.05, 0.2], &[0.5, 0.0], &params, false);
        assert_eq!(MinP.evaluate(&c).unwrap(), TestOutcome::Decision(true));
        assert_eq!(c.weighted().collect::<Vec<_>>(), vec![0]);
        let c = ctx(&[0.05, 0.2], &[0.5, 0.0], &params, true);
        assert_eq!(MinP.evaluate(&c).unwrap(), TestOutcome::AdjustedP(0.05));
    }

    #[test]
    fn test_adjusted_unsupported() {
        let params = TestParams::new();
        let c = ctx(&[0.01], &[1.0], &params, true);
        assert!(matches!(
            DecisionOnly.evaluate(&c),
            Err(ClosureError::AdjustedUnsupported { .. })
        ));
        let c = ctx(&[0.01], &[1.0], &params, false);
        assert_eq!(DecisionOnly.evaluate(&c).unwrap(), TestOutcome::Decision(true));
    }

    #[test]
    fn test_params_from_json() {
        let params: TestParams = serde_json::from_str(
            r#"{
                "correlation": [[1, null], [null, 1]],
                "samples": 5000,
                "two_sided": true,
                "gamma": [0.5, 0.5]
            }"#,
        )
        .unwrap();
        let m = params.get("correlation").unwrap().as_matrix().unwrap();
        assert_eq!(m[(0, 0)], 1.0);
        assert!(m[(0, 1)].is_nan());
        assert_eq!(params.get("samples").unwrap().as_scalar(), Some(5000.0));
        assert_eq!(params.get("two_sided").unwrap().as_flag(), Some(true));
        assert_eq!(params.get("gamma").unwrap().as_vector(), Some(&[0.5, 0.5][..]));
        assert_eq!(
            params.names().collect::<Vec<_>>(),
            vec!["correlation", "gamma", "samples", "two_sided"]
        );

        let back = ParamValue::from_matrix(&m);
        assert_eq!(back, *params.get("correlation").unwrap());
    }
}
