use crate::{ClosureConfig, ClosureResult, SubsetOutcome, SubsetTrace, TraceEntry};
use graphmcp_core::{
    ClosureError, GraphModel, NodeId, Result, TestContext, TestOutcome, TestParams, Warning,
    WeightTable, WeightedTest, F, MAX_HYPOTHESES, RESERVED_PARAMETERS,
};
use rayon::prelude::*;

/// Check `params` against what `test` declares for a family of `n`
/// hypotheses. Fatal problems are errors; parameters the test never reads
/// come back as warnings.
pub fn check_parameters(
    test: &dyn WeightedTest,
    params: &TestParams,
    n: usize,
    adjusted: bool,
) -> Result<Vec<Warning>> {
    let reserved = |name: &str| RESERVED_PARAMETERS.contains(&name);
    let invalid = |parameter: &str, reason: &str| ClosureError::InvalidParameter {
        test: test.name().to_string(),
        parameter: parameter.to_string(),
        reason: reason.to_string(),
    };

    for &name in test.required_parameters().iter().chain(test.optional_parameters()) {
        if reserved(name) {
            return Err(invalid(name, "declared by the test but supplied by the engine"));
        }
    }
    if let Some(name) = params.names().find(|n| reserved(*n)) {
        return Err(invalid(name, "reserved for the engine"));
    }
    let required = test.required_parameters();
    if let Some(&missing) = required.iter().find(|&&name| !params.contains(name)) {
        return Err(ClosureError::MissingParameter {
            test: test.name().to_string(),
            parameter: missing.to_string(),
        });
    }
    test.validate(params, n)?;
    if adjusted && !test.supports_adjusted() {
        return Err(ClosureError::AdjustedUnsupported { test: test.name().to_string() });
    }

    let known = |name: &str| {
        test.required_parameters().contains(&name) || test.optional_parameters().contains(&name)
    };
    Ok(params
        .names()
        .filter(|name| !known(*name))
        .map(|name| {
            Warning::UnusedParameter { test: test.name().to_string(), parameter: name.to_string() }
                .emit()
        })
        .collect())
}

fn validate_pvalues(pvalues: &[F], n: usize) -> Result<()> {
    if pvalues.len() != n {
        return Err(ClosureError::PValueLengthMismatch { expected: n, actual: pvalues.len() });
    }
    match pvalues.iter().position(|p| !(0.0..=1.0).contains(p)) {
        Some(index) => Err(ClosureError::InvalidPValue { index, value: pvalues[index] }),
        None => Ok(()),
    }
}

fn test_row(
    table: &WeightTable,
    r: usize,
    pvalues: &[F],
    test: &dyn WeightedTest,
    params: &TestParams,
    config: &ClosureConfig,
) -> Result<SubsetOutcome> {
    let weights = table.row_weights(r);
    let subset = table.subsets()[r];
    let ctx = TestContext {
        pvalues,
        weights: &weights,
        alpha: config.alpha,
        adjusted: config.adjusted,
        verbose: config.verbose,
        subset,
        params,
    };
    let outcome = match test.evaluate(&ctx)? {
        TestOutcome::AdjustedP(p) => {
            // NaN never rejects
            let p = if p.is_nan() { 1.0 } else { p.clamp(0.0, 1.0) };
            SubsetOutcome { subset, rejected: p <= config.alpha, adjusted_pvalue: Some(p) }
        }
        TestOutcome::Decision(rejected) => {
            SubsetOutcome { subset, rejected, adjusted_pvalue: None }
        }
    };
    tracing::trace!(
        target: "graphmcp",
        subset = subset.mask(),
        rejected = outcome.rejected,
        adjusted = ?outcome.adjusted_pvalue,
        "intersection tested"
    );
    Ok(outcome)
}

/// Per-hypothesis decisions: `H_i` is rejected iff every intersection
/// containing it is rejected. The adjusted p-value of `H_i` is the largest
/// adjusted p-value among those intersections (`None` if any lacks one).
///
/// Hypotheses flagged in `prior` were rejected before this run. They stay
/// rejected, carry no adjusted p-value and take no part in the closure.
fn close(outcomes: &[SubsetOutcome], prior: &[bool]) -> (Vec<bool>, Vec<Option<F>>) {
    let n = prior.len();
    let mut rejected = vec![true; n];
    let mut adjusted: Vec<Option<F>> = (0..n).map(|i| (!prior[i]).then_some(0.0)).collect();
    for o in outcomes {
        for i in o.subset.members().filter(|&i| !prior[i]) {
            rejected[i] &= o.rejected;
            adjusted[i] = match (adjusted[i], o.adjusted_pvalue) {
                (Some(a), Some(b)) => Some(a.max(b)),
                _ => None,
            };
        }
    }
    (rejected, adjusted)
}

fn build_trace(table: &WeightTable, pvalues: &[F], outcomes: &[SubsetOutcome]) -> Vec<SubsetTrace> {
    let names = table.names();
    outcomes
        .iter()
        .enumerate()
        .map(|(r, o)| {
            let weights = table.weights().row(r);
            SubsetTrace {
                label: o.subset.label(names),
                subset: o.subset,
                members: o
                    .subset
                    .members()
                    .map(|i| TraceEntry {
                        name: names[i].clone(),
                        pvalue: pvalues[i],
                        weight: weights[i],
                    })
                    .collect(),
                rejected: o.rejected,
                adjusted_pvalue: o.adjusted_pvalue,
            }
        })
        .collect()
}

/// Run the closed test of `model` with `test` on every intersection hypothesis.
///
/// All configuration is validated before any intersection is tested. ε-weights
/// are replaced by `config.epsilon`, intersection weights are propagated (and
/// optionally upscaled), each intersection is tested, and the closure rule
/// yields per-hypothesis decisions and adjusted p-values.
///
/// Hypotheses already flagged rejected in `model` (a graph written out after
/// an earlier rejection) are removed from the graph first and reported as
/// rejected without an adjusted p-value.
pub fn closed_test(
    model: &GraphModel,
    pvalues: &[F],
    test: &dyn WeightedTest,
    params: &TestParams,
    config: &ClosureConfig,
) -> Result<ClosureResult> {
    config.validate()?;
    let n = model.num_nodes();
    if n > MAX_HYPOTHESES {
        return Err(ClosureError::TooManyHypotheses { n, max: MAX_HYPOTHESES });
    }
    validate_pvalues(pvalues, n)?;

    let mut warnings = model.diagnostics();
    warnings.extend(check_parameters(test, params, n, config.adjusted)?);

    let prior = model.rejected_nodes();
    let mut prior_flags = vec![false; n];
    for &i in &prior {
        prior_flags[i] = true;
    }
    let working = model.reject_nodes(&prior, config.epsilon)?;
    let mut table = working.weight_table(config.epsilon, config.parallel)?;
    if config.upscale {
        warnings.extend(table.upscale());
    }

    tracing::debug!(
        target: "graphmcp",
        test = test.name(),
        hypotheses = n,
        previously_rejected = prior.len(),
        intersections = table.len(),
        adjusted = config.adjusted,
        parallel = config.parallel,
        "running closed test"
    );

    let rows = 0..table.len();
    let outcomes: Vec<SubsetOutcome> = if config.parallel {
        rows.into_par_iter()
            .map(|r| test_row(&table, r, pvalues, test, params, config))
            .collect::<Result<Vec<_>>>()?
    } else {
        rows.map(|r| test_row(&table, r, pvalues, test, params, config))
            .collect::<Result<Vec<_>>>()?
    };

    let (rejected, adjusted_pvalues) = close(&outcomes, &prior_flags);
    let newly_rejected: Vec<NodeId> = (0..n).filter(|&i| rejected[i] && !prior_flags[i]).collect();
    let graph_after = working.reject_nodes(&newly_rejected, config.epsilon)?;
    let trace = config.verbose.then(|| build_trace(&table, pvalues, &outcomes));

    tracing::info!(
        target: "graphmcp",
        test = test.name(),
        rejected = newly_rejected.len() + prior.len(),
        hypotheses = n,
        warnings = warnings.len(),
        "closed test complete"
    );

    Ok(ClosureResult {
        graph_before: model.clone(),
        graph_after,
        alpha: config.alpha,
        pvalues: pvalues.to_vec(),
        rejected,
        adjusted_pvalues,
        table,
        outcomes,
        warnings,
        trace,
    })
}
