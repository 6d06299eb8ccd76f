use graphmcp_closure::{closed_test, ClosureConfig, ClosureResult};
use graphmcp_core::{
    ClosureError, Graph, GraphModel, ParamValue, Result, TestContext, TestParams, Warning,
    WeightedTest, F, MAX_HYPOTHESES,
};
use graphmcp_tests::{Bonferroni, Parametric, Simes};
use nalgebra::DMatrix;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Closed test with no extra parameters.
fn run(
    model: &GraphModel,
    p: &[F],
    test: &dyn WeightedTest,
    config: &ClosureConfig,
) -> ClosureResult {
    closed_test(model, p, test, &TestParams::new(), config).unwrap()
}

fn random_graph(n: usize, rng: &mut ChaCha20Rng) -> Graph {
    let mut w: Vec<F> = (0..n).map(|_| rng.gen::<F>()).collect();
    let total: F = w.iter().sum();
    w.iter_mut().for_each(|v| *v /= total);
    let rows = (0..n)
        .map(|i| {
            let mut row: Vec<F> =
                (0..n).map(|j| if i == j { 0.0 } else { rng.gen::<F>() }).collect();
            let s: F = row.iter().sum();
            row.iter_mut().for_each(|v| *v /= s);
            row
        })
        .collect();
    Graph::from_numeric(w, rows).unwrap()
}

fn random_pvalues(n: usize, rng: &mut ChaCha20Rng) -> Vec<F> {
    (0..n).map(|_| rng.gen::<F>() * 0.08).collect()
}

#[test]
fn test_decisions_agree_with_every_intersection() {
    let mut rng = ChaCha20Rng::seed_from_u64(11);
    for _ in 0..20 {
        let n = rng.gen_range(2..=6);
        let model = GraphModel::from(random_graph(n, &mut rng));
        let p = random_pvalues(n, &mut rng);
        let res = run(&model, &p, &Bonferroni, &ClosureConfig::default());

        assert_eq!(res.outcomes().len(), (1 << n) - 1);
        for i in 0..n {
            let containing: Vec<_> =
                res.outcomes().iter().filter(|o| o.subset.contains(i)).collect();
            assert_eq!(containing.len(), 1 << (n - 1));
            assert_eq!(res.rejected()[i], containing.iter().all(|o| o.rejected));
            let adj = res.adjusted_pvalues()[i].unwrap();
            let worst = containing.iter().map(|o| o.adjusted_pvalue.unwrap()).fold(0.0, F::max);
            assert_eq!(adj, worst);
            assert!((0.0..=1.0).contains(&adj));
            assert_eq!(res.rejected()[i], adj <= res.alpha());
        }
    }
}

#[test]
fn test_smaller_pvalues_never_lose_rejections() {
    let mut rng = ChaCha20Rng::seed_from_u64(5);
    for _ in 0..20 {
        let n = rng.gen_range(2..=5);
        let model = GraphModel::from(random_graph(n, &mut rng));
        let p = random_pvalues(n, &mut rng);
        let smaller: Vec<F> = p.iter().map(|&v| v * rng.gen::<F>()).collect();

        let a = run(&model, &p, &Bonferroni, &ClosureConfig::default());
        let b = run(&model, &smaller, &Bonferroni, &ClosureConfig::default());
        for i in 0..n {
            assert!(!a.rejected()[i] || b.rejected()[i]);
            assert!(b.adjusted_pvalues()[i].unwrap() <= a.adjusted_pvalues()[i].unwrap() + 1e-12);
        }
    }
}

#[test]
fn test_decision_mode_matches_adjusted_mode() {
    let mut rng = ChaCha20Rng::seed_from_u64(23);
    for _ in 0..10 {
        let n = rng.gen_range(2..=5);
        let model = GraphModel::from(random_graph(n, &mut rng));
        let p = random_pvalues(n, &mut rng);
        for test in [&Bonferroni as &dyn WeightedTest, &Simes] {
            let adjusted = run(&model, &p, test, &ClosureConfig::default());
            let decisions = run(&model, &p, test, &ClosureConfig::default().with_adjusted(false));
            assert_eq!(adjusted.rejected(), decisions.rejected());
            assert!(decisions.adjusted_pvalues().iter().all(Option::is_none));
        }
    }
}

#[test]
fn test_parallel_matches_serial() {
    let mut rng = ChaCha20Rng::seed_from_u64(99);
    let n = 5;
    let model = GraphModel::from(random_graph(n, &mut rng));
    let p = random_pvalues(n, &mut rng);
    let corr = DMatrix::from_fn(n, n, |i, j| if i == j { 1.0 } else { 0.4 });
    let params = TestParams::new()
        .with("correlation", ParamValue::from_matrix(&corr))
        .with("samples", ParamValue::Scalar(2_000.0));

    let serial_cfg = ClosureConfig::default().with_parallel(false);
    let parallel_cfg = ClosureConfig::default().with_parallel(true);
    let test = Parametric::default();
    let a = closed_test(&model, &p, &test, &params, &serial_cfg).unwrap();
    let b = closed_test(&model, &p, &test, &params, &parallel_cfg).unwrap();
    assert_eq!(a.rejected(), b.rejected());
    assert_eq!(a.adjusted_pvalues(), b.adjusted_pvalues());
    assert_eq!(a.outcomes(), b.outcomes());
    assert_eq!(a.weight_table(), b.weight_table());
}

#[test]
fn test_upscale_normalizes_rows() {
    let rows = vec![vec![0.0; 3]; 3];
    let model = GraphModel::from(Graph::from_numeric(vec![0.5, 0.25, 0.0], rows).unwrap());
    let p = [0.03, 0.04, 0.01];

    let plain = run(&model, &p, &Bonferroni, &ClosureConfig::default());
    let res = run(&model, &p, &Bonferroni, &ClosureConfig::default().with_upscale(true));

    let table = res.weight_table();
    for r in 0..table.len() {
        let sum = table.row_sum(r);
        assert!((sum - 1.0).abs() < 1e-12 || sum == 0.0, "row {} sums to {}", r, sum);
    }
    assert_eq!(res.warnings(), &[Warning::ZeroWeightNormalization { subset: "H3".to_string() }]);
    // {H1, H2} is tested at 2/3 and 1/3 instead of 1/2 and 1/4
    assert!(!plain.rejected()[1]);
    assert!(res.rejected()[1]);
    // H3 never receives weight
    assert!(!res.rejected()[2]);
}

#[test]
fn test_invalid_inputs_fail_before_testing() {
    let model = GraphModel::from(random_graph(3, &mut ChaCha20Rng::seed_from_u64(1)));
    let none = TestParams::new();
    let cfg = ClosureConfig::default();
    let p = [0.1, 0.2, 0.3];

    assert_eq!(
        closed_test(&model, &[0.1, 0.2], &Bonferroni, &none, &cfg).unwrap_err(),
        ClosureError::PValueLengthMismatch { expected: 3, actual: 2 }
    );
    assert!(matches!(
        closed_test(&model, &[0.1, -0.2, 0.3], &Bonferroni, &none, &cfg),
        Err(ClosureError::InvalidPValue { index: 1, .. })
    ));
    assert_eq!(
        closed_test(&model, &p, &Bonferroni, &none, &cfg.clone().with_alpha(1.5)).unwrap_err(),
        ClosureError::InvalidAlpha(1.5)
    );
    assert_eq!(
        closed_test(&model, &p, &Bonferroni, &none, &cfg.clone().with_epsilon(-0.1)).unwrap_err(),
        ClosureError::InvalidEpsilon(-0.1)
    );
    let reserved = TestParams::new().with("alpha", ParamValue::Scalar(0.1));
    assert!(matches!(
        closed_test(&model, &p, &Bonferroni, &reserved, &cfg),
        Err(ClosureError::InvalidParameter { .. })
    ));
}

#[test]
fn test_too_many_hypotheses() {
    let n = MAX_HYPOTHESES + 1;
    let graph = Graph::from_numeric(vec![1.0 / n as F; n], vec![vec![0.0; n]; n]).unwrap();
    let model = GraphModel::from(graph);
    let cfg = ClosureConfig::default();
    let p = vec![0.5; n];
    let err = closed_test(&model, &p, &Bonferroni, &TestParams::new(), &cfg).unwrap_err();
    assert_eq!(err, ClosureError::TooManyHypotheses { n: 21, max: 20 });
}

/// Rejects when the smallest weighted p-value is below α, with no adjusted p-value.
struct DecisionOnly;

impl WeightedTest for DecisionOnly {
    fn name(&self) -> &str {
        "decision_only"
    }

    fn supports_adjusted(&self) -> bool {
        false
    }

    fn rejects(&self, ctx: &TestContext<'_>) -> Result<bool> {
        Ok(ctx.weighted().any(|i| ctx.pvalues[i] <= ctx.alpha * ctx.weights[i]))
    }
}

#[test]
fn test_decision_only_strategy() {
    let model = GraphModel::from(random_graph(3, &mut ChaCha20Rng::seed_from_u64(2)));
    let p = [0.001, 0.002, 0.9];
    let none = TestParams::new();
    let err = closed_test(&model, &p, &DecisionOnly, &none, &ClosureConfig::default()).unwrap_err();
    assert_eq!(err, ClosureError::AdjustedUnsupported { test: "decision_only".to_string() });

    let cfg = ClosureConfig::default().with_adjusted(false);
    let res = run(&model, &p, &DecisionOnly, &cfg);
    let bonf = run(&model, &p, &Bonferroni, &cfg);
    assert_eq!(res.rejected(), bonf.rejected());
    assert!(res.adjusted_pvalues().iter().all(Option::is_none));
}
