use crate::{load_model, node_index, render, RunConfig};
use graphmcp_closure::ClosureConfig;
use graphmcp_core::{GraphModel, TestParams, WeightTable, F};
use graphmcp_tests::TestKind;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "graphmcp")]
#[command(about = "Graph-based closed multiple testing")]
#[command(long_about = "Closed testing of weighted graphs: intersection weights, \
weighted tests and adjusted p-values")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the closed test and print decisions and adjusted p-values
    Test(TestArgs),

    /// Print the weights of every intersection hypothesis
    Weights {
        /// Graph file (JSON)
        #[arg(long)]
        graph: PathBuf,

        /// Value substituted for ε-weights
        #[arg(long, default_value = "0.001")]
        eps: F,

        /// Rescale every intersection to total weight 1
        #[arg(long)]
        upscale: bool,

        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Print the graph after rejecting one hypothesis
    Reject {
        /// Graph file (JSON)
        #[arg(long)]
        graph: PathBuf,

        /// Name of the hypothesis to reject
        #[arg(long)]
        node: String,

        /// Value substituted for ε-weights
        #[arg(long, default_value = "0.001")]
        eps: F,
    },
}

#[derive(Args, Clone, Debug, Default)]
pub struct TestArgs {
    /// Run file (JSON); flags below override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Graph file (JSON), replaces the run file's model
    #[arg(long)]
    pub graph: Option<PathBuf>,

    /// Comma-separated p-values
    #[arg(long, value_delimiter = ',')]
    pub pvalues: Option<Vec<F>>,

    #[arg(long, value_enum)]
    pub test: Option<TestType>,

    /// Test parameters (JSON object), merged over the run file's
    #[arg(long)]
    pub params: Option<String>,

    #[arg(long)]
    pub alpha: Option<F>,

    /// Value substituted for ε-weights
    #[arg(long)]
    pub eps: Option<F>,

    #[arg(long)]
    pub upscale: bool,

    /// Include the per-intersection trace
    #[arg(long)]
    pub verbose: bool,

    /// Report reject decisions only, no adjusted p-values
    #[arg(long)]
    pub decisions_only: bool,

    /// Evaluate intersections on one thread
    #[arg(long)]
    pub serial: bool,

    #[arg(long, value_enum, default_value = "json")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum TestType {
    #[value(name = "bonferroni")]
    Bonferroni,
    #[value(name = "simes")]
    Simes,
    #[value(name = "parametric")]
    Parametric,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    #[value(name = "json")]
    Json,
    #[value(name = "table")]
    Table,
}

impl From<TestType> for TestKind {
    fn from(t: TestType) -> Self {
        match t {
            TestType::Bonferroni => TestKind::Bonferroni,
            TestType::Simes => TestKind::Simes,
            TestType::Parametric => TestKind::Parametric,
        }
    }
}

impl TestArgs {
    /// The run file (if any) with every given flag applied on top.
    pub fn run_config(&self) -> anyhow::Result<RunConfig> {
        let mut run = match &self.config {
            Some(path) => RunConfig::load_from_file(path)?,
            None => RunConfig::default(),
        };
        if let Some(path) = &self.graph {
            run.model = Some(load_model(path)?);
        }
        if let Some(p) = &self.pvalues {
            run.pvalues = p.clone();
        }
        if let Some(t) = self.test {
            run.test = t.into();
        }
        if let Some(json) = &self.params {
            let extra: TestParams = serde_json::from_str(json)?;
            for name in extra.names() {
                if let Some(value) = extra.get(name) {
                    run.params.insert(name, value.clone());
                }
            }
        }
        if self.alpha.is_some() {
            run.alpha = self.alpha;
        }
        if self.eps.is_some() {
            run.epsilon = self.eps;
        }
        if self.upscale {
            run.upscale = Some(true);
        }
        if self.verbose {
            run.verbose = Some(true);
        }
        if self.decisions_only {
            run.adjusted = Some(false);
        }
        if self.serial {
            run.parallel = Some(false);
        }
        Ok(run)
    }
}

pub async fn run_test_command(args: TestArgs) -> anyhow::Result<()> {
    let run = args.run_config()?;
    tracing::debug!(test = run.test.as_str(), hypotheses = run.pvalues.len(), "starting run");

    let result = tokio::task::spawn_blocking(move || run.execute()).await??;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Table => print!("{}", render::result_table(&result)),
    }
    Ok(())
}

/// Intersection weights of `model` as `closed_test` sees them: ε-weights
/// are substituted (and clamped) before propagation.
pub fn intersection_weights(
    model: &GraphModel,
    eps: F,
    upscale: bool,
) -> anyhow::Result<WeightTable> {
    ClosureConfig::default().with_epsilon(eps).validate()?;
    let mut table = model.substitute_eps(eps).weight_table(eps, true)?;
    if upscale {
        table.upscale();
    }
    Ok(table)
}

/// `model` after rejecting the hypothesis called `node`.
pub fn reject_by_name(model: &GraphModel, node: &str, eps: F) -> anyhow::Result<GraphModel> {
    ClosureConfig::default().with_epsilon(eps).validate()?;
    let index = node_index(model, node)?;
    Ok(model.reject_nodes(&[index], eps)?)
}

pub async fn run_weights_command(
    graph: PathBuf,
    eps: F,
    upscale: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let model = load_model(&graph)?;
    let table =
        tokio::task::spawn_blocking(move || intersection_weights(&model, eps, upscale)).await??;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&table)?),
        OutputFormat::Table => print!("{}", render::weight_table(&table)),
    }
    Ok(())
}

pub async fn run_reject_command(graph: PathBuf, node: String, eps: F) -> anyhow::Result<()> {
    let model = load_model(&graph)?;
    let updated = reject_by_name(&model, &node, eps)?;
    println!("{}", serde_json::to_string_pretty(&updated)?);
    Ok(())
}
