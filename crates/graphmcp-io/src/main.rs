use clap::Parser;
use graphmcp_io::cli::{run_reject_command, run_test_command, run_weights_command, Cli, Commands};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries results; logs go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Test(args) => {
            run_test_command(args).await?;
        }
        Commands::Weights { graph, eps, upscale, format } => {
            run_weights_command(graph, eps, upscale, format).await?;
        }
        Commands::Reject { graph, node, eps } => {
            run_reject_command(graph, node, eps).await?;
        }
    }

    Ok(())
}
