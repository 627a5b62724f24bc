//! loopabs CLI
//!
//! `loopabs [STAGE]...` runs the selected stages (all by default) in
//! pipeline order. Configuration comes from `$LOOPABS_CONFIG` or
//! `./loopabs.json`. Exits non-zero when the clean stage ran and fewer loops
//! than `min_corpus_size` were verified.

use anyhow::Context;
use clap::Parser;
use loopabs::{Pipeline, PipelineConfig, Step};
use std::process::ExitCode;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "loopabs")]
#[command(about = "Abstract C pointer loops into index form and verify them with CBMC")]
#[command(version)]
struct Cli {
    /// Stages to (re)run; all when omitted
    #[arg(value_enum)]
    stages: Vec<Step>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::load().context("loading configuration")?;
    let pipeline = Pipeline::new(config).context("opening output directory")?;

    let summary = tokio::select! {
        result = pipeline.run(&cli.stages) => result?,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted; records already written are complete");
            return Ok(ExitCode::from(130));
        }
    };

    print!("{summary}");
    Ok(if summary.threshold_met() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
