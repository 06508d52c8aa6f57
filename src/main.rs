//! # AdLaunch CLI Entry Point

use adlaunch::cli::{Cli, run};
use adlaunch::config::ConfigLoader;
use adlaunch::telemetry::{self, TraceContext};
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration from layered env files and variables
    let config = ConfigLoader::new().load()?;
    telemetry::init_tracing(&config)?;

    // One trace id correlates every request this invocation makes
    telemetry::with_trace_context(TraceContext::new(), run(cli, config)).await
}
