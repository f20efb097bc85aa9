use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use gaugeread::{GaugeConfig, GaugeReader};

#[derive(Parser)]
#[command(name = "gaugeread-server")]
#[command(about = "HTTP service reading pressure gauges from uploaded images")]
struct Args {
    /// Address to listen on
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,

    /// Directory holding nanodet.rten and gauge-pose.rten
    #[arg(long, value_name = "DIR")]
    model_dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Largest accepted request body in bytes
    #[arg(long, value_name = "BYTES")]
    max_body_bytes: Option<usize>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    gaugeread::init_tracing(args.verbose);

    if let Err(e) = run(args).await {
        tracing::error!("{:#}", e);
        std::process::exit(-1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = GaugeConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(dir) = args.model_dir {
        config.models.dir = dir;
    }
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(limit) = args.max_body_bytes {
        config.server.max_body_bytes = limit;
    }

    // Models load once, before the listener opens
    let reader = GaugeReader::load(&config).context("failed to load models")?;
    tracing::info!(models = ?reader.models(), "reader ready");

    gaugeread::server::serve(Arc::new(reader), &config.server).await
}
