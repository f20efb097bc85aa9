use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;

use gaugeread::batch::{self, BatchOptions, Mode};
use gaugeread::{DebugConfig, GaugeConfig, GaugeReader};

#[derive(Parser)]
#[command(name = "gaugeread")]
#[command(about = "Read pressure gauges from photographs")]
struct Cli {
    /// Process one image or every *.jpg in a folder
    #[arg(value_enum)]
    mode: Mode,

    /// Image file (single) or directory (folder)
    #[arg(value_name = "PATH")]
    path: PathBuf,

    /// Directory receiving one <stem>.txt report per image
    #[arg(value_name = "OUTPUT_DIR")]
    output_dir: PathBuf,

    /// Directory holding nanodet.rten and gauge-pose.rten
    #[arg(long, value_name = "DIR")]
    model_dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Also write <stem>_processed.jpg with the annotated image
    #[arg(long)]
    save_image: bool,

    /// Save intermediate images to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = match Cli::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // Help and version go to stdout and are not failures
            let code = if e.use_stderr() { -1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    gaugeread::init_tracing(args.verbose);

    if let Err(e) = run(args) {
        tracing::error!("{:#}", e);
        std::process::exit(-1);
    }
}

fn run(args: Cli) -> anyhow::Result<()> {
    let mut config = GaugeConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(dir) = args.model_dir {
        config.models.dir = dir;
    }

    let reader = GaugeReader::load(&config).context("failed to load models")?;

    let debug = args.debug_out.map(DebugConfig::new).transpose()?;
    let options = BatchOptions {
        output_dir: args.output_dir,
        save_image: args.save_image,
        debug,
    };

    let summary = batch::run(&reader, args.mode, &args.path, &options)?;

    if !summary.skipped.is_empty() {
        tracing::warn!(count = summary.skipped.len(), "some images could not be read");
    }
    tracing::info!(
        images = summary.processed.len(),
        output = %options.output_dir.display(),
        "Processing complete"
    );

    Ok(())
}
