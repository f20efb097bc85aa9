pub mod batch;
pub mod config;
pub mod detection;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod pose;
pub mod render;
pub mod scale;
pub mod server;

pub use config::GaugeConfig;
pub use error::{GaugeError, Result};
pub use models::{
    BoundingBox, DetectedObject, Detections, EffectiveRoi, Frame, Keypoint, KeypointSet,
    PipelineOutcome, PipelineResult, RegionImage, ScaleReading,
};
pub use pipeline::{DebugConfig, GaugeReader, PipelineContext};
pub use scale::ScaleCalculator;

/// Install the `tracing` subscriber used by both binaries.
///
/// Logs go to stderr. `RUST_LOG` wins when set; otherwise `verbose` picks
/// debug over info.
pub fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose { "gaugeread=debug,info" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .init();
}
