use shopfloor_tracker::app;
use shopfloor_tracker::config::TrackerConfig;

/// Main entry point for the tracking server
///
/// Configuration comes from `TRACKER_*` environment variables (see
/// [`TrackerConfig::from_env`]); log verbosity from `RUST_LOG`.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = TrackerConfig::from_env()?;
    app::run(config).await
}
