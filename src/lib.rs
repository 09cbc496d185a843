pub mod club_multiplier;
pub mod combiner;
pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod model_artifact;
pub mod player;
pub mod predictors;
pub mod response;
pub mod roi;

pub use engine::{EngineStatus, ValuationEngine, global_engine};
pub use error::{Result, ValuationError};

/// Load `.env.local` then `.env` and install a stderr subscriber honouring
/// `RUST_LOG` (default `warn`). Binaries call this once at startup.
pub fn init_runtime() {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
