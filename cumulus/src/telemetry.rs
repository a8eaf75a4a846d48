//! Tracing initialization.
//!
//! Sets up `tracing-subscriber` with an `EnvFilter` (honoring `RUST_LOG`,
//! defaulting to `info`) and console output. Call once at process start;
//! embedding applications that install their own subscriber can skip this
//! entirely.

use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
pub fn init_telemetry() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    info!("Telemetry initialized");
    Ok(())
}
