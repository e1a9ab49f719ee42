//! Diagnostics for the simulation run.
//!
//! Rendered world states go to stdout; tracing output goes to stderr and is
//! filtered through `RUST_LOG`, for example `RUST_LOG=blocks_world_system_environment=debug`.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the tracing subscriber. Defaults to `warn` when `RUST_LOG` is unset.
pub(crate) fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
