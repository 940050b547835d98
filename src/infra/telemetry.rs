use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global fmt subscriber, filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A subscriber may already be set when called from tests.
    let _ = fmt().with_env_filter(filter).try_init();
}
