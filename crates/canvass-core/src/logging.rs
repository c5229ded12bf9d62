//! Tracing subscriber setup shared by binaries and integration harnesses.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default filter used when `RUST_LOG` is not set.
pub const DEFAULT_DIRECTIVE: &str = "info,canvass=debug";

/// Install a global `tracing` subscriber with an env-driven filter.
///
/// `RUST_LOG` takes precedence over `default_directive`. Calling this more
/// than once is harmless; later calls are ignored.
pub fn init_tracing(default_directive: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init();
}
