//! Logging setup.
//!
//! Diagnostics go to stderr so they show up as `remote:` lines in the
//! pusher's terminal. The filter is read from `SIEVE_PUSHDEPLOY_LOG`
//! (same syntax as `RUST_LOG`) and defaults to `info`.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const LOG_ENV: &str = "SIEVE_PUSHDEPLOY_LOG";

/// Initialize the global tracing subscriber.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .try_init()
        .ok();
}
