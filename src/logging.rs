//! Logging initialization.
//!
//! Structured logging via `tracing`, written to stderr so stdout stays
//! reserved for command output (including `--json` descriptors).

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the level chosen by `verbose`.
pub fn init(verbose: bool, json_format: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
