//! Logging setup and the command log.
//!
//! Library code logs through `tracing`. Outgoing commands are additionally
//! emitted under the [`COMMAND_TARGET`] target when command logging is
//! enabled, so they can be switched on with
//! `RUST_LOG=helios_docstore::command=debug` without raising the level of
//! everything else.

use serde_json::Value;

/// Tracing target of the command log.
pub const COMMAND_TARGET: &str = "helios_docstore::command";

/// Initializes the tracing subscriber for logging.
///
/// This should be called once at application startup. `RUST_LOG` takes
/// precedence over `level` when set.
///
/// # Arguments
///
/// * `level` - The log level (error, warn, info, debug, trace)
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("helios_docstore={}", level)));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

/// Emits one outgoing command on the command log.
pub fn log_command(command: &str, database: &str, collection: Option<&str>, body: &Value) {
    tracing::debug!(
        target: COMMAND_TARGET,
        command,
        database,
        collection = collection.unwrap_or_default(),
        body = %body,
        "{} command",
        command
    );
}
