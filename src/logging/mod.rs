// Logging
//
// `init_tracing` sets up the process-wide subscriber. `TurnLogger` appends one
// JSONL record per finished turn for offline review.

pub mod turn_log;

pub use turn_log::{TurnLogger, TurnRecord};

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset
const DEFAULT_FILTER: &str = "datachat=info,tower_http=info";
const DEBUG_FILTER: &str = "datachat=debug,tower_http=debug";

/// Install the global fmt subscriber. `RUST_LOG` wins over `debug`.
///
/// Logs go to stderr so `ask` can print NDJSON events on stdout.
pub fn init_tracing(debug: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if debug { DEBUG_FILTER } else { DEFAULT_FILTER })
    });

    // Ignore the error when a subscriber is already set (tests, embedding)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
