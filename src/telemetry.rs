//! Tracing subscriber setup.
//!
//! Library code only ever emits through `tracing`; installing a
//! subscriber is the embedding application's choice. `init` is a
//! convenience for binaries and examples: env-filtered fmt output, ANSI
//! when stderr is a terminal.

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

/// Install the default subscriber. Safe to call more than once; later
/// calls are ignored.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .try_init();
}
