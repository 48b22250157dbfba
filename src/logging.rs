//! Logging initialisation
//!
//! Filter sources, first match wins: `QCT_LOG`, `RUST_LOG`, then the level
//! implied by `--verbose`/`--quiet`. Output goes to stderr so command output
//! on stdout stays pipeable.

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber for the CLI
pub fn init(verbose: bool, quiet: bool) {
    let fallback = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };

    let filter = EnvFilter::try_from_env("QCT_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Subscriber for unit tests; safe to call more than once
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
