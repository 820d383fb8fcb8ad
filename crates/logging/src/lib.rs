#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

//! Diagnostics setup for the adbsync binaries.
//!
//! All crates in the workspace emit through [`tracing`]; this crate owns the
//! mapping from repeated `-v` flags to a subscriber filter. Level 0 shows
//! warnings and the final summary, `-v` narrates per-file decisions, `-vv`
//! adds planner/scanner debugging and `-vvv` opens the trace firehose
//! including adb argument vectors. `RUST_LOG` overrides the mapping when
//! set.

use tracing_subscriber::EnvFilter;

/// Returns the filter directive for a `-v` count.
#[must_use]
pub fn directive_for_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Installs the global subscriber.
///
/// Later calls are no-ops (the first subscriber wins), which keeps test
/// harnesses that initialise logging repeatedly out of trouble.
pub fn init(verbose: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directive_for_verbosity(verbose)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
