//! Tracing subscriber bootstrap.
//!
//! The library itself only emits `tracing` spans and events; binaries and
//! tests call [`init`] to install a formatted subscriber filtered by
//! `RUST_LOG`.

use tracing_subscriber::EnvFilter;

/// Install the default fmt subscriber with `RUST_LOG` filtering.
///
/// Safe to call more than once; subsequent calls are no-ops.
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .try_init();
}
