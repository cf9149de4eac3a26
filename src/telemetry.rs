//! Tracing subscriber setup shared by binaries and tests.

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Panics if one is already installed.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(default_filter())
        .init();
}

/// Install the global subscriber if none is set yet. Tests call this from
/// several entry points, so losing the race is not an error.
pub fn try_init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(default_filter())
        .try_init();
}

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dicehouse=info"))
}
