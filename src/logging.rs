//! Tracing subscriber setup for hosts embedding the group controller.

use tracing_subscriber::EnvFilter;

/// Installs a fmt subscriber filtered by `RUST_LOG`, falling back to `default`
/// (for example `"info"` or `"group_buddy=debug"`).
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(default: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}
