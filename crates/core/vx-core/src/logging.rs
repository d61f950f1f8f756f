//! Logging bootstrap
//!
//! The workspace logs through the `log` facade only. Binaries and tests pick
//! the backend; these helpers install `env_logger`.

/// Install `env_logger` with `default_filter` unless `RUST_LOG` is set.
///
/// Returns `false` when a logger was already installed.
pub fn init_logging(default_filter: &str) -> bool {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", default_filter))
        .try_init()
        .is_ok()
}

/// Test-friendly logger: output is captured by the test harness and repeated
/// calls are harmless.
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
