//! Test utilities for Stackyard.
//!
//! Available to unit tests and, through the `test-utils` feature, to the
//! integration tests in `tests/`:
//!
//! - [`init_test_logging`] to see `tracing` output from a test
//! - [`ManifestFixture`] sample manifests
//! - [`TestGit`] to build throwaway repositories for `git+` sources

pub mod fixtures;
pub mod git_helper;

pub use fixtures::ManifestFixture;
pub use git_helper::TestGit;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests, once per process.
///
/// Uses `level` when given, otherwise `RUST_LOG`; with neither, nothing is logged.
///
/// ```rust,no_run
/// use tracing::Level;
///
/// stackyard::test_utils::init_test_logging(Some(Level::DEBUG));
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}
