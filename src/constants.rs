//! Global constants used throughout the Stackyard codebase.
//!
//! Timeouts, retry parameters and engine limits that are shared across
//! modules live here so the magic numbers stay discoverable.

use std::time::Duration;

/// Maximum nesting depth for embedded variable evaluation.
///
/// Every nested snippet (and every `${ref:...}` hop) adds one level. Going past
/// this limit fails the resolution instead of recursing further.
pub const MAX_EMBEDDED_VARIABLE_DEPTH: usize = 3;

/// Scope every item belongs to until it is given a real one.
pub const DEFAULT_SCOPE: &str = "__default__";

/// Extra parameter consulted by `env` snippets when the variable is unset.
pub const ENV_DEFAULT_PARAMETER: &str = "default_value";

/// Default shell used for `shell` snippets.
pub const DEFAULT_SHELL: &str = "sh";

/// Default timeout for a single `shell` snippet (60 seconds).
pub const DEFAULT_SHELL_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for fetching a manifest over HTTP (30 seconds).
pub const HTTP_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for Git clone operations (120 seconds).
pub const GIT_CLONE_TIMEOUT: Duration = Duration::from_secs(120);

/// Starting delay for exponential backoff (10ms).
pub const STARTING_BACKOFF_DELAY_MS: u64 = 10;

/// Maximum backoff delay for exponential backoff (500ms).
pub const MAX_BACKOFF_DELAY_MS: u64 = 500;

/// Number of attempts for retriable fetches.
pub const FETCH_RETRY_ATTEMPTS: usize = 4;

/// Build variable holding the environment being planned.
pub const ENVIRONMENT_VARIABLE: &str = "environment";

/// Function exposing the manifest's accounts to `func` snippets.
pub const ACCOUNT_FUNCTION: &str = "account";

/// Name of the global configuration file inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Directory under the home directory holding the global configuration.
pub const CONFIG_DIR_NAME: &str = ".stackyard";
