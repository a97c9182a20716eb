//! Explicit context handed to the [`VariableStore`](super::VariableStore).
//!
//! Everything resolution touches outside the store itself (the function registry,
//! the shell, the environment, failure policy) is carried here instead of living in
//! process-wide singletons.

use std::collections::HashMap;
use std::sync::Arc;

use super::ShellRunner;
use crate::functions::FunctionRegistry;

/// How evaluation side-effect failures are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResolutionMode {
    /// Failing shell commands and functions are logged and yield partial or empty text.
    #[default]
    Lenient,
    /// Failing shell commands and functions abort resolution.
    Strict,
}

impl ResolutionMode {
    pub const fn from_strict(strict: bool) -> Self {
        if strict {
            Self::Strict
        } else {
            Self::Lenient
        }
    }
}

/// Source of environment variables for `env` snippets.
///
/// Overrides are consulted first; the process environment is only read when the
/// lookup is not isolated.
#[derive(Debug, Clone, Default)]
pub struct EnvLookup {
    overrides: HashMap<String, String>,
    isolated: bool,
}

impl EnvLookup {
    /// Read the process environment.
    pub fn process() -> Self {
        Self::default()
    }

    /// Never read the process environment; only overrides are visible.
    pub fn isolated() -> Self {
        Self {
            overrides: HashMap::new(),
            isolated: true,
        }
    }

    /// Add an override.
    #[must_use]
    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<String> {
        if let Some(value) = self.overrides.get(name) {
            return Some(value.clone());
        }
        if self.isolated {
            None
        } else {
            std::env::var(name).ok()
        }
    }
}

/// Collaborators used during resolution.
#[derive(Clone)]
pub struct ResolveContext {
    pub functions: Arc<FunctionRegistry>,
    pub shell: ShellRunner,
    pub env: EnvLookup,
    pub mode: ResolutionMode,
}

impl ResolveContext {
    pub fn new(functions: Arc<FunctionRegistry>) -> Self {
        Self {
            functions,
            shell: ShellRunner::default(),
            env: EnvLookup::process(),
            mode: ResolutionMode::Lenient,
        }
    }

    #[must_use]
    pub fn with_shell(mut self, shell: ShellRunner) -> Self {
        self.shell = shell;
        self
    }

    #[must_use]
    pub fn with_env(mut self, env: EnvLookup) -> Self {
        self.env = env;
        self
    }

    #[must_use]
    pub const fn with_mode(mut self, mode: ResolutionMode) -> Self {
        self.mode = mode;
        self
    }
}

impl Default for ResolveContext {
    fn default() -> Self {
        Self::new(Arc::new(FunctionRegistry::with_builtins()))
    }
}
