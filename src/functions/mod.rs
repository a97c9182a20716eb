//! Registered functions callable from `${func:name(key=value)}` snippets.
//!
//! The [`FunctionRegistry`] maps a name to a handler plus fixed parameters. When a
//! snippet invokes a function the arguments are merged in this order, later keys
//! winning:
//!
//! 1. the function's fixed parameters (supplied at registration),
//! 2. the resolving variable's extra parameters,
//! 3. the keyword arguments written in the call.
//!
//! Registries are built explicitly and handed to the store through
//! [`ResolveContext`](crate::variables::ResolveContext); there is no global table.
//!
//! # Examples
//!
//! ```rust
//! use stackyard::functions::{FunctionRegistry, required_str};
//!
//! let mut registry = FunctionRegistry::with_builtins();
//! registry.register("greet", |args| Ok(format!("hello {}", required_str(args, "name")?)));
//! assert!(registry.contains("greet"));
//! assert!(registry.contains("join"));
//! ```

mod builtins;

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Keyword arguments passed to a function.
pub type FunctionArgs = serde_json::Map<String, Value>;

/// A callable registered under a name.
pub type FunctionHandler = Arc<dyn Fn(&FunctionArgs) -> anyhow::Result<String> + Send + Sync>;

/// A handler plus its fixed parameters.
#[derive(Clone)]
pub struct RegisteredFunction {
    handler: FunctionHandler,
    fixed_parameters: FunctionArgs,
}

impl RegisteredFunction {
    pub const fn fixed_parameters(&self) -> &FunctionArgs {
        &self.fixed_parameters
    }

    pub fn call(&self, args: &FunctionArgs) -> anyhow::Result<String> {
        (self.handler)(args)
    }
}

impl fmt::Debug for RegisteredFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredFunction")
            .field("fixed_parameters", &self.fixed_parameters)
            .finish_non_exhaustive()
    }
}

/// Table of functions available to `func` snippets.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, RegisteredFunction>,
}

impl FunctionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the string helpers (`join`, `upper`, `lower`,
    /// `replace`, `default`, `echo`).
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtins::register_all(&mut registry);
        registry
    }

    /// Register `handler` under `name` without fixed parameters.
    pub fn register<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&FunctionArgs) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        self.register_with_parameters(name, FunctionArgs::new(), handler);
    }

    /// Register `handler` under `name`; `fixed_parameters` are merged under every call.
    pub fn register_with_parameters<F>(
        &mut self,
        name: impl Into<String>,
        fixed_parameters: FunctionArgs,
        handler: F,
    ) where
        F: Fn(&FunctionArgs) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.functions.contains_key(&name) {
            tracing::debug!("Replacing registered function '{}'", name);
        }
        self.functions.insert(
            name,
            RegisteredFunction {
                handler: Arc::new(handler),
                fixed_parameters,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredFunction> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Render an argument value as the text a template would receive.
///
/// Strings are used as-is, null becomes empty, containers are rendered as JSON.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Fetch a required argument rendered as a string.
pub fn required_str(args: &FunctionArgs, key: &str) -> anyhow::Result<String> {
    args.get(key)
        .map(value_to_string)
        .ok_or_else(|| anyhow::anyhow!("missing required argument '{key}'"))
}

/// Fetch an optional argument rendered as a string.
pub fn optional_str(args: &FunctionArgs, key: &str) -> Option<String> {
    args.get(key).map(value_to_string)
}
