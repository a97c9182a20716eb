//! String helpers every registry starts with.

use anyhow::bail;
use serde_json::Value;

use super::{FunctionArgs, FunctionRegistry, optional_str, required_str, value_to_string};

pub(super) fn register_all(registry: &mut FunctionRegistry) {
    registry.register("echo", echo);
    registry.register("join", join);
    registry.register("upper", |args| Ok(required_str(args, "value")?.to_uppercase()));
    registry.register("lower", |args| Ok(required_str(args, "value")?.to_lowercase()));
    registry.register("replace", replace);
    registry.register("default", default);
}

/// `echo(message=...)`
fn echo(args: &FunctionArgs) -> anyhow::Result<String> {
    Ok(optional_str(args, "message").unwrap_or_default())
}

/// `join(items=[...], separator='-')`
fn join(args: &FunctionArgs) -> anyhow::Result<String> {
    let separator = optional_str(args, "separator").unwrap_or_default();
    match args.get("items") {
        Some(Value::Array(items)) => {
            Ok(items.iter().map(value_to_string).collect::<Vec<_>>().join(&separator))
        }
        Some(other) => Ok(value_to_string(other)),
        None => bail!("missing required argument 'items'"),
    }
}

/// `replace(value=..., old=..., new=...)`
fn replace(args: &FunctionArgs) -> anyhow::Result<String> {
    let value = required_str(args, "value")?;
    let old = required_str(args, "old")?;
    if old.is_empty() {
        bail!("argument 'old' must not be empty");
    }
    let new = optional_str(args, "new").unwrap_or_default();
    Ok(value.replace(&old, &new))
}

/// `default(value=..., fallback=...)`: `fallback` when `value` is empty or missing.
fn default(args: &FunctionArgs) -> anyhow::Result<String> {
    match optional_str(args, "value") {
        Some(value) if !value.is_empty() => Ok(value),
        _ => required_str(args, "fallback"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, args: Value) -> anyhow::Result<String> {
        let registry = FunctionRegistry::with_builtins();
        let Value::Object(args) = args else {
            unreachable!("test arguments are objects");
        };
        registry.get(name).unwrap().call(&args)
    }

    #[test]
    fn test_join() {
        assert_eq!(call("join", json!({"items": ["web", "app", 1], "separator": "-"})).unwrap(), "web-app-1");
        assert_eq!(call("join", json!({"items": ["a", "b"]})).unwrap(), "ab");
        assert!(call("join", json!({})).is_err());
    }

    #[test]
    fn test_case_helpers() {
        assert_eq!(call("upper", json!({"value": "dev"})).unwrap(), "DEV");
        assert_eq!(call("lower", json!({"value": "PROD"})).unwrap(), "prod");
    }

    #[test]
    fn test_replace() {
        assert_eq!(
            call("replace", json!({"value": "a.b.c", "old": ".", "new": "-"})).unwrap(),
            "a-b-c"
        );
        assert!(call("replace", json!({"value": "abc", "old": ""})).is_err());
    }

    #[test]
    fn test_default() {
        assert_eq!(call("default", json!({"value": "", "fallback": "x"})).unwrap(), "x");
        assert_eq!(call("default", json!({"value": "y", "fallback": "x"})).unwrap(), "y");
        assert_eq!(call("default", json!({"fallback": "x"})).unwrap(), "x");
    }

    #[test]
    fn test_echo() {
        assert_eq!(call("echo", json!({"message": "hi"})).unwrap(), "hi");
        assert_eq!(call("echo", json!({})).unwrap(), "");
    }
}
