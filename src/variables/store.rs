//! The variable store and its recursive resolution engine.

use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;

use super::{
    Classification, FunctionCall, ResolutionMode, ResolveContext, Snippet, Variable,
    VariableValue, snippet_body, snippet_spans,
};
use crate::constants::{ENV_DEFAULT_PARAMETER, MAX_EMBEDDED_VARIABLE_DEPTH};
use crate::core::{StackyardError, suggest_similar};
use crate::functions::{FunctionArgs, value_to_string};

/// Owns every [`Variable`], partitioned by classification.
///
/// `(classification, id)` is the key: the same id may exist in several partitions.
/// Mutation needs `&mut self`, so a store that is being resolved (possibly by several
/// concurrent futures sharing `&self`) cannot change underneath them.
pub struct VariableStore {
    partitions: HashMap<Classification, HashMap<String, Variable>>,
    context: ResolveContext,
}

impl VariableStore {
    pub fn new(context: ResolveContext) -> Self {
        Self {
            partitions: HashMap::new(),
            context,
        }
    }

    pub const fn context(&self) -> &ResolveContext {
        &self.context
    }

    /// Insert a variable. Fails if `(classification, id)` already exists.
    pub fn add(&mut self, variable: Variable) -> Result<(), StackyardError> {
        let partition = self.partitions.entry(variable.classification()).or_default();
        if partition.contains_key(variable.id()) {
            return Err(StackyardError::DuplicateVariable {
                classification: variable.classification().to_string(),
                id: variable.id().to_string(),
            });
        }
        tracing::trace!("Adding variable {}:{}", variable.classification(), variable.id());
        partition.insert(variable.id().to_string(), variable);
        Ok(())
    }

    /// Replace an existing variable.
    ///
    /// Returns `false` and changes nothing when `(classification, id)` is absent;
    /// callers create first and update afterwards.
    pub fn update(&mut self, variable: Variable) -> bool {
        match self
            .partitions
            .get_mut(&variable.classification())
            .and_then(|partition| partition.get_mut(variable.id()))
        {
            Some(existing) => {
                *existing = variable;
                true
            }
            None => {
                tracing::debug!(
                    "Ignoring update of unknown variable {}:{}",
                    variable.classification(),
                    variable.id()
                );
                false
            }
        }
    }

    /// Exact lookup.
    pub fn get(&self, id: &str, classification: Classification) -> Result<&Variable, StackyardError> {
        let partition = self.partitions.get(&classification);
        partition.and_then(|p| p.get(id)).ok_or_else(|| StackyardError::VariableNotFound {
            classification: classification.to_string(),
            id: id.to_string(),
            suggestions: partition
                .map(|p| suggest_similar(id, p.keys().map(String::as_str)))
                .unwrap_or_default(),
        })
    }

    /// Variables of one classification, in no particular order.
    pub fn variables(&self, classification: Classification) -> impl Iterator<Item = &Variable> {
        self.partitions.get(&classification).into_iter().flat_map(HashMap::values)
    }

    pub fn len(&self) -> usize {
        self.partitions.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Produce the final value of `(classification, id)`.
    ///
    /// With `skip_resolution` the raw value is returned untouched. Otherwise every
    /// embedded placeholder is evaluated, innermost first.
    pub async fn resolve(
        &self,
        id: &str,
        classification: Classification,
        skip_resolution: bool,
    ) -> Result<String, StackyardError> {
        let variable = self.get(id, classification)?;
        if skip_resolution {
            return Ok(variable.raw_value().to_string());
        }

        tracing::debug!(target: "resolve", "Resolving {}:{}", classification, id);
        self.resolve_variable(variable, 0).await
    }

    fn resolve_variable<'a>(
        &'a self,
        variable: &'a Variable,
        depth: usize,
    ) -> BoxFuture<'a, Result<String, StackyardError>> {
        async move {
            match variable.raw_value() {
                VariableValue::Str(line) => self.process_line(line, variable, depth, false).await,
                other => Ok(other.to_string()),
            }
        }
        .boxed()
    }

    /// Substitute every top-level snippet of `line`, then evaluate `line` itself when
    /// it is a snippet body.
    fn process_line<'a>(
        &'a self,
        line: &'a str,
        variable: &'a Variable,
        depth: usize,
        is_snippet: bool,
    ) -> BoxFuture<'a, Result<String, StackyardError>> {
        async move {
            if depth > MAX_EMBEDDED_VARIABLE_DEPTH {
                return Err(StackyardError::MaxDepthExceeded {
                    max_depth: MAX_EMBEDDED_VARIABLE_DEPTH,
                    snippet: line.to_string(),
                });
            }

            // Values are spliced into the original line, so substituted text is never
            // scanned again.
            let mut processed = String::with_capacity(line.len());
            let mut computed: HashMap<&str, String> = HashMap::new();
            let mut copied_to = 0;
            for span in snippet_spans(line) {
                let body = snippet_body(line, &span);
                if !computed.contains_key(body) {
                    let value = self.process_line(body, variable, depth + 1, true).await?;
                    computed.insert(body, value);
                }
                processed.push_str(&line[copied_to..span.start]);
                processed.push_str(&computed[body]);
                copied_to = span.end;
            }
            processed.push_str(&line[copied_to..]);

            if is_snippet {
                self.evaluate(&processed, variable, depth).await
            } else {
                Ok(processed)
            }
        }
        .boxed()
    }

    async fn evaluate(
        &self,
        text: &str,
        variable: &Variable,
        depth: usize,
    ) -> Result<String, StackyardError> {
        tracing::trace!(target: "resolve", "Evaluating snippet '{}' at depth {}", text, depth);

        match Snippet::parse(text)? {
            Snippet::Stored {
                classification,
                id,
            } => Ok(self.get(id, classification)?.raw_value().to_string()),
            Snippet::Ref {
                id,
            } => {
                let target = self.get(id, Classification::BuildVariable)?;
                self.resolve_variable(target, depth).await
            }
            Snippet::Env {
                name,
            } => Ok(self.evaluate_env(name, variable)),
            Snippet::Shell {
                command,
            } => self.evaluate_shell(command).await,
            Snippet::Func {
                call,
            } => self.evaluate_func(call, variable),
        }
    }

    fn evaluate_env(&self, name: &str, variable: &Variable) -> String {
        if let Some(value) = self.context.env.get(name) {
            return value;
        }
        match variable.extra_parameters().get(ENV_DEFAULT_PARAMETER) {
            Some(default) => value_to_string(default),
            None => {
                tracing::debug!(
                    target: "resolve",
                    "Environment variable '{}' is unset and '{}' has no default",
                    name,
                    variable.id()
                );
                String::new()
            }
        }
    }

    async fn evaluate_shell(&self, command: &str) -> Result<String, StackyardError> {
        let strict = self.context.mode == ResolutionMode::Strict;

        match self.context.shell.run(command).await {
            Ok(output) if output.success => Ok(output.stdout),
            Ok(output) => {
                let reason = format!(
                    "exit status {}: {}",
                    output.code.map_or_else(|| "signal".to_string(), |c| c.to_string()),
                    output.stderr.trim()
                );
                if strict {
                    return Err(StackyardError::ShellCommandFailed {
                        command: command.to_string(),
                        reason,
                    });
                }
                tracing::warn!(target: "resolve", "Shell command '{}' failed ({})", command, reason);
                Ok(output.stdout)
            }
            Err(err) if strict => Err(err),
            Err(err) => {
                tracing::warn!(target: "resolve", "{}", err);
                Ok(String::new())
            }
        }
    }

    fn evaluate_func(&self, text: &str, variable: &Variable) -> Result<String, StackyardError> {
        let strict = self.context.mode == ResolutionMode::Strict;

        let call = match FunctionCall::parse(text) {
            Ok(call) => call,
            Err(err) if strict => return Err(err),
            Err(err) => {
                tracing::warn!(target: "resolve", "{}; calling without arguments", err);
                FunctionCall {
                    name: FunctionCall::parse_name(text)?,
                    arguments: FunctionArgs::new(),
                }
            }
        };

        let registry = &self.context.functions;
        let function =
            registry.get(&call.name).ok_or_else(|| StackyardError::FunctionNotRegistered {
                name: call.name.clone(),
                suggestions: suggest_similar(&call.name, registry.names()),
            })?;

        let mut arguments = function.fixed_parameters().clone();
        arguments.extend(variable.extra_parameters().clone());
        arguments.extend(call.arguments);

        match function.call(&arguments) {
            Ok(value) => Ok(value),
            Err(err) if strict => Err(StackyardError::FunctionFailed {
                name: call.name,
                reason: format!("{err:#}"),
            }),
            Err(err) => {
                tracing::warn!(target: "resolve", "Function '{}' failed: {:#}", call.name, err);
                Ok(String::new())
            }
        }
    }
}
