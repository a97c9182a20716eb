//! Error handling for Stackyard
//!
//! This module provides the strongly-typed error enum used by the resolution and
//! ordering engines, plus user-friendly error reporting for the CLI. The error
//! system follows two principles:
//! 1. **Strongly-typed errors** so callers (and tests) can match on the failure mode
//! 2. **User-friendly messages** with actionable suggestions for CLI users
//!
//! # Error Categories
//!
//! - **Configuration**: [`StackyardError::UnknownClassification`],
//!   [`StackyardError::TypeMismatch`], [`StackyardError::DuplicateVariable`],
//!   [`StackyardError::VariableNotFound`], [`StackyardError::ItemNotFound`],
//!   [`StackyardError::NoSharedScope`]
//! - **Resolution**: [`StackyardError::MaxDepthExceeded`],
//!   [`StackyardError::FunctionNotRegistered`], [`StackyardError::MalformedFunctionCall`],
//!   [`StackyardError::MalformedSnippet`], [`StackyardError::UnsupportedClassification`]
//! - **Evaluation side effects** (strict mode only): [`StackyardError::ShellCommandFailed`],
//!   [`StackyardError::FunctionFailed`]
//! - **Plumbing**: manifests, sources, git, configuration files
//!
//! Engine code returns `Result<T, StackyardError>`; plumbing wraps these in
//! [`anyhow::Error`] and [`user_friendly_error`] recovers them for display.
//!
//! # Examples
//!
//! ```rust,no_run
//! use stackyard::core::{StackyardError, user_friendly_error};
//!
//! let error = StackyardError::MaxDepthExceeded { max_depth: 3, snippet: "ref:a".into() };
//! let ctx = user_friendly_error(anyhow::Error::from(error));
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for Stackyard operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StackyardError {
    /// A classification tag that is not part of the recognized set.
    #[error("Unknown variable classification '{classification}'")]
    UnknownClassification {
        /// The unrecognized tag
        classification: String,
    },

    /// A variable's raw value cannot be assigned to its declared type.
    #[error("Variable '{id}' declares type {expected} but its value '{value}' is not assignable")]
    TypeMismatch {
        /// Variable identifier
        id: String,
        /// Declared type
        expected: String,
        /// Offending raw value
        value: String,
    },

    /// A `(classification, id)` pair was added twice.
    #[error("Variable '{id}' already exists in classification '{classification}'")]
    DuplicateVariable {
        /// Classification partition
        classification: String,
        /// Variable identifier
        id: String,
    },

    /// Lookup of a missing `(classification, id)` pair.
    #[error("Variable '{id}' not found in classification '{classification}'")]
    VariableNotFound {
        /// Classification partition
        classification: String,
        /// Variable identifier
        id: String,
        /// Close matches within the same classification
        suggestions: Vec<String>,
    },

    /// Lookup of a missing item in the graph.
    #[error("Item '{name}' not found")]
    ItemNotFound {
        /// Item name
        name: String,
        /// Close matches among existing items
        suggestions: Vec<String>,
    },

    /// A parent link between two items that have no scope in common.
    #[error("Items '{parent}' and '{child}' do not share a scope")]
    NoSharedScope {
        /// Parent item name
        parent: String,
        /// Child item name
        child: String,
    },

    /// Nested snippet evaluation went deeper than the guard allows.
    #[error("Maximum embedded variable depth exceeded ({max_depth}) while evaluating '{snippet}'")]
    MaxDepthExceeded {
        /// Configured maximum depth
        max_depth: usize,
        /// The snippet being evaluated when the guard tripped
        snippet: String,
    },

    /// A snippet without a `classification:` prefix.
    #[error("Malformed snippet '{snippet}': expected 'classification:content'")]
    MalformedSnippet {
        /// Raw snippet text
        snippet: String,
    },

    /// A recognized classification that cannot be evaluated inside a snippet.
    #[error("Classification '{classification}' not supported in snippet '{snippet}'")]
    UnsupportedClassification {
        /// The classification tag
        classification: String,
        /// Raw snippet text
        snippet: String,
    },

    /// The function name of a `func` snippet is not in the registry.
    #[error("Function '{name}' is not a recognized function (not registered)")]
    FunctionNotRegistered {
        /// Function name as written
        name: String,
        /// Close matches among registered functions
        suggestions: Vec<String>,
    },

    /// The `name(key=value, ...)` call text could not be parsed.
    #[error("Malformed function call '{call}': {reason}")]
    MalformedFunctionCall {
        /// Raw call text
        call: String,
        /// Parser diagnostic
        reason: String,
    },

    /// A shell command failed (strict mode only).
    #[error("Shell command failed: {command}")]
    ShellCommandFailed {
        /// Command text
        command: String,
        /// Exit status, stderr or spawn error
        reason: String,
    },

    /// A registered function returned an error (strict mode only).
    #[error("Function '{name}' failed: {reason}")]
    FunctionFailed {
        /// Function name
        name: String,
        /// Error reported by the function
        reason: String,
    },

    /// Manifest could not be located.
    #[error("Manifest not found: {location}")]
    ManifestNotFound {
        /// Path or URL that was tried
        location: String,
    },

    /// Manifest content is not valid.
    #[error("Failed to parse manifest {location}: {reason}")]
    ManifestParseError {
        /// Path or URL of the manifest
        location: String,
        /// Parser diagnostic
        reason: String,
    },

    /// Manifest content parsed but is inconsistent.
    #[error("Invalid manifest: {reason}")]
    ManifestValidationError {
        /// What is wrong
        reason: String,
    },

    /// A manifest source could not be fetched.
    #[error("Failed to fetch manifest from {location}: {reason}")]
    SourceFetchFailed {
        /// URL of the source
        location: String,
        /// Underlying failure
        reason: String,
    },

    /// Git executable not found in PATH.
    #[error("Git is not installed or not found in PATH")]
    GitNotFound,

    /// Git operation failed during execution.
    #[error("Git operation failed: {operation}")]
    GitCommandError {
        /// The git operation that failed (e.g., "clone")
        operation: String,
        /// The error output from the git command
        stderr: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },
}

impl StackyardError {
    /// Close matches carried by lookup failures; empty for every other error.
    pub fn suggestions(&self) -> &[String] {
        match self {
            Self::VariableNotFound {
                suggestions,
                ..
            }
            | Self::ItemNotFound {
                suggestions,
                ..
            }
            | Self::FunctionNotRegistered {
                suggestions,
                ..
            } => suggestions,
            _ => &[],
        }
    }

    /// The error message followed by its suggestions, if any.
    pub fn with_hint(&self) -> String {
        match did_you_mean(self.suggestions()) {
            Some(hint) => format!("{self}. {hint}"),
            None => self.to_string(),
        }
    }
}

/// Error wrapper with a suggestion and details for CLI display.
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: StackyardError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context without suggestion or details.
    #[must_use]
    pub const fn new(error: StackyardError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

fn did_you_mean(suggestions: &[String]) -> Option<String> {
    if suggestions.is_empty() {
        None
    } else {
        Some(format!("Did you mean: {}?", suggestions.join(", ")))
    }
}

fn create_error_context(error: StackyardError) -> ErrorContext {
    match &error {
        StackyardError::VariableNotFound {
            suggestions,
            ..
        }
        | StackyardError::ItemNotFound {
            suggestions,
            ..
        } => {
            let hint = did_you_mean(suggestions);
            let ctx = ErrorContext::new(error.clone());
            match hint {
                Some(hint) => ctx.with_suggestion(hint),
                None => ctx.with_suggestion("Check the spelling against the manifest"),
            }
        }
        StackyardError::FunctionNotRegistered {
            suggestions,
            ..
        } => {
            let hint = did_you_mean(suggestions)
                .unwrap_or_else(|| "Run 'stackyard validate' to list unknown functions".into());
            ErrorContext::new(error.clone()).with_suggestion(hint)
        }
        StackyardError::MaxDepthExceeded {
            ..
        } => ErrorContext::new(error.clone())
            .with_suggestion("Look for variables that reference each other through ${ref:...}")
            .with_details("Embedded variables may nest at most three levels deep"),
        StackyardError::MalformedFunctionCall {
            ..
        } => ErrorContext::new(error.clone())
            .with_suggestion("Use keyword arguments with literal values: name(key='value', n=1)"),
        StackyardError::NoSharedScope {
            ..
        } => ErrorContext::new(error.clone())
            .with_suggestion("Add a common environment to both units or remove the dependency"),
        StackyardError::GitNotFound => ErrorContext::new(error.clone())
            .with_suggestion("Install git and make sure it is available in PATH"),
        StackyardError::GitCommandError {
            stderr,
            ..
        } => ErrorContext::new(error.clone()).with_details(stderr.clone()),
        StackyardError::ShellCommandFailed {
            reason,
            ..
        } => ErrorContext::new(error.clone())
            .with_details(reason.clone())
            .with_suggestion("Drop --strict to tolerate failing shell snippets"),
        StackyardError::ManifestNotFound {
            ..
        } => ErrorContext::new(error.clone())
            .with_suggestion("Pass a local path, an http(s) URL or git+<url>//<path> to --manifest"),
        _ => ErrorContext::new(error.clone()),
    }
}

/// Convert any error into an [`ErrorContext`] suitable for CLI display.
///
/// Errors that wrap a [`StackyardError`] anywhere in their chain get a targeted
/// suggestion; everything else is reported with its full cause chain.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    for cause in error.chain() {
        if let Some(known) = cause.downcast_ref::<StackyardError>() {
            let ctx = create_error_context(known.clone());
            let outer = error.to_string();
            if outer != known.to_string() {
                return ctx.with_details(outer);
            }
            return ctx;
        }
    }

    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(ToString::to_string).collect();
    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(StackyardError::ConfigError {
        message,
    })
}
