//! Structured error types shared across the sampler crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Diagnostic carried by every [`McError`].
///
/// `code` is a stable kebab-case tag such as `duplicate-move` or `worker-aborted` that tests
/// and callers match on. `context` records the offending names, ranks or paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable tag identifying the failure.
    pub code: String,
    /// What went wrong, for people.
    pub message: String,
    /// Offending values keyed by what they are (`name`, `rank`, `path`, ...).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// How to get the run going again, when there is an obvious remedy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Payload with no context and no hint.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Records one offending value; a repeated key keeps the last value.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Attaches a remedy.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the sampler.
///
/// `Configuration` and `TypeMismatch` are raised during setup and never once cycles run.
/// `Measure` is isolated by the measure registry and only ever reported. `Reduction` is
/// fatal for the whole run because every worker synchronises on the collective.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum McError {
    /// Invalid registration, unknown generator name or invalid cycle parameters.
    #[error("configuration error: {0}")]
    Configuration(ErrorInfo),
    /// Typed retrieval of a move or measurement with the wrong type.
    #[error("type mismatch: {0}")]
    TypeMismatch(ErrorInfo),
    /// Driver used out of order (`start` twice, `collect_results` before `start`, ...).
    #[error("state error: {0}")]
    State(ErrorInfo),
    /// Failure raised by a single measurement.
    #[error("measure error: {0}")]
    Measure(ErrorInfo),
    /// Failure of a cross-worker collective.
    #[error("reduction error: {0}")]
    Reduction(ErrorInfo),
    /// Serialization, schema and configuration file errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if !self.context.is_empty() {
            let pairs: Vec<String> = self
                .context
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect();
            write!(f, " ({})", pairs.join(", "))?;
        }
        match &self.hint {
            Some(hint) => write!(f, "; hint: {hint}"),
            None => Ok(()),
        }
    }
}

impl McError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            McError::Configuration(info)
            | McError::TypeMismatch(info)
            | McError::State(info)
            | McError::Measure(info)
            | McError::Reduction(info)
            | McError::Serde(info) => info,
        }
    }

    /// Shorthand for a [`McError::Configuration`] with the given code and message.
    pub fn configuration(code: impl Into<String>, message: impl Into<String>) -> Self {
        McError::Configuration(ErrorInfo::new(code, message))
    }

    /// Shorthand for a [`McError::Measure`] with the given code and message.
    pub fn measure(code: impl Into<String>, message: impl Into<String>) -> Self {
        McError::Measure(ErrorInfo::new(code, message))
    }
}
