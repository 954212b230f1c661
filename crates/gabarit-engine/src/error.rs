//! Engine error types
//!
//! Only caller-input validation is a hard failure. Everything that can go
//! wrong while rendering (unknown filters, failing filters, unresolved paths,
//! malformed directives) is recovered from and logged instead.

use miette::Diagnostic;
use thiserror::Error;

/// Hard failures surfaced to the caller
#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum EngineError {
    /// The template handed to `compile_value` is not a string
    #[error("Invalid template: expected a string, found {found}")]
    #[diagnostic(
        code(gabarit::engine::invalid_template),
        help("pass the template text itself, not a parsed document")
    )]
    InvalidTemplate { found: &'static str },

    /// A filter registration was rejected
    #[error("Invalid filter `{name}`: {reason}")]
    #[diagnostic(code(gabarit::engine::invalid_filter))]
    InvalidFilter {
        name: String,
        reason: String,
        #[help]
        suggestion: Option<String>,
    },
}

impl EngineError {
    /// Create an invalid filter error without help text
    pub fn invalid_filter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFilter {
            name: name.into(),
            reason: reason.into(),
            suggestion: None,
        }
    }
}

/// Recoverable failure raised by a filter implementation
///
/// The directive processor logs it and keeps the value it had before the
/// failing filter ran.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("missing required argument `{arg}`")]
    MissingArgument { arg: &'static str },

    #[error("invalid argument `{arg}`: expected {expected}, found {found}")]
    InvalidArgument {
        arg: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("{0}")]
    Failed(String),
}

impl FilterError {
    /// Create a generic failure from a message
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
