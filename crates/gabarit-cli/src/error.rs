//! CLI error types with exit code handling
//!
//! This module provides a unified error type for CLI operations that
//! maps errors to appropriate exit codes.

use gabarit_core::CoreError;
use gabarit_engine::EngineError;
use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// A context file or override could not be loaded
    #[error("Context error: {message}")]
    #[diagnostic(code(gabarit::cli::context))]
    Context {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// The template could not be rendered
    #[error("Template error: {message}")]
    #[diagnostic(code(gabarit::cli::template))]
    Template {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(gabarit::cli::io))]
    Io { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Context { .. } => exit_codes::CONTEXT_ERROR,
            CliError::Template { .. } => exit_codes::TEMPLATE_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
        }
    }

    /// Create a context error with help text
    pub fn context_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Context {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create an IO error mentioning the file involved
    pub fn io_at(path: &Path, err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{}: {}", path.display(), err),
        }
    }

    /// Attach the file a context error came from
    pub fn loading(path: &Path, err: CoreError) -> Self {
        match err {
            CoreError::Io(io) => Self::io_at(path, io),
            other => Self::context_with_help(
                format!("{}: {}", path.display(), other),
                "context files must hold a JSON or YAML mapping at the top level",
            ),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::Io(io) => io.into(),
            CoreError::InvalidSet { .. } => Self::context_with_help(
                message,
                "use --set key.path=value, e.g. --set site.name=example.org",
            ),
            _ => CliError::Context { message, help: None },
        }
    }
}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        let help = err.help().map(|h| h.to_string());
        CliError::Template {
            message: err.to_string(),
            help,
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
