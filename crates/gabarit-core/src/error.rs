//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Failed to parse YAML context: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON context: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid --set format: '{arg}'. Expected key=value")]
    InvalidSet { arg: String },

    #[error("Context must be a mapping at the top level, found {found}")]
    InvalidContext { found: &'static str },
}

pub type Result<T> = std::result::Result<T, CoreError>;
