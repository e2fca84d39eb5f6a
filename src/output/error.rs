// ABOUTME: Error types for metric output formatting
// ABOUTME: Defines the failures of rendering a registry snapshot

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Unknown output format '{format}', expected text, json or yaml")]
    FormatterNotFound { format: String },

    #[error("Failed to render snapshot as JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to render snapshot as YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, OutputError>;
