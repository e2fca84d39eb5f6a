// ABOUTME: Error types for instance execution and scheduling
// ABOUTME: Every variant is absorbed at the target boundary and logged, never surfaced to callers

use thiserror::Error;

use crate::parser::ExecutionType;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("HTTP request to {url} failed: {source}")]
    HttpError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to build HTTP client: {0}")]
    ClientError(#[source] reqwest::Error),

    #[error("Failed to parse JSON response: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Step '{step_id}' failed: {source}")]
    StepFailed {
        step_id: String,
        #[source]
        source: Box<ExecutionError>,
    },

    #[error("Execution type not supported: {execution_type:?}")]
    PipelineNotSupported { execution_type: ExecutionType },

    #[error("Settings error: {0}")]
    SettingsError(#[from] crate::settings::SettingsError),

    #[error("Parser error: {0}")]
    ParserError(#[from] crate::parser::ParserError),
}

pub type Result<T> = std::result::Result<T, ExecutionError>;
