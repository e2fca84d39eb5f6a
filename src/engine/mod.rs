// ABOUTME: Execution engine module for template-driven metric collection
// ABOUTME: Handles target fan-out, HTTP fetching, step caching and instance scheduling

pub mod cache;
pub mod context;
pub mod error;
pub mod executor;
pub mod http;
pub mod result;
pub mod scheduler;

pub use cache::StepCache;
pub use context::{label_preview_inputs, merge_inputs, TargetContext, AUTO_PLACEHOLDER};
pub use error::{ExecutionError, Result};
pub use executor::{
    ExecutionEngine, ExecutionEngineBuilder, DEFAULT_TARGET_DELAY, EMPTY_VALUE, ERROR_VALUE,
};
pub use http::{HttpRequester, DEFAULT_TIMEOUT};
pub use result::{InstanceResult, StepOutcome, TargetResult, TargetStatus};
pub use scheduler::{InstanceScheduler, LOADING_VALUE, MIN_INTERVAL};
