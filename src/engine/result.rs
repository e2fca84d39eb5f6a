// ABOUTME: Result types for chain steps, targets and whole instance executions
// ABOUTME: Lets callers and tests observe what one tick did without reading the sink

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use super::error::ExecutionError;

/// What happened to one chain step.
#[derive(Debug)]
pub enum StepOutcome {
    /// Fetched from the network; `cached` is whether the values were stored for reuse.
    Fetched { cached: bool },
    /// Values came from a fresh cache entry; no request was sent.
    Cached,
    Failed(ExecutionError),
}

impl StepOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, StepOutcome::Failed(_))
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum TargetStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct TargetResult {
    pub key_suffix: String,
    pub status: TargetStatus,
    pub error: Option<String>,
    /// Every `(key, value)` pair this target sent to the sink, in order.
    pub published: Vec<(String, String)>,
    pub duration: Duration,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstanceResult {
    pub instance_id: String,
    pub template_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub targets: Vec<TargetResult>,
    pub schema_changed: bool,
}

impl TargetResult {
    pub fn success(key_suffix: String, published: Vec<(String, String)>, duration: Duration) -> Self {
        Self {
            key_suffix,
            status: TargetStatus::Success,
            error: None,
            published,
            duration,
        }
    }

    pub fn failed(
        key_suffix: String,
        error: &ExecutionError,
        published: Vec<(String, String)>,
        duration: Duration,
    ) -> Self {
        Self {
            key_suffix,
            status: TargetStatus::Failed,
            error: Some(error.to_string()),
            published,
            duration,
        }
    }

    pub fn is_successful(&self) -> bool {
        self.status == TargetStatus::Success
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.published
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl InstanceResult {
    pub fn new(instance_id: String, template_id: String) -> Self {
        Self {
            instance_id,
            template_id,
            start_time: Utc::now(),
            end_time: None,
            targets: Vec::new(),
            schema_changed: false,
        }
    }

    pub fn add_target_result(&mut self, result: TargetResult) {
        self.targets.push(result);
    }

    pub fn mark_completed(&mut self) {
        self.end_time = Some(Utc::now());
    }

    pub fn successful_targets(&self) -> usize {
        self.targets.iter().filter(|t| t.is_successful()).count()
    }

    pub fn failed_targets(&self) -> usize {
        self.targets.len() - self.successful_targets()
    }

    /// Value published under `key` by any target of this execution.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.targets.iter().find_map(|t| t.value(key))
    }
}

impl std::fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetStatus::Success => write!(f, "success"),
            TargetStatus::Failed => write!(f, "failed"),
        }
    }
}
