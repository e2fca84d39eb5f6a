// ABOUTME: Multi-step pipeline where each step may consume variables of earlier steps
// ABOUTME: Steps run strictly in order; a step may be served from the TTL cache

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use super::{fetch_resolved, PipelineImplementation, PipelineOutput, RequestParts};
use crate::engine::context::TargetContext;
use crate::engine::error::{ExecutionError, Result};
use crate::engine::http::unwrap_jsonp;
use crate::engine::result::StepOutcome;
use crate::parser::{ExecutionType, ParserError, ResponseFormat, Step, Template};
use crate::processor::{apply_transforms, extract_json_value, Variables};

pub struct ChainPipeline;

#[async_trait]
impl PipelineImplementation for ChainPipeline {
    async fn run(&self, target: &mut TargetContext<'_>) -> Result<PipelineOutput> {
        let template = target.template;

        for step in &template.execution.steps {
            match execute_step(target, step).await {
                StepOutcome::Failed(source) => {
                    warn!("Step {} failed, aborting chain", step.id);
                    return Err(ExecutionError::StepFailed {
                        step_id: step.id.clone(),
                        source: Box::new(source),
                    });
                }
                StepOutcome::Cached => debug!("Step {} used cache", step.id),
                StepOutcome::Fetched { cached } => {
                    debug!("Step {} fetched (stored in cache: {})", step.id, cached)
                }
            }
        }

        Ok(PipelineOutput::Variables)
    }

    fn execution_type(&self) -> ExecutionType {
        ExecutionType::Chain
    }

    fn validate(&self, template: &Template) -> Result<()> {
        if template.execution.steps.is_empty() {
            return Err(ExecutionError::ParserError(ParserError::InvalidTemplate {
                template: template.id.clone(),
                reason: "chain without Steps".to_string(),
            }));
        }

        let mut seen = std::collections::HashSet::new();
        for step in &template.execution.steps {
            if !seen.insert(step.id.as_str()) {
                return Err(ExecutionError::ParserError(ParserError::InvalidTemplate {
                    template: template.id.clone(),
                    reason: format!("duplicate step Id '{}'", step.id),
                }));
            }
        }

        Ok(())
    }
}

/// Run one step against the target: serve it from cache when a fresh entry
/// exists, otherwise fetch, extract, transform and (when enabled) cache.
pub async fn execute_step(target: &mut TargetContext<'_>, step: &Step) -> StepOutcome {
    let cache_key = target.cache_key(&step.id);
    let caching = step.cache_minutes != 0;

    if caching {
        if let Some(values) = target.cache.get_fresh(&cache_key, step.cache_minutes) {
            target.variables.extend(values);
            return StepOutcome::Cached;
        }
    }

    if let Err(error) = fetch_step(target, step).await {
        return StepOutcome::Failed(error);
    }

    if caching {
        let produced: Variables = step
            .produced_variables()
            .into_iter()
            .filter_map(|name| {
                target
                    .variables
                    .get(name)
                    .map(|value| (name.to_string(), value.clone()))
            })
            .collect();
        target.cache.store(target.instance_id, &cache_key, produced);
    }

    StepOutcome::Fetched { cached: caching }
}

async fn fetch_step(target: &mut TargetContext<'_>, step: &Step) -> Result<()> {
    let raw = fetch_resolved(
        target,
        RequestParts {
            method: step.method,
            url: &step.url,
            body: &step.body,
            headers: &step.headers,
            encoding: step.encoding(),
        },
    )
    .await?;

    let format = step.format();
    if !step.extract.is_empty() && format != ResponseFormat::Other {
        let mut body = raw.trim();
        if format == ResponseFormat::Jsonp {
            body = unwrap_jsonp(body).trim();
        }

        if body.starts_with('{') || body.starts_with('[') {
            let document: JsonValue = serde_json::from_str(body)?;
            for (name, path) in &step.extract {
                target
                    .variables
                    .insert(name.clone(), extract_json_value(&document, path));
            }
        } else {
            debug!("Step {} response is not JSON, nothing extracted", step.id);
        }
    }

    apply_transforms(&step.process, &mut target.variables);
    Ok(())
}
