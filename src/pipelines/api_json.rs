// ABOUTME: Single-request pipeline that parses the body as JSON and runs Extract
// ABOUTME: A body that is not valid JSON fails the target

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tracing::debug;

use super::{fetch_resolved, require_url, PipelineImplementation, PipelineOutput, RequestParts};
use crate::engine::context::TargetContext;
use crate::engine::error::Result;
use crate::parser::{ExecutionType, ResponseEncoding, Template};
use crate::processor::extract_json_value;

pub struct ApiJsonPipeline;

#[async_trait]
impl PipelineImplementation for ApiJsonPipeline {
    async fn run(&self, target: &mut TargetContext<'_>) -> Result<PipelineOutput> {
        let template = target.template;
        let execution = &template.execution;

        let body = fetch_resolved(
            target,
            RequestParts {
                method: execution.method,
                url: &execution.url,
                body: &execution.body,
                headers: &execution.headers,
                encoding: ResponseEncoding::Utf8,
            },
        )
        .await?;

        let document: JsonValue = serde_json::from_str(body.trim())?;

        for (name, path) in &execution.extract {
            let value = extract_json_value(&document, path);
            debug!("Extracted {} = {}", name, value);
            target.variables.insert(name.clone(), value);
        }

        Ok(PipelineOutput::Variables)
    }

    fn execution_type(&self) -> ExecutionType {
        ExecutionType::ApiJson
    }

    fn validate(&self, template: &Template) -> Result<()> {
        require_url(template)
    }
}
