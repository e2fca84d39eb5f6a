// ABOUTME: Single-request pipeline that publishes the response body verbatim
// ABOUTME: No parsing, no extraction and no declared outputs

use async_trait::async_trait;

use super::{fetch_resolved, require_url, PipelineImplementation, PipelineOutput, RequestParts};
use crate::engine::context::TargetContext;
use crate::engine::error::Result;
use crate::parser::{ExecutionType, ResponseEncoding, Template};

pub struct ApiTextPipeline;

#[async_trait]
impl PipelineImplementation for ApiTextPipeline {
    async fn run(&self, target: &mut TargetContext<'_>) -> Result<PipelineOutput> {
        let execution = &target.template.execution;
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

        Ok(PipelineOutput::Raw(body))
    }

    fn execution_type(&self) -> ExecutionType {
        ExecutionType::ApiText
    }

    fn validate(&self, template: &Template) -> Result<()> {
        require_url(template)
    }
}
