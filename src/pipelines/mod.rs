// ABOUTME: Execution pipelines, one per template execution type
// ABOUTME: Contains the api_json, api_text and chain implementations and their registry

pub mod api_json;
pub mod api_text;
pub mod chain;

use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::HashMap;

use crate::engine::context::TargetContext;
use crate::engine::error::{ExecutionError, Result};
use crate::engine::http::{decode_body, HttpRequest};
use crate::parser::{ExecutionType, RequestMethod, ResponseEncoding, Template};
use crate::processor::resolve_template;

/// What a pipeline left behind for output generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutput {
    /// Body to publish verbatim under the target's root key.
    Raw(String),
    /// The target's variables are populated; render the declared outputs.
    Variables,
}

#[async_trait]
pub trait PipelineImplementation: Send + Sync {
    async fn run(&self, target: &mut TargetContext<'_>) -> Result<PipelineOutput>;

    fn execution_type(&self) -> ExecutionType;

    /// Structural checks beyond what parsing enforces.
    fn validate(&self, template: &Template) -> Result<()>;
}

pub struct PipelineRegistry {
    implementations: HashMap<ExecutionType, Box<dyn PipelineImplementation>>,
}

impl PipelineRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            implementations: HashMap::new(),
        };

        registry.register(Box::new(api_json::ApiJsonPipeline));
        registry.register(Box::new(api_text::ApiTextPipeline));
        registry.register(Box::new(chain::ChainPipeline));

        registry
    }

    pub fn register(&mut self, implementation: Box<dyn PipelineImplementation>) {
        self.implementations
            .insert(implementation.execution_type(), implementation);
    }

    pub fn get_implementation(
        &self,
        execution_type: ExecutionType,
    ) -> Option<&dyn PipelineImplementation> {
        self.implementations
            .get(&execution_type)
            .map(|imp| imp.as_ref())
    }

    pub fn validate(&self, template: &Template) -> Result<()> {
        match self.get_implementation(template.execution.execution_type) {
            Some(implementation) => implementation.validate(template),
            None => Err(ExecutionError::PipelineNotSupported {
                execution_type: template.execution.execution_type,
            }),
        }
    }

    pub async fn run(&self, target: &mut TargetContext<'_>) -> Result<PipelineOutput> {
        let execution_type = target.template.execution.execution_type;
        match self.get_implementation(execution_type) {
            Some(implementation) => implementation.run(target).await,
            None => Err(ExecutionError::PipelineNotSupported { execution_type }),
        }
    }
}

impl Default for PipelineRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Request parts as written in the template, before placeholder resolution.
pub(crate) struct RequestParts<'t> {
    pub method: RequestMethod,
    pub url: &'t str,
    pub body: &'t str,
    pub headers: &'t IndexMap<String, String>,
    pub encoding: ResponseEncoding,
}

/// Resolve url and body against the target's variables, send, and decode the body.
pub(crate) async fn fetch_resolved(
    target: &TargetContext<'_>,
    parts: RequestParts<'_>,
) -> Result<String> {
    let url = resolve_template(parts.url, &target.variables);
    let body = resolve_template(parts.body, &target.variables);

    let bytes = target
        .http
        .fetch(HttpRequest {
            method: parts.method,
            url: &url,
            body: &body,
            headers: parts.headers,
        })
        .await?;

    Ok(decode_body(&bytes, parts.encoding))
}

pub(crate) fn require_url(template: &Template) -> Result<()> {
    if template.execution.url.trim().is_empty() {
        return Err(ExecutionError::ParserError(
            crate::parser::ParserError::MissingField("Execution.Url".to_string()),
        ));
    }
    Ok(())
}
