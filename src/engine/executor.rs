// ABOUTME: Execution engine running one instance across its targets
// ABOUTME: Drives the pipeline per target, publishes outputs and keeps descriptor labels current

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use super::cache::StepCache;
use super::context::{merge_inputs, TargetContext};
use super::error::Result;
use super::http::{default_user_agent, HttpRequester, DEFAULT_TIMEOUT};
use super::result::{InstanceResult, TargetResult};
use crate::output::{MetricSink, SchemaNotifier};
use crate::parser::Template;
use crate::pipelines::{PipelineOutput, PipelineRegistry};
use crate::processor::{apply_transforms, resolve_template};
use crate::settings::{descriptor_key, ConfigStore, InstanceConfig};

/// Published for every output of a target whose pipeline failed.
pub const ERROR_VALUE: &str = "Err";
/// Published when an output renders to the empty string.
pub const EMPTY_VALUE: &str = "[Empty]";
pub const DEFAULT_TARGET_DELAY: Duration = Duration::from_millis(500);

/// Rendered labels for one descriptor, applied after all targets ran.
#[derive(Debug, Clone)]
struct LabelUpdate {
    descriptor_key: String,
    label: String,
    short_label: String,
}

pub struct ExecutionEngine {
    http: HttpRequester,
    cache: StepCache,
    pipelines: PipelineRegistry,
    sink: Arc<dyn MetricSink>,
    config_store: Arc<dyn ConfigStore>,
    notifier: SchemaNotifier,
    target_delay: Duration,
}

pub struct ExecutionEngineBuilder {
    sink: Arc<dyn MetricSink>,
    config_store: Arc<dyn ConfigStore>,
    notifier: SchemaNotifier,
    timeout: Duration,
    user_agent: String,
    target_delay: Duration,
}

impl ExecutionEngineBuilder {
    pub fn notifier(mut self, notifier: SchemaNotifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Pause before every target after the first.
    pub fn target_delay(mut self, delay: Duration) -> Self {
        self.target_delay = delay;
        self
    }

    pub fn build(self) -> Result<ExecutionEngine> {
        Ok(ExecutionEngine {
            http: HttpRequester::new(self.timeout, &self.user_agent)?,
            cache: StepCache::new(),
            pipelines: PipelineRegistry::new(),
            sink: self.sink,
            config_store: self.config_store,
            notifier: self.notifier,
            target_delay: self.target_delay,
        })
    }
}

impl ExecutionEngine {
    /// Engine with default HTTP settings and target delay.
    pub fn new(sink: Arc<dyn MetricSink>, config_store: Arc<dyn ConfigStore>) -> Result<Self> {
        Self::builder(sink, config_store).build()
    }

    pub fn builder(
        sink: Arc<dyn MetricSink>,
        config_store: Arc<dyn ConfigStore>,
    ) -> ExecutionEngineBuilder {
        ExecutionEngineBuilder {
            sink,
            config_store,
            notifier: SchemaNotifier::new(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: default_user_agent(),
            target_delay: DEFAULT_TARGET_DELAY,
        }
    }

    pub fn notifier(&self) -> &SchemaNotifier {
        &self.notifier
    }

    pub fn sink(&self) -> &Arc<dyn MetricSink> {
        &self.sink
    }

    pub fn config_store(&self) -> &Arc<dyn ConfigStore> {
        &self.config_store
    }

    pub fn cache(&self) -> &StepCache {
        &self.cache
    }

    /// Drop cached step values for one instance, or for everything when `None`.
    pub fn clear_cache(&self, instance_id: Option<&str>) {
        match instance_id {
            Some(id) => {
                let removed = self.cache.clear_instance(id);
                debug!("Cleared {} cache entries of instance {}", removed, id);
            }
            None => {
                self.cache.clear();
                debug!("Cleared step cache");
            }
        }
    }

    /// Run every target of `instance` in order. Failures are absorbed per target:
    /// the failing target publishes [`ERROR_VALUE`] for each output and the
    /// remaining targets still run.
    #[instrument(skip(self, instance, template), fields(instance_id = %instance.id))]
    pub async fn execute_instance(
        &self,
        instance: &InstanceConfig,
        template: &Template,
    ) -> InstanceResult {
        let mut result = InstanceResult::new(instance.id.clone(), template.id.clone());
        let mut label_updates = Vec::new();

        for (index, overrides) in instance.effective_targets().iter().enumerate() {
            if index > 0 && !self.target_delay.is_zero() {
                tokio::time::sleep(self.target_delay).await;
            }

            let key_suffix = instance.key_suffix(index);
            let target_result = self
                .execute_target(instance, template, overrides, key_suffix, &mut label_updates)
                .await;
            result.add_target_result(target_result);
        }

        result.schema_changed = self.apply_label_updates(&instance.id, &label_updates);
        result.mark_completed();

        debug!(
            "Instance {} finished: {} ok, {} failed",
            instance.id,
            result.successful_targets(),
            result.failed_targets()
        );

        result
    }

    async fn execute_target(
        &self,
        instance: &InstanceConfig,
        template: &Template,
        overrides: &HashMap<String, String>,
        key_suffix: String,
        label_updates: &mut Vec<LabelUpdate>,
    ) -> TargetResult {
        let start_time = Instant::now();
        let variables = merge_inputs(template, instance, overrides);
        let mut target = TargetContext::new(
            &instance.id,
            template,
            key_suffix,
            variables,
            &self.http,
            &self.cache,
        );

        match self.pipelines.run(&mut target).await {
            Ok(PipelineOutput::Raw(body)) => {
                let key = target.raw_key();
                self.sink.inject_value(&key, &body);
                TargetResult::success(target.key_suffix, vec![(key, body)], start_time.elapsed())
            }
            Ok(PipelineOutput::Variables) => {
                apply_transforms(&template.execution.process, &mut target.variables);
                let published = self.publish_outputs(&target, label_updates);
                TargetResult::success(target.key_suffix, published, start_time.elapsed())
            }
            Err(e) => {
                error!(
                    "Target '{}{}' of template {} failed: {}",
                    instance.id, target.key_suffix, template.id, e
                );
                let published = self.publish_errors(&target);
                TargetResult::failed(target.key_suffix, &e, published, start_time.elapsed())
            }
        }
    }

    fn publish_outputs(
        &self,
        target: &TargetContext<'_>,
        label_updates: &mut Vec<LabelUpdate>,
    ) -> Vec<(String, String)> {
        let template = target.template;
        let mut published = Vec::with_capacity(template.outputs.len());

        for output in &template.outputs {
            let mut value = resolve_template(&output.format, &target.variables);
            if value.is_empty() {
                value = EMPTY_VALUE.to_string();
            }

            let key = target.metric_key(&output.key);
            self.sink.inject_value(&key, &value);

            label_updates.push(LabelUpdate {
                descriptor_key: descriptor_key(&key),
                label: resolve_template(&template.label_pattern(output), &target.variables),
                short_label: resolve_template(&output.short_label, &target.variables),
            });
            published.push((key, value));
        }

        published
    }

    fn publish_errors(&self, target: &TargetContext<'_>) -> Vec<(String, String)> {
        target
            .template
            .outputs
            .iter()
            .map(|output| {
                let key = target.metric_key(&output.key);
                self.sink.inject_value(&key, ERROR_VALUE);
                (key, ERROR_VALUE.to_string())
            })
            .collect()
    }

    /// Write changed labels of existing descriptors in one save and notify once.
    /// Descriptors are created by the scheduler's sync, never here.
    fn apply_label_updates(&self, instance_id: &str, updates: &[LabelUpdate]) -> bool {
        if updates.is_empty() {
            return false;
        }

        let outcome = self.config_store.modify(&mut |settings| {
            let mut changed = false;
            for update in updates {
                let Some(item) = settings.monitor_item_mut(&update.descriptor_key) else {
                    continue;
                };
                if item.user_label != update.label {
                    item.user_label = update.label.clone();
                    changed = true;
                }
                if item.taskbar_label != update.short_label {
                    item.taskbar_label = update.short_label.clone();
                    changed = true;
                }
            }
            changed
        });

        match outcome {
            Ok(true) => {
                info!("Labels of instance {} changed", instance_id);
                self.notifier.notify(instance_id);
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!("Failed to persist labels of instance {}: {}", instance_id, e);
                false
            }
        }
    }
}
