// ABOUTME: Instance scheduler owning one periodic timer task per enabled instance
// ABOUTME: Manages instance lifecycle and keeps metric descriptors in sync with templates

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::context::label_preview_inputs;
use super::error::Result;
use super::executor::ExecutionEngine;
use crate::parser::{LoadReport, Template, TemplateStore};
use crate::processor::resolve_template;
use crate::settings::{
    descriptor_key, metric_key, InstanceConfig, MonitorItemConfig, Settings, DESCRIPTOR_PREFIX,
};

/// Shortest allowed period between two firings of one instance.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1000);
/// Published for every computed key while its first execution is pending.
pub const LOADING_VALUE: &str = "...";

/// A descriptor as the current template and instance configuration want it.
struct DesiredDescriptor {
    key: String,
    label: String,
    short_label: String,
    unit: String,
}

pub struct InstanceScheduler {
    engine: Arc<ExecutionEngine>,
    templates: Arc<TemplateStore>,
    timers: Mutex<HashMap<String, JoinHandle<()>>>,
    min_interval: Duration,
}

impl InstanceScheduler {
    pub fn new(engine: Arc<ExecutionEngine>, templates: Arc<TemplateStore>) -> Self {
        Self {
            engine,
            templates,
            timers: Mutex::new(HashMap::new()),
            min_interval: MIN_INTERVAL,
        }
    }

    /// Override the interval floor. A zero floor is raised to one millisecond,
    /// a timer period must be non-zero.
    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval.max(Duration::from_millis(1));
        self
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn engine(&self) -> &Arc<ExecutionEngine> {
        &self.engine
    }

    pub fn templates(&self) -> &Arc<TemplateStore> {
        &self.templates
    }

    /// Load templates from `dir`, then give every template without a bound
    /// instance a default one. Running timers are left alone.
    pub fn load_templates<P: AsRef<Path>>(&self, dir: P) -> Result<LoadReport> {
        let report = self.templates.load_dir(dir)?;
        let created = self.ensure_default_instances()?;
        if created > 0 {
            info!("Created {} default instances", created);
        }
        Ok(report)
    }

    /// Create one enabled instance seeded with input defaults for each template
    /// that no instance references. Persisted once when anything was created.
    pub fn ensure_default_instances(&self) -> Result<usize> {
        let templates = self.templates.all();
        let mut created = 0;

        self.engine.config_store().modify(&mut |settings| {
            created = 0;
            for template in &templates {
                if settings
                    .plugin_instances
                    .iter()
                    .any(|inst| inst.template_id == template.id)
                {
                    continue;
                }

                let id = if settings.instance(&template.id).is_some() {
                    short_id()
                } else {
                    template.id.clone()
                };

                debug!("Creating default instance {} for template {}", id, template.id);
                let mut instance = InstanceConfig::new(id, template.id.clone());
                instance.input_values = template.default_inputs();
                settings.plugin_instances.push(instance);
                created += 1;
            }
            created > 0
        })?;

        Ok(created)
    }

    /// Stop everything, then schedule every enabled instance with a known template.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime; timers are spawned on it.
    pub fn start(&self) -> usize {
        self.stop();
        self.schedule_enabled()
    }

    /// Like [`start`](Self::start), but also drops all cached step values so
    /// edited parameters take effect on the next firing.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime; timers are spawned on it.
    pub fn reload(&self) -> usize {
        self.stop();
        self.engine.clear_cache(None);
        self.schedule_enabled()
    }

    fn schedule_enabled(&self) -> usize {
        let settings = match self.engine.config_store().load() {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to load settings, no instances scheduled: {}", e);
                return 0;
            }
        };

        let mut scheduled = 0;
        for instance in &settings.plugin_instances {
            if self.sync_and_schedule(instance) {
                scheduled += 1;
            }
        }

        info!("Scheduled {} instances", scheduled);
        scheduled
    }

    /// Stop one instance's timer and schedule it again from current settings.
    /// Returns whether it is running afterwards.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime; timers are spawned on it.
    pub fn restart_instance(&self, instance_id: &str) -> bool {
        self.cancel_timer(instance_id);

        let settings = match self.engine.config_store().load() {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to load settings for instance {}: {}", instance_id, e);
                return false;
            }
        };

        match settings.instance(instance_id) {
            Some(instance) => self.sync_and_schedule(instance),
            None => {
                debug!("Instance {} not found, not restarting", instance_id);
                false
            }
        }
    }

    /// Stop the instance's timer and delete every descriptor in its namespace.
    /// Returns how many descriptors were deleted.
    pub fn remove_instance(&self, instance_id: &str) -> usize {
        self.cancel_timer(instance_id);
        self.engine.clear_cache(Some(instance_id));

        let mut removed = 0;
        let outcome = self.engine.config_store().modify(&mut |settings| {
            removed = settings.remove_instance_items(instance_id);
            removed > 0
        });

        match outcome {
            Ok(_) => {
                info!("Removed instance {} ({} descriptors)", instance_id, removed);
                removed
            }
            Err(e) => {
                warn!("Failed to remove descriptors of {}: {}", instance_id, e);
                0
            }
        }
    }

    /// Cancel every timer. Executions already in flight run to completion.
    pub fn stop(&self) {
        let mut timers = self.timers.lock();
        for (instance_id, handle) in timers.drain() {
            debug!("Stopping timer of {}", instance_id);
            handle.abort();
        }
    }

    pub fn running_instances(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.timers.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_running(&self, instance_id: &str) -> bool {
        self.timers.lock().contains_key(instance_id)
    }

    fn sync_and_schedule(&self, instance: &InstanceConfig) -> bool {
        if !instance.enabled {
            return false;
        }

        let Some(template) = self.templates.get(&instance.template_id) else {
            debug!(
                "Instance {} references unknown template {}, skipping",
                instance.id, instance.template_id
            );
            return false;
        };

        self.sync_monitor_item(instance);
        self.schedule(instance.clone(), template);
        true
    }

    /// Spawn the timer task: the first tick fires immediately, then every period.
    /// Each tick runs in its own task, so a slow execution may overlap the next.
    fn schedule(&self, instance: InstanceConfig, template: Arc<Template>) {
        let period = instance.effective_interval(template.interval(), self.min_interval);
        let engine = Arc::clone(&self.engine);
        let instance_id = instance.id.clone();

        debug!("Scheduling {} every {:?}", instance_id, period);

        let instance = Arc::new(instance);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let engine = Arc::clone(&engine);
                let instance = Arc::clone(&instance);
                let template = Arc::clone(&template);
                tokio::spawn(async move {
                    engine.execute_instance(&instance, &template).await;
                });
            }
        });

        if let Some(previous) = self.timers.lock().insert(instance_id, handle) {
            previous.abort();
        }
    }

    fn cancel_timer(&self, instance_id: &str) {
        if let Some(handle) = self.timers.lock().remove(instance_id) {
            handle.abort();
        }
    }

    /// Bring the instance's descriptors in line with its template and targets:
    /// create missing ones, refresh label, short label and unit, delete those
    /// left over from removed targets. Every computed key shows
    /// [`LOADING_VALUE`] until the next execution publishes. Returns whether
    /// the settings changed; they are saved once at most.
    pub fn sync_monitor_item(&self, instance: &InstanceConfig) -> bool {
        let Some(template) = self.templates.get(&instance.template_id) else {
            return false;
        };

        let desired = self.desired_descriptors(instance, &template);
        let valid: HashSet<&str> = desired.iter().map(|d| d.key.as_str()).collect();
        let namespace = format!("{}{}.", DESCRIPTOR_PREFIX, instance.id);

        let outcome = self.engine.config_store().modify(&mut |settings| {
            let mut changed = apply_descriptors(settings, &desired);

            let before = settings.monitor_items.len();
            settings
                .monitor_items
                .retain(|item| !item.key.starts_with(&namespace) || valid.contains(item.key.as_str()));
            changed |= settings.monitor_items.len() != before;

            changed
        });

        match outcome {
            Ok(true) => {
                debug!("Descriptors of {} updated", instance.id);
                self.engine.notifier().notify(&instance.id);
                true
            }
            Ok(false) => false,
            Err(e) => {
                warn!("Failed to save descriptors of {}: {}", instance.id, e);
                false
            }
        }
    }

    fn desired_descriptors(
        &self,
        instance: &InstanceConfig,
        template: &Template,
    ) -> Vec<DesiredDescriptor> {
        let sink = self.engine.sink();
        let mut desired = Vec::new();

        for (index, overrides) in instance.effective_targets().iter().enumerate() {
            let preview = label_preview_inputs(template, instance, overrides);
            let suffix = instance.key_suffix(index);

            for output in &template.outputs {
                let key = metric_key(&instance.id, &suffix, &output.key);
                sink.inject_value(&key, LOADING_VALUE);

                desired.push(DesiredDescriptor {
                    key: descriptor_key(&key),
                    label: resolve_template(&template.label_pattern(output), &preview),
                    short_label: resolve_template(&output.short_label, &preview),
                    unit: output.unit.clone(),
                });
            }
        }

        desired
    }
}

impl Drop for InstanceScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn apply_descriptors(settings: &mut Settings, desired: &[DesiredDescriptor]) -> bool {
    let mut changed = false;

    for descriptor in desired {
        match settings.monitor_item_mut(&descriptor.key) {
            Some(item) => {
                if item.user_label != descriptor.label {
                    item.user_label = descriptor.label.clone();
                    changed = true;
                }
                if item.taskbar_label != descriptor.short_label {
                    item.taskbar_label = descriptor.short_label.clone();
                    changed = true;
                }
                if item.unit_panel != descriptor.unit {
                    item.unit_panel = descriptor.unit.clone();
                    changed = true;
                }
            }
            None => {
                let mut item = MonitorItemConfig::new(descriptor.key.clone());
                item.user_label = descriptor.label.clone();
                item.taskbar_label = descriptor.short_label.clone();
                item.unit_panel = descriptor.unit.clone();
                settings.monitor_items.push(item);
                changed = true;
            }
        }
    }

    changed
}

/// Eight hex characters from a random UUID.
fn short_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}
