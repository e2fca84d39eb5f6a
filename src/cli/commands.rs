// ABOUTME: Command implementations for the metricfeed CLI
// ABOUTME: Handles execution of run, once, validate and templates commands

use anyhow::{Context, Result};
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use super::config::Config;
use crate::engine::{ExecutionEngine, InstanceScheduler};
use crate::output::{formatter_for, MetricRegistry};
use crate::parser::TemplateStore;
use crate::pipelines::PipelineRegistry;
use crate::settings::{ConfigStore, FileConfigStore};

/// The wired-up runtime shared by `run` and `once`.
pub struct Services {
    pub registry: Arc<MetricRegistry>,
    pub scheduler: InstanceScheduler,
}

/// Build the engine and scheduler on top of a settings file.
pub fn build_services(config: &Config, settings_path: &Path) -> Result<Services> {
    let registry = Arc::new(MetricRegistry::new());
    let store = Arc::new(
        FileConfigStore::open(settings_path)
            .with_context(|| format!("Failed to open settings {}", settings_path.display()))?,
    );

    let engine = ExecutionEngine::builder(registry.clone(), store)
        .timeout(config.http.timeout())
        .user_agent(config.http.user_agent.clone())
        .target_delay(config.scheduler.target_delay())
        .build()
        .context("Failed to create execution engine")?;

    let scheduler = InstanceScheduler::new(Arc::new(engine), Arc::new(TemplateStore::new()))
        .with_min_interval(config.scheduler.min_interval());

    Ok(Services {
        registry,
        scheduler,
    })
}

/// Keep every enabled instance running until Ctrl-C
pub async fn run(
    templates: Option<PathBuf>,
    settings: Option<PathBuf>,
    config: &Config,
) -> Result<()> {
    let templates_dir = templates.unwrap_or_else(|| config.templates_dir.clone());
    let settings_path = settings.unwrap_or_else(|| config.settings_path.clone());

    let services = build_services(config, &settings_path)?;
    let report = services
        .scheduler
        .load_templates(&templates_dir)
        .with_context(|| format!("Failed to load templates from {}", templates_dir.display()))?;
    info!(
        "Loaded {} templates ({} skipped) from {}",
        report.loaded_count(),
        report.skipped_count(),
        templates_dir.display()
    );

    let mut schema_events = services.scheduler.engine().notifier().subscribe();
    let scheduled = services.scheduler.start();
    info!("{} instances running, press Ctrl-C to stop", scheduled);

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                break;
            }
            event = schema_events.recv() => match event {
                Ok(event) => info!("Schema of instance {} changed", event.instance_id),
                Err(RecvError::Lagged(missed)) => warn!("Missed {} schema change events", missed),
                Err(RecvError::Closed) => break,
            },
        }
    }

    services.scheduler.stop();
    info!("Stopped");
    Ok(())
}

/// Execute every enabled instance once and print the registry
pub async fn once(
    templates: Option<PathBuf>,
    settings: Option<PathBuf>,
    format: String,
    config: &Config,
) -> Result<()> {
    let formatter = formatter_for(&format)?;
    let templates_dir = templates.unwrap_or_else(|| config.templates_dir.clone());
    let settings_path = settings.unwrap_or_else(|| config.settings_path.clone());

    let services = build_services(config, &settings_path)?;
    let scheduler = &services.scheduler;
    scheduler
        .load_templates(&templates_dir)
        .with_context(|| format!("Failed to load templates from {}", templates_dir.display()))?;

    let settings = scheduler.engine().config_store().load()?;
    let mut runnable = Vec::new();

    for instance in settings.plugin_instances.iter().filter(|i| i.enabled) {
        let Some(template) = scheduler.templates().get(&instance.template_id) else {
            warn!(
                "Instance {} references unknown template {}",
                instance.id, instance.template_id
            );
            continue;
        };

        scheduler.sync_monitor_item(instance);
        runnable.push((instance, template));
    }

    // Instances are independent; only targets within one instance are sequential
    let results = join_all(
        runnable
            .iter()
            .map(|(instance, template)| scheduler.engine().execute_instance(instance, template)),
    )
    .await;
    let failed_targets: usize = results.iter().map(|r| r.failed_targets()).sum();

    print!("{}", formatter.format(&services.registry.snapshot())?);

    if failed_targets > 0 {
        warn!("{} targets failed", failed_targets);
    }
    Ok(())
}

/// Report loadable and skipped template files
pub async fn validate(dir: PathBuf) -> Result<()> {
    if !dir.is_dir() {
        return Err(anyhow::anyhow!(
            "Template directory not found: {}",
            dir.display()
        ));
    }

    let store = TemplateStore::new();
    let report = store.load_dir(&dir)?;
    let pipelines = PipelineRegistry::new();
    let mut problems = report.skipped_count();

    for id in &report.loaded {
        let Some(template) = store.get(id) else {
            continue;
        };
        match pipelines.validate(&template) {
            Ok(()) => println!("✓ {}", id),
            Err(e) => {
                println!("✗ {}: {}", id, e);
                problems += 1;
            }
        }
    }

    for (path, reason) in &report.skipped {
        println!("✗ {}: {}", path.display(), reason);
    }

    println!(
        "{} loaded, {} skipped",
        report.loaded_count(),
        report.skipped_count()
    );

    if problems > 0 {
        return Err(anyhow::anyhow!("{} template problems found", problems));
    }
    Ok(())
}

/// List loaded templates
pub async fn list_templates(templates: Option<PathBuf>, config: &Config) -> Result<()> {
    let templates_dir = templates.unwrap_or_else(|| config.templates_dir.clone());
    let store = TemplateStore::new();
    store.load_dir(&templates_dir)?;

    if store.is_empty() {
        println!("No templates in {}", templates_dir.display());
        return Ok(());
    }

    for template in store.all() {
        let execution = serde_json::to_value(template.execution.execution_type)?;
        println!(
            "{}  {}  {}  every {:?}  {} outputs",
            template.id,
            template.display_name(),
            execution.as_str().unwrap_or_default(),
            template.interval(),
            template.outputs.len()
        );
    }

    Ok(())
}
