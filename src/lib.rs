// ABOUTME: Main library module for the metricfeed collector
// ABOUTME: Exports all core modules and provides the public API

pub mod cli;
pub mod engine;
pub mod output;
pub mod parser;
pub mod pipelines;
pub mod processor;
pub mod settings;

// Re-export commonly used types
pub use cli::{App, Args, Config};
pub use engine::{ExecutionEngine, InstanceResult, InstanceScheduler, StepCache};
pub use output::{MetricRegistry, MetricSink, SchemaNotifier};
pub use parser::{Template, TemplateStore};
pub use settings::{ConfigStore, FileConfigStore, MemoryConfigStore, Settings};

// Error handling
pub type Result<T> = anyhow::Result<T>;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
