// ABOUTME: Output module for publishing metric values and schema changes
// ABOUTME: Exports the MetricSink contract, the registry, notifications and snapshot formatters

pub mod error;
pub mod events;
pub mod formatter;
pub mod sink;

pub use error::{OutputError, Result};
pub use events::{SchemaChanged, SchemaNotifier};
pub use formatter::{formatter_for, JsonFormatter, SnapshotFormatter, TextFormatter, YamlFormatter};
pub use sink::{MetricRegistry, MetricSink};
