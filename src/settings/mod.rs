// ABOUTME: Settings module holding configured instances and metric descriptors
// ABOUTME: Exports the settings model and the ConfigStore persistence contract

pub mod error;
pub mod model;
pub mod store;

pub use error::{Result, SettingsError};
pub use model::{
    descriptor_key, metric_key, InstanceConfig, MonitorItemConfig, Settings, DESCRIPTOR_PREFIX,
};
pub use store::{ConfigStore, FileConfigStore, MemoryConfigStore};
