// ABOUTME: ConfigStore contract and its file-backed and in-memory implementations
// ABOUTME: All writes go through one critical section so concurrent ticks never interleave saves

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

use super::error::{Result, SettingsError};
use super::model::Settings;

/// Load/save contract for the mutable settings document.
pub trait ConfigStore: Send + Sync {
    /// Snapshot of the current settings.
    fn load(&self) -> Result<Settings>;

    /// Replace and persist the settings.
    fn save(&self, settings: &Settings) -> Result<()>;

    /// Load, mutate and save under a single lock. `apply` returns whether it changed
    /// anything; the document is persisted only in that case. Returns that flag.
    fn modify(&self, apply: &mut dyn FnMut(&mut Settings) -> bool) -> Result<bool>;
}

/// Settings persisted as a pretty-printed JSON file.
#[derive(Debug)]
pub struct FileConfigStore {
    path: PathBuf,
    settings: Mutex<Settings>,
}

impl FileConfigStore {
    /// Open `path`, starting from empty settings when the file does not exist yet.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let settings = if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|source| {
                SettingsError::IoError {
                    path: path.clone(),
                    source,
                }
            })?;
            serde_json::from_str(&content)?
        } else {
            info!("Settings file {} not found, starting empty", path.display());
            Settings::default()
        };

        Ok(Self {
            path,
            settings: Mutex::new(settings),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_file(&self, settings: &Settings) -> Result<()> {
        let io_err = |source| SettingsError::IoError {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }

        let content = serde_json::to_string_pretty(settings)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(io_err)?;
        std::fs::rename(&tmp, &self.path).map_err(io_err)?;

        debug!("Settings saved to {}", self.path.display());
        Ok(())
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Result<Settings> {
        Ok(self.settings.lock().clone())
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        let mut guard = self.settings.lock();
        self.write_file(settings)?;
        *guard = settings.clone();
        Ok(())
    }

    fn modify(&self, apply: &mut dyn FnMut(&mut Settings) -> bool) -> Result<bool> {
        let mut guard = self.settings.lock();
        let mut working = guard.clone();
        if !apply(&mut working) {
            return Ok(false);
        }
        self.write_file(&working)?;
        *guard = working;
        Ok(true)
    }
}

/// Settings kept in memory; counts saves so callers can observe persistence.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    settings: Mutex<Settings>,
    saves: AtomicUsize,
}

impl MemoryConfigStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Mutex::new(settings),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<Settings> {
        Ok(self.settings.lock().clone())
    }

    fn save(&self, settings: &Settings) -> Result<()> {
        *self.settings.lock() = settings.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn modify(&self, apply: &mut dyn FnMut(&mut Settings) -> bool) -> Result<bool> {
        let mut guard = self.settings.lock();
        let changed = apply(&mut guard);
        if changed {
            self.saves.fetch_add(1, Ordering::SeqCst);
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::model::{InstanceConfig, MonitorItemConfig};
    use tempfile::TempDir;

    #[test]
    fn test_file_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let store = FileConfigStore::open(&path).unwrap();
        assert!(store.load().unwrap().plugin_instances.is_empty());

        let mut settings = store.load().unwrap();
        settings
            .plugin_instances
            .push(InstanceConfig::new("w", "weather"));
        store.save(&settings).unwrap();

        let reopened = FileConfigStore::open(&path).unwrap();
        assert_eq!(reopened.load().unwrap(), settings);
    }

    #[test]
    fn test_modify_persists_only_on_change() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        let store = FileConfigStore::open(&path).unwrap();

        let changed = store.modify(&mut |_settings| false).unwrap();
        assert!(!changed);
        assert!(!path.exists());

        let changed = store
            .modify(&mut |settings| {
                settings
                    .monitor_items
                    .push(MonitorItemConfig::new("DASH.w.temp"));
                true
            })
            .unwrap();
        assert!(changed);
        assert!(path.exists());
        assert_eq!(store.load().unwrap().monitor_items.len(), 1);
    }

    #[test]
    fn test_memory_store_counts_saves() {
        let store = MemoryConfigStore::default();
        store.modify(&mut |_| false).unwrap();
        assert_eq!(store.save_count(), 0);

        store
            .modify(&mut |settings| {
                settings.plugin_instances.push(InstanceConfig::new("a", "t"));
                true
            })
            .unwrap();
        store.save(&store.load().unwrap()).unwrap();
        assert_eq!(store.save_count(), 2);
        assert_eq!(store.load().unwrap().plugin_instances.len(), 1);
    }

    #[test]
    fn test_concurrent_modifications_are_not_lost() {
        let store = std::sync::Arc::new(MemoryConfigStore::default());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .modify(&mut |settings| {
                            settings
                                .monitor_items
                                .push(MonitorItemConfig::new(format!("DASH.i{i}.v")));
                            true
                        })
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.load().unwrap().monitor_items.len(), 8);
    }
}
