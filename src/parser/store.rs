// ABOUTME: In-memory template library loaded from a directory of JSON files
// ABOUTME: Each load replaces the whole set; unreadable or malformed files are skipped

use indexmap::IndexMap;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::error::{ParserError, Result};
use super::template::Template;

/// Outcome of one directory load.
#[derive(Debug, Default, Clone)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub skipped: Vec<(PathBuf, String)>,
}

impl LoadReport {
    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

#[derive(Debug, Default)]
pub struct TemplateStore {
    templates: RwLock<IndexMap<String, Arc<Template>>>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.json` file in `dir`, replacing the current set.
    ///
    /// A missing directory is created and yields an empty set.
    pub fn load_dir<P: AsRef<Path>>(&self, dir: P) -> Result<LoadReport> {
        let dir = dir.as_ref();
        if !dir.exists() {
            std::fs::create_dir_all(dir).map_err(ParserError::IoError)?;
            info!("Created template directory: {}", dir.display());
            self.replace(IndexMap::new());
            return Ok(LoadReport::default());
        }

        let mut report = LoadReport::default();
        let mut templates = IndexMap::new();

        let entries = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
            });

        for entry in entries {
            let path = entry.path();
            match Template::from_file(path) {
                Ok(template) => {
                    if templates.contains_key(&template.id) {
                        warn!(
                            "Duplicate template id '{}' in {}, keeping the first definition",
                            template.id,
                            path.display()
                        );
                        report
                            .skipped
                            .push((path.to_path_buf(), format!("duplicate id '{}'", template.id)));
                        continue;
                    }
                    debug!("Loaded template '{}' from {}", template.id, path.display());
                    report.loaded.push(template.id.clone());
                    templates.insert(template.id.clone(), Arc::new(template));
                }
                Err(e) => {
                    warn!("Failed to load template {}: {}", path.display(), e);
                    report.skipped.push((path.to_path_buf(), e.to_string()));
                }
            }
        }

        info!(
            "Loaded {} templates from {} ({} skipped)",
            report.loaded_count(),
            dir.display(),
            report.skipped_count()
        );

        self.replace(templates);
        Ok(report)
    }

    /// Replace the whole template set.
    pub fn replace(&self, templates: IndexMap<String, Arc<Template>>) {
        *self.templates.write() = templates;
    }

    pub fn get(&self, id: &str) -> Option<Arc<Template>> {
        self.templates.read().get(id).cloned()
    }

    pub fn all(&self) -> Vec<Arc<Template>> {
        self.templates.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.templates.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.read().is_empty()
    }
}
