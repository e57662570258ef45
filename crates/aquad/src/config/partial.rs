use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use super::diagnostics::{
    Diagnostic, Error, LoadError, MergeConflictLocation, MergeError, SourceInfo, Warning,
};
use super::LogLevel;
use crate::integrations::aquarea::PartialAquareaConfig;

#[derive(Debug, Default, Deserialize)]
pub struct PartialConfig {
    #[serde(default)]
    pub imports: Vec<String>,

    pub logging: Option<PartialLoggingConfig>,
    pub api: Option<PartialApiConfig>,
    pub integrations: Option<PartialIntegrationsConfig>,

    /// Source information for error reporting (not serialized)
    #[serde(skip)]
    pub source: Option<SourceInfo>,

    /// File that defined each merged field, keyed by field path (filled in by `merge`)
    #[serde(skip)]
    pub field_sources: HashMap<String, SourceInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialLoggingConfig {
    pub level: Option<toml::Spanned<LogLevel>>,
    pub overrides: Option<HashMap<String, toml::Spanned<LogLevel>>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialApiConfig {
    pub listen: Option<toml::Spanned<String>>,
    pub port: Option<toml::Spanned<u16>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialIntegrationsConfig {
    pub aquarea: Option<PartialAquareaConfig>,
}

/// First-wins bookkeeping for merging fields across config files.
///
/// Remembers where each field was first defined; any later definition is
/// recorded as a conflict and the first value is kept.
#[derive(Debug, Default)]
pub struct FieldMerger {
    locations: HashMap<String, MergeConflictLocation>,
    diagnostics: Vec<Diagnostic>,
}

impl FieldMerger {
    pub fn merge<T>(
        &mut self,
        field_path: &str,
        target: &mut Option<toml::Spanned<T>>,
        incoming: Option<toml::Spanned<T>>,
        source: &SourceInfo,
    ) {
        let Some(value) = incoming else {
            return;
        };

        let location = MergeConflictLocation {
            file_path: source.file_path.clone(),
            span: value.span(),
            content: source.content.clone(),
        };

        if let Some(prev) = self.locations.get(field_path) {
            self.diagnostics.push(Diagnostic::Error(Error::Merge(MergeError {
                field_path: field_path.to_string(),
                message: format!("'{}' defined in multiple config files", field_path),
                conflicts: vec![prev.clone(), location],
            })));
        } else {
            *target = Some(value);
            self.locations.insert(field_path.to_string(), location);
        }
    }

    /// Split into the winning location of every field and the collected conflicts
    fn into_parts(self) -> (HashMap<String, SourceInfo>, Vec<Diagnostic>) {
        let sources = self
            .locations
            .into_iter()
            .map(|(field_path, location)| {
                (
                    field_path,
                    SourceInfo {
                        file_path: location.file_path,
                        content: location.content,
                    },
                )
            })
            .collect();
        (sources, self.diagnostics)
    }
}

impl PartialConfig {
    /// Load a single config file without processing imports
    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| LoadError::Io {
            path: path.to_path_buf(),
            error: e,
        })?;

        let mut config: PartialConfig = toml::from_str(&content).map_err(|e| LoadError::Parse {
            path: path.to_path_buf(),
            error: e,
        })?;

        config.source = Some(SourceInfo {
            file_path: path.to_path_buf(),
            content,
        });

        Ok(config)
    }

    /// Load config files with import resolution
    ///
    /// Each config file is loaded, then its imports are recursively processed.
    /// Cycle detection prevents infinite loops.
    ///
    /// Returns a Vec of all loaded configs in order (imports first, then parent)
    pub fn load_with_imports(paths: &[PathBuf]) -> Result<Vec<Self>, LoadError> {
        let mut visited = HashSet::new();
        let mut all_configs = Vec::new();

        for path in paths {
            Self::load_recursive(path, &mut visited, &mut all_configs)?;
        }

        Ok(all_configs)
    }

    /// Recursively load a config file and its imports
    fn load_recursive(
        path: &Path,
        visited: &mut HashSet<PathBuf>,
        configs: &mut Vec<Self>,
    ) -> Result<(), LoadError> {
        // Canonicalize the path to detect cycles reliably
        let canonical_path = path
            .canonicalize()
            .unwrap_or_else(|_| path.to_path_buf());

        if visited.contains(&canonical_path) {
            return Err(LoadError::ImportCycle {
                path: canonical_path.clone(),
                cycle: visited.iter().cloned().collect(),
            });
        }

        visited.insert(canonical_path.clone());

        let config = Self::from_file(path)?;

        // Process imports first (depth-first)
        for import_path in &config.imports {
            let import_path_buf = PathBuf::from(import_path);

            // Resolve relative imports from the parent file's directory
            let resolved_path = if import_path_buf.is_absolute() {
                import_path_buf
            } else {
                let parent_dir = path.parent().unwrap_or_else(|| Path::new("."));
                parent_dir.join(import_path_buf)
            };

            Self::load_recursive(&resolved_path, visited, configs)?;
        }

        configs.push(config);

        // Remove from visited set to allow imports from sibling branches
        visited.remove(&canonical_path);

        Ok(())
    }

    /// Merge multiple partial configs together
    ///
    /// Uses first-wins semantics: the first occurrence of a field is kept.
    /// Conflicts (same field defined in multiple configs) are collected as errors
    /// but merging continues to find all conflicts at once.
    ///
    /// Returns (merged, diagnostics) where diagnostics may contain warnings and errors
    pub fn merge<I>(configs: I) -> (Self, Vec<Diagnostic>)
    where
        I: IntoIterator<Item = Self>,
    {
        let mut result = PartialConfig::default();
        let mut warnings = Vec::new();
        let mut merger = FieldMerger::default();
        let mut imports = Vec::new();

        for config in configs {
            imports.extend(config.imports.clone());

            let source_info = config.source.clone().unwrap_or_else(|| SourceInfo {
                file_path: PathBuf::from("<unknown>"),
                content: String::new(),
            });

            let is_empty = config.logging.is_none()
                && config.api.is_none()
                && config.integrations.is_none()
                && config.imports.is_empty();

            if is_empty {
                warnings.push(Diagnostic::Warning(Warning::EmptyConfig {
                    file_path: source_info.file_path.clone(),
                }));
            }

            if let Some(logging) = config.logging {
                let result_logging = result.logging.get_or_insert_with(Default::default);
                merger.merge(
                    "logging.level",
                    &mut result_logging.level,
                    logging.level,
                    &source_info,
                );

                for (key, value) in logging.overrides.unwrap_or_default() {
                    let result_overrides =
                        result_logging.overrides.get_or_insert_with(HashMap::new);
                    let mut slot = result_overrides.remove(&key);
                    merger.merge(
                        &format!("logging.overrides.{}", key),
                        &mut slot,
                        Some(value),
                        &source_info,
                    );
                    if let Some(slot) = slot {
                        result_overrides.insert(key, slot);
                    }
                }
            }

            if let Some(api) = config.api {
                let result_api = result.api.get_or_insert_with(Default::default);
                merger.merge("api.listen", &mut result_api.listen, api.listen, &source_info);
                merger.merge("api.port", &mut result_api.port, api.port, &source_info);
            }

            if let Some(aquarea) = config.integrations.and_then(|i| i.aquarea) {
                let result_integrations = result.integrations.get_or_insert_with(Default::default);
                let result_aquarea = result_integrations
                    .aquarea
                    .get_or_insert_with(Default::default);
                result_aquarea.merge_from(aquarea, &mut merger, &source_info);
            }
        }

        let (field_sources, conflicts) = merger.into_parts();
        result.imports = imports;
        result.field_sources = field_sources;

        let mut diagnostics = warnings;
        diagnostics.extend(conflicts);
        (result, diagnostics)
    }
}
