use serde::Deserialize;
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::filter::Targets;

use super::diagnostics::{format_diagnostics, Diagnostic, Error, ValidationError};
use super::partial::{PartialApiConfig, PartialConfig};
use crate::integrations::aquarea::AquareaConfig;

const DEFAULT_API_LISTEN: &str = "127.0.0.1";
const DEFAULT_API_PORT: u16 = 8565;

#[derive(Debug, Default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub api: ApiConfig,
    pub integrations: IntegrationsConfig,
}

// LogLevel needs Deserialize because it's used in PartialLoggingConfig with toml::Spanned
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: LogLevel,

    /// Per-target levels, e.g. `"aquad::engine" = "debug"`
    pub overrides: HashMap<String, LogLevel>,
}

impl LoggingConfig {
    /// Build the tracing filter for the default level plus overrides
    pub fn targets(&self) -> Targets {
        self.overrides.iter().fold(
            Targets::new().with_default(LevelFilter::from(self.level)),
            |targets, (target, level)| targets.with_target(target.clone(), LevelFilter::from(*level)),
        )
    }
}

/// HTTP API settings
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub listen: String,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_API_LISTEN.to_string(),
            port: DEFAULT_API_PORT,
        }
    }
}

#[derive(Debug, Default)]
pub struct IntegrationsConfig {
    pub aquarea: Option<AquareaConfig>,
}

impl Config {
    /// Load configuration from multiple TOML files with import resolution
    ///
    /// It supports:
    /// - Multiple config files (e.g., base + secrets)
    /// - Import statements within config files
    /// - Conflict detection across all sources
    /// - Validation with all errors and warnings reported together
    ///
    /// Returns Ok((Config, diagnostics)) where diagnostics contains warnings.
    /// Only returns Err if there are actual errors (not just warnings).
    pub fn from_files(
        paths: &[PathBuf],
    ) -> Result<(Self, Vec<Diagnostic>), Box<dyn std::error::Error>> {
        let configs = PartialConfig::load_with_imports(paths)?;

        // Merge with first-wins semantics, collecting diagnostics
        let (partial, diagnostics) = PartialConfig::merge(configs);

        Self::from_partial(partial, diagnostics)
    }

    /// Convert a PartialConfig to a Config, validating all fields
    ///
    /// Takes diagnostics from the merge step and adds validation diagnostics.
    /// Returns Ok((Config, diagnostics)) if no errors, Err if there are errors.
    pub fn from_partial(
        partial: PartialConfig,
        mut diagnostics: Vec<Diagnostic>,
    ) -> Result<(Self, Vec<Diagnostic>), Box<dyn std::error::Error>> {
        let logging = if let Some(partial_logging) = partial.logging {
            LoggingConfig {
                level: partial_logging
                    .level
                    .map(|s| *s.get_ref())
                    .unwrap_or_default(),
                overrides: partial_logging
                    .overrides
                    .map(|hm| hm.into_iter().map(|(k, v)| (k, *v.get_ref())).collect())
                    .unwrap_or_default(),
            }
        } else {
            LoggingConfig::default()
        };

        let api = match partial.api {
            Some(partial_api) => match Self::validate_api(partial_api, &partial.field_sources) {
                Ok(api) => api,
                Err(errors) => {
                    diagnostics.extend(
                        errors
                            .into_iter()
                            .map(|e| Diagnostic::Error(Error::Validation(e))),
                    );
                    ApiConfig::default()
                }
            },
            None => ApiConfig::default(),
        };

        let aquarea = match partial.integrations.and_then(|i| i.aquarea) {
            Some(partial_aquarea) => match partial_aquarea.validate(&partial.field_sources) {
                Ok(aquarea) => Some(aquarea),
                Err(errors) => {
                    diagnostics.extend(
                        errors
                            .into_iter()
                            .map(|e| Diagnostic::Error(Error::Validation(e))),
                    );
                    None
                }
            },
            None => None,
        };

        let config = Config {
            logging,
            api,
            integrations: IntegrationsConfig { aquarea },
        };

        let has_errors = diagnostics.iter().any(|d| d.is_error());

        if has_errors {
            Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format_diagnostics(&diagnostics),
            )))
        } else {
            Ok((config, diagnostics))
        }
    }

    /// Validate the API section and fill in defaults
    fn validate_api(
        partial: PartialApiConfig,
        sources: &HashMap<String, super::diagnostics::SourceInfo>,
    ) -> Result<ApiConfig, Vec<ValidationError>> {
        let listen = match partial.listen {
            Some(listen) => {
                if listen.get_ref().parse::<IpAddr>().is_err() {
                    return Err(vec![ValidationError {
                        field_path: "api.listen".to_string(),
                        message: format!("'{}' is not an IP address", listen.get_ref()),
                        span: Some(listen.span()),
                        source: sources.get("api.listen").cloned(),
                    }]);
                }
                listen.into_inner()
            }
            None => DEFAULT_API_LISTEN.to_string(),
        };

        Ok(ApiConfig {
            listen,
            port: partial
                .port
                .map(|p| p.into_inner())
                .unwrap_or(DEFAULT_API_PORT),
        })
    }
}
