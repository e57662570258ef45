use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use chrono_tz::Tz;
use serde::Deserialize;
use toml::Spanned;

use crate::config::FieldMerger;
use crate::config::SourceInfo;
use crate::config::ValidationError;

const DEFAULT_SCAN_INTERVAL_SECS: u64 = 30;
const DEFAULT_CONSUMPTION_REFRESH_MINS: u64 = 5;

/// Which backend the integration talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    /// In-memory simulated heat pump
    Demo,
}

/// Validated configuration for the Aquarea integration
#[derive(Clone)]
pub struct AquareaConfig {
    pub username: String,
    pub password: String,
    pub environment: Environment,
    pub scan_interval: Duration,
    pub consumption_refresh_interval: Duration,
    pub timezone: Tz,
}

impl fmt::Debug for AquareaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AquareaConfig")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("environment", &self.environment)
            .field("scan_interval", &self.scan_interval)
            .field("consumption_refresh_interval", &self.consumption_refresh_interval)
            .field("timezone", &self.timezone)
            .finish()
    }
}

/// `[integrations.aquarea]` as read from a single file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialAquareaConfig {
    pub username: Option<Spanned<String>>,
    pub password: Option<Spanned<String>>,
    pub environment: Option<Spanned<Environment>>,
    pub scan_interval_secs: Option<Spanned<u64>>,
    pub consumption_refresh_mins: Option<Spanned<u64>>,
    pub timezone: Option<Spanned<String>>,
}

impl PartialAquareaConfig {
    /// Fold `other` into `self`, first definition wins
    pub(crate) fn merge_from(
        &mut self,
        other: PartialAquareaConfig,
        merger: &mut FieldMerger,
        source: &SourceInfo,
    ) {
        merger.merge(
            "integrations.aquarea.username",
            &mut self.username,
            other.username,
            source,
        );
        merger.merge(
            "integrations.aquarea.password",
            &mut self.password,
            other.password,
            source,
        );
        merger.merge(
            "integrations.aquarea.environment",
            &mut self.environment,
            other.environment,
            source,
        );
        merger.merge(
            "integrations.aquarea.scan_interval_secs",
            &mut self.scan_interval_secs,
            other.scan_interval_secs,
            source,
        );
        merger.merge(
            "integrations.aquarea.consumption_refresh_mins",
            &mut self.consumption_refresh_mins,
            other.consumption_refresh_mins,
            source,
        );
        merger.merge(
            "integrations.aquarea.timezone",
            &mut self.timezone,
            other.timezone,
            source,
        );
    }

    /// Check every field, reporting all problems at once
    pub(crate) fn validate(
        self,
        sources: &HashMap<String, SourceInfo>,
    ) -> Result<AquareaConfig, Vec<ValidationError>> {
        let mut errors = Vec::new();

        let mut error = |field: &str, message: String, span: Option<std::ops::Range<usize>>| {
            let field_path = format!("integrations.aquarea.{}", field);
            let source = span.as_ref().and_then(|_| sources.get(&field_path).cloned());
            errors.push(ValidationError {
                field_path,
                message,
                span,
                source,
            });
        };

        let username = required(self.username, "username", &mut error);
        let password = required(self.password, "password", &mut error);

        let scan_interval_secs = match self.scan_interval_secs {
            Some(v) if *v.get_ref() == 0 => {
                error(
                    "scan_interval_secs",
                    "must be greater than zero".to_string(),
                    Some(v.span()),
                );
                DEFAULT_SCAN_INTERVAL_SECS
            }
            Some(v) => v.into_inner(),
            None => DEFAULT_SCAN_INTERVAL_SECS,
        };

        let consumption_refresh_mins = self
            .consumption_refresh_mins
            .map(Spanned::into_inner)
            .unwrap_or(DEFAULT_CONSUMPTION_REFRESH_MINS);

        let timezone = match self.timezone {
            Some(tz) => match tz.get_ref().parse::<Tz>() {
                Ok(parsed) => parsed,
                Err(_) => {
                    error(
                        "timezone",
                        format!("unknown timezone '{}'", tz.get_ref()),
                        Some(tz.span()),
                    );
                    Tz::UTC
                }
            },
            None => Tz::UTC,
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(AquareaConfig {
            username,
            password,
            environment: self.environment.map(Spanned::into_inner).unwrap_or_default(),
            scan_interval: Duration::from_secs(scan_interval_secs),
            consumption_refresh_interval: Duration::from_secs(consumption_refresh_mins * 60),
            timezone,
        })
    }
}

fn required(
    value: Option<Spanned<String>>,
    field: &str,
    error: &mut impl FnMut(&str, String, Option<std::ops::Range<usize>>),
) -> String {
    match value {
        Some(v) if v.get_ref().trim().is_empty() => {
            error(field, format!("{} must not be empty", field), Some(v.span()));
            String::new()
        }
        Some(v) => v.into_inner(),
        None => {
            error(field, format!("{} is required", field), None);
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> PartialAquareaConfig {
        toml::from_str(content).unwrap()
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = parse("username = \"me\"\npassword = \"hunter2\"\n")
            .validate(&HashMap::new())
            .unwrap();

        let debug = format!("{:?}", config);
        assert!(debug.contains("me"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_zero_scan_interval_is_rejected() {
        let errors = parse("username = \"me\"\npassword = \"pw\"\nscan_interval_secs = 0\n")
            .validate(&HashMap::new())
            .unwrap_err();

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field_path, "integrations.aquarea.scan_interval_secs");
        assert!(errors[0].span.is_some());
    }

    #[test]
    fn test_empty_username_is_rejected() {
        let errors = parse("username = \"  \"\npassword = \"pw\"\n")
            .validate(&HashMap::new())
            .unwrap_err();

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "username must not be empty");
    }
}
