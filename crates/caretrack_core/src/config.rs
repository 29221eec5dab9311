//! Engine configuration loaded from TOML.
//!
//! # Responsibility
//! - Describe the obligation rule catalogue, occurrence cap, day boundary,
//!   trigger secret and logging options.
//! - Fall back to defaults for every missing field.
//!
//! # Invariants
//! - `validate()` must pass before a config is handed to the scheduler.

use crate::model::obligation::SubjectKind;
use crate::schedule::derivation::{ObligationRule, RecurrenceRule, DEFAULT_MAX_OCCURRENCES};
use chrono::{Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const CONFIG_DIR_NAME: &str = "caretrack";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Which calendar defines "today" and the notification day bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayBoundary {
    #[default]
    Utc,
    Local,
}

impl DayBoundary {
    /// Reads the current calendar date for this boundary.
    pub fn today(self) -> NaiveDate {
        match self {
            Self::Utc => Utc::now().date_naive(),
            Self::Local => Local::now().date_naive(),
        }
    }
}

/// Logging options consumed by the CLI before it calls `init_logging`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `trace|debug|info|warn|error`; build-mode default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Absolute directory for rolling log files; logging is off when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub day_boundary: DayBoundary,
    /// Cap on derived recurring occurrences per subject and rule.
    pub max_occurrences: u32,
    /// Shared secret required by network-facing triggers. `None` disables the check.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_secret: Option<String>,
    pub logging: LoggingConfig,
    pub rules: Vec<ObligationRule>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            day_boundary: DayBoundary::Utc,
            max_occurrences: DEFAULT_MAX_OCCURRENCES,
            trigger_secret: None,
            logging: LoggingConfig::default(),
            rules: default_rules(),
        }
    }
}

/// Built-in obligation rule catalogue.
pub fn default_rules() -> Vec<ObligationRule> {
    vec![
        ObligationRule {
            obligation_type: "INITIAL_REVIEW".to_string(),
            name: "30-day initial review".to_string(),
            subject: SubjectKind::Client,
            rule: RecurrenceRule::OneTime { days: 30 },
        },
        ObligationRule {
            obligation_type: "SEMI_ANNUAL".to_string(),
            name: "Semi-annual review".to_string(),
            subject: SubjectKind::Client,
            rule: RecurrenceRule::Recurring { months: 6 },
        },
        ObligationRule {
            obligation_type: "ANNUAL".to_string(),
            name: "Annual review".to_string(),
            subject: SubjectKind::Client,
            rule: RecurrenceRule::Recurring { months: 12 },
        },
        ObligationRule {
            obligation_type: "ANNUAL_EVALUATION".to_string(),
            name: "Annual performance evaluation".to_string(),
            subject: SubjectKind::Employee,
            rule: RecurrenceRule::Recurring { months: 12 },
        },
    ]
}

/// Errors from loading, saving or validating configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "config file `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config toml: {err}"),
            Self::Serialize(err) => write!(f, "failed to serialize config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Serialize(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl EngineConfig {
    /// Loads and validates configuration from a TOML file.
    ///
    /// # Errors
    /// - Returns `Io` when the file cannot be read.
    /// - Returns `Parse` or `Invalid` when content is malformed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Writes configuration as pretty TOML, creating parent directories.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, content).map_err(io_error)
    }

    /// Checks catalogue and cap invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_occurrences == 0 {
            return Err(ConfigError::Invalid(
                "max_occurrences must be at least 1".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for rule in &self.rules {
            let obligation_type = rule.obligation_type.trim();
            if obligation_type.is_empty() {
                return Err(ConfigError::Invalid(
                    "rule obligation_type cannot be empty".to_string(),
                ));
            }
            if obligation_type.contains(':') {
                return Err(ConfigError::Invalid(format!(
                    "rule obligation_type `{obligation_type}` cannot contain `:`"
                )));
            }
            if !seen.insert((rule.subject, obligation_type.to_string())) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate rule `{obligation_type}` for subject `{}`",
                    rule.subject
                )));
            }
            let offset = match rule.rule {
                RecurrenceRule::OneTime { days } => days,
                RecurrenceRule::Recurring { months } => months,
            };
            if offset == 0 {
                return Err(ConfigError::Invalid(format!(
                    "rule `{obligation_type}` must have a non-zero offset"
                )));
            }
        }

        if let Some(secret) = self.trigger_secret.as_deref() {
            if secret.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "trigger_secret cannot be blank; omit it to disable the check".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Returns the default config file path: `~/.config/caretrack/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config)
                .join(CONFIG_DIR_NAME)
                .join(CONFIG_FILE_NAME)
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join(CONFIG_DIR_NAME)
                .join(CONFIG_FILE_NAME)
        } else {
            std::env::temp_dir()
                .join(CONFIG_DIR_NAME)
                .join(CONFIG_FILE_NAME)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, DayBoundary, EngineConfig};
    use crate::model::obligation::SubjectKind;
    use crate::schedule::derivation::RecurrenceRule;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        config.validate().expect("defaults must validate");
        assert_eq!(config.max_occurrences, 5);
        assert_eq!(config.day_boundary, DayBoundary::Utc);
        assert!(config.trigger_secret.is_none());
        assert_eq!(config.rules.len(), 4);
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config = EngineConfig::from_toml_str("").expect("empty config parses");
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn rules_table_replaces_default_catalogue() {
        let config = EngineConfig::from_toml_str(
            r#"
day_boundary = "local"
max_occurrences = 3
trigger_secret = "s3cret"

[logging]
level = "debug"

[[rules]]
obligation_type = "QUARTERLY"
name = "Quarterly care plan"
subject = "client"
rule = { kind = "recurring", months = 3 }

[[rules]]
obligation_type = "ORIENTATION"
name = "Orientation"
subject = "employee"
rule = { kind = "one_time", days = 14 }
"#,
        )
        .expect("config parses");

        assert_eq!(config.day_boundary, DayBoundary::Local);
        assert_eq!(config.max_occurrences, 3);
        assert_eq!(config.trigger_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
        assert_eq!(config.rules.len(), 2);
        assert_eq!(config.rules[0].rule, RecurrenceRule::Recurring { months: 3 });
        assert_eq!(config.rules[1].subject, SubjectKind::Employee);
        assert_eq!(config.rules[1].rule, RecurrenceRule::OneTime { days: 14 });
    }

    #[test]
    fn duplicate_rule_is_rejected() {
        let err = EngineConfig::from_toml_str(
            r#"
[[rules]]
obligation_type = "ANNUAL"
name = "a"
subject = "client"
rule = { kind = "recurring", months = 12 }

[[rules]]
obligation_type = "ANNUAL"
name = "b"
subject = "client"
rule = { kind = "recurring", months = 6 }
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(message) if message.contains("duplicate")));
    }

    #[test]
    fn zero_cap_and_zero_offset_are_rejected() {
        assert!(matches!(
            EngineConfig::from_toml_str("max_occurrences = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str(
                r#"
[[rules]]
obligation_type = "X"
name = "x"
subject = "client"
rule = { kind = "one_time", days = 0 }
"#
            ),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn invalid_toml_returns_parse_error() {
        let result = EngineConfig::from_toml_str("this is not valid toml {{{");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = EngineConfig::default();
        config.trigger_secret = Some("cron-token".to_string());
        config.save_to_file(&path).expect("save config");

        let loaded = EngineConfig::from_file(&path).expect("load config");
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_returns_io_error() {
        let result = EngineConfig::from_file(std::path::Path::new("/nonexistent/caretrack.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
