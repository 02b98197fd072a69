//! Engine configuration
//!
//! Options can be built in code, deserialized from JSON (inline or from a
//! file) or overlaid from `MEMDOC_*` environment variables.

use crate::error::{MemDocError, Result};
use crate::logging::{self, LogLevel};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// URI accepted by [`crate::Database::open_uri`] when nothing else is configured
pub const DEFAULT_URI: &str = "mongodb://localhost:27017";

/// What a reduction does when an expression divides by zero
///
/// - **Skip**: the offending row contributes nothing to the running aggregate
/// - **Error**: the pipeline stops with [`MemDocError::DivideByZero`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DivideByZeroPolicy {
    #[default]
    Skip,
    Error,
}

/// Which identifier generator a database installs for missing `_id`s
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IdGeneration {
    #[default]
    ObjectId,
    Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Reject update documents that carry no recognized operator
    pub validate_updates: bool,
    /// Fail on unknown pipeline stages instead of skipping them
    pub strict_stages: bool,
    pub divide_by_zero: DivideByZeroPolicy,
    pub id_generation: IdGeneration,
    /// URI prefixes accepted by `Database::open_uri`
    pub allowed_uris: Vec<String>,
    /// Log level applied when a database opens ("error" .. "trace")
    pub log_level: Option<String>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            validate_updates: true,
            strict_stages: true,
            divide_by_zero: DivideByZeroPolicy::Skip,
            id_generation: IdGeneration::ObjectId,
            allowed_uris: vec![DEFAULT_URI.to_string()],
            log_level: None,
        }
    }
}

impl EngineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_validate_updates(mut self, validate: bool) -> Self {
        self.validate_updates = validate;
        self
    }

    pub fn with_strict_stages(mut self, strict: bool) -> Self {
        self.strict_stages = strict;
        self
    }

    pub fn with_divide_by_zero(mut self, policy: DivideByZeroPolicy) -> Self {
        self.divide_by_zero = policy;
        self
    }

    pub fn with_id_generation(mut self, kind: IdGeneration) -> Self {
        self.id_generation = kind;
        self
    }

    pub fn with_allowed_uri(mut self, prefix: impl Into<String>) -> Self {
        self.allowed_uris.push(prefix.into());
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level.as_str().to_lowercase());
        self
    }

    /// Parse options from a JSON object; missing keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: EngineOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Defaults overlaid with `MEMDOC_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().overlay_env()
    }

    /// Overlay `MEMDOC_STRICT_STAGES`, `MEMDOC_VALIDATE_UPDATES`,
    /// `MEMDOC_DIVIDE_BY_ZERO` and `MEMDOC_LOG` onto these options.
    pub fn overlay_env(mut self) -> Result<Self> {
        if let Ok(raw) = std::env::var("MEMDOC_STRICT_STAGES") {
            self.strict_stages = parse_bool("MEMDOC_STRICT_STAGES", &raw)?;
        }
        if let Ok(raw) = std::env::var("MEMDOC_VALIDATE_UPDATES") {
            self.validate_updates = parse_bool("MEMDOC_VALIDATE_UPDATES", &raw)?;
        }
        if let Ok(raw) = std::env::var("MEMDOC_DIVIDE_BY_ZERO") {
            self.divide_by_zero = match raw.trim().to_lowercase().as_str() {
                "skip" => DivideByZeroPolicy::Skip,
                "error" => DivideByZeroPolicy::Error,
                other => {
                    return Err(MemDocError::InvalidArgument(format!(
                        "MEMDOC_DIVIDE_BY_ZERO must be 'skip' or 'error', got '{}'",
                        other
                    )))
                }
            };
        }
        if let Ok(raw) = std::env::var(logging::LOG_ENV_VAR) {
            self.log_level = Some(raw);
        }
        self.validate()?;
        Ok(self)
    }

    /// Parsed log level, if one is configured.
    pub fn log_level(&self) -> Result<Option<LogLevel>> {
        match &self.log_level {
            None => Ok(None),
            Some(raw) => LogLevel::parse(raw).map(Some).ok_or_else(|| {
                MemDocError::InvalidArgument(format!("Unknown log level '{}'", raw))
            }),
        }
    }

    /// Reject configurations a database cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.allowed_uris.is_empty() {
            return Err(MemDocError::InvalidArgument(
                "allowed_uris must list at least one URI prefix".to_string(),
            ));
        }
        self.log_level()?;
        Ok(())
    }
}

fn parse_bool(var: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(MemDocError::InvalidArgument(format!(
            "{} must be a boolean, got '{}'",
            var, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let options = EngineOptions::default();
        assert!(options.validate_updates);
        assert!(options.strict_stages);
        assert_eq!(options.divide_by_zero, DivideByZeroPolicy::Skip);
        assert_eq!(options.id_generation, IdGeneration::ObjectId);
        assert_eq!(options.allowed_uris, vec![DEFAULT_URI.to_string()]);
    }

    #[test]
    fn test_builder() {
        let options = EngineOptions::new()
            .with_strict_stages(false)
            .with_divide_by_zero(DivideByZeroPolicy::Error)
            .with_id_generation(IdGeneration::Uuid)
            .with_log_level(LogLevel::Debug);
        assert!(!options.strict_stages);
        assert_eq!(options.divide_by_zero, DivideByZeroPolicy::Error);
        assert_eq!(options.id_generation, IdGeneration::Uuid);
        assert_eq!(options.log_level().unwrap(), Some(LogLevel::Debug));
    }

    #[test]
    fn test_from_json_partial() {
        let options =
            EngineOptions::from_json_str(r#"{"strict_stages": false, "divide_by_zero": "error"}"#)
                .unwrap();
        assert!(!options.strict_stages);
        assert!(options.validate_updates);
        assert_eq!(options.divide_by_zero, DivideByZeroPolicy::Error);
    }

    #[test]
    fn test_from_json_rejects_bad_level() {
        let result = EngineOptions::from_json_str(r#"{"log_level": "loud"}"#);
        assert!(result.unwrap_err().to_string().contains("Unknown log level"));
    }

    #[test]
    fn test_from_json_rejects_empty_uris() {
        let result = EngineOptions::from_json_str(r#"{"allowed_uris": []}"#);
        assert!(matches!(result, Err(MemDocError::InvalidArgument(_))));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"id_generation": "uuid", "validate_updates": false}}"#).unwrap();

        let options = EngineOptions::from_file(file.path()).unwrap();
        assert_eq!(options.id_generation, IdGeneration::Uuid);
        assert!(!options.validate_updates);
    }

    #[test]
    fn test_from_missing_file() {
        let result = EngineOptions::from_file("/nonexistent/memdoc.json");
        assert!(matches!(result, Err(MemDocError::Io(_))));
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("X", "Yes").unwrap());
        assert!(!parse_bool("X", "0").unwrap());
        assert!(parse_bool("X", "maybe").is_err());
    }
}
