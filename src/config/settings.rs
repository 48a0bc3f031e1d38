//! TOML-based configuration.
//!
//! Supports a config file (palisade.toml) with environment variable
//! expansion.
//!
//! Example configuration:
//! ```toml
//! [database]
//! dialect = "mysql"
//!
//! [security]
//! user_column = "user_id"
//! require_tenant_filter = true
//! max_limit = 500
//! default_limit = 100
//!
//! [pipeline]
//! classify_timeout_ms = 15000
//! draft_timeout_ms = 20000
//! execute_timeout_ms = 30000
//! narrate_timeout_ms = 15000
//! max_result_rows = 500
//!
//! [audit]
//! log_path = "${PALISADE_DATA_DIR}/audit.log"
//! redact_params = true
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::sql::Dialect;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Unsupported SQL dialect: {0}")]
    UnsupportedDialect(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub security: SecuritySettings,
    pub pipeline: PipelineSettings,
    pub audit: AuditSettings,
}

/// Target database configuration.
///
/// Only the dialect matters to the core; connection details belong to the
/// execution collaborator.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQL dialect name (mysql, postgres, tsql).
    pub dialect: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            dialect: "mysql".to_string(),
        }
    }
}

impl DatabaseSettings {
    pub fn dialect(&self) -> Result<Dialect, SettingsError> {
        Dialect::from_name(&self.dialect)
            .ok_or_else(|| SettingsError::UnsupportedDialect(self.dialect.clone()))
    }
}

/// Tenant isolation and result-size rules.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecuritySettings {
    /// Column that scopes user-specific intents.
    pub user_column: String,

    /// Require a tenant filter whenever the fact table has a mapped tenant
    /// column. This cannot be disabled per-request.
    pub require_tenant_filter: bool,

    /// Hard ceiling on row limits; larger requests are clamped.
    pub max_limit: i64,

    /// Limit applied when a plan does not specify one.
    pub default_limit: i64,

    /// Aggregations plans may request. Deployments can restrict this below
    /// the full set; they cannot extend it beyond what the plan contract
    /// can express.
    pub allowed_aggregations: Vec<String>,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            user_column: "user_id".to_string(),
            require_tenant_filter: true,
            max_limit: 500,
            default_limit: 100,
            allowed_aggregations: ["count", "sum", "avg", "min", "max"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Per-stage timeouts and execution caps.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Timeout for the intent classification call, in milliseconds.
    pub classify_timeout_ms: u64,

    /// Timeout for the plan drafting call, in milliseconds.
    pub draft_timeout_ms: u64,

    /// Timeout for query execution, in milliseconds.
    pub execute_timeout_ms: u64,

    /// Timeout for the narration call, in milliseconds.
    pub narrate_timeout_ms: u64,

    /// Maximum rows returned to the caller; extra rows are truncated.
    pub max_result_rows: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            classify_timeout_ms: 15_000,
            draft_timeout_ms: 20_000,
            execute_timeout_ms: 30_000,
            narrate_timeout_ms: 15_000,
            max_result_rows: 500,
        }
    }
}

/// Audit log configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditSettings {
    /// Path of the append-only audit log (supports ${ENV_VAR} expansion).
    pub log_path: String,

    /// Redact bound parameter values, keeping only their names.
    pub redact_params: bool,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            log_path: "palisade-audit.log".to_string(),
            redact_params: true,
        }
    }
}

impl AuditSettings {
    /// The audit log path with environment variables expanded.
    pub fn resolved_log_path(&self) -> Result<PathBuf, SettingsError> {
        Ok(PathBuf::from(expand_env_vars(&self.log_path)?))
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        settings.check()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `PALISADE_CONFIG`
    /// 2. `./palisade.toml`
    /// 3. `~/.config/palisade/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("PALISADE_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("palisade.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("palisade").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    fn check(&self) -> Result<(), SettingsError> {
        self.database.dialect()?;
        if self.security.max_limit <= 0 {
            return Err(SettingsError::InvalidConfig(
                "security.max_limit must be positive".to_string(),
            ));
        }
        if self.security.default_limit <= 0 || self.security.default_limit > self.security.max_limit
        {
            return Err(SettingsError::InvalidConfig(
                "security.default_limit must be positive and within max_limit".to_string(),
            ));
        }
        Ok(())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' {
            if chars.peek() == Some(&'{') {
                chars.next(); // consume '{'
                let mut var_name = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch == '}' {
                        chars.next(); // consume '}'
                        break;
                    }
                    var_name.push(chars.next().unwrap());
                }
                let value = env::var(&var_name)
                    .map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
                result.push_str(&value);
            } else {
                // $VAR (ends at non-alphanumeric/underscore)
                let mut var_name = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' {
                        var_name.push(chars.next().unwrap());
                    } else {
                        break;
                    }
                }
                if var_name.is_empty() {
                    // Just a lone $, keep it
                    result.push('$');
                } else {
                    let value = env::var(&var_name)
                        .map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
                    result.push_str(&value);
                }
            }
        } else {
            result.push(c);
        }
    }

    Ok(result)
}
