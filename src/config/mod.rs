//! Configuration module.
//!
//! Handles the TOML config file, environment variable expansion, and the
//! security/pipeline/audit settings the core reads at run time.

mod settings;

pub use settings::{
    expand_env_vars, AuditSettings, DatabaseSettings, PipelineSettings, SecuritySettings,
    Settings, SettingsError,
};
