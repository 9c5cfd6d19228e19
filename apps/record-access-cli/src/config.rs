//! Layered application configuration.
//!
//! defaults -> YAML file -> environment (`APP__*`) -> CLI overrides

use std::collections::BTreeMap;
use std::path::Path;

use clap::Args;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use record_access::RecordAccessConfig;
use record_access_sdk::{Fields, Record, ValidationTable, Verdict};
use serde::{Deserialize, Serialize};
use static_store_plugin::StaticStorePluginConfig;

/// Environment variable prefix; `__` separates nesting levels.
pub const ENV_PREFIX: &str = "APP__";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub record_access: RecordAccessConfig,
    /// Seed data for the in-memory backends.
    pub static_store: StaticStorePluginConfig,
    /// Field name -> accepted values. Each entry becomes a field validator.
    pub allowed_values: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Filter used when neither `RUST_LOG` nor `-v` is given.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: "warn".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Table settings that can be overridden from the command line.
#[derive(Debug, Clone, Default, Args)]
pub struct TableOverrides {
    /// Data table name
    #[arg(long, global = true)]
    pub data_table: Option<String>,

    /// Identity table name
    #[arg(long, global = true)]
    pub auth_table: Option<String>,

    /// Group table name
    #[arg(long, global = true)]
    pub group_table: Option<String>,

    /// Audit table name (enables auditing)
    #[arg(long, global = true)]
    pub audit_table: Option<String>,

    /// Days before read audit entries expire
    #[arg(long, global = true)]
    pub log_retention_days: Option<u32>,
}

impl AppConfig {
    /// Loads the layered configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not exist or a layer fails to parse.
    pub fn load(path: Option<&Path>, overrides: &TableOverrides) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));
        if let Some(path) = path {
            if !path.is_file() {
                anyhow::bail!("config file does not exist: {}", path.display());
            }
            figment = figment.merge(Yaml::file(path));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let mut cfg: AppConfig = figment.extract()?;
        cfg.apply_cli_overrides(overrides);
        Ok(cfg)
    }

    pub fn apply_cli_overrides(&mut self, overrides: &TableOverrides) {
        let ra = &mut self.record_access;
        if let Some(v) = &overrides.data_table {
            ra.data_table.clone_from(v);
        }
        if let Some(v) = &overrides.auth_table {
            ra.auth_table.clone_from(v);
        }
        if let Some(v) = &overrides.group_table {
            ra.group_table.clone_from(v);
        }
        if let Some(v) = &overrides.audit_table {
            ra.audit_table = Some(v.clone());
        }
        if let Some(days) = overrides.log_retention_days {
            ra.log_retention_days = days;
        }
    }

    /// Builds the field validators from `allowed_values`.
    #[must_use]
    pub fn validation_table(&self) -> ValidationTable {
        self.allowed_values
            .iter()
            .fold(ValidationTable::builder(), |builder, (field, allowed)| {
                let field_name = field.clone();
                let allowed = allowed.clone();
                let check = move |value: &str,
                                  _: &Fields,
                                  _: Option<&Record>|
                      -> anyhow::Result<Verdict> {
                    if allowed.iter().any(|a| a == value) {
                        Ok(Verdict::Accepted)
                    } else {
                        Ok(Verdict::rejected(format!(
                            "Invalid value '{value}' for attribute '{field_name}'"
                        )))
                    }
                };
                builder.field(field.clone(), check)
            })
            .build()
    }
}
