//! Configuration for the record access module.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Module configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecordAccessConfig {
    /// Table holding the protected items.
    pub data_table: String,

    /// Table holding identity rows (users and provider-asserted groups).
    pub auth_table: String,

    /// Table holding group rows.
    pub group_table: String,

    /// Table receiving audit entries. Auditing is disabled when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_table: Option<String>,

    /// Primary key field of the data table, used when the store does not
    /// describe its own key schema.
    pub primary_key: String,

    /// Days after which read audit entries (GET, LIST) expire.
    pub log_retention_days: u32,

    /// Names of the headers carrying identity-provider claims.
    pub oidc: OidcHeaders,

    /// How far owned groups are expanded.
    pub group_expansion: GroupExpansion,

    /// Upper bound on nested group levels for [`GroupExpansion::Transitive`].
    pub max_group_depth: usize,

    /// Bound on the whole identity resolution, including store round-trips.
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub resolve_timeout: Option<Duration>,
}

impl Default for RecordAccessConfig {
    fn default() -> Self {
        Self {
            data_table: String::new(),
            auth_table: String::new(),
            group_table: String::new(),
            audit_table: None,
            primary_key: "id".to_owned(),
            log_retention_days: 30,
            oidc: OidcHeaders::default(),
            group_expansion: GroupExpansion::default(),
            max_group_depth: 8,
            resolve_timeout: None,
        }
    }
}

impl RecordAccessConfig {
    /// Checks the settings that have no usable default.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first missing table.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, value) in [
            ("data_table", &self.data_table),
            ("auth_table", &self.auth_table),
            ("group_table", &self.group_table),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("{name} must be set");
            }
        }
        if self.audit_table.as_deref().is_some_and(|t| t.trim().is_empty()) {
            anyhow::bail!("audit_table must not be empty when set");
        }
        if self.primary_key.trim().is_empty() {
            anyhow::bail!("primary_key must not be empty");
        }
        if self.group_expansion == GroupExpansion::Transitive && self.max_group_depth == 0 {
            anyhow::bail!("max_group_depth must be at least 1 for transitive expansion");
        }
        Ok(())
    }

    /// Chrono duration of the read audit retention.
    #[must_use]
    pub fn log_retention(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.log_retention_days))
    }
}

/// Header names the identity-provider proxy forwards claims in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OidcHeaders {
    pub username_header: String,
    pub name_header: String,
    pub email_header: String,
    /// Empty disables group claims.
    pub group_header: String,
    pub group_separator: String,
}

impl Default for OidcHeaders {
    fn default() -> Self {
        Self {
            username_header: "Sub".to_owned(),
            name_header: "Name".to_owned(),
            email_header: "Mail".to_owned(),
            group_header: String::new(),
            group_separator: ",".to_owned(),
        }
    }
}

/// Owned-group expansion strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupExpansion {
    /// Resolve the groups listed on the identity row; nested group ids are
    /// copied onto the user but not resolved.
    #[default]
    Direct,
    /// Resolve nested group ids breadth-first up to `max_group_depth`.
    Transitive,
}
