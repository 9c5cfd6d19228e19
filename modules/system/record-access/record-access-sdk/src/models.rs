//! Domain models for the record access module.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A stored item as seen by the engine: a flat JSON document.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// A parsed request body. Iteration order is the order the client declared
/// the fields in.
pub type Fields = IndexMap<String, String>;

/// Query or path parameters.
pub type Params = BTreeMap<String, String>;

/// An endpoint grant: `method` plus an endpoint pattern.
///
/// `method` compares case-insensitively and `"*"` matches any method.
/// `endpoint` is a glob pattern: plain strings match exactly, `*` matches any
/// run of characters (including `/`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PermittedEndpoint {
    pub method: String,
    pub endpoint: String,
}

impl PermittedEndpoint {
    #[must_use]
    pub fn new(method: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            endpoint: endpoint.into(),
        }
    }
}

/// How a [`FilterCondition`] compares the record value to the condition value.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    #[default]
    Equals,
    NotEqual,
    Contains,
    NotContains,
    StartsWith,
    GreaterThan,
    LessThan,
}

/// A single `(field, value, match-type)` condition.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FilterCondition {
    pub field: String,
    pub value: String,
    #[serde(default)]
    pub operator: MatchType,
}

impl FilterCondition {
    #[must_use]
    pub fn new(field: impl Into<String>, value: impl Into<String>, operator: MatchType) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            operator,
        }
    }

    #[must_use]
    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field, value, MatchType::Equals)
    }
}

/// Permission attributes shared by users, identity rows and groups.
///
/// Every collection is a set: merging only ever adds entries. `groups` keeps
/// insertion order but never holds the same id twice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionSet {
    pub groups: Vec<String>,
    pub permitted_endpoints: BTreeSet<PermittedEndpoint>,
    pub exclude_fields: BTreeSet<String>,
    pub update_fields_restricted: BTreeSet<String>,
    pub update_fields_permitted: BTreeSet<String>,
    pub filter_fields: BTreeSet<FilterCondition>,
}

impl PermissionSet {
    /// Appends a group id unless it is already present.
    pub fn add_group(&mut self, group_id: &str) {
        if !self.groups.iter().any(|g| g == group_id) {
            self.groups.push(group_id.to_owned());
        }
    }

    /// Returns true if `field` may be written by this permission set.
    ///
    /// An explicit permit overrides a blanket restriction.
    #[must_use]
    pub fn may_update(&self, field: &str) -> bool {
        !self.update_fields_restricted.contains(field)
            || self.update_fields_permitted.contains(field)
    }
}

/// A resolved user together with its effective permissions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub permissions: PermissionSet,
}

impl User {
    /// Creates a user with no metadata and no permissions.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn groups(&self) -> &[String] {
        &self.permissions.groups
    }

    /// Identifier used in log lines: `"<username> (<id>)"` when a username is
    /// known, otherwise `"<id>"`.
    #[must_use]
    pub fn identifier(&self) -> String {
        match self.username.as_deref() {
            Some(username) if !username.is_empty() => format!("{username} ({})", self.id),
            _ => self.id.clone(),
        }
    }
}

/// A named bundle of permissions a user inherits through membership.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub group_id: String,
    #[serde(flatten)]
    pub permissions: PermissionSet,
}

impl Group {
    #[must_use]
    pub fn new(group_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            permissions: PermissionSet::default(),
        }
    }
}

/// Identity metadata asserted by the caller's identity provider.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityClaims {
    pub username: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub groups: Vec<String>,
}

impl IdentityClaims {
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }
}

/// Request model handed over by the transport layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequest {
    pub subject_id: String,
    pub claims: Option<IdentityClaims>,
    pub method: String,
    pub path: String,
    pub body: Fields,
    pub query_params: Params,
    pub path_params: Params,
}

impl AccessRequest {
    #[must_use]
    pub fn new(
        subject_id: impl Into<String>,
        method: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_claims(mut self, claims: IdentityClaims) -> Self {
        self.claims = Some(claims);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Fields) -> Self {
        self.body = body;
        self
    }

    #[must_use]
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_path_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.path_params.insert(key.into(), value.into());
        self
    }
}

/// Operation recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    Create,
    Get,
    Update,
    Delete,
    List,
}

impl AuditAction {
    /// Read actions produce audit entries that expire after the retention period.
    #[must_use]
    pub fn is_read(self) -> bool {
        matches!(self, AuditAction::Get | AuditAction::List)
    }
}

/// Identity fields copied into an audit entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditUser {
    pub id: String,
    pub username: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl From<&User> for AuditUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
        }
    }
}

/// One entry of the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub user: AuditUser,
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub body: Fields,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query_params: Params,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub path_params: Params,
    /// Primary key of the affected item, when the action targets one item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Params>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<Record>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<Record>,
    pub time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_time: Option<DateTime<Utc>>,
}
