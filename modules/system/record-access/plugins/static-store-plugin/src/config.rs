//! Configuration for the static store plugin.

use std::collections::BTreeSet;

use record_access_sdk::{FilterCondition, Group, PermissionSet, PermittedEndpoint, Record, User};
use serde::{Deserialize, Deserializer, Serialize};

/// Plugin configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StaticStorePluginConfig {
    /// Field the items are keyed by.
    pub primary_key: String,

    /// Identity rows: users, and groups that identity providers may assert.
    #[serde(deserialize_with = "identity_rows")]
    pub identities: Vec<User>,

    /// Group rows.
    #[serde(deserialize_with = "group_rows")]
    pub groups: Vec<Group>,

    /// Initial contents of the data table.
    pub items: Vec<Record>,
}

impl Default for StaticStorePluginConfig {
    fn default() -> Self {
        Self {
            primary_key: "id".to_owned(),
            identities: Vec::new(),
            groups: Vec::new(),
            items: Vec::new(),
        }
    }
}

// Seed rows spell every attribute out: unknown keys are rejected, which
// `#[serde(flatten)]` on the SDK models cannot do.

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct IdentityRow {
    id: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    groups: Vec<String>,
    #[serde(default)]
    permitted_endpoints: BTreeSet<PermittedEndpoint>,
    #[serde(default)]
    exclude_fields: BTreeSet<String>,
    #[serde(default)]
    update_fields_restricted: BTreeSet<String>,
    #[serde(default)]
    update_fields_permitted: BTreeSet<String>,
    #[serde(default)]
    filter_fields: BTreeSet<FilterCondition>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct GroupRow {
    group_id: String,
    #[serde(default)]
    groups: Vec<String>,
    #[serde(default)]
    permitted_endpoints: BTreeSet<PermittedEndpoint>,
    #[serde(default)]
    exclude_fields: BTreeSet<String>,
    #[serde(default)]
    update_fields_restricted: BTreeSet<String>,
    #[serde(default)]
    update_fields_permitted: BTreeSet<String>,
    #[serde(default)]
    filter_fields: BTreeSet<FilterCondition>,
}

impl From<IdentityRow> for User {
    fn from(row: IdentityRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            name: row.name,
            email: row.email,
            permissions: PermissionSet {
                groups: row.groups,
                permitted_endpoints: row.permitted_endpoints,
                exclude_fields: row.exclude_fields,
                update_fields_restricted: row.update_fields_restricted,
                update_fields_permitted: row.update_fields_permitted,
                filter_fields: row.filter_fields,
            },
        }
    }
}

impl From<GroupRow> for Group {
    fn from(row: GroupRow) -> Self {
        Self {
            group_id: row.group_id,
            permissions: PermissionSet {
                groups: row.groups,
                permitted_endpoints: row.permitted_endpoints,
                exclude_fields: row.exclude_fields,
                update_fields_restricted: row.update_fields_restricted,
                update_fields_permitted: row.update_fields_permitted,
                filter_fields: row.filter_fields,
            },
        }
    }
}

fn identity_rows<'de, D>(d: D) -> Result<Vec<User>, D::Error>
where
    D: Deserializer<'de>,
{
    let rows = Vec::<IdentityRow>::deserialize(d)?;
    Ok(rows.into_iter().map(User::from).collect())
}

fn group_rows<'de, D>(d: D) -> Result<Vec<Group>, D::Error>
where
    D: Deserializer<'de>,
{
    let rows = Vec::<GroupRow>::deserialize(d)?;
    Ok(rows.into_iter().map(Group::from).collect())
}
