//! Domain service for the static store plugin.

use std::collections::{BTreeMap, HashMap};

use parking_lot::RwLock;
use record_access_sdk::filter::value_text;
use record_access_sdk::{Group, Record, User};

use crate::config::StaticStorePluginConfig;

/// In-memory identity, group and data tables.
///
/// Identity and group rows are fixed at construction. Items are kept ordered
/// by primary key so scans are deterministic.
pub struct StaticStore {
    pub(super) identities: HashMap<String, User>,
    pub(super) groups: HashMap<String, Group>,
    pub(super) primary_key: String,
    pub(super) items: RwLock<BTreeMap<String, Record>>,
}

impl StaticStore {
    /// Creates a new store from configuration.
    ///
    /// Rows without an id and items without a primary key value are skipped.
    #[must_use]
    pub fn from_config(cfg: &StaticStorePluginConfig) -> Self {
        let identities: HashMap<String, User> = cfg
            .identities
            .iter()
            .filter(|u| !u.id.is_empty())
            .map(|u| (u.id.clone(), u.clone()))
            .collect();

        let groups: HashMap<String, Group> = cfg
            .groups
            .iter()
            .filter(|g| !g.group_id.is_empty())
            .map(|g| (g.group_id.clone(), g.clone()))
            .collect();

        let mut items = BTreeMap::new();
        for item in &cfg.items {
            if let Some(key) = key_of(item, &cfg.primary_key) {
                items.insert(key, item.clone());
            } else {
                tracing::warn!(
                    primary_key = %cfg.primary_key,
                    "skipping seed item without a primary key"
                );
            }
        }

        tracing::debug!(
            identities = identities.len(),
            groups = groups.len(),
            items = items.len(),
            "static store loaded"
        );

        Self {
            identities,
            groups,
            primary_key: cfg.primary_key.clone(),
            items: RwLock::new(items),
        }
    }

    /// Number of items currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }

    pub(super) fn key_of(&self, record: &Record) -> Option<String> {
        key_of(record, &self.primary_key)
    }
}

fn key_of(record: &Record, primary_key: &str) -> Option<String> {
    record
        .get(primary_key)
        .filter(|v| !v.is_null())
        .map(|v| value_text(v).into_owned())
        .filter(|k| !k.is_empty())
}
