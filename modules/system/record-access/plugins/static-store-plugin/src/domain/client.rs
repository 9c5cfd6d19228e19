//! Collaborator trait implementations for the static store.

use async_trait::async_trait;
use record_access_sdk::{
    AccessError, DataStore, Fields, FilterExpr, Group, GroupStore, IdentityStore, Record, User,
};
use serde_json::Value;

use super::service::StaticStore;

#[async_trait]
impl IdentityStore for StaticStore {
    async fn find_identity(&self, id: &str) -> Result<Option<User>, AccessError> {
        Ok(self.identities.get(id).cloned())
    }
}

#[async_trait]
impl GroupStore for StaticStore {
    async fn find_group(&self, group_id: &str) -> Result<Option<Group>, AccessError> {
        Ok(self.groups.get(group_id).cloned())
    }
}

#[async_trait]
impl DataStore for StaticStore {
    async fn scan(&self, filter: Option<&FilterExpr>) -> Result<Vec<Record>, AccessError> {
        let items = self.items.read();
        Ok(items
            .values()
            .filter(|item| filter.is_none_or(|f| f.matches(item)))
            .cloned()
            .collect())
    }

    async fn get(&self, key: &str) -> Result<Option<Record>, AccessError> {
        Ok(self.items.read().get(key).cloned())
    }

    async fn put(&self, record: Record) -> Result<(), AccessError> {
        let key = self.key_of(&record).ok_or_else(|| {
            AccessError::bad_request(format!("Item has no '{}' value", self.primary_key))
        })?;
        self.items.write().insert(key, record);
        Ok(())
    }

    async fn update(&self, key: &str, fields: &Fields) -> Result<Record, AccessError> {
        let mut items = self.items.write();
        let item = items
            .get_mut(key)
            .ok_or_else(|| AccessError::not_found(format!("Item '{key}' not found")))?;
        for (field, value) in fields {
            item.insert(field.clone(), Value::String(value.clone()));
        }
        Ok(item.clone())
    }

    async fn delete(&self, key: &str) -> Result<(), AccessError> {
        self.items
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| AccessError::not_found(format!("Item '{key}' not found")))
    }

    async fn describe_key_schema(&self) -> Result<String, AccessError> {
        Ok(self.primary_key.clone())
    }
}
