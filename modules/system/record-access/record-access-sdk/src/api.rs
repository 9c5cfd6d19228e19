//! Collaborator traits the engine consumes.
//!
//! Backends implement these traits; the engine holds them as
//! `Arc<dyn Trait>` and never branches on which backend it talks to.

use async_trait::async_trait;

use crate::error::AccessError;
use crate::filter::FilterExpr;
use crate::models::{AuditEntry, Fields, Group, Record, User};

/// Key-by-id lookup of identity rows.
///
/// Used for the caller's direct identity row and for verifying groups
/// asserted by the identity provider, which may be registered as identity
/// rows of their own.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Returns the identity row for `id`, or `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error when the lookup itself fails.
    async fn find_identity(&self, id: &str) -> Result<Option<User>, AccessError>;
}

/// Key-by-group-id lookup of group rows.
#[async_trait]
pub trait GroupStore: Send + Sync {
    /// Returns the group row for `group_id`, or `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error when the lookup itself fails.
    async fn find_group(&self, group_id: &str) -> Result<Option<Group>, AccessError>;
}

/// Storage capability over the protected data table.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Returns every record matching `filter`, or every record when `filter`
    /// is `None`.
    ///
    /// # Errors
    ///
    /// `BadRequest` when the backend rejects a filter argument, `Internal`
    /// on transport failures.
    async fn scan(&self, filter: Option<&FilterExpr>) -> Result<Vec<Record>, AccessError>;

    /// Returns the record stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error when the lookup fails.
    async fn get(&self, key: &str) -> Result<Option<Record>, AccessError>;

    /// Stores `record`, replacing any record with the same key.
    ///
    /// # Errors
    ///
    /// Returns an error when the record has no usable key or the write fails.
    async fn put(&self, record: Record) -> Result<(), AccessError>;

    /// Sets `fields` on the record stored under `key` and returns the
    /// updated record.
    ///
    /// # Errors
    ///
    /// `NotFound` when there is no record under `key`.
    async fn update(&self, key: &str, fields: &Fields) -> Result<Record, AccessError>;

    /// Removes the record stored under `key`.
    ///
    /// # Errors
    ///
    /// `NotFound` when there is no record under `key`.
    async fn delete(&self, key: &str) -> Result<(), AccessError>;

    /// Name of the primary key field.
    ///
    /// # Errors
    ///
    /// Returns an error when the schema cannot be described.
    async fn describe_key_schema(&self) -> Result<String, AccessError>;
}

/// Append-only sink for audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// # Errors
    ///
    /// Returns an error when the entry could not be written. Callers treat
    /// this as non-fatal.
    async fn record(&self, entry: &AuditEntry) -> Result<(), AccessError>;
}
