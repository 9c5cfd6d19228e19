//! In-memory audit sink.

use async_trait::async_trait;
use parking_lot::Mutex;
use record_access_sdk::{AccessError, AuditEntry, AuditSink};

/// Appends audit entries to an in-memory table.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    table: String,
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            entries: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Snapshot of the entries recorded so far, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, entry: &AuditEntry) -> Result<(), AccessError> {
        tracing::debug!(table = %self.table, user = %entry.user.id, "audit entry recorded");
        self.entries.lock().push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use chrono::Utc;
    use record_access_sdk::{AuditAction, AuditUser, Fields, Params};

    fn entry(action: AuditAction) -> AuditEntry {
        AuditEntry {
            action,
            user: AuditUser {
                id: "u1".into(),
                ..AuditUser::default()
            },
            method: "GET".into(),
            path: "/items/".into(),
            body: Fields::new(),
            query_params: Params::new(),
            path_params: Params::new(),
            resource: None,
            previous: None,
            new: None,
            time: Utc::now(),
            expire_time: None,
        }
    }

    #[tokio::test]
    async fn keeps_entries_in_order() {
        let sink = MemoryAuditSink::new("audit");
        sink.record(&entry(AuditAction::List)).await.unwrap();
        sink.record(&entry(AuditAction::Get)).await.unwrap();

        let actions: Vec<AuditAction> = sink.entries().iter().map(|e| e.action).collect();
        assert_eq!(actions, [AuditAction::List, AuditAction::Get]);
        assert_eq!(sink.table(), "audit");
    }
}
