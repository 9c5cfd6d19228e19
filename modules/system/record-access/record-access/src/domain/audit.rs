//! Best-effort audit trail.

use std::sync::Arc;

use chrono::Utc;
use record_access_sdk::{AccessRequest, AuditAction, AuditEntry, AuditSink, AuditUser, User};

/// Builds audit entries and hands them to the configured sink.
///
/// Sink failures are logged and swallowed; they never change the outcome of
/// the operation being audited.
#[derive(Clone)]
pub struct AuditLogger {
    sink: Option<Arc<dyn AuditSink>>,
    retention: chrono::Duration,
}

impl AuditLogger {
    #[must_use]
    pub fn new(sink: Option<Arc<dyn AuditSink>>, retention: chrono::Duration) -> Self {
        Self { sink, retention }
    }

    /// Logger that drops every entry.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(None, chrono::Duration::zero())
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Creates an entry for `action` stamped with the current time.
    ///
    /// Read actions expire after the retention period; mutations never do.
    #[must_use]
    pub fn entry(&self, action: AuditAction, req: &AccessRequest, user: &User) -> AuditEntry {
        let time = Utc::now();
        AuditEntry {
            action,
            user: AuditUser::from(user),
            method: req.method.clone(),
            path: req.path.clone(),
            body: req.body.clone(),
            query_params: req.query_params.clone(),
            path_params: req.path_params.clone(),
            resource: None,
            previous: None,
            new: None,
            time,
            expire_time: action.is_read().then(|| time + self.retention),
        }
    }

    /// Submits `entry` to the sink, if any.
    pub async fn submit(&self, entry: AuditEntry) {
        let Some(sink) = &self.sink else {
            return;
        };
        if let Err(e) = sink.record(&entry).await {
            tracing::warn!(
                action = ?entry.action,
                user = %entry.user.id,
                error = %e,
                "Failed to create audit log"
            );
        }
    }
}
