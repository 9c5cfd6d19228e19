//! Response-side removal of fields the caller may not see.

use record_access_sdk::{Record, User};

/// Strips every field in the user's exclude list from each record.
#[must_use]
pub fn post_process(records: Vec<Record>, user: &User) -> Vec<Record> {
    records
        .into_iter()
        .map(|record| strip_excluded(record, user))
        .collect()
}

/// Single-record form of [`post_process`].
#[must_use]
pub fn strip_excluded(mut record: Record, user: &User) -> Record {
    for field in &user.permissions.exclude_fields {
        record.remove(field);
    }
    record
}
