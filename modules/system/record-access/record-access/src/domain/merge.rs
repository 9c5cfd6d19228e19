//! Monotonic union of permission attributes.

use record_access_sdk::PermissionSet;

/// Folds `source` into `target`.
///
/// Every collection of `target` ends up a superset of what it held before;
/// nothing is ever removed. Group ids keep first-seen order.
pub fn merge_permissions(target: &mut PermissionSet, source: &PermissionSet) {
    target
        .permitted_endpoints
        .extend(source.permitted_endpoints.iter().cloned());
    target
        .exclude_fields
        .extend(source.exclude_fields.iter().cloned());
    target
        .update_fields_restricted
        .extend(source.update_fields_restricted.iter().cloned());
    target
        .update_fields_permitted
        .extend(source.update_fields_permitted.iter().cloned());
    target
        .filter_fields
        .extend(source.filter_fields.iter().cloned());
    for group_id in &source.groups {
        target.add_group(group_id);
    }
}
