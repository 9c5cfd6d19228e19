//! Builds the filter expression handed to the data store for listings.

use record_access_sdk::{FilterCondition, FilterExpr, Params, User};

/// Path parameter naming the field of a single-field search.
pub const SEARCH_KEY: &str = "search_key";
/// Path parameter carrying the value of a single-field search.
pub const SEARCH_VALUE: &str = "search_value";

/// Combines the user's mandatory filters with the request parameters.
///
/// The user's filter fields always come first and are never replaced: a
/// client parameter on the same field adds a second condition that can only
/// narrow the result. Path parameters override query parameters with the
/// same key. Returns `None` when there is nothing to filter on.
#[must_use]
pub fn build_filter(
    user: &User,
    query_params: &Params,
    path_params: &Params,
) -> Option<FilterExpr> {
    let mut params = query_params.clone();
    params.extend(fold_search_params(path_params));

    let mut conditions: Vec<FilterCondition> =
        user.permissions.filter_fields.iter().cloned().collect();
    conditions.extend(
        params
            .into_iter()
            .map(|(field, value)| FilterCondition::equals(field, value)),
    );
    FilterExpr::and(conditions)
}

/// The user's mandatory filters alone, used to scope single-item operations.
#[must_use]
pub fn mandatory_filter(user: &User) -> Option<FilterExpr> {
    FilterExpr::and(user.permissions.filter_fields.iter().cloned().collect())
}

/// Replaces a `search_key`/`search_value` pair with `{<search_key>: <search_value>}`.
///
/// A lone `search_key` or `search_value` is passed through unchanged.
fn fold_search_params(path_params: &Params) -> Params {
    let mut params = path_params.clone();
    if params.contains_key(SEARCH_KEY)
        && params.contains_key(SEARCH_VALUE)
        && let (Some(key), Some(value)) = (params.remove(SEARCH_KEY), params.remove(SEARCH_VALUE))
    {
        params.insert(key, value);
    }
    params
}
