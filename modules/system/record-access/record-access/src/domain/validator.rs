//! Checks a resolved user against the requested operation and body.

use glob::Pattern;
use record_access_sdk::{
    AccessError, AccessRequest, Fields, PermittedEndpoint, Record, User, ValidationTable, Verdict,
};
use tracing::warn;

/// Validates users and requests against resolved permissions and the
/// configured per-field validators.
#[derive(Debug, Clone, Default)]
pub struct RequestValidator {
    validations: ValidationTable,
}

impl RequestValidator {
    #[must_use]
    pub fn new(validations: ValidationTable) -> Self {
        Self { validations }
    }

    /// Full request check: endpoint, restricted fields, field validators.
    ///
    /// Field validators receive no existing record here; callers updating an
    /// item run [`Self::validate_fields`] themselves with the stored record.
    ///
    /// # Errors
    ///
    /// The first violation found, see the individual checks.
    pub fn validate_request(&self, req: &AccessRequest, user: &User) -> Result<(), AccessError> {
        check_endpoint(req, user)?;
        check_update_fields(&req.body, user)?;
        self.validate_fields(&req.body, None)
    }

    /// Runs registered validators in body order, stopping at the first
    /// failure.
    ///
    /// # Errors
    ///
    /// `BadRequest` with the validator's message on rejection, `Internal`
    /// when a validator fails to run.
    pub fn validate_fields(
        &self,
        body: &Fields,
        existing: Option<&Record>,
    ) -> Result<(), AccessError> {
        for (field, value) in body {
            let Some(validator) = self.validations.get(field) else {
                continue;
            };
            match validator.validate(value, body, existing) {
                Ok(Verdict::Accepted) => {}
                Ok(Verdict::Rejected(message)) => {
                    warn!(field = %field, %message, "field validation rejected");
                    return Err(AccessError::bad_request(message));
                }
                Err(e) => {
                    tracing::error!(field = %field, error = %e, "field validator failed");
                    return Err(AccessError::internal(format!(
                        "Validation of field '{field}' failed"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Structural sanity of a resolved user.
///
/// # Errors
///
/// `Unauthorized` when the id is empty, an endpoint grant is incomplete or
/// does not parse, or a mandatory filter names no field.
pub fn validate_user(user: &User) -> Result<(), AccessError> {
    if user.id.trim().is_empty() {
        return Err(AccessError::unauthorized("Resolved user has no id"));
    }
    for grant in &user.permissions.permitted_endpoints {
        if grant.method.trim().is_empty() || grant.endpoint.trim().is_empty() {
            return Err(AccessError::unauthorized(format!(
                "User {} has an incomplete endpoint permission",
                user.identifier()
            )));
        }
        if let Err(e) = Pattern::new(&grant.endpoint) {
            return Err(AccessError::unauthorized(format!(
                "User {} has an invalid endpoint pattern '{}': {e}",
                user.identifier(),
                grant.endpoint
            )));
        }
    }
    if user
        .permissions
        .filter_fields
        .iter()
        .any(|c| c.field.trim().is_empty())
    {
        return Err(AccessError::unauthorized(format!(
            "User {} has a filter without a field",
            user.identifier()
        )));
    }
    Ok(())
}

/// # Errors
///
/// `Unauthorized` when no permitted endpoint matches the request.
pub fn check_endpoint(req: &AccessRequest, user: &User) -> Result<(), AccessError> {
    let allowed = user
        .permissions
        .permitted_endpoints
        .iter()
        .any(|grant| endpoint_matches(grant, &req.method, &req.path));
    if allowed {
        return Ok(());
    }
    warn!(
        user = %user.identifier(),
        method = %req.method,
        path = %req.path,
        "endpoint not permitted"
    );
    Err(AccessError::unauthorized(format!(
        "User {} is not permitted to call {} {}",
        user.identifier(),
        req.method,
        req.path
    )))
}

/// Rejects the first body field the user may not write.
///
/// # Errors
///
/// `BadRequest` naming the offending field.
pub fn check_update_fields(body: &Fields, user: &User) -> Result<(), AccessError> {
    match body.keys().find(|field| !user.permissions.may_update(field)) {
        Some(field) => {
            warn!(user = %user.identifier(), field = %field, "restricted field submitted");
            Err(AccessError::bad_request(format!(
                "Not permitted to update field '{field}'"
            )))
        }
        None => Ok(()),
    }
}

fn endpoint_matches(grant: &PermittedEndpoint, method: &str, path: &str) -> bool {
    let method_ok = grant.method == "*" || grant.method.eq_ignore_ascii_case(method);
    method_ok
        && (grant.endpoint == path
            || Pattern::new(&grant.endpoint).is_ok_and(|p| p.matches(path)))
}
