//! CRUD orchestration over the data store, gated by the resolved user.
//!
//! Every operation resolves and validates the caller first, scopes the data
//! access by the user's mandatory filters, strips excluded fields from what
//! it returns and finally writes a best-effort audit entry.

use std::collections::BTreeSet;
use std::sync::Arc;

use record_access_sdk::filter::value_text;
use record_access_sdk::{
    AccessError, AccessRequest, AuditAction, AuditSink, DataStore, GroupStore, IdentityStore,
    Params, Record, User, ValidationTable,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::RecordAccessConfig;
use crate::domain::audit::AuditLogger;
use crate::domain::filter::{build_filter, mandatory_filter};
use crate::domain::post_process::{post_process, strip_excluded};
use crate::domain::resolver::UserResolver;
use crate::domain::validator::{RequestValidator, validate_user};

/// Record access service.
#[derive(Clone)]
pub struct Service {
    resolver: UserResolver,
    validator: RequestValidator,
    data: Arc<dyn DataStore>,
    audit: AuditLogger,
    default_primary_key: String,
}

impl Service {
    /// Wires the service from configuration and its collaborators.
    ///
    /// `audit` is the sink for the audit trail; pass `None` to disable it.
    #[must_use]
    pub fn new(
        cfg: &RecordAccessConfig,
        identities: Arc<dyn IdentityStore>,
        groups: Arc<dyn GroupStore>,
        data: Arc<dyn DataStore>,
        audit: Option<Arc<dyn AuditSink>>,
        validations: ValidationTable,
    ) -> Self {
        Self {
            resolver: UserResolver::from_config(cfg, identities, groups),
            validator: RequestValidator::new(validations),
            data,
            audit: AuditLogger::new(audit, cfg.log_retention()),
            default_primary_key: cfg.primary_key.clone(),
        }
    }

    /// Resolves the caller and checks the request against its permissions,
    /// running the field validators over the body without a stored record.
    ///
    /// # Errors
    ///
    /// `Unauthorized` for unresolved identities, malformed users and
    /// endpoints that are not permitted; `BadRequest` for restricted body
    /// fields and validator rejections; lookup errors unchanged.
    pub async fn initialize_request(&self, req: &AccessRequest) -> Result<User, AccessError> {
        let user = self
            .resolver
            .resolve(&req.subject_id, req.claims.as_ref())
            .await?;
        validate_user(&user)?;
        self.validator.validate_request(req, &user)?;
        debug!(user = %user.identifier(), "request authorized");
        Ok(user)
    }

    /// Creates an item from the request body.
    ///
    /// # Errors
    ///
    /// `BadRequest` when the primary key is missing, a validator rejects a
    /// field or the key is taken; `Unauthorized` when the item falls outside
    /// the caller's mandatory filters.
    #[tracing::instrument(skip_all, fields(subject = %req.subject_id, path = %req.path))]
    pub async fn create(&self, req: &AccessRequest) -> Result<Record, AccessError> {
        let user = self.initialize_request(req).await?;

        let key_field = self.key_field().await?;
        let key = req
            .body
            .get(&key_field)
            .filter(|k| !k.is_empty())
            .cloned()
            .ok_or_else(|| {
                AccessError::bad_request(format!("Missing primary key '{key_field}'"))
            })?;

        let item: Record = req
            .body
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        ensure_in_scope(&user, &item)?;

        if self.data.get(&key).await?.is_some() {
            return Err(AccessError::bad_request("Item already exists"));
        }
        self.data.put(item.clone()).await?;
        debug!(key = %key, "item created");

        let mut entry = self.audit.entry(AuditAction::Create, req, &user);
        entry.resource = Some(resource(&key_field, &key));
        entry.new = Some(item.clone());
        self.audit.submit(entry).await;

        Ok(strip_excluded(item, &user))
    }

    /// # Errors
    ///
    /// `NotFound` when the item does not exist or is outside the caller's
    /// mandatory filters.
    #[tracing::instrument(skip_all, fields(subject = %req.subject_id, key = %key))]
    pub async fn get(&self, req: &AccessRequest, key: &str) -> Result<Record, AccessError> {
        let user = self.initialize_request(req).await?;
        let key_field = self.key_field().await?;
        let item = self.find_in_scope(&user, key).await?;

        let mut entry = self.audit.entry(AuditAction::Get, req, &user);
        entry.resource = Some(resource(&key_field, key));
        self.audit.submit(entry).await;

        Ok(strip_excluded(item, &user))
    }

    /// Lists the items visible to the caller, narrowed by the request's
    /// query and path parameters.
    ///
    /// # Errors
    ///
    /// Authorization errors and store errors, including `BadRequest` when
    /// the store rejects a filter argument.
    #[tracing::instrument(skip_all, fields(subject = %req.subject_id, path = %req.path))]
    pub async fn list(&self, req: &AccessRequest) -> Result<Vec<Record>, AccessError> {
        let user = self.initialize_request(req).await?;
        let records = self.scan_for(&user, req).await?;

        self.audit
            .submit(self.audit.entry(AuditAction::List, req, &user))
            .await;
        Ok(post_process(records, &user))
    }

    /// Sorted distinct values of `field` across the items visible to the
    /// caller. Empty when the field is excluded for the caller.
    ///
    /// # Errors
    ///
    /// Same as [`Self::list`].
    #[tracing::instrument(skip_all, fields(subject = %req.subject_id, field = %field))]
    pub async fn list_unique_values(
        &self,
        req: &AccessRequest,
        field: &str,
    ) -> Result<Vec<String>, AccessError> {
        let user = self.initialize_request(req).await?;
        if user.permissions.exclude_fields.contains(field) {
            debug!("field is excluded for caller");
            return Ok(Vec::new());
        }
        let records = self.scan_for(&user, req).await?;

        let values: BTreeSet<String> = records
            .iter()
            .filter_map(|r| r.get(field))
            .filter(|v| !v.is_null())
            .map(|v| value_text(v).into_owned())
            .collect();

        self.audit
            .submit(self.audit.entry(AuditAction::List, req, &user))
            .await;
        Ok(values.into_iter().collect())
    }

    /// Applies the request body to the item stored under `key`.
    ///
    /// # Errors
    ///
    /// `BadRequest` for an empty body, a body naming the primary key or a
    /// validator rejection; `NotFound` when the item does not exist or is
    /// outside the caller's mandatory filters; `Unauthorized` when the update
    /// would move the item outside them. An item that leaves the filters
    /// through a concurrent write is put back as it was read.
    #[tracing::instrument(skip_all, fields(subject = %req.subject_id, key = %key))]
    pub async fn update(&self, req: &AccessRequest, key: &str) -> Result<Record, AccessError> {
        let user = self.initialize_request(req).await?;
        if req.body.is_empty() {
            return Err(AccessError::bad_request("Nothing to update"));
        }
        let key_field = self.key_field().await?;
        if req.body.contains_key(&key_field) {
            return Err(AccessError::bad_request(format!(
                "Primary key '{key_field}' cannot be updated"
            )));
        }

        let existing = self.find_in_scope(&user, key).await?;
        self.validator.validate_fields(&req.body, Some(&existing))?;

        let mut prospective = existing.clone();
        for (k, v) in &req.body {
            prospective.insert(k.clone(), Value::String(v.clone()));
        }
        ensure_in_scope(&user, &prospective)?;

        let updated = self.data.update(key, &req.body).await?;
        if let Err(e) = ensure_in_scope(&user, &updated) {
            // A concurrent write moved the item between the read and the update.
            self.data.put(existing).await?;
            return Err(e);
        }
        debug!("item updated");

        let mut entry = self.audit.entry(AuditAction::Update, req, &user);
        entry.resource = Some(resource(&key_field, key));
        entry.previous = Some(existing);
        entry.new = Some(updated.clone());
        self.audit.submit(entry).await;

        Ok(strip_excluded(updated, &user))
    }

    /// # Errors
    ///
    /// `NotFound` when the item does not exist or is outside the caller's
    /// mandatory filters.
    #[tracing::instrument(skip_all, fields(subject = %req.subject_id, key = %key))]
    pub async fn delete(&self, req: &AccessRequest, key: &str) -> Result<(), AccessError> {
        let user = self.initialize_request(req).await?;
        let key_field = self.key_field().await?;
        let existing = self.find_in_scope(&user, key).await?;

        self.data.delete(key).await?;
        debug!("item deleted");

        let mut entry = self.audit.entry(AuditAction::Delete, req, &user);
        entry.resource = Some(resource(&key_field, key));
        entry.previous = Some(existing);
        self.audit.submit(entry).await;
        Ok(())
    }

    async fn key_field(&self) -> Result<String, AccessError> {
        let described = self.data.describe_key_schema().await?;
        if described.is_empty() {
            Ok(self.default_primary_key.clone())
        } else {
            Ok(described)
        }
    }

    async fn scan_for(
        &self,
        user: &User,
        req: &AccessRequest,
    ) -> Result<Vec<Record>, AccessError> {
        let filter = build_filter(user, &req.query_params, &req.path_params);
        debug!(has_filter = filter.is_some(), "scanning data store");
        self.data.scan(filter.as_ref()).await
    }

    async fn find_in_scope(&self, user: &User, key: &str) -> Result<Record, AccessError> {
        let not_found = || AccessError::not_found(format!("Item '{key}' not found"));
        let item = self.data.get(key).await?.ok_or_else(not_found)?;
        if mandatory_filter(user).is_some_and(|scope| !scope.matches(&item)) {
            debug!(user = %user.identifier(), "item outside caller's filter");
            return Err(not_found());
        }
        Ok(item)
    }
}

fn ensure_in_scope(user: &User, item: &Record) -> Result<(), AccessError> {
    if let Some(scope) = mandatory_filter(user)
        && !scope.matches(item)
    {
        warn!(user = %user.identifier(), "item outside caller's filter");
        return Err(AccessError::unauthorized(format!(
            "User {} may not write items outside its filter",
            user.identifier()
        )));
    }
    Ok(())
}

fn resource(key_field: &str, key: &str) -> Params {
    Params::from([(key_field.to_owned(), key.to_owned())])
}
