//! Per-field validation functions supplied by the hosting application.
//!
//! The table is built once at startup and is immutable afterwards; the engine
//! receives it at construction time.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::models::{Fields, Record};

/// Outcome of a field validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    /// Rejected with a message surfaced to the caller as a bad request.
    Rejected(String),
}

impl Verdict {
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Verdict::Rejected(message.into())
    }
}

/// Validates a single body field.
///
/// Receives the submitted value, the full submitted body and, for updates,
/// the item as it currently exists in the store. An `Err` is treated as an
/// internal failure, not as a rejection.
pub trait FieldValidator: Send + Sync {
    /// # Errors
    ///
    /// Returns an error when the validator itself fails to run.
    fn validate(
        &self,
        value: &str,
        item: &Fields,
        existing: Option<&Record>,
    ) -> anyhow::Result<Verdict>;
}

impl<F> FieldValidator for F
where
    F: Fn(&str, &Fields, Option<&Record>) -> anyhow::Result<Verdict> + Send + Sync,
{
    fn validate(
        &self,
        value: &str,
        item: &Fields,
        existing: Option<&Record>,
    ) -> anyhow::Result<Verdict> {
        self(value, item, existing)
    }
}

/// Immutable mapping `field name -> validator`.
#[derive(Clone, Default)]
pub struct ValidationTable {
    validators: Arc<HashMap<String, Arc<dyn FieldValidator>>>,
}

impl ValidationTable {
    #[must_use]
    pub fn builder() -> ValidationTableBuilder {
        ValidationTableBuilder::default()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&dyn FieldValidator> {
        self.validators.get(field).map(AsRef::as_ref)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

impl fmt::Debug for ValidationTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields: Vec<&str> = self.validators.keys().map(String::as_str).collect();
        fields.sort_unstable();
        f.debug_struct("ValidationTable")
            .field("fields", &fields)
            .finish()
    }
}

/// Builder for [`ValidationTable`].
#[derive(Default)]
pub struct ValidationTableBuilder {
    validators: HashMap<String, Arc<dyn FieldValidator>>,
}

impl ValidationTableBuilder {
    /// Registers `validator` for `field`, replacing any earlier registration.
    #[must_use]
    pub fn field(
        mut self,
        field: impl Into<String>,
        validator: impl FieldValidator + 'static,
    ) -> Self {
        self.validators.insert(field.into(), Arc::new(validator));
        self
    }

    #[must_use]
    pub fn build(self) -> ValidationTable {
        ValidationTable {
            validators: Arc::new(self.validators),
        }
    }
}
