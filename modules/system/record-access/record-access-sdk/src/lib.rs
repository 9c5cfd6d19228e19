//! Record Access SDK
//!
//! This crate provides the public contract for the `record_access` module:
//!
//! - [`User`], [`Group`], [`PermissionSet`] - Identity and permission models
//! - [`AccessRequest`], [`IdentityClaims`] - Request model handed over by the transport
//! - [`FilterExpr`], [`FilterCondition`], [`MatchType`] - Backend-neutral filter expressions
//! - [`ValidationTable`], [`FieldValidator`] - Per-field body validation supplied at startup
//! - [`IdentityStore`], [`GroupStore`], [`DataStore`], [`AuditSink`] - Collaborator traits
//! - [`AccessError`], [`ErrorKind`] - Error taxonomy
//!
//! ## Usage
//!
//! ```ignore
//! use record_access_sdk::{AccessRequest, IdentityClaims};
//!
//! let req = AccessRequest::new("u1", "GET", "/items/")
//!     .with_claims(IdentityClaims::default().with_groups(["admins"]));
//!
//! let records = service.list(&req).await?;
//! ```

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod api;
pub mod error;
pub mod filter;
pub mod models;
pub mod validation;

// Re-export main types at crate root
pub use api::{AuditSink, DataStore, GroupStore, IdentityStore};
pub use error::{AccessError, ErrorKind};
pub use filter::FilterExpr;
pub use models::{
    AccessRequest, AuditAction, AuditEntry, AuditUser, Fields, FilterCondition, Group,
    IdentityClaims, MatchType, Params, PermissionSet, PermittedEndpoint, Record, User,
};
pub use validation::{FieldValidator, ValidationTable, ValidationTableBuilder, Verdict};
