//! Record Access Module
//!
//! Authorization and filter resolution for CRUD access to a protected data
//! table. A request is handled as
//!
//! identity -> [`UserResolver`] -> [`RequestValidator`] -> filter building ->
//! data store -> post-processing -> audit
//!
//! The backing stores are reached through the collaborator traits of
//! `record_access_sdk`; [`Service`] wires everything together.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod claims;
pub mod config;
pub mod domain;

pub use claims::ClaimsFromHeaders;
pub use config::{GroupExpansion, OidcHeaders, RecordAccessConfig};
pub use domain::audit::AuditLogger;
pub use domain::filter::{build_filter, mandatory_filter};
pub use domain::merge::merge_permissions;
pub use domain::post_process::post_process;
pub use domain::resolver::UserResolver;
pub use domain::service::Service;
pub use domain::validator::{RequestValidator, validate_user};
