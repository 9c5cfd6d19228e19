//! Static Store Plugin
//!
//! In-memory backends for the record access module, seeded from
//! configuration. Useful for testing, development, and the CLI.
//!
//! ## Configuration
//!
//! ```yaml
//! static_store:
//!   primary_key: "id"
//!   identities:
//!     - id: "u1"
//!       username: "alice"
//!       groups: ["finance-team"]
//!       permitted_endpoints:
//!         - { method: "GET", endpoint: "/items/*" }
//!   groups:
//!     - group_id: "finance-team"
//!       filter_fields:
//!         - { field: "dept", value: "finance" }
//!   items:
//!     - { id: "1", dept: "finance", amount: "10" }
//! ```

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod audit;
pub mod config;
pub mod domain;

pub use audit::MemoryAuditSink;
pub use config::StaticStorePluginConfig;
pub use domain::service::StaticStore;
