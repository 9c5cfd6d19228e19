#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

//! Common test utilities for record-access integration tests

use std::sync::Arc;

use record_access::{RecordAccessConfig, Service};
use record_access_sdk::{AccessRequest, Fields, Record, ValidationTable, Verdict};
use serde_json::{Value, json};
use static_store_plugin::{MemoryAuditSink, StaticStore, StaticStorePluginConfig};

pub struct Fixture {
    pub service: Service,
    pub store: Arc<StaticStore>,
    pub audit: Arc<MemoryAuditSink>,
}

pub fn config() -> RecordAccessConfig {
    RecordAccessConfig {
        data_table: "items".to_owned(),
        auth_table: "auth".to_owned(),
        group_table: "groups".to_owned(),
        audit_table: Some("audit".to_owned()),
        ..RecordAccessConfig::default()
    }
}

/// Only `"hello"` is an acceptable `value`.
pub fn validations() -> ValidationTable {
    ValidationTable::builder()
        .field(
            "value",
            |value: &str, _: &Fields, _: Option<&Record>| -> anyhow::Result<Verdict> {
                if value == "hello" {
                    Ok(Verdict::Accepted)
                } else {
                    Ok(Verdict::rejected(format!(
                        "Invalid value '{value}' for attribute 'value'"
                    )))
                }
            },
        )
        .build()
}

pub fn fixture_with(cfg: &RecordAccessConfig, seed: Value) -> Fixture {
    let seed: StaticStorePluginConfig = serde_json::from_value(seed).unwrap();
    let store = Arc::new(StaticStore::from_config(&seed));
    let audit = Arc::new(MemoryAuditSink::new("audit"));
    let service = Service::new(
        cfg,
        store.clone(),
        store.clone(),
        store.clone(),
        Some(audit.clone()),
        validations(),
    );
    Fixture {
        service,
        store,
        audit,
    }
}

pub fn fixture(seed: Value) -> Fixture {
    fixture_with(&config(), seed)
}

/// A finance clerk, an auditor group asserted by the identity provider and a
/// small data table spanning two departments.
pub fn default_seed() -> Value {
    json!({
        "identities": [
            {
                "id": "clerk",
                "username": "carol",
                "groups": ["finance-team"],
                "permitted_endpoints": [
                    {"method": "GET", "endpoint": "/items/*"},
                    {"method": "POST", "endpoint": "/items/"},
                    {"method": "PUT", "endpoint": "/items/*"},
                    {"method": "DELETE", "endpoint": "/items/*"}
                ],
                "update_fields_restricted": ["owner", "approved"],
                "update_fields_permitted": ["approved"]
            },
            {
                "id": "auditors",
                "permitted_endpoints": [{"method": "GET", "endpoint": "/items/*"}],
                "exclude_fields": ["amount"]
            }
        ],
        "groups": [
            {
                "group_id": "finance-team",
                "exclude_fields": ["ssn"],
                "filter_fields": [{"field": "dept", "value": "finance"}]
            }
        ],
        "items": [
            {"id": "1", "dept": "finance", "owner": "carol", "amount": "10", "ssn": "111"},
            {"id": "2", "dept": "engineering", "owner": "dave", "amount": "20", "ssn": "222"},
            {"id": "3", "dept": "finance", "owner": "erin", "amount": "30", "ssn": "333"}
        ]
    })
}

pub fn body(pairs: &[(&str, &str)]) -> Fields {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

pub fn request(subject: &str, method: &str, path: &str) -> AccessRequest {
    AccessRequest::new(subject, method, path)
}
