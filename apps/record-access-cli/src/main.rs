mod config;
mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use record_access::{RecordAccessConfig, Service, UserResolver};
use record_access_sdk::{AccessError, AccessRequest, AuditSink, IdentityClaims};
use serde::Serialize;
use static_store_plugin::{MemoryAuditSink, StaticStore};

use crate::config::{AppConfig, TableOverrides};

/// Record access CLI - resolve identities and query the protected table
#[derive(Parser)]
#[command(name = "record-access-cli")]
#[command(about = "Record access CLI - resolve identities and query the protected table")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    tables: TableOverrides,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration and print it
    Check,
    /// Print the effective permissions of a subject
    Resolve {
        #[command(flatten)]
        caller: CallerArgs,
    },
    /// List the items visible to a subject
    List {
        #[command(flatten)]
        caller: CallerArgs,

        /// Request path checked against the permitted endpoints
        #[arg(long, default_value = "/items/")]
        path: String,

        /// Query parameter narrowing the listing (repeatable)
        #[arg(long = "query", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        query: Vec<(String, String)>,

        /// Print the distinct values of this field instead of the items
        #[arg(long)]
        unique: Option<String>,
    },
    /// Fetch a single item
    Get {
        #[command(flatten)]
        caller: CallerArgs,

        /// Primary key of the item
        #[arg(long)]
        key: String,

        /// Request path; defaults to `/items/<key>`
        #[arg(long)]
        path: Option<String>,
    },
}

/// Identity of the caller as an authenticating proxy would forward it.
#[derive(Args)]
struct CallerArgs {
    /// Subject id
    #[arg(long)]
    subject: String,

    /// Asserted group (repeatable)
    #[arg(long = "group")]
    groups: Vec<String>,

    /// Asserted username
    #[arg(long)]
    username: Option<String>,

    /// Asserted display name
    #[arg(long)]
    name: Option<String>,

    /// Asserted email
    #[arg(long)]
    email: Option<String>,
}

impl CallerArgs {
    fn claims(&self) -> Option<IdentityClaims> {
        if self.groups.is_empty()
            && self.username.is_none()
            && self.name.is_none()
            && self.email.is_none()
        {
            return None;
        }
        Some(IdentityClaims {
            username: self.username.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            groups: self.groups.clone(),
        })
    }

    fn request(&self, method: &str, path: &str) -> AccessRequest {
        let req = AccessRequest::new(&self.subject, method, path);
        match self.claims() {
            Some(claims) => req.with_claims(claims),
            None => req,
        }
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_owned(), v.trim().to_owned()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref(), &cli.tables)?;
    logging::init(&config.logging, cli.verbose);
    config.record_access.validate()?;

    tracing::debug!(
        data_table = %config.record_access.data_table,
        auth_table = %config.record_access.auth_table,
        group_table = %config.record_access.group_table,
        "configuration loaded"
    );

    match cli.command {
        Commands::Check => check_config(&config),
        Commands::Resolve { caller } => resolve(&config, &caller).await,
        Commands::List {
            caller,
            path,
            query,
            unique,
        } => list(&config, &caller, &path, query, unique.as_deref()).await,
        Commands::Get { caller, key, path } => {
            let path = path.unwrap_or_else(|| format!("/items/{key}"));
            get(&config, &caller, &path, &key).await
        }
    }
}

fn check_config(config: &AppConfig) -> Result<()> {
    tracing::info!("Checking configuration...");
    println!("Configuration is valid");
    print_json(config)
}

async fn resolve(config: &AppConfig, caller: &CallerArgs) -> Result<()> {
    let store = Arc::new(StaticStore::from_config(&config.static_store));
    let resolver = UserResolver::from_config(&config.record_access, store.clone(), store);
    let user = resolver
        .resolve(&caller.subject, caller.claims().as_ref())
        .await
        .map_err(access_error)?;
    record_access::validate_user(&user).map_err(access_error)?;
    print_json(&user)
}

async fn list(
    config: &AppConfig,
    caller: &CallerArgs,
    path: &str,
    query: Vec<(String, String)>,
    unique: Option<&str>,
) -> Result<()> {
    let runtime = Runtime::build(config);
    let mut req = caller.request("GET", path);
    req.query_params.extend(query);

    if let Some(field) = unique {
        let values = runtime
            .service
            .list_unique_values(&req, field)
            .await
            .map_err(access_error)?;
        runtime.report_audit();
        return print_json(&values);
    }
    let records = runtime.service.list(&req).await.map_err(access_error)?;
    runtime.report_audit();
    print_json(&records)
}

async fn get(config: &AppConfig, caller: &CallerArgs, path: &str, key: &str) -> Result<()> {
    let runtime = Runtime::build(config);
    let req = caller.request("GET", path);
    let item = runtime.service.get(&req, key).await.map_err(access_error)?;
    runtime.report_audit();
    print_json(&item)
}

/// Service wired to the static store, plus the audit sink when enabled.
struct Runtime {
    service: Service,
    audit: Option<Arc<MemoryAuditSink>>,
}

impl Runtime {
    fn build(config: &AppConfig) -> Self {
        let cfg: &RecordAccessConfig = &config.record_access;
        let store = Arc::new(StaticStore::from_config(&config.static_store));
        let audit = cfg
            .audit_table
            .as_deref()
            .map(|table| Arc::new(MemoryAuditSink::new(table)));
        let sink = audit.clone().map(|a| a as Arc<dyn AuditSink>);

        let service = Service::new(
            cfg,
            store.clone(),
            store.clone(),
            store,
            sink,
            config.validation_table(),
        );
        Self { service, audit }
    }

    fn report_audit(&self) {
        for line in self.audit_lines() {
            eprintln!("{line}");
        }
    }

    /// Recorded audit entries, one JSON document per line.
    fn audit_lines(&self) -> Vec<String> {
        let Some(audit) = &self.audit else {
            return Vec::new();
        };
        audit
            .entries()
            .iter()
            .filter_map(|entry| match serde_json::to_string(entry) {
                Ok(line) => Some(line),
                Err(e) => {
                    tracing::warn!(
                        table = %audit.table(),
                        error = %e,
                        "failed to render audit entry"
                    );
                    None
                }
            })
            .collect()
    }
}

fn access_error(e: AccessError) -> anyhow::Error {
    anyhow::anyhow!("{}: {}", e.kind(), e)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_pairs() {
        assert_eq!(
            parse_key_value("dept=finance").unwrap(),
            ("dept".to_owned(), "finance".to_owned())
        );
        assert_eq!(
            parse_key_value("note=a=b").unwrap(),
            ("note".to_owned(), "a=b".to_owned())
        );
        assert!(parse_key_value("dept").is_err());
        assert!(parse_key_value("=x").is_err());
    }

    #[test]
    fn cli_accepts_subcommands_and_overrides() {
        let cli = Cli::try_parse_from([
            "record-access-cli",
            "list",
            "--subject",
            "u1",
            "--group",
            "admins",
            "--query",
            "dept=finance",
            "--data-table",
            "items",
        ])
        .unwrap();

        assert_eq!(cli.tables.data_table.as_deref(), Some("items"));
        let Commands::List { caller, query, .. } = cli.command else {
            panic!("expected list");
        };
        assert_eq!(query, [("dept".to_owned(), "finance".to_owned())]);
        let claims = caller.claims().unwrap();
        assert_eq!(claims.groups, ["admins"]);
    }

    fn seeded_config(audit_table: Option<&str>) -> AppConfig {
        let mut config = AppConfig::default();
        config.record_access.data_table = "items".to_owned();
        config.record_access.auth_table = "auth".to_owned();
        config.record_access.group_table = "groups".to_owned();
        config.record_access.audit_table = audit_table.map(str::to_owned);
        config.static_store = serde_json::from_value(serde_json::json!({
            "identities": [{
                "id": "u1",
                "permitted_endpoints": [{"method": "GET", "endpoint": "/items/*"}]
            }],
            "items": [{"id": "1"}, {"id": "2"}]
        }))
        .unwrap();
        config
    }

    #[tokio::test]
    async fn audit_entries_are_rendered_when_enabled() {
        let runtime = Runtime::build(&seeded_config(Some("audit")));
        let req = AccessRequest::new("u1", "GET", "/items/");
        let records = runtime.service.list(&req).await.unwrap();
        assert_eq!(records.len(), 2);

        let lines = runtime.audit_lines();
        assert_eq!(lines.len(), 1);
        let entry: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(entry["user"]["id"], "u1");
        assert_eq!(entry["path"], "/items/");
    }

    #[tokio::test]
    async fn no_audit_lines_without_audit_table() {
        let runtime = Runtime::build(&seeded_config(None));
        let req = AccessRequest::new("u1", "GET", "/items/1");
        runtime.service.get(&req, "1").await.unwrap();
        assert!(runtime.audit_lines().is_empty());
    }

    #[test]
    fn no_claims_without_assertions() {
        let cli = Cli::try_parse_from(["record-access-cli", "resolve", "--subject", "u1"]).unwrap();
        let Commands::Resolve { caller } = cli.command else {
            panic!("expected resolve");
        };
        assert!(caller.claims().is_none());
    }
}
