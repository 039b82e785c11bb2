//! Febula Server: Application entry point.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use febula_core::error::FebulaError;
use febula_core::models::context::CallerContext;
use febula_core::models::filter_rule::PermissionSet;
use febula_db::{DbConfig, DbManager};
use febula_filters::{FilterEngine, FiltersConfig, Method, Router};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "febula")]
#[command(about = "Filter chain validation, seeding and sync visualization", version)]
struct Cli {
    /// SurrealDB WebSocket address
    #[arg(long, env = "FEBULA_DB_URL", default_value = "127.0.0.1:8000")]
    db_url: String,

    #[arg(long, env = "FEBULA_DB_NAMESPACE", default_value = "febula")]
    db_namespace: String,

    #[arg(long, env = "FEBULA_DB_DATABASE", default_value = "filters")]
    db_database: String,

    #[arg(long, env = "FEBULA_DB_USERNAME", default_value = "root")]
    db_username: String,

    #[arg(long, env = "FEBULA_DB_PASSWORD", default_value = "root", hide_env_values = true)]
    db_password: String,

    /// Identity of this service; rows it owns are locked for regular callers
    #[arg(long, env = "FEBULA_CALLER_ID", default_value = "febula")]
    caller_id: String,

    /// Owner allowed to delegate writes, as OWNER=SECRET (repeatable)
    #[arg(
        long = "trusted-owner",
        env = "FEBULA_TRUSTED_OWNERS",
        value_delimiter = ',',
        value_parser = parse_trusted_owner,
        hide_env_values = true
    )]
    trusted_owners: Vec<(String, String)>,

    /// Concurrent writes during bulk soft-delete
    #[arg(long, env = "FEBULA_MAX_PARALLEL_WRITES", default_value_t = 10)]
    max_parallel_writes: usize,

    /// Concurrent writes while seeding and backfilling
    #[arg(long, env = "FEBULA_BOOTSTRAP_PARALLELISM", default_value_t = 5)]
    bootstrap_parallelism: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Seed the basic filter objects and their rules
    Install,
    /// Backfill permission sets on legacy rules, then install
    Upgrade,
    /// Print how every resource is scoped per role
    Visualize {
        #[arg(long, default_value = "Sync", value_parser = parse_permission_set)]
        permission_set: PermissionSet,
        /// Case-insensitive resource name filter
        #[arg(long)]
        search: Option<String>,
        /// Render nested HTML lists instead of indented text
        #[arg(long)]
        html: bool,
    },
    /// Dispatch one request and print the JSON response
    Call {
        endpoint: String,
        #[arg(long, default_value = "GET", value_parser = parse_method)]
        method: Method,
        /// JSON body or query
        #[arg(long)]
        payload: Option<String>,
        /// Owner the request acts for, when delegated
        #[arg(long, requires = "secret")]
        owner: Option<String>,
        #[arg(long)]
        secret: Option<String>,
    },
}

fn parse_trusted_owner(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((owner, secret)) if !owner.is_empty() && !secret.is_empty() => {
            Ok((owner.to_string(), secret.to_string()))
        }
        _ => Err(format!("expected OWNER=SECRET, got {value}")),
    }
}

fn parse_permission_set(value: &str) -> Result<PermissionSet, String> {
    PermissionSet::parse(value).ok_or_else(|| format!("unknown permission set {value}"))
}

fn parse_method(value: &str) -> Result<Method, String> {
    Method::parse(value).ok_or_else(|| format!("unsupported method {value}"))
}

impl Cli {
    fn db_config(&self) -> DbConfig {
        DbConfig {
            url: self.db_url.clone(),
            namespace: self.db_namespace.clone(),
            database: self.db_database.clone(),
            username: self.db_username.clone(),
            password: self.db_password.clone(),
        }
    }

    fn filters_config(&self) -> FiltersConfig {
        let config = FiltersConfig {
            max_parallel_writes: self.max_parallel_writes,
            bootstrap_parallelism: self.bootstrap_parallelism,
            ..Default::default()
        };
        self.trusted_owners
            .iter()
            .fold(config, |config, (owner, secret)| {
                config.with_trusted_owner(owner, secret)
            })
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let db = DbManager::connect(&cli.db_config()).await?;
    let engine = FilterEngine::new(
        db.resource_catalog(),
        db.filter_objects(),
        db.filter_rules(),
        cli.filters_config(),
    );
    let ctx = CallerContext::direct(cli.caller_id.clone());

    match cli.command {
        Command::Install => {
            let report = febula_filters::install(&engine, &ctx).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Upgrade => {
            let report = febula_filters::upgrade(&engine, &ctx).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Visualize {
            permission_set,
            search,
            html,
        } => {
            let rows = engine.visualize(permission_set, search.as_deref()).await?;
            info!(rows = rows.len(), %permission_set, "Sync visualization rendered");
            for row in rows {
                println!("# {} / {}", row.resource, row.employee_type);
                if html {
                    println!("{}\n", row.render_html());
                } else {
                    println!("{}\n", row.render_text());
                }
            }
        }
        Command::Call {
            endpoint,
            method,
            payload,
            owner,
            secret,
        } => {
            let payload = match payload {
                Some(raw) => serde_json::from_str(&raw)?,
                None => serde_json::Value::Null,
            };
            let ctx = match owner {
                Some(owner) => CallerContext::delegated(cli.caller_id, owner, secret),
                None => ctx,
            };
            let response = Router::new(engine)
                .handle(&ctx, &endpoint, method, payload)
                .await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("febula=info"));
    tracing_subscriber::fmt().with_env_filter(filter).json().init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<FebulaError>() {
                Some(rejection) if rejection.is_validation() => {
                    warn!(error = %rejection, "Request rejected")
                }
                _ => error!(error = %err, "Febula command failed"),
            }
            ExitCode::FAILURE
        }
    }
}
