//! examdesk - command-line client for the exam administration dashboard.
//!
//! Every command runs through the same cached stores, route guard and
//! prefetch scheduler the dashboard uses, backed by files under the user
//! cache directory.

use std::io;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use examdesk_core::api::ApiClient;
use examdesk_core::auth::{Admission, CredentialStore};
use examdesk_core::cache::{FileStorage, StorageMedium, TtlStore};
use examdesk_core::dashboard::{
    AdminDashboard, DashboardResource, ExamTablesStore, DASHBOARD_NAMESPACE, TABLES_NAMESPACE,
};
use examdesk_core::models::Payload;
use examdesk_core::navigator::Navigator;
use examdesk_core::prefetch::{select_idle_scheduler, IdleSignal, PrefetchScheduler};
use examdesk_core::routes::RouteTable;
use examdesk_core::Config;

// ============================================================================
// Constants
// ============================================================================

/// When set, logs are also written to a daily rolling file in this directory
const LOG_DIR_ENV: &str = "EXAMDESK_LOG_DIR";

const LOG_FILE_PREFIX: &str = "examdesk.log";

/// Route whose prefetch warms the exam tables cache
const TABLES_ROUTE: &str = "/admin/administration-tables";

const USAGE: &str = "\
Usage: examdesk <command> [args]

Commands:
  login <token>                       Store the access token
  logout                              Remove the token and all cached data
  whoami                              Show the authenticated user
  navigate <path>                     Check admission for a path and warm its neighbours
  performance <career_id> [--refresh] Global performance of a career
  prediction <career_id> [--refresh]  Performance prediction of a career
  registrations <career_id> [--refresh]
                                      Registration percentage of a career
  tables [--refresh]                  Exam tables grouped by career
  delete-table <id>                   Delete an exam table
  clear [namespace]                   Clear cached data (adminDashboard, adminTables or all)";

/// Initialize the tracing subscriber for logging.
///
/// The returned guard flushes the file writer and must live until exit.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(LOG_DIR_ENV) {
        Ok(dir) if !dir.trim().is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

/// Everything a command needs, wired over one storage medium.
struct Services {
    credentials: CredentialStore,
    api: ApiClient,
    dashboard: AdminDashboard,
    tables: Arc<ExamTablesStore>,
    navigator: Navigator,
    idle_signal: Option<IdleSignal>,
}

impl Services {
    fn build(config: &Config) -> Result<Self> {
        let storage_dir = config.storage_dir()?;
        let medium: Arc<dyn StorageMedium> = Arc::new(
            FileStorage::new(storage_dir.clone())
                .with_context(|| format!("Could not open storage at {}", storage_dir.display()))?,
        );

        let credentials = CredentialStore::new(medium.clone());
        let mut api = ApiClient::new(config.api_base_url.clone())?;
        if let Some(token) = credentials.token() {
            api.set_token(token);
        }
        let backend = Arc::new(api.clone());

        let dashboard = AdminDashboard::new(
            TtlStore::new(medium.clone(), DASHBOARD_NAMESPACE, config.ttl.dashboard()),
            backend.clone(),
        );
        let tables = Arc::new(ExamTablesStore::new(
            TtlStore::new(medium, TABLES_NAMESPACE, config.ttl.tables()),
            backend,
        ));

        let routes = RouteTable::with_known_routes().warm_with(TABLES_ROUTE, tables.clone());
        let (idle, idle_signal) = select_idle_scheduler(
            config.prefetch.strategy,
            config.prefetch.idle_timeout(),
            config.prefetch.fallback_delay(),
        );
        let scheduler =
            PrefetchScheduler::new(Arc::new(routes), idle, config.prefetch.max_concurrent);
        let navigator = Navigator::new(
            credentials.clone(),
            scheduler,
            origin_host(&config.api_base_url),
        );

        Ok(Self {
            credentials,
            api,
            dashboard,
            tables,
            navigator,
            idle_signal,
        })
    }

    /// Give pending prefetches their idle slot and wait for them to finish.
    async fn settle(&self) {
        tokio::task::yield_now().await;
        if let Some(ref signal) = self.idle_signal {
            signal.notify_idle();
        }
        self.navigator.scheduler().wait_until_settled().await;
    }
}

/// Host part of a base URL, e.g. `127.0.0.1:8000`.
fn origin_host(base_url: &str) -> &str {
    let rest = base_url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(base_url);
    rest.split('/').next().unwrap_or(rest)
}

fn print_payload(payload: Option<Payload>, error: Option<String>) -> Result<()> {
    match (payload, error) {
        (Some(payload), _) => {
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(())
        }
        (None, Some(message)) => bail!(message),
        (None, None) => {
            println!("No data");
            Ok(())
        }
    }
}

fn report_cache_age(age: Option<String>) {
    if let Some(age) = age {
        eprintln!("Cached {}", age);
    }
}

fn required<'a>(args: &'a [String], index: usize, what: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .with_context(|| format!("Missing {}\n\n{}", what, USAGE))
}

async fn run(command: &str, args: &[String], services: &Services) -> Result<()> {
    let refresh = args.iter().any(|a| a == "--refresh");

    match command {
        "login" => {
            let token = required(args, 0, "token")?;
            services.credentials.store(token)?;
            let admission = services.navigator.navigate("/login");
            match admission.redirect_path() {
                Some(home) => println!("Logged in, home is {}", home),
                None => bail!("Token was rejected: it does not name a known role"),
            }
        }
        "logout" => {
            services.credentials.clear();
            services.dashboard.reset_all();
            services.tables.clear_cache();
            println!("Logged out");
        }
        "whoami" => {
            if !services.credentials.has_credential() {
                bail!("Not logged in");
            }
            let user = services
                .api
                .fetch_current_user()
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            println!(
                "{} ({}){}",
                user.name.as_deref().unwrap_or(&user.username),
                user.role,
                user.email.map(|e| format!(" <{}>", e)).unwrap_or_default()
            );
        }
        "navigate" => {
            let path = required(args, 0, "path")?;
            match services.navigator.navigate(path) {
                Admission::Allow => println!("Allowed {}", path),
                other => match other.redirect_path() {
                    Some(to) => println!("Redirected to {}", to),
                    None => println!("Allowed {}", path),
                },
            }
        }
        "performance" | "prediction" | "registrations" => {
            let resource = match command {
                "performance" => DashboardResource::GlobalPerformance,
                "prediction" => DashboardResource::Prediction,
                _ => DashboardResource::Registrations,
            };
            let career_id = required(args, 0, "career id")?;
            let payload = services
                .dashboard
                .fetch(resource, career_id, refresh)
                .await;
            let cell = services.dashboard.cell(resource);
            report_cache_age(cell.cache_age(career_id.trim()));
            print_payload(payload, cell.error())?;
        }
        "tables" => {
            let payload = services.tables.fetch_exam_tables_grouped(refresh).await;
            report_cache_age(services.tables.cell().cache_age(""));
            print_payload(payload, services.tables.cell().error())?;
        }
        "delete-table" => {
            let id: i64 = required(args, 0, "table id")?
                .parse()
                .context("Table id must be a number")?;
            services
                .tables
                .delete_exam_table(id)
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            println!("Deleted exam table {}", id);
        }
        "clear" => match args.first().map(String::as_str) {
            None | Some("all") => {
                services.dashboard.reset_all();
                services.tables.clear_cache();
                println!("Cleared all cached data");
            }
            Some(DASHBOARD_NAMESPACE) => {
                services.dashboard.reset_all();
                println!("Cleared {}", DASHBOARD_NAMESPACE);
            }
            Some(TABLES_NAMESPACE) => {
                services.tables.clear_cache();
                println!("Cleared {}", TABLES_NAMESPACE);
            }
            Some(other) => bail!("Unknown namespace: {}", other),
        },
        "help" | "--help" | "-h" => println!("{}", USAGE),
        other => bail!("Unknown command: {}\n\n{}", other, USAGE),
    }

    services.settle().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _log_guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        println!("{}", USAGE);
        return Ok(());
    };

    let config = Config::load()?;
    info!(api = %config.api_base_url, command = %command, "examdesk starting");
    let services = Services::build(&config)?;

    run(command, rest, &services).await
}
