//! iplb-frontend: manage and sweep IP load-balancer HTTP frontends.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tabled::{Table, Tabled};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use iplb_frontend::config::{DEFAULT_ENDPOINT, DEFAULT_TEST_PREFIX};
use iplb_frontend::{
    ApiConfig, FrontendId, FrontendReconciler, FrontendSpec, FrontendState, PortList, Reconciler,
    RestClient, RetryConfig, SweepConfig, Sweeper,
};

/// IP load-balancer HTTP frontend tool
#[derive(Parser, Debug)]
#[command(name = "iplb-frontend", version, about)]
struct Cli {
    #[command(flatten)]
    api: ApiArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct ApiArgs {
    /// API root URL
    #[arg(long, env = "IPLB_API_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Bearer token for the API
    #[arg(long, env = "IPLB_API_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, env = "IPLB_API_TIMEOUT", default_value = "30")]
    timeout_secs: u64,

    /// Load-balancer service name
    #[arg(long, env = "OVH_IPLB_SERVICE_TEST")]
    service: Option<String>,

    /// Display-name prefix of frontends owned by test runs
    #[arg(long, env = "IPLB_TEST_PREFIX", default_value = DEFAULT_TEST_PREFIX)]
    prefix: String,

    /// Wall-clock budget in seconds for retried deletes
    #[arg(long, env = "IPLB_RETRY_BUDGET", default_value = "300")]
    retry_budget_secs: u64,
}

impl ApiArgs {
    fn api_config(&self) -> ApiConfig {
        let config = ApiConfig::new(&self.endpoint).with_timeout(Duration::from_secs(self.timeout_secs));
        match &self.token {
            Some(token) => config.with_token(token),
            None => config,
        }
    }

    fn retry_config(&self) -> RetryConfig {
        RetryConfig::with_budget(Duration::from_secs(self.retry_budget_secs))
    }

    fn require_service(&self) -> Result<&str> {
        self.service
            .as_deref()
            .context("No service given; pass --service or set OVH_IPLB_SERVICE_TEST")
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List frontends of the service
    List,

    /// Show one frontend
    Get {
        /// Frontend ID
        id: FrontendId,
    },

    /// Create a frontend
    Create(SpecArgs),

    /// Replace a frontend with the given attributes
    Update {
        /// Frontend ID
        id: FrontendId,

        #[command(flatten)]
        spec: SpecArgs,
    },

    /// Delete a frontend, retrying transient failures
    Delete {
        /// Frontend ID
        id: FrontendId,
    },

    /// Delete every frontend whose display name carries the test prefix
    Sweep {
        /// Only report what would be deleted
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Args, Debug)]
struct SpecArgs {
    /// Display name
    #[arg(long)]
    display_name: Option<String>,

    /// Zone (all, gra, rbx, ...)
    #[arg(long, default_value = "all")]
    zone: String,

    /// Ports and port ranges, e.g. 80,443 or 8000-8010
    #[arg(long)]
    port: PortList,

    /// Terminate TLS
    #[arg(long)]
    ssl: bool,

    /// Create administratively disabled
    #[arg(long)]
    disabled: bool,

    /// Send Strict-Transport-Security (requires --ssl)
    #[arg(long)]
    hsts: bool,

    /// Allowed client CIDR (repeatable)
    #[arg(long = "allowed-source")]
    allowed_source: Vec<String>,

    /// Dedicated failover IP (repeatable)
    #[arg(long = "dedicated-ipfo")]
    dedicated_ipfo: Vec<String>,

    /// Header injection template, e.g. "X-Ip-Header %ci" (repeatable)
    #[arg(long = "http-header")]
    http_header: Vec<String>,

    /// Default farm ID
    #[arg(long)]
    default_farm_id: Option<i64>,

    /// Default SSL certificate ID
    #[arg(long)]
    default_ssl_id: Option<i64>,

    /// Redirect every request to this URL
    #[arg(long)]
    redirect_location: Option<String>,
}

impl SpecArgs {
    fn into_spec(self, service: &str) -> FrontendSpec {
        FrontendSpec {
            service_name: service.to_string(),
            display_name: self.display_name,
            zone: self.zone,
            port: self.port,
            ssl: self.ssl,
            disabled: self.disabled,
            hsts: self.hsts,
            allowed_source: self.allowed_source,
            dedicated_ipfo: self.dedicated_ipfo,
            http_header: self.http_header,
            default_farm_id: self.default_farm_id,
            default_ssl_id: self.default_ssl_id,
            redirect_location: self.redirect_location,
        }
    }
}

#[derive(Tabled)]
struct FrontendRow {
    #[tabled(rename = "ID")]
    id: FrontendId,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "ZONE")]
    zone: String,
    #[tabled(rename = "PORT")]
    port: String,
    #[tabled(rename = "SSL")]
    ssl: bool,
    #[tabled(rename = "DISABLED")]
    disabled: bool,
}

impl From<FrontendState> for FrontendRow {
    fn from(f: FrontendState) -> Self {
        Self {
            id: f.id,
            name: f.display_name.unwrap_or_else(|| "-".to_string()),
            zone: f.zone,
            port: f.port.to_wire(),
            ssl: f.ssl,
            disabled: f.disabled,
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to render output")?
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "iplb_frontend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let api = cli.api;

    let client = RestClient::new(&api.api_config()).context("Failed to build HTTP client")?;
    let reconciler = FrontendReconciler::new(Arc::new(client));

    match cli.command {
        Commands::List => {
            let service = api.require_service()?;
            let ids = reconciler.list(service).await?;
            if ids.is_empty() {
                println!("No frontends found");
            } else {
                let mut rows = Vec::with_capacity(ids.len());
                for id in ids {
                    rows.push(FrontendRow::from(reconciler.read(service, id).await?));
                }
                println!("{}", Table::new(rows));
            }
        }

        Commands::Get { id } => {
            let service = api.require_service()?;
            print_json(&reconciler.read(service, id).await?)?;
        }

        Commands::Create(spec) => {
            let service = api.require_service()?;
            let state = reconciler.create(&spec.into_spec(service)).await?;
            info!(frontend_id = state.id, "Created frontend");
            print_json(&state)?;
        }

        Commands::Update { id, spec } => {
            let service = api.require_service()?;
            let state = reconciler.update(service, id, &spec.into_spec(service)).await?;
            print_json(&state)?;
        }

        Commands::Delete { id } => {
            let service = api.require_service()?;
            let outcome = reconciler
                .delete_with_retry(service, id, &api.retry_config())
                .await?;
            println!("Deleted frontend {} ({:?})", id, outcome);
        }

        Commands::Sweep { dry_run } => {
            let config = SweepConfig::new(api.service.clone())
                .with_prefix(&api.prefix)
                .with_retry(api.retry_config())
                .dry_run(dry_run);
            let report = Sweeper::new(reconciler, config).sweep().await?;
            print_json(&report)?;
        }
    }

    Ok(())
}
