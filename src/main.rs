use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{ArgAction, Parser};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use rhizome::database::{DatabaseConfig, DatabaseType, GuardMode};
use rhizome::{EligibilityPolicy, Node, NodeConfig};

#[derive(Parser, Debug)]
#[command(name = "rhizome", version, about = "Primary-replica relational replication with automatic failover")]
struct Args {
    /// Address to bind the HTTP server to
    #[arg(long, env = "RHIZOME_LISTEN", default_value = "127.0.0.1:8001")]
    listen: SocketAddr,

    /// Base URL other nodes use to reach this one (default: http://<listen>)
    #[arg(long, env = "RHIZOME_ADVERTISE")]
    advertise: Option<String>,

    /// Base URL of the primary (default: this node)
    #[arg(long, env = "RHIZOME_PRIMARY")]
    primary: Option<String>,

    /// Start as primary
    #[arg(long, env = "RHIZOME_BOOTSTRAP_PRIMARY", default_value_t = false)]
    bootstrap_primary: bool,

    /// Comma-separated base URLs of the other nodes
    #[arg(long, env = "RHIZOME_PEERS", value_delimiter = ',')]
    peers: Vec<String>,

    /// Milliseconds between liveness probes
    #[arg(long, env = "RHIZOME_PROBE_INTERVAL_MS", default_value_t = 10_000)]
    probe_interval_ms: u64,

    /// Timeout in milliseconds for probes, re-checks and primary discovery
    #[arg(long, env = "RHIZOME_PROBE_TIMEOUT_MS", default_value_t = 5_000)]
    probe_timeout_ms: u64,

    /// Milliseconds to wait before re-checking a silent primary
    #[arg(long, env = "RHIZOME_SETTLE_DELAY_MS", default_value_t = 2_000)]
    settle_delay_ms: u64,

    /// Timeout in milliseconds for each mutation forwarded to a replica
    #[arg(long, env = "RHIZOME_FORWARD_TIMEOUT_MS", default_value_t = 5_000)]
    forward_timeout_ms: u64,

    /// Promotion policy: always, never or designated:<address>
    #[arg(long, env = "RHIZOME_ELIGIBILITY", default_value = "always")]
    eligibility: EligibilityPolicy,

    /// Ask peers for an existing primary before promoting
    #[arg(long, env = "RHIZOME_DISCOVER_PRIMARY", default_value_t = true, action = ArgAction::Set)]
    discover_primary: bool,

    /// Parse spliced statements before execution: on or off
    #[arg(long, env = "RHIZOME_STATEMENT_GUARD", default_value = "on")]
    statement_guard: GuardMode,

    /// Storage backend: sqlite or postgres
    #[arg(long, env = "RHIZOME_BACKEND", default_value = "sqlite")]
    backend: DatabaseType,

    /// Directory for SQLite database files (in-memory when omitted)
    #[arg(long, env = "RHIZOME_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// PostgreSQL host
    #[arg(long, env = "RHIZOME_PG_HOST")]
    pg_host: Option<String>,

    /// PostgreSQL port
    #[arg(long, env = "RHIZOME_PG_PORT", default_value_t = 5432)]
    pg_port: u16,

    /// PostgreSQL user
    #[arg(long, env = "RHIZOME_PG_USER")]
    pg_user: Option<String>,

    /// PostgreSQL password
    #[arg(long, env = "RHIZOME_PG_PASSWORD", hide_env_values = true)]
    pg_password: Option<String>,

    /// PostgreSQL database holding one schema per logical database
    #[arg(long, env = "RHIZOME_PG_DATABASE", default_value = "rhizome")]
    pg_database: String,

    /// Emit logs as JSON
    #[arg(long, env = "RHIZOME_LOG_JSON", default_value_t = false)]
    log_json: bool,
}

impl Args {
    fn into_config(self) -> NodeConfig {
        let advertise = self
            .advertise
            .unwrap_or_else(|| format!("http://{}", self.listen));
        let primary = self.primary.unwrap_or_else(|| advertise.clone());

        let database = DatabaseConfig {
            db_type: self.backend,
            data_dir: self.data_dir,
            host: self.pg_host,
            port: Some(self.pg_port),
            user: self.pg_user,
            password: self.pg_password,
            database: self.pg_database,
            ..Default::default()
        };

        NodeConfig {
            listen: self.listen,
            advertise,
            primary,
            bootstrap_primary: self.bootstrap_primary,
            peers: self.peers.into_iter().filter(|p| !p.trim().is_empty()).collect(),
            probe_interval: Duration::from_millis(self.probe_interval_ms),
            probe_timeout: Duration::from_millis(self.probe_timeout_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            forward_timeout: Duration::from_millis(self.forward_timeout_ms),
            eligibility: self.eligibility,
            discover_primary: self.discover_primary,
            statement_guard: self.statement_guard,
            database,
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rhizome=info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }

    tracing::info!("Shutting down gracefully, draining in-flight requests...");
    token.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let node = Node::new(args.into_config())
        .await
        .context("failed to start node")?;

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    node.run(shutdown).await.context("server error")?;
    Ok(())
}
