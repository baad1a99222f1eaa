//! A single node: storage, role state, HTTP API and failover loop.

use std::sync::Arc;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::api::{self, handlers::AppState};
use crate::config::NodeConfig;
use crate::database::{self, Database, Executor};
use crate::error::{Error, Result};
use crate::network::ReplicationClient;
use crate::replication::{
    ElectionCoordinator, ElectionSettings, HttpProbe, LivenessProbe, LivenessProber,
    MetricsCollector, NodeState, ReplicationEvent, Replicator,
};

/// Capacity of the replication event channel
const EVENT_CAPACITY: usize = 256;

/// One replication node.
///
/// The same implementation runs as primary or replica; only the initial role
/// in [`NodeConfig`] differs.
#[derive(Debug)]
pub struct Node {
    config: NodeConfig,
    app: AppState,
    probe: Arc<dyn LivenessProbe>,
    coordinator: Arc<ElectionCoordinator>,
    event_tx: broadcast::Sender<ReplicationEvent>,
}

impl Node {
    /// Validates `config` and opens the configured engine
    pub async fn new(config: NodeConfig) -> Result<Self> {
        let config = config.validated()?;
        let db = database::connect(&config.database).await?;
        Self::build(config, db)
    }

    /// Like [`Node::new`] but over an already opened engine
    pub fn with_database(config: NodeConfig, db: Arc<dyn Database>) -> Result<Self> {
        Self::build(config.validated()?, db)
    }

    fn build(config: NodeConfig, db: Arc<dyn Database>) -> Result<Self> {
        let state = if config.bootstrap_primary {
            NodeState::primary(config.advertise.clone())
        } else {
            NodeState::replica(config.advertise.clone(), config.primary.clone())
        };

        let client = ReplicationClient::new()?;
        let metrics = Arc::new(MetricsCollector::new());
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let replicator = Replicator::new(
            client.clone(),
            config.peers.clone(),
            config.forward_timeout,
            metrics.clone(),
            event_tx.clone(),
        );

        let probe: Arc<dyn LivenessProbe> = Arc::new(HttpProbe::new(client, config.probe_timeout));
        let coordinator = Arc::new(ElectionCoordinator::new(
            state.clone(),
            probe.clone(),
            ElectionSettings {
                settle_delay: config.settle_delay,
                eligibility: config.eligibility.clone(),
                discover_primary: config.discover_primary,
                peers: config.peers.clone(),
            },
            metrics.clone(),
            event_tx.clone(),
        ));

        let app = AppState {
            node: state,
            executor: Executor::new(db, config.statement_guard),
            replicator,
            metrics,
            eligibility: config.eligibility.clone(),
        };

        Ok(Self {
            config,
            app,
            probe,
            coordinator,
            event_tx,
        })
    }

    /// Role state
    pub fn state(&self) -> &NodeState {
        &self.app.node
    }

    /// Replication counters
    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.app.metrics
    }

    /// Validated configuration
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Subscribes to replication events
    pub fn subscribe(&self) -> broadcast::Receiver<ReplicationEvent> {
        self.event_tx.subscribe()
    }

    /// HTTP routes of this node
    pub fn router(&self) -> Router {
        api::create_router(self.app.clone())
    }

    fn prober(&self) -> LivenessProber {
        LivenessProber::new(
            self.app.node.clone(),
            self.probe.clone(),
            self.coordinator.clone(),
            self.config.probe_interval,
            self.app.metrics.clone(),
            self.event_tx.clone(),
        )
    }

    /// Binds the configured listen address and serves until `shutdown`
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let listener = TcpListener::bind(self.config.listen).await.map_err(|e| {
            Error::network(format!("failed to bind to {}: {}", self.config.listen, e))
        })?;
        self.serve(listener, shutdown).await
    }

    /// Serves on `listener` until `shutdown` is cancelled.
    ///
    /// Replicas also run the liveness prober, which stops on shutdown or
    /// after promotion.
    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        let prober = if self.state().is_primary() {
            None
        } else {
            Some(tokio::spawn(self.prober().run(shutdown.child_token())))
        };

        let local_addr = listener.local_addr()?;
        tracing::info!(
            %local_addr,
            advertise = %self.config.advertise,
            role = %self.state().role(),
            primary = %self.state().primary_address(),
            peers = ?self.config.peers,
            "node listening"
        );

        let token = shutdown.clone();
        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await;

        shutdown.cancel();
        if let Some(prober) = prober {
            if let Err(e) = prober.await {
                tracing::warn!(error = %e, "liveness prober task failed");
            }
        }

        tracing::info!(%local_addr, "node stopped");
        result.map_err(Error::from)
    }
}
