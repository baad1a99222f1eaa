#![allow(dead_code)]

use std::time::Duration;

use reqwest::{redirect, Client};
use rhizome::replication::ReplicationEvent;
use rhizome::{Node, NodeConfig, NodeState};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A node serving on an ephemeral port.
pub struct TestNode {
    pub addr: String,
    pub state: NodeState,
    pub events: broadcast::Receiver<ReplicationEvent>,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl TestNode {
    /// Stops the node and waits for its server to exit.
    pub async fn stop(self) {
        self.shutdown.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}

/// Binds an ephemeral port and returns the listener with its base URL.
pub async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = format!("http://{}", listener.local_addr().unwrap());
    (listener, addr)
}

/// Configuration with short timers for a node advertised at `addr`.
pub fn config(addr: &str, primary: &str, peers: &[&str]) -> NodeConfig {
    NodeConfig {
        advertise: addr.to_string(),
        primary: primary.to_string(),
        peers: peers.iter().map(|p| p.to_string()).collect(),
        probe_interval: Duration::from_secs(60),
        probe_timeout: Duration::from_millis(300),
        settle_delay: Duration::from_millis(100),
        forward_timeout: Duration::from_secs(2),
        ..Default::default()
    }
}

/// Starts a node on an already bound listener.
pub async fn spawn(listener: TcpListener, config: NodeConfig) -> TestNode {
    let node = Node::new(config).await.expect("Failed to build node");
    let addr = node.config().advertise.clone();
    let state = node.state().clone();
    let events = node.subscribe();

    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    let handle = tokio::spawn(async move {
        node.serve(listener, token).await.unwrap();
    });

    TestNode {
        addr,
        state,
        events,
        shutdown,
        handle,
    }
}

/// Client that does not follow redirects.
pub fn client() -> Client {
    Client::builder()
        .redirect(redirect::Policy::none())
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// Waits for `n` forwarded-mutation events.
pub async fn forwarded(events: &mut broadcast::Receiver<ReplicationEvent>, n: usize) -> Vec<(String, ReplicationEvent)> {
    let mut seen = Vec::new();
    while seen.len() < n {
        let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for replication")
            .expect("event channel closed");
        if let ReplicationEvent::MutationForwarded { replica, .. } = &event {
            seen.push((replica.clone(), event.clone()));
        }
    }
    seen
}

/// Polls `check` every 50ms until it holds or `limit` passes.
pub async fn eventually<F, Fut>(limit: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}
