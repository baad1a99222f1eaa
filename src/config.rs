//! Node configuration.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::database::{DatabaseConfig, GuardMode};
use crate::error::{Error, Result};

/// Which replicas may promote themselves when the primary disappears
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EligibilityPolicy {
    /// Promote unconditionally
    #[default]
    Always,
    /// Never promote; a pure read replica
    Never,
    /// Promote only if this node's address is the designated successor
    Designated(String),
}

impl EligibilityPolicy {
    /// Whether a node advertising `self_address` may promote itself
    pub fn allows(&self, self_address: &str) -> bool {
        match self {
            EligibilityPolicy::Always => true,
            EligibilityPolicy::Never => false,
            EligibilityPolicy::Designated(successor) => successor == self_address,
        }
    }
}

impl FromStr for EligibilityPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "always" => return Ok(EligibilityPolicy::Always),
            "never" => return Ok(EligibilityPolicy::Never),
            _ => {}
        }
        match s.split_once(':') {
            Some((prefix, addr)) if prefix.eq_ignore_ascii_case("designated") => {
                Ok(EligibilityPolicy::Designated(normalize_address(addr)?))
            }
            _ => Err(Error::config(format!("unknown eligibility policy: {}", s))),
        }
    }
}

impl fmt::Display for EligibilityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EligibilityPolicy::Always => write!(f, "always"),
            EligibilityPolicy::Never => write!(f, "never"),
            EligibilityPolicy::Designated(addr) => write!(f, "designated:{}", addr),
        }
    }
}

/// Checks that `raw` is an http(s) base URL and strips any trailing slash.
pub fn normalize_address(raw: &str) -> Result<String> {
    let addr = raw.trim().trim_end_matches('/');
    let host = addr
        .strip_prefix("http://")
        .or_else(|| addr.strip_prefix("https://"))
        .ok_or_else(|| Error::config(format!("address must start with http:// or https://: {:?}", raw)))?;
    if host.is_empty() || host.contains('/') {
        return Err(Error::config(format!("address must be a bare base URL: {:?}", raw)));
    }
    Ok(addr.to_string())
}

/// Configuration for a single node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Socket address the HTTP server binds to
    pub listen: SocketAddr,
    /// Base URL peers use to reach this node
    pub advertise: String,
    /// Base URL of the node believed to be primary at startup
    pub primary: String,
    /// Start as primary instead of replica
    pub bootstrap_primary: bool,
    /// Base URLs of every other node
    pub peers: Vec<String>,
    /// Interval between liveness probes
    pub probe_interval: Duration,
    /// Timeout for probes, election re-checks and primary discovery
    pub probe_timeout: Duration,
    /// Wait between a failed probe and the re-check
    pub settle_delay: Duration,
    /// Timeout for each mutation forwarded to a replica
    pub forward_timeout: Duration,
    /// Promotion policy
    pub eligibility: EligibilityPolicy,
    /// Ask peers for an existing primary before promoting
    pub discover_primary: bool,
    /// Statement guard mode for spliced fragments
    pub statement_guard: GuardMode,
    /// Storage backend
    pub database: DatabaseConfig,
}

impl Default for NodeConfig {
    /// Creates a default node configuration.
    ///
    /// Default values:
    /// - Listen address: 127.0.0.1:8001
    /// - Probe interval: 10 seconds, probe timeout: 5 seconds
    /// - Settle delay: 2 seconds
    /// - Forward timeout: 5 seconds
    /// - In-memory SQLite
    fn default() -> Self {
        let listen = SocketAddr::from(([127, 0, 0, 1], 8001));
        let advertise = format!("http://{}", listen);
        Self {
            listen,
            primary: advertise.clone(),
            advertise,
            bootstrap_primary: false,
            peers: Vec::new(),
            probe_interval: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(5),
            settle_delay: Duration::from_secs(2),
            forward_timeout: Duration::from_secs(5),
            eligibility: EligibilityPolicy::Always,
            discover_primary: true,
            statement_guard: GuardMode::On,
            database: DatabaseConfig::in_memory(),
        }
    }
}

impl NodeConfig {
    /// Validates the configuration and normalizes every address.
    ///
    /// A node whose primary is itself starts as primary. Its own address is
    /// dropped from the peer list.
    pub fn validated(mut self) -> Result<Self> {
        self.advertise = normalize_address(&self.advertise)?;
        self.primary = normalize_address(&self.primary)?;

        let mut peers = Vec::with_capacity(self.peers.len());
        for peer in &self.peers {
            let peer = normalize_address(peer)?;
            if peer == self.advertise {
                tracing::warn!(%peer, "ignoring own address in peer list");
                continue;
            }
            if !peers.contains(&peer) {
                peers.push(peer);
            }
        }
        self.peers = peers;

        if self.probe_interval.is_zero() {
            return Err(Error::config("probe interval must be positive"));
        }
        if self.probe_timeout.is_zero() {
            return Err(Error::config("probe timeout must be positive"));
        }
        if self.forward_timeout.is_zero() {
            return Err(Error::config("forward timeout must be positive"));
        }
        if self.settle_delay >= self.probe_interval {
            tracing::warn!(
                settle_delay = ?self.settle_delay,
                probe_interval = ?self.probe_interval,
                "settle delay is not shorter than the probe interval"
            );
        }

        if self.primary == self.advertise && !self.bootstrap_primary {
            tracing::info!(primary = %self.primary, "primary address is this node, starting as primary");
            self.bootstrap_primary = true;
        }
        if self.bootstrap_primary && self.primary != self.advertise {
            tracing::warn!(
                primary = %self.primary,
                "bootstrap primary configured with a foreign primary address, using own address"
            );
            self.primary = self.advertise.clone();
        }

        self.database.validate()?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_address() {
        assert_eq!(normalize_address("http://localhost:8000/").unwrap(), "http://localhost:8000");
        assert_eq!(normalize_address(" https://db1:443 ").unwrap(), "https://db1:443");
        assert!(normalize_address("localhost:8000").is_err());
        assert!(normalize_address("http://").is_err());
        assert!(normalize_address("http://host:1/ping").is_err());
    }

    #[test]
    fn test_eligibility_policy() {
        assert_eq!("always".parse::<EligibilityPolicy>().unwrap(), EligibilityPolicy::Always);
        assert_eq!("NEVER".parse::<EligibilityPolicy>().unwrap(), EligibilityPolicy::Never);

        let policy: EligibilityPolicy = "designated:http://localhost:8002/".parse().unwrap();
        assert_eq!(policy, EligibilityPolicy::Designated("http://localhost:8002".into()));
        assert!(policy.allows("http://localhost:8002"));
        assert!(!policy.allows("http://localhost:8001"));
        assert_eq!(policy.to_string(), "designated:http://localhost:8002");

        assert!(EligibilityPolicy::Always.allows("http://any:1"));
        assert!(!EligibilityPolicy::Never.allows("http://any:1"));
        assert!("sometimes".parse::<EligibilityPolicy>().is_err());
    }

    #[test]
    fn test_validated_filters_self_from_peers() {
        let config = NodeConfig {
            advertise: "http://127.0.0.1:8001/".into(),
            primary: "http://127.0.0.1:8000".into(),
            peers: vec![
                "http://127.0.0.1:8001".into(),
                "http://127.0.0.1:8002/".into(),
                "http://127.0.0.1:8002".into(),
            ],
            ..Default::default()
        }
        .validated()
        .unwrap();

        assert_eq!(config.advertise, "http://127.0.0.1:8001");
        assert_eq!(config.peers, vec!["http://127.0.0.1:8002".to_string()]);
        assert!(!config.bootstrap_primary);
    }

    #[test]
    fn test_self_primary_bootstraps() {
        let config = NodeConfig::default().validated().unwrap();
        assert!(config.bootstrap_primary);
        assert_eq!(config.primary, config.advertise);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = NodeConfig {
            probe_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(config.validated(), Err(Error::Config(_))));
    }
}
