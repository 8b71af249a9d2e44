//! Sync configuration with validation

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use symsync_core::{ActorId, Property, SyncError, SyncResult};
use symsync_diffusion::Role;
use symsync_state::{BucketTable, PropertyRegistry};

/// Default listener port of a relay
pub const DEFAULT_LISTENER_PORT: u16 = 13000;

/// Main sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Master switch; a disabled node stays inert
    pub enabled: bool,
    /// Identity of this node in the overlay
    pub actor_id: String,
    /// Region announced in the handshake
    pub region_name: String,
    /// Relay or leaf
    pub role: Role,
    /// Local listener for inbound connectors
    pub listener: ListenerConfig,
    /// Listeners to dial on start
    pub remote_listeners: Vec<RemoteListener>,
    /// Heartbeat between outbound flushes
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,
    /// Property-bucket assignment, in send order; empty means the default table
    pub buckets: Vec<BucketConfig>,
    /// Periodic statistics file
    pub stats_log: StatsLogConfig,
    /// Log output
    pub log: LogConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            actor_id: String::new(),
            region_name: String::new(),
            role: Role::Leaf,
            listener: ListenerConfig::default(),
            remote_listeners: Vec::new(),
            flush_interval: Duration::from_millis(50),
            buckets: Vec::new(),
            stats_log: StatsLogConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Minimal config for an actor
    pub fn for_actor(actor_id: impl Into<String>, role: Role) -> Self {
        Self {
            actor_id: actor_id.into(),
            role,
            ..Self::default()
        }
    }

    /// Parse from a JSON document
    pub fn from_json_str(json: &str) -> SyncResult<Self> {
        serde_json::from_str(json).map_err(|e| SyncError::InvalidConfig(e.to_string()))
    }

    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> SyncResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SyncError::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    /// Validate configuration
    pub fn validate(&self) -> SyncResult<()> {
        if self.actor().is_empty() {
            return Err(SyncError::MissingActorId);
        }
        if self.flush_interval.is_zero() {
            return Err(SyncError::InvalidConfig("flush_interval must be non-zero".into()));
        }
        if self.stats_log.enabled && self.stats_log.interval.is_zero() {
            return Err(SyncError::InvalidConfig("stats_log.interval must be non-zero".into()));
        }
        self.listener_addr()?;
        for remote in &self.remote_listeners {
            remote.socket_addr()?;
        }
        self.registry()?;
        Ok(())
    }

    pub fn actor(&self) -> ActorId {
        ActorId::new(self.actor_id.trim())
    }

    /// Whether this node accepts inbound connectors; relays do by default
    pub fn listens(&self) -> bool {
        self.listener.enabled.unwrap_or(self.role.is_relay())
    }

    /// Listener address, if this node listens
    pub fn listener_addr(&self) -> SyncResult<Option<SocketAddr>> {
        if !self.listens() {
            return Ok(None);
        }
        parse_addr(&self.listener.address, self.listener.port).map(Some)
    }

    /// Build the property registry from the bucket table
    pub fn registry(&self) -> SyncResult<PropertyRegistry> {
        if self.buckets.is_empty() {
            return Ok(PropertyRegistry::with_defaults());
        }
        let table = self
            .buckets
            .iter()
            .map(|b| {
                let properties = b
                    .properties
                    .iter()
                    .map(|name| name.parse::<Property>())
                    .collect::<SyncResult<Vec<_>>>()?;
                Ok((b.name.clone(), properties))
            })
            .collect::<SyncResult<BucketTable>>()?;
        PropertyRegistry::from_table(&table)
    }
}

/// Local listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Unset means: listen if relay
    pub enabled: Option<bool>,
    pub address: String,
    pub port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            enabled: None,
            address: "127.0.0.1".to_string(),
            port: DEFAULT_LISTENER_PORT,
        }
    }
}

/// A listener to dial
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteListener {
    pub address: String,
    pub port: u16,
}

impl RemoteListener {
    pub fn socket_addr(&self) -> SyncResult<SocketAddr> {
        parse_addr(&self.address, self.port)
    }
}

/// One bucket of the assignment table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketConfig {
    pub name: String,
    pub properties: Vec<String>,
}

/// Statistics log configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsLogConfig {
    pub enabled: bool,
    pub directory: PathBuf,
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    pub file_prefix: String,
}

impl Default for StatsLogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: PathBuf::from("."),
            interval: Duration::from_secs(5),
            file_prefix: "stats-".to_string(),
        }
    }
}

impl StatsLogConfig {
    /// File the statistics of `actor` go to
    pub fn file_for(&self, actor: &ActorId) -> PathBuf {
        self.directory.join(format!("{}{}.log", self.file_prefix, actor))
    }
}

/// Log output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter used when RUST_LOG is unset
    pub level: String,
    /// JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

fn parse_addr(address: &str, port: u16) -> SyncResult<SocketAddr> {
    format!("{}:{}", address, port)
        .parse()
        .map_err(|e| SyncError::InvalidConfig(format!("bad address {}:{}: {}", address, port, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_needs_actor() {
        let config = SyncConfig::default();
        assert!(matches!(config.validate(), Err(SyncError::MissingActorId)));

        let config = SyncConfig::for_actor("scene-1", Role::Leaf);
        assert!(config.validate().is_ok());
        assert_eq!(config.flush_interval, Duration::from_millis(50));
        assert!(!config.listens());
    }

    #[test]
    fn test_relay_listens_by_default() {
        let config = SyncConfig::for_actor("hub", Role::Relay);
        assert_eq!(
            config.listener_addr().unwrap(),
            Some("127.0.0.1:13000".parse().unwrap())
        );

        let mut quiet = config.clone();
        quiet.listener.enabled = Some(false);
        assert_eq!(quiet.listener_addr().unwrap(), None);
    }

    #[test]
    fn test_from_json() {
        let config = SyncConfig::from_json_str(
            r#"{
                "actor_id": "phys-1",
                "region_name": "Sandbox",
                "role": "relay",
                "listener": { "address": "0.0.0.0", "port": 14000 },
                "remote_listeners": [{ "address": "10.0.0.2", "port": 13000 }],
                "flush_interval": "20ms",
                "stats_log": { "enabled": true, "interval": "1s" },
                "log": { "level": "debug", "json": true }
            }"#,
        )
        .unwrap();

        assert_eq!(config.role, Role::Relay);
        assert_eq!(config.flush_interval, Duration::from_millis(20));
        assert_eq!(config.stats_log.interval, Duration::from_secs(1));
        assert_eq!(config.stats_log.file_prefix, "stats-");
        assert!(config.log.json);
        assert_eq!(config.remote_listeners[0].socket_addr().unwrap().port(), 13000);
        assert!(config.validate().is_ok());
        assert_eq!(
            config.stats_log.file_for(&config.actor()),
            PathBuf::from("./stats-phys-1.log")
        );
    }

    #[test]
    fn test_bad_listener_address() {
        let mut config = SyncConfig::for_actor("hub", Role::Relay);
        config.listener.address = "not an ip".to_string();
        assert!(matches!(config.validate(), Err(SyncError::InvalidConfig(_))));
    }

    #[test]
    fn test_custom_bucket_table() {
        let mut config = SyncConfig::for_actor("a", Role::Leaf);
        let default = PropertyRegistry::default_table();
        config.buckets = default
            .iter()
            .map(|(name, props)| BucketConfig {
                name: name.clone(),
                properties: props.iter().map(|p| p.as_str().to_string()).collect(),
            })
            .collect();
        assert_eq!(config.registry().unwrap().buckets().len(), 2);

        config.buckets[0].properties.retain(|p| p != "Name");
        assert!(matches!(
            config.validate(),
            Err(SyncError::UnmappedProperty(Property::Name))
        ));

        config.buckets[0].properties.push("Bogus".to_string());
        assert!(matches!(config.registry(), Err(SyncError::UnknownProperty(_))));
    }
}
