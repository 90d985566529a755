//! Configuration for giftd

use giftcircle_types::{GroupId, GroupMember, ItemListing, MemberId};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GiftdConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Seed data for the in-memory membership directory and item catalog
    #[serde(default)]
    pub fixtures: FixtureConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Enable permissive CORS
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            enable_cors: true,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (for development/testing)
    #[default]
    Memory,

    /// PostgreSQL storage
    Postgres {
        url: String,

        #[serde(default = "default_pool_size")]
        max_connections: u32,

        #[serde(default = "default_connection_timeout")]
        connect_timeout_secs: u64,
    },
}

impl StorageConfig {
    pub fn postgres(url: impl Into<String>, max_connections: u32) -> Self {
        Self::Postgres {
            url: url.into(),
            max_connections,
            connect_timeout_secs: default_connection_timeout(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FixtureConfig {
    #[serde(default)]
    pub groups: Vec<GroupFixture>,

    #[serde(default)]
    pub items: Vec<ItemListing>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupFixture {
    pub group_id: GroupId,

    #[serde(default)]
    pub members: Vec<GroupMember>,

    /// Members holding admin capability; each must also appear in `members`
    #[serde(default)]
    pub admins: Vec<MemberId>,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8095))
}

fn default_true() -> bool {
    true
}

fn default_pool_size() -> u32 {
    10
}

fn default_connection_timeout() -> u64 {
    5
}

fn default_log_level() -> String {
    "giftcircle=info,info".to_string()
}

impl GiftdConfig {
    /// Layer defaults, an optional TOML file and `GIFTD_*` environment variables.
    ///
    /// Nested keys use a double underscore, e.g. `GIFTD_SERVER__LISTEN_ADDR`.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&GiftdConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("GIFTD")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_memory_storage() {
        let config = GiftdConfig::default();
        assert!(matches!(config.storage, StorageConfig::Memory));
        assert_eq!(config.server.listen_addr.port(), 8095);
        assert_eq!(config.logging.level, "giftcircle=info,info");
    }

    #[test]
    fn toml_file_layers_over_defaults() {
        let dir = std::env::temp_dir().join(format!("giftd-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("giftd.toml");
        std::fs::write(
            &path,
            r#"
[storage]
type = "postgres"
url = "postgres://localhost/gifts"

[[fixtures.items]]
item_id = "item-1"
owner_id = "a"
price_minor = 2500
"#,
        )
        .unwrap();

        let config = GiftdConfig::load(path.to_str()).unwrap();
        match config.storage {
            StorageConfig::Postgres {
                url,
                max_connections,
                ..
            } => {
                assert_eq!(url, "postgres://localhost/gifts");
                assert_eq!(max_connections, 10);
            }
            StorageConfig::Memory => panic!("expected postgres storage"),
        }
        assert_eq!(config.fixtures.items.len(), 1);
        assert_eq!(config.fixtures.items[0].price_minor, Some(2500));
        assert!(config.server.enable_cors);
    }
}
