//! Configuration for the token ledger

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::{Address, Genesis, TokenMetadata};

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Token parameters used at genesis
    pub token: TokenConfig,

    /// Actor configuration
    pub actor: ActorConfig,

    /// Snapshot configuration
    pub snapshot: SnapshotConfig,

    /// Metrics listen address
    pub metrics_listen_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "token-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            token: TokenConfig::default(),
            actor: ActorConfig::default(),
            snapshot: SnapshotConfig::default(),
            metrics_listen_addr: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Token genesis parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Token name
    pub name: String,

    /// Token symbol
    pub symbol: String,

    /// Decimal places
    pub decimals: u8,

    /// Total supply in whole tokens (scaled by 10^decimals at genesis)
    pub total_supply: u64,

    /// Hex address credited with the whole supply
    pub initial_holder: String,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            name: "Boost Token".to_string(),
            symbol: "BOOST".to_string(),
            decimals: 18,
            total_supply: 1_000_000,                                         // 1 million tokens
            initial_holder: "0x0000000000000000000000000000000000000001".to_string(),
        }
    }
}

impl TokenConfig {
    /// Build genesis parameters
    pub fn genesis(&self) -> crate::Result<Genesis> {
        let initial_holder: Address = self.initial_holder.parse()?;

        let mut metadata = TokenMetadata {
            name: self.name.clone(),
            symbol: self.symbol.clone(),
            decimals: self.decimals,
            total_supply: Default::default(),
        };
        metadata.total_supply = metadata.to_base_units(u128::from(self.total_supply))?;

        let genesis = Genesis {
            metadata,
            initial_holder,
        };
        genesis.validate()?;
        Ok(genesis)
    }
}

/// Actor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Bounded mailbox size (backpressure threshold)
    pub mailbox_capacity: usize,

    /// Buffer per live event subscriber
    pub broadcast_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: 1000,
            broadcast_capacity: 1024,
        }
    }
}

/// Snapshot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Persist a snapshot on shutdown and restore it on start
    pub enabled: bool,

    /// Snapshot file
    pub path: PathBuf,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("./data/ledger.snapshot"),
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(name) = std::env::var("TOKEN_LEDGER_NAME") {
            config.token.name = name;
        }

        if let Ok(symbol) = std::env::var("TOKEN_LEDGER_SYMBOL") {
            config.token.symbol = symbol;
        }

        if let Ok(decimals) = std::env::var("TOKEN_LEDGER_DECIMALS") {
            config.token.decimals = parse_env("TOKEN_LEDGER_DECIMALS", &decimals)?;
        }

        if let Ok(supply) = std::env::var("TOKEN_LEDGER_TOTAL_SUPPLY") {
            config.token.total_supply = parse_env("TOKEN_LEDGER_TOTAL_SUPPLY", &supply)?;
        }

        if let Ok(holder) = std::env::var("TOKEN_LEDGER_INITIAL_HOLDER") {
            config.token.initial_holder = holder;
        }

        if let Ok(path) = std::env::var("TOKEN_LEDGER_SNAPSHOT_PATH") {
            config.snapshot.path = PathBuf::from(path);
        }

        if let Ok(addr) = std::env::var("TOKEN_LEDGER_METRICS_ADDR") {
            config.metrics_listen_addr = addr;
        }

        if let Ok(capacity) = std::env::var("TOKEN_LEDGER_MAILBOX_CAPACITY") {
            config.actor.mailbox_capacity = parse_env("TOKEN_LEDGER_MAILBOX_CAPACITY", &capacity)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.actor.mailbox_capacity == 0 {
            return Err(crate::Error::Config(
                "actor.mailbox_capacity must be positive".to_string(),
            ));
        }

        self.token.genesis().map(|_| ())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> crate::Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| crate::Error::Config(format!("{}={}: {}", key, value, e)))
}
