//! TOML file configuration structures.
//!
//! These structs directly map to the `frogpool-config.toml` file format.
//! Durations are given in whole seconds (or milliseconds where the field
//! name says so).

use frogpool_core::config::SolanaNetwork;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use url::Url;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub chain: ChainConfig,
    #[serde(default)]
    pub game: GameConfig,
}

/// Server configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The address and port to listen on (e.g., "0.0.0.0:8080").
    #[serde(default = "default_listen_addr")]
    pub listen: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

/// Session token configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC key of the bearer session tokens.
    pub session_secret: String,
    #[serde(default = "default_max_session_age")]
    pub max_session_age_secs: i64,
}

fn default_max_session_age() -> i64 {
    frogpool_sdk::session::DEFAULT_MAX_SESSION_AGE
}

/// Solana access configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub network: SolanaNetwork,
    /// Overrides the public endpoint of `network`.
    #[serde(default)]
    pub rpc_url: Option<Url>,
    pub treasury_address: String,
    #[serde(default = "default_activation_lamports")]
    pub activation_lamports: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_retry_delay_ms")]
    pub initial_retry_delay_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_activation_lamports() -> u64 {
    10_000_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_retry_delay_ms() -> u64 {
    1_000
}

fn default_request_timeout_secs() -> u64 {
    10
}

/// Game rules. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub pool_capacity: Option<i32>,
    pub default_prize: Option<Decimal>,
    pub prize_interval_secs: Option<u64>,
    pub decay_interval_secs: Option<u64>,
    pub hunger_unit_secs: Option<u64>,
    pub ws_write_timeout_secs: Option<u64>,
    pub ws_read_timeout_secs: Option<u64>,
    pub ws_send_buffer: Option<usize>,
    pub max_join_attempts: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_parsing() {
        let toml_str = r#"
[auth]
session_secret = "0123456789abcdef0123456789abcdef"

[chain]
network = "devnet"
treasury_address = "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin"
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 8080);
        assert_eq!(config.chain.network, SolanaNetwork::Devnet);
        assert!(config.chain.rpc_url.is_none());
        assert_eq!(config.chain.activation_lamports, 10_000_000);
        assert_eq!(
            config.auth.max_session_age_secs,
            frogpool_sdk::session::DEFAULT_MAX_SESSION_AGE
        );
        assert!(config.game.pool_capacity.is_none());
    }

    #[test]
    fn test_full_config_parsing() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:3000"

[auth]
session_secret = "0123456789abcdef0123456789abcdef"
max_session_age_secs = 3600

[chain]
network = "mainnet"
rpc_url = "https://rpc.example.com/"
treasury_address = "treasury"
activation_lamports = 5000
max_attempts = 5
initial_retry_delay_ms = 250
request_timeout_secs = 4

[game]
pool_capacity = 4
default_prize = "2.5"
prize_interval_secs = 5
hunger_unit_secs = 6
"#;
        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.listen.port(), 3000);
        assert_eq!(config.auth.max_session_age_secs, 3600);
        assert_eq!(config.chain.network, SolanaNetwork::Mainnet);
        assert_eq!(
            config.chain.rpc_url.as_ref().map(Url::as_str),
            Some("https://rpc.example.com/")
        );
        assert_eq!(config.chain.max_attempts, 5);
        assert_eq!(config.game.pool_capacity, Some(4));
        assert_eq!(config.game.default_prize, Some(Decimal::new(25, 1)));
        assert_eq!(config.game.hunger_unit_secs, Some(6));
        assert!(config.game.decay_interval_secs.is_none());
    }

    #[test]
    fn test_missing_chain_section_is_rejected() {
        let toml_str = r#"
[auth]
session_secret = "0123456789abcdef0123456789abcdef"
"#;
        assert!(toml::from_str::<FileConfig>(toml_str).is_err());
    }
}
