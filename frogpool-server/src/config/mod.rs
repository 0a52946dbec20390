//! Configuration module for frogpool-server.
//!
//! Handles loading configuration from TOML files, CLI arguments,
//! and environment variables.

pub mod file;

use crate::config::file::FileConfig;
use frogpool_core::config::{AuthConfig, ChainConfig, GameConfig, ServerConfig};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Shortest accepted session secret, in bytes.
const MIN_SESSION_SECRET_LEN: usize = 16;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("invalid RPC url: {0}")]
    InvalidRpcUrl(#[from] url::ParseError),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Loaded configuration result containing all parts.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub chain: ChainConfig,
    pub game: GameConfig,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
    listen_override: Option<SocketAddr>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, listen_override: Option<SocketAddr>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            listen_override,
        }
    }

    /// Read, override, validate and convert the configuration file.
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        self.load_str(&config_content)
    }

    fn load_str(&self, config_content: &str) -> Result<LoadedConfig, ConfigError> {
        let mut file_config: FileConfig = toml::from_str(config_content)?;

        if let Some(listen) = self.listen_override {
            file_config.server.listen = listen;
        }

        validate(&file_config)?;
        build_loaded_config(file_config)
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    if config.auth.session_secret.len() < MIN_SESSION_SECRET_LEN {
        return Err(ConfigError::ValidationError(format!(
            "auth.session_secret must be at least {MIN_SESSION_SECRET_LEN} bytes"
        )));
    }
    if config.auth.max_session_age_secs <= 0 {
        return Err(ConfigError::ValidationError(
            "auth.max_session_age_secs must be positive".into(),
        ));
    }
    if config.chain.treasury_address.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "chain.treasury_address is required".into(),
        ));
    }
    if config.chain.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "chain.max_attempts must be at least 1".into(),
        ));
    }

    let game = &config.game;
    if game.pool_capacity.is_some_and(|c| c < 1) {
        return Err(ConfigError::ValidationError(
            "game.pool_capacity must be at least 1".into(),
        ));
    }
    if game.default_prize.is_some_and(|p| p.is_sign_negative()) {
        return Err(ConfigError::ValidationError(
            "game.default_prize must not be negative".into(),
        ));
    }
    for (name, secs) in [
        ("prize_interval_secs", game.prize_interval_secs),
        ("decay_interval_secs", game.decay_interval_secs),
        ("hunger_unit_secs", game.hunger_unit_secs),
        ("ws_write_timeout_secs", game.ws_write_timeout_secs),
        ("ws_read_timeout_secs", game.ws_read_timeout_secs),
    ] {
        if secs == Some(0) {
            return Err(ConfigError::ValidationError(format!(
                "game.{name} must be positive"
            )));
        }
    }
    if game.ws_send_buffer == Some(0) || game.max_join_attempts == Some(0) {
        return Err(ConfigError::ValidationError(
            "game.ws_send_buffer and game.max_join_attempts must be positive".into(),
        ));
    }
    Ok(())
}

fn build_loaded_config(file_config: FileConfig) -> Result<LoadedConfig, ConfigError> {
    let chain = file_config.chain;
    let rpc_url = match chain.rpc_url {
        Some(url) => url,
        None => Url::parse(chain.network.default_rpc_url())?,
    };

    let defaults = GameConfig::default();
    let game = file_config.game;
    let secs = |value: Option<u64>, fallback: Duration| {
        value.map(Duration::from_secs).unwrap_or(fallback)
    };

    Ok(LoadedConfig {
        server: ServerConfig {
            listen: file_config.server.listen,
        },
        auth: AuthConfig::new(
            file_config.auth.session_secret.into_bytes(),
            file_config.auth.max_session_age_secs,
        ),
        chain: ChainConfig {
            network: chain.network,
            rpc_url,
            treasury_address: chain.treasury_address.trim().to_owned(),
            activation_lamports: chain.activation_lamports,
            max_attempts: chain.max_attempts,
            initial_retry_delay: Duration::from_millis(chain.initial_retry_delay_ms),
            request_timeout: Duration::from_secs(chain.request_timeout_secs),
        },
        game: GameConfig {
            pool_capacity: game.pool_capacity.unwrap_or(defaults.pool_capacity),
            default_prize: game.default_prize.unwrap_or(defaults.default_prize),
            prize_interval: secs(game.prize_interval_secs, defaults.prize_interval),
            decay_interval: secs(game.decay_interval_secs, defaults.decay_interval),
            hunger_unit: secs(game.hunger_unit_secs, defaults.hunger_unit),
            ws_write_timeout: secs(game.ws_write_timeout_secs, defaults.ws_write_timeout),
            ws_read_timeout: secs(game.ws_read_timeout_secs, defaults.ws_read_timeout),
            ws_send_buffer: game.ws_send_buffer.unwrap_or(defaults.ws_send_buffer),
            max_join_attempts: game.max_join_attempts.unwrap_or(defaults.max_join_attempts),
        },
    })
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use frogpool_core::config::SolanaNetwork;

    const BASE: &str = r#"
[auth]
session_secret = "0123456789abcdef0123456789abcdef"

[chain]
network = "devnet"
treasury_address = " treasury "
"#;

    fn loader() -> ConfigLoader {
        ConfigLoader::new("unused.toml", None)
    }

    #[test]
    fn test_defaults_fill_game_section() {
        let loaded = loader().load_str(BASE).unwrap();
        assert_eq!(loaded.game.pool_capacity, 10);
        assert_eq!(loaded.game.hunger_unit, Duration::from_secs(3));
        assert_eq!(loaded.chain.network, SolanaNetwork::Devnet);
        assert_eq!(
            loaded.chain.rpc_url.as_str(),
            "https://api.devnet.solana.com/"
        );
        assert_eq!(loaded.chain.treasury_address, "treasury");
        assert_eq!(loaded.chain.initial_retry_delay, Duration::from_secs(1));
        assert_eq!(loaded.auth.secret_bytes(), b"0123456789abcdef0123456789abcdef");
    }

    #[test]
    fn test_listen_override_wins() {
        let addr: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        let loaded = ConfigLoader::new("unused.toml", Some(addr))
            .load_str(BASE)
            .unwrap();
        assert_eq!(loaded.server.listen, addr);
    }

    #[test]
    fn test_game_overrides_apply() {
        let content = format!("{BASE}\n[game]\npool_capacity = 3\nprize_interval_secs = 2\n");
        let loaded = loader().load_str(&content).unwrap();
        assert_eq!(loaded.game.pool_capacity, 3);
        assert_eq!(loaded.game.prize_interval, Duration::from_secs(2));
        assert_eq!(loaded.game.decay_interval, Duration::from_secs(3));
    }

    #[test]
    fn test_validation_errors() {
        let short_secret = BASE.replace("0123456789abcdef0123456789abcdef", "short");
        assert!(matches!(
            loader().load_str(&short_secret),
            Err(ConfigError::ValidationError(_))
        ));

        let zero_capacity = format!("{BASE}\n[game]\npool_capacity = 0\n");
        assert!(matches!(
            loader().load_str(&zero_capacity),
            Err(ConfigError::ValidationError(_))
        ));

        let zero_unit = format!("{BASE}\n[game]\nhunger_unit_secs = 0\n");
        assert!(matches!(
            loader().load_str(&zero_unit),
            Err(ConfigError::ValidationError(_))
        ));

        let no_treasury = BASE.replace("\" treasury \"", "\"  \"");
        assert!(matches!(
            loader().load_str(&no_treasury),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_parse_error_surfaces() {
        assert!(matches!(
            loader().load_str("not = [valid"),
            Err(ConfigError::ParseError(_))
        ));
    }
}
