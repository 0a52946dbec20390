//! Solana RPC and treasury configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Solana cluster the server talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolanaNetwork {
    Mainnet,
    Devnet,
}

impl SolanaNetwork {
    /// Public RPC endpoint used when no explicit endpoint is configured.
    pub fn default_rpc_url(self) -> &'static str {
        match self {
            SolanaNetwork::Mainnet => "https://api.mainnet-beta.solana.com",
            SolanaNetwork::Devnet => "https://api.devnet.solana.com",
        }
    }
}

impl std::fmt::Display for SolanaNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolanaNetwork::Mainnet => write!(f, "mainnet"),
            SolanaNetwork::Devnet => write!(f, "devnet"),
        }
    }
}

/// Chain access configuration.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub network: SolanaNetwork,
    /// JSON-RPC endpoint.
    pub rpc_url: Url,
    /// Wallet that receives activation payments.
    pub treasury_address: String,
    /// Minimum activation payment in lamports.
    pub activation_lamports: u64,
    /// Attempts per RPC call before a transport error is surfaced.
    pub max_attempts: u32,
    /// Delay before the first retry; doubled after every failed attempt.
    pub initial_retry_delay: Duration,
    /// Timeout of a single RPC request.
    pub request_timeout: Duration,
}
