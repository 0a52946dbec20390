//! Access to the Solana chain.
//!
//! The game only needs two things from the chain: proof that an activation
//! payment reached the treasury, and a way to broadcast a signed payout.

pub mod solana;

pub use solana::{SolanaRpcGateway, TransferCheck, retry_delay, verify_transfer};

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("RPC transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("RPC endpoint answered with status {0}")]
    Status(reqwest::StatusCode),
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("malformed RPC response: {0}")]
    Malformed(String),
    #[error("transaction {0} not found")]
    TransactionNotFound(String),
}

#[async_trait::async_trait]
pub trait ChainGateway: Send + Sync {
    /// Whether `tx_hash` is a confirmed, successful transfer of at least
    /// the activation amount to `receiver`.
    async fn verify_payment(&self, tx_hash: &str, receiver: &str) -> Result<bool, ChainError>;

    /// Broadcast a base64 encoded signed transaction and return its
    /// signature.
    async fn submit(&self, signed_transaction: &str) -> Result<String, ChainError>;
}
