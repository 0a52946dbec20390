//! JSON-RPC client for a Solana node.

use super::{ChainError, ChainGateway};
use crate::config::ChainConfig;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Doubling stops after this many retries.
const MAX_BACKOFF_EXPONENT: u32 = 10;

/// Delay before retry number `attempt` (0-based): `initial * 2^attempt`.
pub fn retry_delay(initial: Duration, attempt: u32) -> Duration {
    initial.saturating_mul(2u32.pow(attempt.min(MAX_BACKOFF_EXPONENT)))
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// The parts of a `getTransaction` result the payment check reads.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionInfo {
    pub meta: Option<TransactionMeta>,
    pub transaction: EncodedTransaction,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMeta {
    #[serde(default)]
    pub err: Option<serde_json::Value>,
    #[serde(default)]
    pub pre_balances: Vec<u64>,
    #[serde(default)]
    pub post_balances: Vec<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EncodedTransaction {
    pub message: TransactionMessage,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMessage {
    pub account_keys: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferCheck {
    Verified { received: u64 },
    /// The transaction executed with an error.
    Failed,
    ReceiverMissing,
    BalanceUnavailable,
    Insufficient { received: u64 },
}

/// Check that `info` moved at least `min_lamports` into `receiver`.
pub fn verify_transfer(info: &TransactionInfo, receiver: &str, min_lamports: u64) -> TransferCheck {
    let Some(meta) = &info.meta else {
        return TransferCheck::BalanceUnavailable;
    };
    if meta.err.is_some() {
        return TransferCheck::Failed;
    }
    let Some(index) = info
        .transaction
        .message
        .account_keys
        .iter()
        .position(|key| key == receiver)
    else {
        return TransferCheck::ReceiverMissing;
    };
    let (Some(pre), Some(post)) = (meta.pre_balances.get(index), meta.post_balances.get(index))
    else {
        return TransferCheck::BalanceUnavailable;
    };
    let received = post.saturating_sub(*pre);
    if received < min_lamports {
        TransferCheck::Insufficient { received }
    } else {
        TransferCheck::Verified { received }
    }
}

/// [`ChainGateway`] talking JSON-RPC to a Solana node.
pub struct SolanaRpcGateway {
    config: ChainConfig,
    http_client: reqwest::Client,
}

impl SolanaRpcGateway {
    pub fn new(config: ChainConfig) -> Result<Self, ChainError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            config,
            http_client,
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<Option<T>, ChainError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let attempts = self.config.max_attempts.max(1);
        let mut last_error = None;
        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = retry_delay(self.config.initial_retry_delay, attempt - 1);
                debug!(method, attempt, ?delay, "Retrying RPC request");
                tokio::time::sleep(delay).await;
            }
            match self.post(&body).await {
                Ok(response) => return Self::unwrap_response(response),
                Err(e) => {
                    warn!(method, attempt = attempt + 1, attempts, error = %e, "RPC request failed");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| ChainError::Malformed("no attempt was made".into())))
    }

    /// One HTTP round trip. Errors returned here are worth retrying.
    async fn post<T: DeserializeOwned>(
        &self,
        body: &serde_json::Value,
    ) -> Result<RpcResponse<T>, ChainError> {
        let response = self
            .http_client
            .post(self.config.rpc_url.clone())
            .json(body)
            .send()
            .await?;
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(ChainError::Status(status));
        }
        Ok(response.json::<RpcResponse<T>>().await?)
    }

    fn unwrap_response<T>(response: RpcResponse<T>) -> Result<Option<T>, ChainError> {
        if let Some(error) = response.error {
            return Err(ChainError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        Ok(response.result)
    }
}

#[async_trait::async_trait]
impl ChainGateway for SolanaRpcGateway {
    #[tracing::instrument(skip(self), err)]
    async fn verify_payment(&self, tx_hash: &str, receiver: &str) -> Result<bool, ChainError> {
        let info: TransactionInfo = self
            .call(
                "getTransaction",
                json!([
                    tx_hash,
                    {
                        "encoding": "json",
                        "maxSupportedTransactionVersion": 0,
                        "commitment": "confirmed",
                    }
                ]),
            )
            .await?
            .ok_or_else(|| ChainError::TransactionNotFound(tx_hash.to_owned()))?;

        match verify_transfer(&info, receiver, self.config.activation_lamports) {
            TransferCheck::Verified { received } => {
                info!(network = %self.config.network, received, "Activation payment verified");
                Ok(true)
            }
            check => {
                warn!(network = %self.config.network, ?check, "Activation payment rejected");
                Ok(false)
            }
        }
    }

    #[tracing::instrument(skip_all, err)]
    async fn submit(&self, signed_transaction: &str) -> Result<String, ChainError> {
        let signature: String = self
            .call(
                "sendTransaction",
                json!([signed_transaction, { "encoding": "base64" }]),
            )
            .await?
            .ok_or_else(|| ChainError::Malformed("sendTransaction returned no signature".into()))?;
        info!(network = %self.config.network, %signature, "Transaction submitted");
        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TREASURY: &str = "TreasuryWa11et1111111111111111111111111111";

    fn transaction(err: serde_json::Value, pre: u64, post: u64) -> TransactionInfo {
        serde_json::from_value(json!({
            "blockTime": 1_700_000_000,
            "slot": 42,
            "meta": {
                "err": err,
                "fee": 5000,
                "preBalances": [2_000_000_000u64, pre],
                "postBalances": [1_989_995_000u64, post],
            },
            "transaction": {
                "message": { "accountKeys": ["PayerWa11et", TREASURY] }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_verified_transfer() {
        let info = transaction(serde_json::Value::Null, 100, 10_000_100);
        assert_eq!(
            verify_transfer(&info, TREASURY, 10_000_000),
            TransferCheck::Verified {
                received: 10_000_000
            }
        );
    }

    #[test]
    fn test_rejected_transfers() {
        let failed = transaction(json!({"InstructionError": [0, "Custom"]}), 100, 10_000_100);
        assert_eq!(verify_transfer(&failed, TREASURY, 1), TransferCheck::Failed);

        let short = transaction(serde_json::Value::Null, 100, 5_000_100);
        assert_eq!(
            verify_transfer(&short, TREASURY, 10_000_000),
            TransferCheck::Insufficient { received: 5_000_000 }
        );

        let info = transaction(serde_json::Value::Null, 100, 10_000_100);
        assert_eq!(
            verify_transfer(&info, "SomeoneElse", 1),
            TransferCheck::ReceiverMissing
        );
    }

    #[test]
    fn test_retry_delay_doubles() {
        let initial = Duration::from_secs(1);
        assert_eq!(retry_delay(initial, 0), Duration::from_secs(1));
        assert_eq!(retry_delay(initial, 1), Duration::from_secs(2));
        assert_eq!(retry_delay(initial, 2), Duration::from_secs(4));
        assert_eq!(retry_delay(initial, 10), Duration::from_secs(1024));
        assert_eq!(retry_delay(initial, 50), Duration::from_secs(1024));
    }
}
