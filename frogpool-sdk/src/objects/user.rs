//! User API request and response types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// `GET /users/me` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub wallet_address: String,
    pub unclaimed_rewards: Decimal,
    pub history_rewards: Decimal,
    /// Whether the user currently owns a living frog.
    pub is_active: bool,
}

/// `POST /users/submit-reward-tx` body.
///
/// `amount` must equal the user's whole unclaimed balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRewardTxRequest {
    /// Base64 encoded, fully signed payout transaction.
    pub signed_transaction: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRewardTxResponse {
    pub success: bool,
    pub amount: Decimal,
    pub transaction_hash: String,
}
