//! Game API request and response types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Pool status for API responses.
///
/// This is the API/DTO version without sqlx::Type.
/// For database operations, use the version in `frogpool-core::entities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolStatus {
    Collecting,
    Active,
    Completed,
}

impl std::fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolStatus::Collecting => write!(f, "collecting"),
            PoolStatus::Active => write!(f, "active"),
            PoolStatus::Completed => write!(f, "completed"),
        }
    }
}

/// One participant of a pool as seen by every player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSnapshot {
    pub wallet_address: String,
    pub serial_number: i32,
    pub can_see_big_prize: bool,
    pub is_active: bool,
}

/// `POST /game/activate` body.
///
/// `transaction_hash` is the signature of the activation payment sent to
/// the treasury.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateRequest {
    pub transaction_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrogInfo {
    pub id: i64,
    pub hunger_level: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedPoolInfo {
    pub id: i64,
    pub current_players: i32,
    pub serial_number: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateResponse {
    pub frog: FrogInfo,
    pub pool_info: JoinedPoolInfo,
}

/// `PUT /game/hunger` body. Only the whole part of `pizza_value` counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedRequest {
    pub pizza_value: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedResponse {
    pub new_hunger_level: i32,
}

/// `POST /game/catch-big-prize` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatchPrizeRequest {
    pub pool_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatchPrizeResponse {
    pub success: bool,
    pub reward: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolInfo {
    pub id: i64,
    pub status: PoolStatus,
    pub current_players: i32,
    pub prize_amount: Decimal,
}

/// `GET /pools/current` response. Both fields are empty when the user is
/// not in an open pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentPoolResponse {
    pub pool: Option<PoolInfo>,
    pub participants: Vec<ParticipantSnapshot>,
}
