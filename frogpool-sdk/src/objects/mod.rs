pub mod game;
pub mod user;
pub mod ws;

pub use game::{
    ActivateRequest, ActivateResponse, CatchPrizeRequest, CatchPrizeResponse,
    CurrentPoolResponse, FeedRequest, FeedResponse, FrogInfo, JoinedPoolInfo,
    ParticipantSnapshot, PoolInfo, PoolStatus,
};
pub use user::{SubmitRewardTxRequest, SubmitRewardTxResponse, UserProfile};
pub use ws::{WsClientMessage, WsCloseCode, WsServerMessage};

use serde::{Deserialize, Serialize};

/// Machine-readable failure category returned by every API endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed or missing input. Retrying the same request will not help.
    Validation,
    /// Missing or invalid session token.
    Unauthenticated,
    /// The referenced entity does not exist.
    NotFound,
    /// The request is valid but the game state does not allow it.
    Conflict,
    /// The blockchain RPC could not be reached or rejected the payload.
    Chain,
    /// Persistence failure.
    Storage,
}

/// Error body returned together with a non-2xx status code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub category: ErrorCategory,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}
