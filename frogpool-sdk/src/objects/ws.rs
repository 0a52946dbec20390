//! WebSocket message types for the game stream.
//!
//! The `GET /api/v1/game/ws` endpoint upgrades to a WebSocket connection
//! and pushes [`WsServerMessage`] JSON frames.
//!
//! # Protocol
//!
//! 1. Right after the upgrade the server pushes a catch-up: the current
//!    [`WsServerMessage::HungerUpdate`] (if the user owns an active frog),
//!    then [`WsServerMessage::PoolUpdate`] and
//!    [`WsServerMessage::BigPrizeLocation`] (if the user sits in an open
//!    pool).
//! 2. Further frames are pushed whenever hunger, pool membership or the
//!    big prize location changes, and once a pool is over.
//! 3. The client may send `{"type":"ping"}` at any time; the server answers
//!    with `{"type":"pong"}`.
//! 4. Opening a second connection for the same user closes the first one
//!    with [`WsCloseCode::REPLACED`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::game::ParticipantSnapshot;

/// Server-to-client WebSocket message.
///
/// Serialized as an internally-tagged JSON object:
///
/// ```json
/// {"type":"hunger-update","frogId":3,"newHungerLevel":97}
/// {"type":"big-prize-location","poolId":1,"holderAddress":"9xQe..."}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum WsServerMessage {
    /// A frog's hunger level changed.
    HungerUpdate { frog_id: i64, new_hunger_level: i32 },

    /// Membership of a pool changed.
    PoolUpdate {
        pool_id: i64,
        participants: Vec<ParticipantSnapshot>,
    },

    /// The big prize moved to another participant.
    BigPrizeLocation { pool_id: i64, holder_address: String },

    /// A pool is over. `winner_address` is empty and `prize_amount` is zero
    /// when every frog in the pool starved.
    GameOver {
        pool_id: i64,
        winner_address: String,
        prize_amount: Decimal,
    },

    /// Keep-alive answer to [`WsClientMessage::Ping`].
    Pong,

    /// A server-side error that does not close the connection by itself.
    Error { code: u16, reason: String },
}

/// Client-to-server WebSocket message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WsClientMessage {
    Ping,
}

/// Well-known WebSocket close codes used by the game stream.
///
/// Codes in the 4000–4999 range are reserved for application use by
/// [RFC 6455 §7.4.2](https://www.rfc-editor.org/rfc/rfc6455#section-7.4.2).
pub struct WsCloseCode;

impl WsCloseCode {
    /// Normal closure (server shutting down, client left).
    pub const NORMAL: u16 = 1000;

    /// A client frame could not be understood.
    pub const UNSUPPORTED_DATA: u16 = 1003;

    /// An unexpected server-side error prevented the connection from
    /// continuing.
    pub const INTERNAL_ERROR: u16 = 1011;

    /// A newer connection for the same user took over.
    pub const REPLACED: u16 = 4001;

    /// The client stopped responding within the read deadline.
    pub const IDLE_TIMEOUT: u16 = 4008;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_message_tags() {
        let msg = WsServerMessage::HungerUpdate {
            frog_id: 3,
            new_hunger_level: 97,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "hunger-update");
        assert_eq!(json["frogId"], 3);
        assert_eq!(json["newHungerLevel"], 97);

        let msg = WsServerMessage::BigPrizeLocation {
            pool_id: 1,
            holder_address: "wallet-a".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "big-prize-location");
        assert_eq!(json["holderAddress"], "wallet-a");

        let json = serde_json::to_value(WsServerMessage::Pong).unwrap();
        assert_eq!(json, serde_json::json!({"type": "pong"}));
    }

    #[test]
    fn test_client_ping_parsing() {
        let msg: WsClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(msg, WsClientMessage::Ping);
        assert!(serde_json::from_str::<WsClientMessage>(r#"{"type":"shout"}"#).is_err());
    }
}
