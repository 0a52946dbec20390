//! HTTP and WebSocket API, mounted under `/api/v1`.
//!
//! Every endpoint requires a session token, see [`extractors`].
//!
//! # Endpoints
//!
//! - `GET  /users/me`
//! - `POST /users/submit-reward-tx`
//! - `POST /game/activate`
//! - `PUT  /game/hunger`
//! - `POST /game/catch-big-prize`
//! - `GET  /game/ws`
//! - `GET  /pools/current`

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::state::AppState;

pub mod error;
pub mod extractors;
mod game;
mod pools;
mod users;

/// Build the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(users::me))
        .route("/users/submit-reward-tx", post(users::submit_reward_tx))
        .route("/game/activate", post(game::activate))
        .route("/game/hunger", put(game::feed))
        .route("/game/catch-big-prize", post(game::catch_big_prize))
        .route("/game/ws", get(game::ws::game_ws))
        .route("/pools/current", get(pools::current))
}
