//! `/game` endpoints.
//!
//! - `POST /game/activate`        – verify the activation payment, get a frog and a seat
//! - `PUT  /game/hunger`          – feed the caller's frog
//! - `POST /game/catch-big-prize` – claim the big prize of the caller's pool
//! - `GET  /game/ws`              – push stream, see [`ws`]

use axum::{Json, extract::State};
use frogpool_sdk::objects::{
    ActivateRequest, ActivateResponse, CatchPrizeRequest, CatchPrizeResponse, FeedRequest,
    FeedResponse, FrogInfo, JoinedPoolInfo,
};

use super::error::{ApiError, ApiJson};
use super::extractors::AuthenticatedUser;
use crate::state::AppState;

pub(super) mod ws;

pub(super) async fn activate(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiJson(request): ApiJson<ActivateRequest>,
) -> Result<Json<ActivateResponse>, ApiError> {
    let activation = state.game.activate(&user, &request.transaction_hash).await?;
    Ok(Json(ActivateResponse {
        frog: FrogInfo {
            id: activation.frog.id,
            hunger_level: activation.frog.hunger_level,
        },
        pool_info: JoinedPoolInfo {
            id: activation.joined.pool.id,
            current_players: activation.joined.pool.current_players,
            serial_number: activation.joined.participant.serial_number,
        },
    }))
}

pub(super) async fn feed(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiJson(request): ApiJson<FeedRequest>,
) -> Result<Json<FeedResponse>, ApiError> {
    let frog = state.game.feed(&user, request.pizza_value).await?;
    Ok(Json(FeedResponse {
        new_hunger_level: frog.hunger_level,
    }))
}

pub(super) async fn catch_big_prize(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiJson(request): ApiJson<CatchPrizeRequest>,
) -> Result<Json<CatchPrizeResponse>, ApiError> {
    let pool = state.game.catch_big_prize(&user, request.pool_id).await?;
    Ok(Json(CatchPrizeResponse {
        success: true,
        reward: pool.prize_amount,
    }))
}
