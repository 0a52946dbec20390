use axum::{Json, extract::State};
use frogpool_sdk::objects::{CurrentPoolResponse, PoolInfo};

use super::error::ApiError;
use super::extractors::AuthenticatedUser;
use crate::state::AppState;

/// `GET /pools/current`: the caller's open pool with its participants.
pub(super) async fn current(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<CurrentPoolResponse>, ApiError> {
    let response = match state.game.current_pool(&user).await? {
        Some((pool, participants)) => CurrentPoolResponse {
            pool: Some(PoolInfo {
                id: pool.id,
                status: pool.status.into(),
                current_players: pool.current_players,
                prize_amount: pool.prize_amount,
            }),
            participants,
        },
        None => CurrentPoolResponse {
            pool: None,
            participants: Vec::new(),
        },
    };
    Ok(Json(response))
}
