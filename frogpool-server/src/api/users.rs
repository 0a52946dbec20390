//! `/users` endpoints.

use axum::{Json, extract::State};
use frogpool_sdk::objects::{SubmitRewardTxRequest, SubmitRewardTxResponse, UserProfile};

use super::error::{ApiError, ApiJson};
use super::extractors::AuthenticatedUser;
use crate::state::AppState;

/// `GET /users/me`: wallet, reward balances and whether a frog is alive.
pub(super) async fn me(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<UserProfile>, ApiError> {
    let profile = state.game.profile(&user).await?;
    Ok(Json(UserProfile {
        wallet_address: profile.user.wallet_address,
        unclaimed_rewards: profile.user.unclaimed_rewards,
        history_rewards: profile.user.history_rewards,
        is_active: profile.has_active_frog,
    }))
}

/// `POST /users/submit-reward-tx`: pay out the whole unclaimed balance.
pub(super) async fn submit_reward_tx(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    ApiJson(request): ApiJson<SubmitRewardTxRequest>,
) -> Result<Json<SubmitRewardTxResponse>, ApiError> {
    let claim = state
        .game
        .submit_reward_claim(&user, &request.signed_transaction, request.amount)
        .await?;
    Ok(Json(SubmitRewardTxResponse {
        success: true,
        amount: claim.amount,
        transaction_hash: claim.transaction_hash,
    }))
}
