//! Custom Axum extractors for request authentication.
//!
//! [`AuthenticatedUser`] accepts a session token either in the
//! `Authorization: Bearer ...` header or, for WebSocket upgrades that
//! cannot set headers, in the `token` query parameter. The header wins
//! when both are present.
//!
//! Token verification is delegated to [`frogpool_sdk::session`].

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use frogpool_core::entities::user::User;
use frogpool_sdk::session::{self, TOKEN_QUERY_PARAM};

use super::error::ApiError;
use crate::state::AppState;

const BEARER_PREFIX: &str = "Bearer ";

/// The caller's user row. Created on the first authenticated request of a
/// wallet.
pub struct AuthenticatedUser(pub User);

/// Pull the raw session token out of the request.
fn session_token(parts: &Parts) -> Result<String, ApiError> {
    if let Some(value) = parts.headers.get(AUTHORIZATION) {
        let value = value
            .to_str()
            .map_err(|_| ApiError::unauthenticated("invalid Authorization header"))?;
        return value
            .strip_prefix(BEARER_PREFIX)
            .map(|token| token.trim().to_owned())
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ApiError::unauthenticated("expected a Bearer token"));
    }

    parts
        .uri
        .query()
        .and_then(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == TOKEN_QUERY_PARAM)
                .map(|(_, value)| value.into_owned())
        })
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::unauthenticated("missing session token"))
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = session_token(parts)?;
        let wallet_address = session::verify_token(
            &token,
            state.auth.secret_bytes(),
            state.auth.max_session_age,
        )?;
        let user = state.game.login(&wallet_address).await?;
        Ok(AuthenticatedUser(user))
    }
}
