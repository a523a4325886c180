use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::ApiError;
use crate::models::User;
use crate::repo;
use crate::AppState;

use super::tokens::TokenType;

// ---

/// The authenticated caller, resolved from a `Bearer` access token.
///
/// Rejects with 401 when the header is missing or malformed, the token does
/// not verify, or its user no longer exists or is inactive.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    // ---
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            ApiError::Unauthorized("Authentication credentials were not provided.".to_string())
        })?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Invalid authorization header".to_string()))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        // ---
        let token = bearer_token(parts)?;
        let claims = state.tokens.verify(token, TokenType::Access)?;
        let user_id = claims.user_id()?;

        let user = repo::users::find_by_id(&state.pool, user_id)
            .await?
            .filter(|user| user.is_active)
            .ok_or_else(|| ApiError::Unauthorized("User not found or inactive".to_string()))?;

        tracing::debug!("Authenticated user {} ({})", user.id, user.username);
        Ok(AuthUser(user))
    }
}
