//! Access and refresh tokens.
//!
//! Both kinds are HS256 JWTs signed with the configured secret and told apart
//! by the `token_type` claim. Refresh tokens are single use: spending one
//! (rotation or logout) records its `jti` in `token_blacklist`.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use thiserror::Error;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::repo;
use crate::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id, as a string per RFC 7519.
    pub sub: String,
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
    pub token_type: TokenType,
}

impl Claims {
    pub fn user_id(&self) -> Result<i64, TokenError> {
        self.sub.parse().map_err(|_| TokenError::Invalid)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,

    #[error("Invalid token")]
    Invalid,

    #[error("Token has wrong type")]
    WrongType,
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        ApiError::Unauthorized(err.to_string())
    }
}

/// Issues and verifies tokens with one signing secret.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        // ---
        TokenService {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(
            &cfg.jwt_secret,
            Duration::minutes(i64::from(cfg.access_token_ttl_minutes)),
            Duration::days(i64::from(cfg.refresh_token_ttl_days)),
        )
    }

    /// Sign a token of `token_type` for `user_id`, valid from `now`.
    pub fn issue(
        &self,
        user_id: i64,
        token_type: TokenType,
        now: DateTime<Utc>,
    ) -> ApiResult<(String, Claims)> {
        // ---
        let ttl = match token_type {
            TokenType::Access => self.access_ttl,
            TokenType::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            sub: user_id.to_string(),
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            token_type,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::Internal(format!("Token signing failed: {}", e)))?;
        Ok((token, claims))
    }

    pub fn issue_pair(&self, user_id: i64) -> ApiResult<TokenPair> {
        // ---
        let now = Utc::now();
        let (access_token, _) = self.issue(user_id, TokenType::Access, now)?;
        let (refresh_token, _) = self.issue(user_id, TokenType::Refresh, now)?;
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Check signature, expiry and type. Blacklisting is checked separately.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        // ---
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;

        if data.claims.token_type != expected {
            return Err(TokenError::WrongType);
        }
        Ok(data.claims)
    }

    /// Spend a refresh token and hand out a fresh pair for the same user.
    ///
    /// Fails if the token is invalid, already spent, or its user is gone or
    /// inactive.
    pub async fn rotate(
        &self,
        conn: &mut PgConnection,
        refresh_token: &str,
    ) -> ApiResult<TokenPair> {
        // ---
        let claims = self.verify(refresh_token, TokenType::Refresh)?;
        let user_id = claims.user_id()?;

        let user = repo::users::find_by_id(&mut *conn, user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or(TokenError::Invalid)?;

        let fresh =
            repo::tokens::blacklist(&mut *conn, claims.jti, user.id, claims.expires_at()).await?;
        if !fresh {
            tracing::warn!("Refresh token {} presented after it was spent", claims.jti);
            return Err(TokenError::Invalid.into());
        }

        self.issue_pair(user.id)
    }

    /// Spend `refresh_token` on behalf of `user_id`. Any failure, including a
    /// token owned by someone else, is reported as the same error.
    pub async fn revoke(
        &self,
        conn: &mut PgConnection,
        refresh_token: &str,
        user_id: i64,
    ) -> ApiResult<()> {
        // ---
        let invalid = || ApiError::BadRequest("Invalid token".to_string());

        let claims = self
            .verify(refresh_token, TokenType::Refresh)
            .map_err(|_| invalid())?;
        if claims.user_id().map_err(|_| invalid())? != user_id {
            return Err(invalid());
        }

        let fresh = repo::tokens::blacklist(conn, claims.jti, user_id, claims.expires_at()).await?;
        if !fresh {
            return Err(invalid());
        }
        Ok(())
    }
}
