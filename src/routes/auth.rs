//! Account endpoints under `/api/auth`.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::PgConnection;
use tracing::{info, warn};

use crate::auth::{
    candidate_usernames, hash_password, username_base, verify_password, AuthUser, GoogleError,
    TokenPair,
};
use crate::error::{ApiError, ApiResult, Violations};
use crate::models::{
    normalize_email, LoginRequest, ProfileUpdate, RegisterRequest, Role, User, UserProfile,
};
use crate::repo;
use crate::AppState;

use super::extract::ApiJson;

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/google", post(google))
        .route("/auth/token/refresh", post(refresh))
        .route("/auth/me", get(me))
        .route("/auth/update_profile", put(update_profile))
}

/// Login and Google sign-in response body.
#[derive(Debug, Serialize)]
struct SessionResponse {
    user: UserProfile,
    #[serde(flatten)]
    tokens: TokenPair,
}

#[derive(Debug, Default, Deserialize)]
struct RefreshTokenRequest {
    refresh_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GoogleRequest {
    token: Option<String>,
}

/// Subset of the profile echoed by `update_profile`.
#[derive(Debug, Serialize)]
struct ProfileSummary {
    username: String,
    email: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl From<&User> for ProfileSummary {
    fn from(user: &User) -> Self {
        ProfileSummary {
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role.as_str().to_string(),
            created_at: user.created_at,
        }
    }
}

/// First of `base`, `base1`, `base2`, ... not yet taken.
async fn free_username(conn: &mut PgConnection, base: &str) -> ApiResult<String> {
    // ---
    for candidate in candidate_usernames(base) {
        if !repo::users::username_taken(&mut *conn, &candidate, None).await? {
            return Ok(candidate);
        }
    }
    Err(ApiError::Internal(format!("No free username for base {}", base)))
}

async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    // ---
    info!("POST /api/auth/register");
    let new_user = req.validate()?;

    let mut tx = state.pool.begin().await?;
    let mut v = Violations::new();
    if repo::users::email_taken(&mut *tx, &new_user.email, None).await? {
        v.add("email", "A user with this email already exists.");
    }
    if repo::users::username_taken(&mut *tx, &new_user.username, None).await? {
        v.add("username", "A user with this username already exists.");
    }
    v.finish()?;

    let hash = hash_password(new_user.password, state.config.bcrypt_cost).await?;
    let user = repo::users::insert(
        &mut *tx,
        &new_user.email,
        &new_user.username,
        Some(&hash),
        Role::User,
    )
    .await?;
    tx.commit().await?;

    info!("POST /api/auth/register - Registered user {}", user.id);
    Ok((
        StatusCode::CREATED,
        Json(json!({ "user": UserProfile::from(&user) })),
    ))
}

async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<SessionResponse>> {
    // ---
    info!("POST /api/auth/login");
    let (email, password) = req.validate()?;
    let invalid = || ApiError::BadRequest("Invalid credentials".to_string());

    let user = repo::users::find_by_email(&state.pool, &email)
        .await?
        .filter(|user| user.is_active)
        .ok_or_else(invalid)?;
    if !verify_password(password, user.password_hash.clone()).await? {
        warn!("POST /api/auth/login - Bad password for user {}", user.id);
        return Err(invalid());
    }

    let tokens = state.tokens.issue_pair(user.id)?;
    info!("POST /api/auth/login - User {} logged in", user.id);
    Ok(Json(SessionResponse {
        user: UserProfile::from(&user),
        tokens,
    }))
}

async fn logout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<RefreshTokenRequest>,
) -> ApiResult<Json<Value>> {
    // ---
    info!("POST /api/auth/logout - user {}", user.id);
    let refresh_token = req
        .refresh_token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("Refresh token is required".to_string()))?;

    let mut tx = state.pool.begin().await?;
    state
        .tokens
        .revoke(&mut tx, refresh_token.trim(), user.id)
        .await?;
    tx.commit().await?;

    Ok(Json(json!({ "message": "Successfully logged out" })))
}

async fn refresh(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RefreshTokenRequest>,
) -> ApiResult<Json<TokenPair>> {
    // ---
    info!("POST /api/auth/token/refresh");
    let refresh_token = req
        .refresh_token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::field("refresh_token", "This field is required."))?;

    let mut tx = state.pool.begin().await?;
    let pair = state.tokens.rotate(&mut tx, refresh_token.trim()).await?;
    tx.commit().await?;

    Ok(Json(pair))
}

async fn me(AuthUser(user): AuthUser) -> Json<UserProfile> {
    // ---
    info!("GET /api/auth/me - user {}", user.id);
    Json(UserProfile::from(&user))
}

async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<ProfileUpdate>,
) -> ApiResult<Json<Value>> {
    // ---
    info!("PUT /api/auth/update_profile - user {}", user.id);
    let (username, email, password) = req.validate()?;

    let mut tx = state.pool.begin().await?;
    let mut current = repo::users::find_for_update(&mut *tx, user.id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found or inactive".to_string()))?;

    let mut v = Violations::new();
    if let Some(username) = username.filter(|u| *u != current.username) {
        if repo::users::username_taken(&mut *tx, &username, Some(current.id)).await? {
            v.add("username", "A user with this username already exists.");
        }
        current.username = username;
    }
    if let Some(email) = email.filter(|e| *e != current.email) {
        if repo::users::email_taken(&mut *tx, &email, Some(current.id)).await? {
            v.add("email", "A user with this email already exists.");
        }
        current.email = email;
    }
    v.finish()?;

    if let Some(change) = password {
        if !verify_password(change.current.clone(), current.password_hash.clone()).await? {
            return Err(ApiError::BadRequest(
                "Current password is incorrect".to_string(),
            ));
        }
        if !change.confirmed() {
            return Err(ApiError::BadRequest("New passwords do not match".to_string()));
        }
        current.password_hash = Some(hash_password(change.new, state.config.bcrypt_cost).await?);
        info!("PUT /api/auth/update_profile - Password changed for user {}", user.id);
    }

    let updated = repo::users::update_profile(&mut *tx, &current).await?;
    tx.commit().await?;

    Ok(Json(json!({
        "message": "Profile updated successfully",
        "user": ProfileSummary::from(&updated),
    })))
}

async fn google(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<GoogleRequest>,
) -> ApiResult<Json<SessionResponse>> {
    // ---
    info!("POST /api/auth/google");
    let token = req
        .token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::field("token", "This field is required."))?;

    let identity = state.google.verify(token.trim()).await.map_err(|err| match err {
        GoogleError::NotConfigured => {
            ApiError::BadRequest("Google sign-in is not configured".to_string())
        }
        GoogleError::InvalidToken(reason) => {
            warn!("POST /api/auth/google - Rejected token: {}", reason);
            ApiError::field("token", "Invalid Google token")
        }
        GoogleError::Keys(e) => ApiError::Internal(format!("Google JWKS fetch failed: {}", e)),
    })?;

    let email = identity
        .email
        .as_deref()
        .map(normalize_email)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Email not provided by Google".to_string()))?;

    let mut tx = state.pool.begin().await?;
    let user = match repo::users::find_by_email(&mut *tx, &email).await? {
        Some(user) => user,
        None => {
            let base = username_base(identity.name.as_deref());
            let username = free_username(&mut tx, &base).await?;
            let user = repo::users::insert(&mut *tx, &email, &username, None, Role::User).await?;
            info!("POST /api/auth/google - Created user {} ({})", user.id, user.username);
            user
        }
    };
    tx.commit().await?;

    if !user.is_active {
        return Err(ApiError::BadRequest("User account is disabled".to_string()));
    }

    let tokens = state.tokens.issue_pair(user.id)?;
    Ok(Json(SessionResponse {
        user: UserProfile::from(&user),
        tokens,
    }))
}
