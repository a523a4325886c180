use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use tracing::{debug, info};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::models::{Plant, PlantPayload};
use crate::repo;
use crate::AppState;

use super::extract::{ApiJson, ApiPath};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/plants", get(list).post(create))
        .route(
            "/plants/{id}",
            get(retrieve).put(update).patch(update).delete(destroy),
        )
}

async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<Json<Vec<Plant>>> {
    // ---
    info!("GET /api/plants - user {}", user.id);
    let plants = repo::plants::list(&state.pool, user.id).await?;
    debug!("GET /api/plants - Returning {} plants", plants.len());
    Ok(Json(plants))
}

async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<PlantPayload>,
) -> ApiResult<(StatusCode, Json<Plant>)> {
    // ---
    info!("POST /api/plants - user {}", user.id);
    let new_plant = payload.into_new()?;

    let mut tx = state.pool.begin().await?;
    let plant = repo::plants::insert(&mut *tx, user.id, &new_plant).await?;
    tx.commit().await?;

    info!("POST /api/plants - Created plant {}", plant.id);
    Ok((StatusCode::CREATED, Json(plant)))
}

async fn retrieve(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Plant>> {
    // ---
    info!("GET /api/plants/{} - user {}", id, user.id);
    let plant = repo::plants::get(&state.pool, id, user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Plant"))?;
    Ok(Json(plant))
}

async fn update(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<PlantPayload>,
) -> ApiResult<Json<Plant>> {
    // ---
    info!("PUT /api/plants/{} - user {}", id, user.id);
    let mut tx = state.pool.begin().await?;

    let mut plant = repo::plants::get_for_update(&mut *tx, id, user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Plant"))?;
    payload.apply_to(&mut plant)?;
    let plant = repo::plants::update(&mut *tx, &plant).await?;

    tx.commit().await?;
    Ok(Json(plant))
}

async fn destroy(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    // ---
    info!("DELETE /api/plants/{} - user {}", id, user.id);
    let mut tx = state.pool.begin().await?;
    if !repo::plants::delete(&mut *tx, id, user.id).await? {
        return Err(ApiError::not_found("Plant"));
    }
    tx.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}
