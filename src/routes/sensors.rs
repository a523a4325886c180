use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use tracing::{debug, info};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::filter::QueryParams;
use crate::models::{Sensor, SensorPayload};
use crate::repo::{self, sensors::SensorListFilter};
use crate::AppState;

use super::extract::{ApiJson, ApiPath, ApiQuery};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/sensors", get(list).post(create))
        .route(
            "/sensors/{id}",
            get(retrieve).put(update).patch(update).delete(destroy),
        )
}

/// `status=active|inactive`; anything else leaves the list unfiltered.
fn status_filter(params: &QueryParams) -> Option<bool> {
    match params.first(&["status"]) {
        Some("active") => Some(true),
        Some("inactive") => Some(false),
        _ => None,
    }
}

async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiQuery(params): ApiQuery<QueryParams>,
) -> ApiResult<Json<Vec<Sensor>>> {
    // ---
    info!("GET /api/sensors - user {}", user.id);
    let filter = SensorListFilter {
        plant_id: params.id(&["plant", "plant_id"])?,
        is_active: status_filter(&params),
    };
    let sensors = repo::sensors::list(&state.pool, user.id, filter).await?;
    debug!("GET /api/sensors - Returning {} sensors", sensors.len());
    Ok(Json(sensors))
}

async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<SensorPayload>,
) -> ApiResult<(StatusCode, Json<Sensor>)> {
    // ---
    info!("POST /api/sensors - user {}", user.id);
    let new_sensor = payload.into_new(state.config.time_zone)?;

    let mut tx = state.pool.begin().await?;
    if !repo::plants::is_owned(&mut *tx, new_sensor.plant_id, user.id).await? {
        return Err(ApiError::field("plant", "Invalid plant or not owned by you."));
    }
    let sensor = repo::sensors::insert(&mut *tx, &new_sensor).await?;
    tx.commit().await?;

    info!("POST /api/sensors - Created sensor {}", sensor.id);
    Ok((StatusCode::CREATED, Json(sensor)))
}

async fn retrieve(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Sensor>> {
    // ---
    info!("GET /api/sensors/{} - user {}", id, user.id);
    let sensor = repo::sensors::get(&state.pool, id, user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Sensor"))?;
    Ok(Json(sensor))
}

async fn update(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<SensorPayload>,
) -> ApiResult<Json<Sensor>> {
    // ---
    info!("PUT /api/sensors/{} - user {}", id, user.id);
    let mut tx = state.pool.begin().await?;

    let mut sensor = repo::sensors::get_for_update(&mut *tx, id, user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Sensor"))?;
    payload.apply_to(&mut sensor, state.config.time_zone)?;
    let sensor = repo::sensors::update(&mut *tx, &sensor).await?;

    tx.commit().await?;
    Ok(Json(sensor))
}

async fn destroy(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    // ---
    info!("DELETE /api/sensors/{} - user {}", id, user.id);
    let mut tx = state.pool.begin().await?;
    if !repo::sensors::delete(&mut *tx, id, user.id).await? {
        return Err(ApiError::not_found("Sensor"));
    }
    tx.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}
