use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use sqlx::PgConnection;
use tracing::{debug, info};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::filter::{EnergyFilter, EnergyMetric, Page, PageRequest, QueryParams};
use crate::models::{EnergyConsumption, EnergyPayload};
use crate::repo::{self, energy::EnergyRow};
use crate::AppState;

use super::extract::{ApiJson, ApiPath, ApiQuery};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/energy-consumption", get(list).post(create))
        .route("/energy-consumption/metrics", get(metrics))
        .route(
            "/energy-consumption/{id}",
            get(retrieve).put(update).patch(update).delete(destroy),
        )
}

/// Plant of an owned sensor. A `claimed` plant must agree with it.
async fn derive_plant(
    conn: &mut PgConnection,
    user_id: i64,
    sensor_id: i64,
    claimed: Option<i64>,
) -> ApiResult<i64> {
    // ---
    let plant_id = repo::sensors::owned_plant(conn, sensor_id, user_id)
        .await?
        .ok_or_else(|| ApiError::field("sensor", "Invalid sensor or not owned by you."))?;

    match claimed {
        Some(claimed) if claimed != plant_id => Err(ApiError::field(
            "plant",
            "Plant must match the sensor's plant.",
        )),
        _ => Ok(plant_id),
    }
}

async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiQuery(params): ApiQuery<QueryParams>,
) -> ApiResult<Json<Page<EnergyConsumption>>> {
    // ---
    info!("GET /api/energy-consumption - user {}", user.id);
    let filter = EnergyFilter::from_params(&params, Utc::now(), state.config.time_zone)?;
    let page = PageRequest::from_params(&params)?;

    let count = repo::energy::count(&state.pool, user.id, &filter).await?;
    page.check(count)?;
    let rows = repo::energy::list_page(&state.pool, user.id, &filter, page).await?;

    debug!(
        "GET /api/energy-consumption - Returning {} of {} entries",
        rows.len(),
        count
    );
    Ok(Json(Page::new(page, count, rows)))
}

async fn metrics(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiQuery(params): ApiQuery<QueryParams>,
) -> ApiResult<Response> {
    // ---
    info!("GET /api/energy-consumption/metrics - user {}", user.id);
    let metric = EnergyMetric::from_params(&params)?;
    let tz = state.config.time_zone;
    let filter = EnergyFilter::from_params(&params, Utc::now(), tz)?;

    let response = match metric {
        EnergyMetric::Daily => {
            let days = repo::energy::daily(&state.pool, user.id, &filter, tz).await?;
            debug!("GET /api/energy-consumption/metrics - {} days", days.len());
            Json(days).into_response()
        }
        EnergyMetric::SensorCost => {
            let sensors = repo::energy::by_sensor(&state.pool, user.id, &filter).await?;
            debug!("GET /api/energy-consumption/metrics - {} sensors", sensors.len());
            Json(sensors).into_response()
        }
    };
    Ok(response)
}

async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<EnergyPayload>,
) -> ApiResult<(StatusCode, Json<EnergyConsumption>)> {
    // ---
    info!("POST /api/energy-consumption - user {}", user.id);
    let new_log = payload.into_new(state.config.time_zone)?;

    let mut tx = state.pool.begin().await?;
    let plant_id =
        derive_plant(&mut tx, user.id, new_log.sensor_id, new_log.claimed_plant_id).await?;
    let row = EnergyRow {
        sensor_id: new_log.sensor_id,
        plant_id,
        timestamp: new_log.timestamp,
        energy_kwh: &new_log.energy_kwh,
        cost: new_log.cost.as_ref(),
    };
    let id = repo::energy::insert(&mut *tx, &row).await?;
    let log = repo::energy::get(&mut *tx, id, user.id)
        .await?
        .ok_or_else(|| ApiError::Internal(format!("Energy entry {} vanished after insert", id)))?;
    tx.commit().await?;

    info!("POST /api/energy-consumption - Created entry {}", id);
    Ok((StatusCode::CREATED, Json(log)))
}

async fn retrieve(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<EnergyConsumption>> {
    // ---
    info!("GET /api/energy-consumption/{} - user {}", id, user.id);
    let log = repo::energy::get(&state.pool, id, user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Energy consumption"))?;
    Ok(Json(log))
}

async fn update(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<EnergyPayload>,
) -> ApiResult<Json<EnergyConsumption>> {
    // ---
    info!("PUT /api/energy-consumption/{} - user {}", id, user.id);
    let mut tx = state.pool.begin().await?;

    let mut log = repo::energy::get_for_update(&mut *tx, id, user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Energy consumption"))?;
    let claimed_plant = payload.apply_to(&mut log, state.config.time_zone)?;
    let plant_id = derive_plant(&mut tx, user.id, log.sensor_id, claimed_plant).await?;

    let row = EnergyRow {
        sensor_id: log.sensor_id,
        plant_id,
        timestamp: Some(log.timestamp),
        energy_kwh: &log.energy_kwh,
        cost: log.cost.as_ref(),
    };
    repo::energy::update(&mut *tx, id, &row).await?;
    let log = repo::energy::get(&mut *tx, id, user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Energy consumption"))?;

    tx.commit().await?;
    Ok(Json(log))
}

async fn destroy(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    // ---
    info!("DELETE /api/energy-consumption/{} - user {}", id, user.id);
    let mut tx = state.pool.begin().await?;
    if !repo::energy::delete(&mut *tx, id, user.id).await? {
        return Err(ApiError::not_found("Energy consumption"));
    }
    tx.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}
