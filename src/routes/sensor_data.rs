use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use sqlx::PgConnection;
use tracing::{debug, info};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::filter::{Metric, MetricPoint, Page, PageRequest, QueryParams, SensorDataFilter};
use crate::models::{SensorDataPayload, SensorDataView};
use crate::repo;
use crate::AppState;

use super::extract::{ApiJson, ApiPath, ApiQuery};

// ---

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/sensor-data", get(list).post(create))
        .route("/sensor-data/metrics", get(metrics))
        .route(
            "/sensor-data/{id}",
            get(retrieve).put(update).patch(update).delete(destroy),
        )
}

/// Reject references to a sensor or item the caller does not own.
async fn check_references(
    conn: &mut PgConnection,
    user_id: i64,
    sensor_id: Option<i64>,
    item_id: Option<i64>,
) -> ApiResult<()> {
    // ---
    if let Some(sensor_id) = sensor_id {
        if repo::sensors::owned_plant(&mut *conn, sensor_id, user_id)
            .await?
            .is_none()
        {
            return Err(ApiError::field("sensor", "Invalid sensor or not owned by you."));
        }
    }
    if let Some(item_id) = item_id {
        if !repo::items::is_owned(&mut *conn, item_id, user_id).await? {
            return Err(ApiError::field("item", "Invalid item or not owned by you."));
        }
    }
    Ok(())
}

async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiQuery(params): ApiQuery<QueryParams>,
) -> ApiResult<Json<Page<SensorDataView>>> {
    // ---
    info!("GET /api/sensor-data - user {}", user.id);
    let filter = SensorDataFilter::from_params(&params, Utc::now(), state.config.time_zone)?;
    let page = PageRequest::from_params(&params)?;
    debug!("GET /api/sensor-data - {:?} {:?}", filter, page);

    let count = repo::sensor_data::count(&state.pool, user.id, &filter).await?;
    page.check(count)?;
    let rows = repo::sensor_data::list_page(&state.pool, user.id, &filter, page).await?;

    debug!(
        "GET /api/sensor-data - Returning {} of {} readings",
        rows.len(),
        count
    );
    let results = rows.into_iter().map(|row| row.into_view()).collect();
    Ok(Json(Page::new(page, count, results)))
}

async fn metrics(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiQuery(params): ApiQuery<QueryParams>,
) -> ApiResult<Json<Vec<MetricPoint>>> {
    // ---
    info!("GET /api/sensor-data/metrics - user {}", user.id);
    let metric = Metric::from_params(&params)?;
    let filter = SensorDataFilter::from_params(&params, Utc::now(), state.config.time_zone)?;

    let rows = repo::sensor_data::list_all(&state.pool, user.id, &filter).await?;
    debug!(
        "GET /api/sensor-data/metrics - {:?} over {} readings",
        metric,
        rows.len()
    );
    Ok(Json(rows.iter().map(|row| metric.project(row)).collect()))
}

async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<SensorDataPayload>,
) -> ApiResult<(StatusCode, Json<SensorDataView>)> {
    // ---
    info!("POST /api/sensor-data - user {}", user.id);
    let new_data = payload.into_new(state.config.time_zone)?;

    let mut tx = state.pool.begin().await?;
    check_references(&mut tx, user.id, Some(new_data.sensor_id), new_data.item_id).await?;
    let id = repo::sensor_data::insert(&mut *tx, &new_data).await?;
    let data = repo::sensor_data::get(&mut *tx, id, user.id)
        .await?
        .ok_or_else(|| ApiError::Internal(format!("Reading {} vanished after insert", id)))?;
    tx.commit().await?;

    info!("POST /api/sensor-data - Created reading {}", id);
    Ok((StatusCode::CREATED, Json(data.into_view())))
}

async fn retrieve(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<SensorDataView>> {
    // ---
    info!("GET /api/sensor-data/{} - user {}", id, user.id);
    let data = repo::sensor_data::get(&state.pool, id, user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Sensor data"))?;
    Ok(Json(data.into_view()))
}

async fn update(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<SensorDataPayload>,
) -> ApiResult<Json<SensorDataView>> {
    // ---
    info!("PUT /api/sensor-data/{} - user {}", id, user.id);
    let mut tx = state.pool.begin().await?;

    let mut data = repo::sensor_data::get_for_update(&mut *tx, id, user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Sensor data"))?;
    let (original_sensor, original_item) = (data.sensor_id, data.item_id);
    payload.apply_to(&mut data, state.config.time_zone)?;

    let changed_sensor = Some(data.sensor_id).filter(|&s| s != original_sensor);
    let changed_item = data.item_id.filter(|&i| Some(i) != original_item);
    check_references(&mut tx, user.id, changed_sensor, changed_item).await?;

    repo::sensor_data::update(&mut *tx, &data).await?;
    let data = repo::sensor_data::get(&mut *tx, id, user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Sensor data"))?;

    tx.commit().await?;
    Ok(Json(data.into_view()))
}

async fn destroy(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    // ---
    info!("DELETE /api/sensor-data/{} - user {}", id, user.id);
    let mut tx = state.pool.begin().await?;
    if !repo::sensor_data::delete(&mut *tx, id, user.id).await? {
        return Err(ApiError::not_found("Sensor data"));
    }
    tx.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}
