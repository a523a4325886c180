use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use tracing::{debug, info};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::filter::QueryParams;
use crate::models::{Item, ItemPayload};
use crate::repo;
use crate::AppState;

use super::extract::{ApiJson, ApiPath, ApiQuery};

// ---

const PLANT_NOT_OWNED: &str = "Invalid plant or not owned by you.";

pub fn router() -> Router<AppState> {
    // ---
    Router::new()
        .route("/items", get(list).post(create))
        .route(
            "/items/{id}",
            get(retrieve).put(update).patch(update).delete(destroy),
        )
}

async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiQuery(params): ApiQuery<QueryParams>,
) -> ApiResult<Json<Vec<Item>>> {
    // ---
    info!("GET /api/items - user {}", user.id);
    let plant_id = params.id(&["plant", "plant_id"])?;
    let items = repo::items::list(&state.pool, user.id, plant_id).await?;
    debug!("GET /api/items - Returning {} items", items.len());
    Ok(Json(items))
}

async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiJson(payload): ApiJson<ItemPayload>,
) -> ApiResult<(StatusCode, Json<Item>)> {
    // ---
    info!("POST /api/items - user {}", user.id);
    let new_item = payload.into_new()?;

    let mut tx = state.pool.begin().await?;
    if !repo::plants::is_owned(&mut *tx, new_item.plant_id, user.id).await? {
        return Err(ApiError::field("plant", PLANT_NOT_OWNED));
    }
    let item = repo::items::insert(&mut *tx, &new_item).await?;
    tx.commit().await?;

    info!("POST /api/items - Created item {}", item.id);
    Ok((StatusCode::CREATED, Json(item)))
}

async fn retrieve(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<Json<Item>> {
    // ---
    info!("GET /api/items/{} - user {}", id, user.id);
    let item = repo::items::get(&state.pool, id, user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Item"))?;
    Ok(Json(item))
}

async fn update(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(payload): ApiJson<ItemPayload>,
) -> ApiResult<Json<Item>> {
    // ---
    info!("PUT /api/items/{} - user {}", id, user.id);
    let mut tx = state.pool.begin().await?;

    let mut item = repo::items::get_for_update(&mut *tx, id, user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Item"))?;
    let original_plant = item.plant_id;
    payload.apply_to(&mut item)?;

    if item.plant_id != original_plant
        && !repo::plants::is_owned(&mut *tx, item.plant_id, user.id).await?
    {
        return Err(ApiError::field("plant", PLANT_NOT_OWNED));
    }
    let item = repo::items::update(&mut *tx, &item).await?;

    tx.commit().await?;
    Ok(Json(item))
}

async fn destroy(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<StatusCode> {
    // ---
    info!("DELETE /api/items/{} - user {}", id, user.id);
    let mut tx = state.pool.begin().await?;
    if !repo::items::delete(&mut *tx, id, user.id).await? {
        return Err(ApiError::not_found("Item"));
    }
    tx.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}
