//! HTTP handlers for inventory management endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use shared::DashboardStats;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::inventory::{CreateItemInput, InventoryService, ItemView, UpdateItemInput};
use crate::AppState;

fn service(state: &AppState) -> InventoryService {
    InventoryService::new(state.store.clone(), state.config.store.conflict_retries)
}

/// Create an inventory item
pub async fn create_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateItemInput>,
) -> AppResult<(StatusCode, Json<ItemView>)> {
    let item = service(&state)
        .create_item(current_user.0.owner_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// List the caller's items
pub async fn list_items(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<ItemView>>> {
    let items = service(&state).list_items(current_user.0.owner_id).await?;
    Ok(Json(items))
}

/// Get a single item
pub async fn get_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<ItemView>> {
    let item = service(&state)
        .get_item(current_user.0.owner_id, item_id)
        .await?;
    Ok(Json(item))
}

/// Edit an item
pub async fn update_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(input): Json<UpdateItemInput>,
) -> AppResult<Json<ItemView>> {
    let item = service(&state)
        .edit_item(current_user.0.owner_id, item_id, input)
        .await?;
    Ok(Json(item))
}

/// Delete an item
pub async fn delete_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    service(&state)
        .delete_item(current_user.0.owner_id, item_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Dashboard figures
pub async fn get_inventory_stats(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<DashboardStats>> {
    let stats = service(&state)
        .dashboard_stats(current_user.0.owner_id)
        .await?;
    Ok(Json(stats))
}
