//! Public marketplace handlers

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::inventory::{InventoryService, MarketplaceListing};
use crate::AppState;

/// Published items with their verified values
pub async fn list_marketplace(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<MarketplaceListing>>> {
    let service = InventoryService::new(state.store, state.config.store.conflict_retries);
    let listings = service.marketplace_listing().await?;
    Ok(Json(listings))
}

/// A single published item
pub async fn get_marketplace_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<MarketplaceListing>> {
    let service = InventoryService::new(state.store, state.config.store.conflict_retries);
    let listing = service.marketplace_item(item_id).await?;
    Ok(Json(listing))
}
