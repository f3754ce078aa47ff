//! HTTP handlers for notarization endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::inventory::ItemView;
use crate::services::notarization::{LedgerRecordView, NotarizationService};
use crate::AppState;

fn service(state: &AppState) -> NotarizationService {
    NotarizationService::new(
        state.store.clone(),
        state.ledger.clone(),
        state.config.ledger.timeout(),
        state.config.store.conflict_retries,
    )
}

/// Notarize an item's live values; also used to sync a drifted item
pub async fn publish_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<ItemView>> {
    let item = service(&state)
        .publish(current_user.0.owner_id, item_id)
        .await?;
    Ok(Json(item))
}

/// Withdraw an item from the marketplace
pub async fn unpublish_item(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<ItemView>> {
    let item = service(&state)
        .unpublish(current_user.0.owner_id, item_id)
        .await?;
    Ok(Json(item))
}

/// Ledger record of one item
pub async fn get_item_ledger_record(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<LedgerRecordView>> {
    let record = service(&state)
        .ledger_record(current_user.0.owner_id, item_id)
        .await?;
    Ok(Json(record))
}

/// Ledger records of all the caller's notarized items
pub async fn list_ledger_records(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<LedgerRecordView>>> {
    let records = service(&state)
        .ledger_explorer(current_user.0.owner_id)
        .await?;
    Ok(Json(records))
}
