//! HTTP handlers for sale endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::sales::{CreateSaleInput, SaleService, SaleView, SalesTotal, UpdateSaleInput};
use crate::AppState;

fn service(state: &AppState) -> SaleService {
    SaleService::new(state.store.clone(), state.config.store.conflict_retries)
}

/// Record a sale
pub async fn create_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateSaleInput>,
) -> AppResult<(StatusCode, Json<SaleView>)> {
    let sale = service(&state)
        .create_sale(current_user.0.owner_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(sale)))
}

/// Sales history
pub async fn list_sales(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<SaleView>>> {
    let sales = service(&state).list_sales(current_user.0.owner_id).await?;
    Ok(Json(sales))
}

/// Total received across all sales
pub async fn get_sales_total(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<SalesTotal>> {
    let total = service(&state).total_sales(current_user.0.owner_id).await?;
    Ok(Json(total))
}

pub async fn get_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(sale_id): Path<Uuid>,
) -> AppResult<Json<SaleView>> {
    let sale = service(&state)
        .get_sale(current_user.0.owner_id, sale_id)
        .await?;
    Ok(Json(sale))
}

/// Edit a sale
pub async fn update_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(sale_id): Path<Uuid>,
    Json(input): Json<UpdateSaleInput>,
) -> AppResult<Json<SaleView>> {
    let sale = service(&state)
        .update_sale(current_user.0.owner_id, sale_id, input)
        .await?;
    Ok(Json(sale))
}

/// Delete a sale
pub async fn delete_sale(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(sale_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    service(&state)
        .delete_sale(current_user.0.owner_id, sale_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
