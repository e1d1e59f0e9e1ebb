//! HTTP handlers for product stock endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use shared::StockMovement;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentActor;
use crate::services::stock::{ProductStockStatus, StockService};
use crate::AppState;

/// Ledger movements of a product, newest first
pub async fn product_movements(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Vec<StockMovement>>> {
    let service = StockService::new(state.store.clone());
    let movements = service.movements(&actor, product_id).await?;
    Ok(Json(movements))
}

pub async fn product_stock_status(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ProductStockStatus>> {
    let service = StockService::new(state.store.clone());
    let status = service.status(&actor, product_id).await?;
    Ok(Json(status))
}
