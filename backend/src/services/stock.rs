//! Product stock queries: ledger movements and stock level

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use shared::stock::{stock_status, StockStatus};
use shared::{Actor, Product, StockMovement};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::{ensure_scope, StockLedger};
use crate::store::WorkflowStore;

#[derive(Clone)]
pub struct StockService {
    store: Arc<dyn WorkflowStore>,
    ledger: StockLedger,
}

/// Stock level of one product
#[derive(Debug, Clone, Serialize)]
pub struct ProductStockStatus {
    pub product_id: Uuid,
    pub name: String,
    pub unit: String,
    pub quantity: Decimal,
    pub initial_quantity: Decimal,
    #[serde(flatten)]
    pub status: StockStatus,
}

impl StockService {
    pub fn new(store: Arc<dyn WorkflowStore>) -> Self {
        let ledger = StockLedger::new(store.clone());
        Self { store, ledger }
    }

    pub async fn movements(&self, actor: &Actor, product_id: Uuid) -> AppResult<Vec<StockMovement>> {
        self.visible_product(actor, product_id).await?;
        self.ledger.movements(product_id).await
    }

    pub async fn status(&self, actor: &Actor, product_id: Uuid) -> AppResult<ProductStockStatus> {
        let product = self.visible_product(actor, product_id).await?;
        Ok(ProductStockStatus {
            product_id: product.id,
            status: stock_status(product.quantity, product.initial_quantity),
            name: product.name,
            unit: product.unit,
            quantity: product.quantity,
            initial_quantity: product.initial_quantity,
        })
    }

    async fn visible_product(&self, actor: &Actor, product_id: Uuid) -> AppResult<Product> {
        let product = self
            .store
            .get_product(product_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("product {}", product_id)))?;
        ensure_scope(actor, product.ministry_id, product.structure_id)?;
        Ok(product)
    }
}
