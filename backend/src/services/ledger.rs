//! Stock ledger writer
//!
//! The only place that describes changes to a product's on-hand quantity.
//! A [`LedgerPosting`] pairs the movement line with the product mutation; the
//! store applies both together with the record change and its audit entry.

use std::sync::Arc;

use chrono::Utc;
use shared::{
    IntakeRecord, IssuanceRecord, LedgerPosting, MovementKind, ProductMutation, StockMovement,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::store::WorkflowStore;

#[derive(Clone)]
pub struct StockLedger {
    store: Arc<dyn WorkflowStore>,
}

impl StockLedger {
    pub fn new(store: Arc<dyn WorkflowStore>) -> Self {
        Self { store }
    }

    /// Entry posting for a finally approved intake: credits the quantity and
    /// takes over the intake's unit price
    pub fn receipt(record: &IntakeRecord) -> LedgerPosting {
        LedgerPosting {
            movement: StockMovement {
                id: Uuid::new_v4(),
                kind: MovementKind::Entry,
                quantity: record.quantity,
                product_id: record.product_id,
                ministry_id: record.ministry_id,
                structure_id: record.structure_id,
                supplier_name: Some(record.supplier_name.clone()),
                supplier_tax_id: record.supplier_tax_id.clone(),
                beneficiary_name: None,
                beneficiary_phone: None,
                intake_id: Some(record.id),
                issuance_id: None,
                created_at: Utc::now(),
            },
            mutation: ProductMutation::Receive {
                quantity: record.quantity,
                unit_price: record.unit_price,
            },
        }
    }

    /// Exit posting for a finally approved issuance
    pub fn issue(record: &IssuanceRecord) -> LedgerPosting {
        LedgerPosting {
            movement: StockMovement {
                id: Uuid::new_v4(),
                kind: MovementKind::Exit,
                quantity: record.quantity,
                product_id: record.product_id,
                ministry_id: record.ministry_id,
                structure_id: record.structure_id,
                supplier_name: None,
                supplier_tax_id: None,
                beneficiary_name: Some(record.beneficiary_name.clone()),
                beneficiary_phone: record.beneficiary_phone.clone(),
                intake_id: None,
                issuance_id: Some(record.id),
                created_at: Utc::now(),
            },
            mutation: ProductMutation::Issue {
                quantity: record.quantity,
            },
        }
    }

    /// Movements of a product, newest first
    pub async fn movements(&self, product_id: Uuid) -> AppResult<Vec<StockMovement>> {
        Ok(self.store.movements_for_product(product_id).await?)
    }
}
