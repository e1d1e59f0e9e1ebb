//! Stock ledger models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction of a stock movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    Entry,
    Exit,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Entry => "entry",
            MovementKind::Exit => "exit",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "entry" => Some(MovementKind::Entry),
            "exit" => Some(MovementKind::Exit),
            _ => None,
        }
    }
}

/// Immutable ledger line written exactly once per final approval
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockMovement {
    pub id: Uuid,
    pub kind: MovementKind,
    pub quantity: Decimal,
    pub product_id: Uuid,
    pub ministry_id: Uuid,
    pub structure_id: Uuid,
    pub supplier_name: Option<String>,
    pub supplier_tax_id: Option<String>,
    pub beneficiary_name: Option<String>,
    pub beneficiary_phone: Option<String>,
    /// Intake record that caused an entry
    pub intake_id: Option<Uuid>,
    /// Issuance record that caused an exit
    pub issuance_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Change applied to a product together with its movement
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProductMutation {
    /// Add to the on-hand quantity and take over the intake's unit price
    Receive { quantity: Decimal, unit_price: Decimal },
    /// Remove from the on-hand quantity, never below zero
    Issue { quantity: Decimal },
}

/// Everything the stock ledger writes for one final approval
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerPosting {
    pub movement: StockMovement,
    pub mutation: ProductMutation,
}

impl LedgerPosting {
    pub fn product_id(&self) -> Uuid {
        self.movement.product_id
    }
}
