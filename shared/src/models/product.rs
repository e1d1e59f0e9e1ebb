//! Products and the organisational units they belong to

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stocked article. Its quantity only changes through the stock ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    /// Unit of measure (e.g. "carton", "kg")
    pub unit: String,
    /// Current on-hand quantity
    pub quantity: Decimal,
    /// Baseline used for alert threshold computation
    pub initial_quantity: Decimal,
    pub unit_price: Decimal,
    pub ministry_id: Uuid,
    pub structure_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A structure together with the abbreviations used for document numbers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Structure {
    pub id: Uuid,
    pub ministry_id: Uuid,
    pub name: String,
    pub abbreviation: Option<String>,
    pub ministry_abbreviation: Option<String>,
}
