//! Intake (alimentation) records

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::LockPolicy;

/// Approval state of an intake record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntakeStatus {
    /// Never produced by creation, kept for records imported in that state
    Draft,
    PendingFinance,
    ApprovedFinance,
    /// Reserved, no transition leads here
    PendingDirector,
    ApprovedDirector,
    PendingHead,
    /// Terminal; the stock has been credited
    ApprovedHead,
    Rejected,
}

impl IntakeStatus {
    pub const ALL: [IntakeStatus; 8] = [
        IntakeStatus::Draft,
        IntakeStatus::PendingFinance,
        IntakeStatus::ApprovedFinance,
        IntakeStatus::PendingDirector,
        IntakeStatus::ApprovedDirector,
        IntakeStatus::PendingHead,
        IntakeStatus::ApprovedHead,
        IntakeStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IntakeStatus::Draft => "DRAFT",
            IntakeStatus::PendingFinance => "PENDING_FINANCE",
            IntakeStatus::ApprovedFinance => "APPROVED_FINANCE",
            IntakeStatus::PendingDirector => "PENDING_DIRECTOR",
            IntakeStatus::ApprovedDirector => "APPROVED_DIRECTOR",
            IntakeStatus::PendingHead => "PENDING_HEAD",
            IntakeStatus::ApprovedHead => "APPROVED_HEAD",
            IntakeStatus::Rejected => "REJECTED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        IntakeStatus::ALL.into_iter().find(|status| status.as_str() == s)
    }
}

impl std::fmt::Display for IntakeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A goods-receipt request moving stock into a structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntakeRecord {
    pub id: Uuid,
    /// Document number, e.g. "INT-2026-0042"
    pub number: String,
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub supplier_name: String,
    pub supplier_tax_id: Option<String>,
    pub status: IntakeStatus,
    /// One-way latch set by final approval
    pub is_locked: bool,
    pub observations: Option<String>,
    pub ministry_id: Uuid,
    pub structure_id: Uuid,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IntakeRecord {
    /// Locked intake records can never be deleted, not even by an admin
    pub const LOCK_POLICY: LockPolicy = LockPolicy::Absolute;

    pub fn total_value(&self) -> Decimal {
        self.quantity * self.unit_price
    }
}
