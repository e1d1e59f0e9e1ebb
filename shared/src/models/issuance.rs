//! Issuance (octroi) records

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::LockPolicy;

/// Approval state of an issuance record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssuanceStatus {
    /// Initial state, being entered
    Saisie,
    PendingDirector,
    ApprovedDirector,
    ApprovedFinance,
    PendingHead,
    /// Terminal; the stock has been debited
    ApprovedHead,
    Rejected,
}

impl IssuanceStatus {
    pub const ALL: [IssuanceStatus; 7] = [
        IssuanceStatus::Saisie,
        IssuanceStatus::PendingDirector,
        IssuanceStatus::ApprovedDirector,
        IssuanceStatus::ApprovedFinance,
        IssuanceStatus::PendingHead,
        IssuanceStatus::ApprovedHead,
        IssuanceStatus::Rejected,
    ];

    /// States whose quantity is still waiting to leave the stock
    pub const PENDING: [IssuanceStatus; 5] = [
        IssuanceStatus::Saisie,
        IssuanceStatus::PendingDirector,
        IssuanceStatus::ApprovedDirector,
        IssuanceStatus::ApprovedFinance,
        IssuanceStatus::PendingHead,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssuanceStatus::Saisie => "SAISIE",
            IssuanceStatus::PendingDirector => "PENDING_DIRECTOR",
            IssuanceStatus::ApprovedDirector => "APPROVED_DIRECTOR",
            IssuanceStatus::ApprovedFinance => "APPROVED_FINANCE",
            IssuanceStatus::PendingHead => "PENDING_HEAD",
            IssuanceStatus::ApprovedHead => "APPROVED_HEAD",
            IssuanceStatus::Rejected => "REJECTED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        IssuanceStatus::ALL.into_iter().find(|status| status.as_str() == s)
    }

    pub fn is_pending(&self) -> bool {
        IssuanceStatus::PENDING.contains(self)
    }
}

impl std::fmt::Display for IssuanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A goods-distribution request moving stock out of a structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssuanceRecord {
    pub id: Uuid,
    /// Document number, e.g. "ISS-MSAS-DRS-2026-0007"
    pub number: String,
    /// Optional external reference (letter, request number)
    pub reference: Option<String>,
    pub issued_on: NaiveDate,
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub beneficiary_name: String,
    pub beneficiary_phone: Option<String>,
    pub reason: Option<String>,
    pub status: IssuanceStatus,
    pub is_locked: bool,
    pub observations: Option<String>,
    pub ministry_id: Uuid,
    pub structure_id: Uuid,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IssuanceRecord {
    /// Admins may delete locked issuance records
    pub const LOCK_POLICY: LockPolicy = LockPolicy::AdminOverridable;
}
