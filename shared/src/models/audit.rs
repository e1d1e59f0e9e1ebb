//! Audit trail models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::EntityType;

/// Kind of workflow step recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Hold,
    Approve,
    Reject,
    Edit,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Hold => "HOLD",
            AuditAction::Approve => "APPROVE",
            AuditAction::Reject => "REJECT",
            AuditAction::Edit => "EDIT",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "CREATE" => Some(AuditAction::Create),
            "HOLD" => Some(AuditAction::Hold),
            "APPROVE" => Some(AuditAction::Approve),
            "REJECT" => Some(AuditAction::Reject),
            "EDIT" => Some(AuditAction::Edit),
            _ => None,
        }
    }
}

/// One successful workflow step. Never updated once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditEntry {
    pub id: Uuid,
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub action: AuditAction,
    /// Empty for creation entries
    pub from_state: String,
    pub to_state: String,
    pub actor_id: Uuid,
    pub actor_role: String,
    pub observations: Option<String>,
    pub created_at: DateTime<Utc>,
}
