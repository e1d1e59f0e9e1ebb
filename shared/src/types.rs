//! Common types used across the engine

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of record an audit entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    Intake,
    Issuance,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Intake => "INTAKE",
            EntityType::Issuance => "ISSUANCE",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "INTAKE" => Some(EntityType::Intake),
            "ISSUANCE" => Some(EntityType::Issuance),
            _ => None,
        }
    }
}

/// How a workflow treats the lock flag when a record is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockPolicy {
    /// A locked record can never be deleted
    Absolute,
    /// Admins may delete locked records
    AdminOverridable,
}

impl LockPolicy {
    pub fn blocks_delete(&self, is_locked: bool, is_admin: bool) -> bool {
        match self {
            LockPolicy::Absolute => is_locked,
            LockPolicy::AdminOverridable => is_locked && !is_admin,
        }
    }
}

/// Which records a listing may return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ScopeFilter {
    All,
    Ministry(Uuid),
    Structure(Uuid),
}

impl ScopeFilter {
    pub fn matches(&self, ministry_id: Uuid, structure_id: Uuid) -> bool {
        match self {
            ScopeFilter::All => true,
            ScopeFilter::Ministry(id) => *id == ministry_id,
            ScopeFilter::Structure(id) => *id == structure_id,
        }
    }
}
