//! Audit log: append-only trail of successful workflow steps

use std::sync::Arc;

use chrono::Utc;
use shared::{Actor, AuditAction, AuditEntry, EntityType};
use uuid::Uuid;

use crate::error::AppResult;
use crate::store::WorkflowStore;

/// Role name recorded for an actor: the role that authorised the step, even
/// when the actor also holds the admin flag
pub fn actor_label(actor: &Actor) -> String {
    actor.role.display_name().to_string()
}

/// Build the entry for one step. Entries are written by the store together
/// with the change they describe, never on their own.
pub fn entry(
    entity_type: EntityType,
    entity_id: Uuid,
    action: AuditAction,
    from_state: &str,
    to_state: &str,
    actor: &Actor,
    observations: Option<String>,
) -> AuditEntry {
    AuditEntry {
        id: Uuid::new_v4(),
        entity_type,
        entity_id,
        action,
        from_state: from_state.to_string(),
        to_state: to_state.to_string(),
        actor_id: actor.user_id,
        actor_role: actor_label(actor),
        observations,
        created_at: Utc::now(),
    }
}

/// Read side of the audit trail
#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn WorkflowStore>,
}

impl AuditLog {
    pub fn new(store: Arc<dyn WorkflowStore>) -> Self {
        Self { store }
    }

    /// Entries of one record, newest first
    pub async fn trail(&self, entity_type: EntityType, entity_id: Uuid) -> AppResult<Vec<AuditEntry>> {
        Ok(self.store.audit_trail(entity_type, entity_id).await?)
    }
}
