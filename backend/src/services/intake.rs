//! Intake (alimentation) workflow service
//!
//! Creation, the finance/director/head-of-entity approval chain, rework by
//! purchasing and deletion. Final approval credits the product through the
//! stock ledger in the same atomic unit as the state change.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::workflow::{intake as rules, Effect, WorkflowAction};
use shared::{
    Actor, AuditAction, AuditEntry, EntityType, IntakeRecord, IntakeStatus, Role,
};
use uuid::Uuid;
use validator::Validate;

use crate::config::NumberingConfig;
use crate::error::{AppError, AppResult};
use crate::services::{
    audit, ensure_scope, required_observations, visible_scope, AuditLog, SequenceAllocator,
    StockLedger,
};
use crate::store::{IntakeUpdate, StatusChange, WorkflowStore};

/// Intake workflow service
#[derive(Clone)]
pub struct IntakeService {
    store: Arc<dyn WorkflowStore>,
    sequences: SequenceAllocator,
    audit_log: AuditLog,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateIntakeInput {
    pub product_id: Uuid,
    #[validate(custom = "shared::validation::positive_decimal")]
    pub quantity: Decimal,
    #[validate(custom = "shared::validation::positive_decimal")]
    pub unit_price: Decimal,
    #[validate(custom = "shared::validation::not_blank")]
    pub supplier_name: String,
    pub supplier_tax_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EditIntakeInput {
    #[validate(custom = "shared::validation::positive_decimal")]
    pub quantity: Decimal,
    #[validate(custom = "shared::validation::positive_decimal")]
    pub unit_price: Decimal,
    #[validate(custom = "shared::validation::not_blank")]
    pub supplier_name: String,
    pub supplier_tax_id: Option<String>,
    pub observations: Option<String>,
}

impl IntakeService {
    pub fn new(store: Arc<dyn WorkflowStore>, numbering: NumberingConfig) -> Self {
        let sequences = SequenceAllocator::new(store.clone(), numbering);
        let audit_log = AuditLog::new(store.clone());
        Self {
            store,
            sequences,
            audit_log,
        }
    }

    /// Create an intake record pending finance approval
    pub async fn create(&self, actor: &Actor, input: CreateIntakeInput) -> AppResult<IntakeRecord> {
        check_amounts(input.quantity, input.unit_price)?;
        input.validate()?;

        if actor.role != Role::Purchasing {
            return Err(AppError::InvalidTransition {
                current_state: String::new(),
                message: format!("role {} may not create intake records", actor.role),
            });
        }

        let product = self
            .store
            .get_product(input.product_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("product {}", input.product_id)))?;

        if !actor.is_admin && actor.ministry_id != Some(product.ministry_id) {
            return Err(AppError::Forbidden(
                "Intakes can only be created for products of your ministry".to_string(),
            ));
        }

        let number = self.sequences.next_intake_number().await?;
        let now = Utc::now();
        let record = IntakeRecord {
            id: Uuid::new_v4(),
            number,
            product_id: product.id,
            quantity: input.quantity,
            unit_price: input.unit_price,
            supplier_name: input.supplier_name.trim().to_string(),
            supplier_tax_id: shared::normalize_optional(input.supplier_tax_id),
            status: IntakeStatus::PendingFinance,
            is_locked: false,
            observations: None,
            ministry_id: product.ministry_id,
            structure_id: product.structure_id,
            created_by: actor.user_id,
            created_at: now,
            updated_at: now,
        };

        let entry = audit::entry(
            EntityType::Intake,
            record.id,
            AuditAction::Create,
            "",
            record.status.as_str(),
            actor,
            None,
        );
        self.store.insert_intake(&record, &entry).await?;

        tracing::info!(
            record_id = %record.id,
            numero = %record.number,
            role = %actor.role,
            "intake created"
        );
        Ok(record)
    }

    pub async fn put_on_hold(
        &self,
        actor: &Actor,
        id: Uuid,
        observations: Option<String>,
    ) -> AppResult<IntakeRecord> {
        self.transition(actor, id, WorkflowAction::PutOnHold, observations)
            .await
    }

    pub async fn approve(
        &self,
        actor: &Actor,
        id: Uuid,
        observations: Option<String>,
    ) -> AppResult<IntakeRecord> {
        self.transition(actor, id, WorkflowAction::Approve, observations)
            .await
    }

    /// Reject an intake; observations are mandatory and the record stays unlocked
    pub async fn reject(
        &self,
        actor: &Actor,
        id: Uuid,
        observations: Option<String>,
    ) -> AppResult<IntakeRecord> {
        let observations = required_observations(observations)?;
        self.transition(actor, id, WorkflowAction::Reject, Some(observations))
            .await
    }

    /// Finance keeps a pending record on hold: the state stays
    /// PENDING_FINANCE, the observations are recorded.
    pub async fn keep_on_hold(
        &self,
        actor: &Actor,
        id: Uuid,
        observations: Option<String>,
    ) -> AppResult<IntakeRecord> {
        let observations = required_observations(observations)?;
        let record = self.load(id).await?;
        ensure_scope(actor, record.ministry_id, record.structure_id)?;

        if actor.role != Role::Finance {
            return Err(AppError::InvalidTransition {
                current_state: record.status.to_string(),
                message: format!("role {} may not keep intake records on hold", actor.role),
            });
        }
        if record.status != IntakeStatus::PendingFinance {
            return Err(AppError::InvalidTransition {
                current_state: record.status.to_string(),
                message: "only intakes pending finance can be kept on hold".to_string(),
            });
        }
        if record.is_locked {
            return Err(locked(&record));
        }

        let change = StatusChange {
            id,
            expected: IntakeStatus::PendingFinance,
            next: IntakeStatus::PendingFinance,
            lock: false,
            observations: Some(observations.clone()),
        };
        let entry = audit::entry(
            EntityType::Intake,
            id,
            AuditAction::Hold,
            record.status.as_str(),
            record.status.as_str(),
            actor,
            Some(observations),
        );

        match self
            .store
            .commit_intake_transition(&change, None, &entry)
            .await?
        {
            Some(updated) => {
                tracing::info!(record_id = %id, numero = %updated.number, "intake kept on hold");
                Ok(updated)
            }
            None => Err(self.explain_lost_guard(id).await),
        }
    }

    /// Rework an intake before approval; the record returns to PENDING_FINANCE
    pub async fn edit(
        &self,
        actor: &Actor,
        id: Uuid,
        input: EditIntakeInput,
    ) -> AppResult<IntakeRecord> {
        check_amounts(input.quantity, input.unit_price)?;
        input.validate()?;

        let record = self.load(id).await?;
        if !rules::may_rework(actor.role, actor.is_admin) {
            return Err(AppError::InvalidTransition {
                current_state: record.status.to_string(),
                message: format!("role {} may not edit intake records", actor.role),
            });
        }
        ensure_scope(actor, record.ministry_id, record.structure_id)?;
        if record.is_locked {
            return Err(locked(&record));
        }
        if !rules::editable_states(actor.is_admin).contains(&record.status) {
            return Err(AppError::InvalidTransition {
                current_state: record.status.to_string(),
                message: "this intake can no longer be edited".to_string(),
            });
        }

        let next = IntakeStatus::PendingFinance;
        let entry = (record.status != next).then(|| {
            audit::entry(
                EntityType::Intake,
                id,
                AuditAction::Edit,
                record.status.as_str(),
                next.as_str(),
                actor,
                Some("Intake edited and returned to finance".to_string()),
            )
        });
        let update = IntakeUpdate {
            id,
            expected: record.status,
            next,
            quantity: input.quantity,
            unit_price: input.unit_price,
            supplier_name: input.supplier_name.trim().to_string(),
            supplier_tax_id: shared::normalize_optional(input.supplier_tax_id),
            observations: shared::normalize_optional(input.observations),
        };

        match self.store.update_intake(&update, entry.as_ref()).await? {
            Some(updated) => {
                tracing::info!(
                    record_id = %id,
                    from = %record.status,
                    to = %updated.status,
                    "intake edited"
                );
                Ok(updated)
            }
            None => Err(self.explain_lost_guard(id).await),
        }
    }

    /// Delete an intake and its audit trail. Locked intakes are never deleted.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> AppResult<()> {
        let record = self.load(id).await?;
        if !rules::may_rework(actor.role, actor.is_admin) {
            return Err(AppError::InvalidTransition {
                current_state: record.status.to_string(),
                message: format!("role {} may not delete intake records", actor.role),
            });
        }
        if IntakeRecord::LOCK_POLICY.blocks_delete(record.is_locked, actor.is_admin) {
            return Err(locked(&record));
        }
        if !actor.is_admin {
            ensure_scope(actor, record.ministry_id, record.structure_id)?;
            if !rules::DELETABLE_BY_NON_ADMIN.contains(&record.status) {
                return Err(AppError::InvalidTransition {
                    current_state: record.status.to_string(),
                    message: "only an admin can delete an intake in this state".to_string(),
                });
            }
        }

        if self.store.delete_intake(id, record.status).await? {
            tracing::info!(record_id = %id, numero = %record.number, "intake deleted");
            Ok(())
        } else {
            Err(self.explain_lost_guard(id).await)
        }
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> AppResult<IntakeRecord> {
        let record = self.load(id).await?;
        ensure_scope(actor, record.ministry_id, record.structure_id)?;
        Ok(record)
    }

    pub async fn list(&self, actor: &Actor) -> AppResult<Vec<IntakeRecord>> {
        let scope = visible_scope(actor)?;
        Ok(self.store.list_intakes(scope).await?)
    }

    /// Audit trail of an intake, newest first
    pub async fn history(&self, actor: &Actor, id: Uuid) -> AppResult<Vec<AuditEntry>> {
        self.get(actor, id).await?;
        self.audit_log.trail(EntityType::Intake, id).await
    }

    async fn load(&self, id: Uuid) -> AppResult<IntakeRecord> {
        self.store
            .get_intake(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("intake {}", id)))
    }

    async fn transition(
        &self,
        actor: &Actor,
        id: Uuid,
        action: WorkflowAction,
        observations: Option<String>,
    ) -> AppResult<IntakeRecord> {
        let observations = shared::normalize_optional(observations);
        let record = self.load(id).await?;
        ensure_scope(actor, record.ministry_id, record.structure_id)?;

        let step = rules::TRANSITIONS
            .next(action, actor.role, record.status)
            .map_err(|denied| {
                tracing::debug!(
                    record_id = %id,
                    role = %actor.role,
                    state = %record.status,
                    reason = %denied.reason,
                    "intake transition refused"
                );
                AppError::from(denied)
            })?;
        if record.is_locked {
            return Err(locked(&record));
        }

        let posting = (step.effect == Effect::PostStock).then(|| StockLedger::receipt(&record));
        let change = StatusChange {
            id,
            expected: step.from,
            next: step.to,
            lock: step.effect.locks(),
            observations: observations.clone(),
        };
        let entry = audit::entry(
            EntityType::Intake,
            id,
            action.audit_action(),
            step.from.as_str(),
            step.to.as_str(),
            actor,
            observations,
        );

        match self
            .store
            .commit_intake_transition(&change, posting.as_ref(), &entry)
            .await?
        {
            Some(updated) => {
                tracing::info!(
                    record_id = %id,
                    numero = %updated.number,
                    from = %step.from,
                    to = %step.to,
                    role = %actor.role,
                    "intake transition applied"
                );
                Ok(updated)
            }
            None => Err(self.explain_lost_guard(id).await),
        }
    }

    /// A guarded write matched nothing: someone changed the record first.
    /// Describe the state it is actually in now.
    async fn explain_lost_guard(&self, id: Uuid) -> AppError {
        match self.store.get_intake(id).await {
            Ok(Some(current)) if current.is_locked => AppError::InvalidTransition {
                current_state: current.status.to_string(),
                message: "this intake was finalized by a concurrent request".to_string(),
            },
            Ok(Some(current)) => AppError::InvalidTransition {
                current_state: current.status.to_string(),
                message: "this intake was changed by a concurrent request".to_string(),
            },
            Ok(None) => AppError::NotFound(format!("intake {}", id)),
            Err(err) => err.into(),
        }
    }
}

fn check_amounts(quantity: Decimal, unit_price: Decimal) -> AppResult<()> {
    if quantity <= Decimal::ZERO {
        return Err(AppError::validation(
            "quantity",
            "Quantity must be greater than zero",
            "La quantité doit être supérieure à 0",
        ));
    }
    if unit_price <= Decimal::ZERO {
        return Err(AppError::validation(
            "unit_price",
            "Unit price must be greater than zero",
            "Le prix unitaire doit être supérieur à 0",
        ));
    }
    if shared::validate_scale(quantity, shared::QUANTITY_SCALE).is_err() {
        return Err(AppError::validation(
            "quantity",
            "Quantity allows at most 3 decimal places",
            "La quantité accepte au plus 3 décimales",
        ));
    }
    if shared::validate_scale(unit_price, shared::PRICE_SCALE).is_err() {
        return Err(AppError::validation(
            "unit_price",
            "Unit price allows at most 2 decimal places",
            "Le prix unitaire accepte au plus 2 décimales",
        ));
    }
    Ok(())
}

fn locked(record: &IntakeRecord) -> AppError {
    AppError::RecordLocked(format!("intake {} is locked", record.number))
}
