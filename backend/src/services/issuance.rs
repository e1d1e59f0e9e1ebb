//! Issuance (octroi) workflow service
//!
//! Entry by purchasing or data entry agents, then the director, finance and
//! head-of-entity approval chain. Final approval debits the product; the
//! store refuses the debit when the product no longer holds enough.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::workflow::{issuance as rules, Effect, WorkflowAction};
use shared::{
    Actor, AuditAction, AuditEntry, EntityType, IssuanceRecord, IssuanceStatus, Product,
};
use uuid::Uuid;
use validator::Validate;

use crate::config::NumberingConfig;
use crate::error::{AppError, AppResult};
use crate::services::{
    audit, ensure_scope, required_observations, visible_scope, AuditLog, SequenceAllocator,
    StockLedger,
};
use crate::store::{IssuanceUpdate, StatusChange, StoreError, WorkflowStore};

#[derive(Clone)]
pub struct IssuanceService {
    store: Arc<dyn WorkflowStore>,
    sequences: SequenceAllocator,
    audit_log: AuditLog,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateIssuanceInput {
    pub product_id: Uuid,
    #[validate(custom = "shared::validation::positive_decimal")]
    pub quantity: Decimal,
    #[validate(custom = "shared::validation::not_blank")]
    pub beneficiary_name: String,
    #[validate(custom = "shared::validation::phone_number")]
    pub beneficiary_phone: Option<String>,
    pub reason: Option<String>,
    pub reference: Option<String>,
    /// Defaults to today
    pub issued_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct EditIssuanceInput {
    /// Switch the issuance to another product
    pub product_id: Option<Uuid>,
    #[validate(custom = "shared::validation::positive_decimal")]
    pub quantity: Decimal,
    #[validate(custom = "shared::validation::not_blank")]
    pub beneficiary_name: String,
    #[validate(custom = "shared::validation::phone_number")]
    pub beneficiary_phone: Option<String>,
    pub reason: Option<String>,
    pub reference: Option<String>,
    pub issued_on: Option<NaiveDate>,
    pub observations: Option<String>,
}

impl IssuanceService {
    pub fn new(store: Arc<dyn WorkflowStore>, numbering: NumberingConfig) -> Self {
        let sequences = SequenceAllocator::new(store.clone(), numbering);
        let audit_log = AuditLog::new(store.clone());
        Self {
            store,
            sequences,
            audit_log,
        }
    }

    /// Create an issuance record in SAISIE.
    ///
    /// The availability check here is advisory; stock is only reserved by the
    /// conditional debit at final approval.
    pub async fn create(
        &self,
        actor: &Actor,
        input: CreateIssuanceInput,
    ) -> AppResult<IssuanceRecord> {
        check_quantity(input.quantity)?;
        input.validate()?;

        if !rules::may_enter(actor.role) {
            return Err(AppError::InvalidTransition {
                current_state: String::new(),
                message: format!("role {} may not create issuance records", actor.role),
            });
        }

        let product = self.load_product(input.product_id).await?;
        ensure_scope(actor, product.ministry_id, product.structure_id)?;
        check_available(product.quantity, input.quantity)?;

        let structure = self
            .store
            .get_structure(product.structure_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("structure {}", product.structure_id)))?;
        let number = self.sequences.next_issuance_number(&structure).await?;

        let now = Utc::now();
        let record = IssuanceRecord {
            id: Uuid::new_v4(),
            number,
            reference: shared::normalize_optional(input.reference),
            issued_on: input.issued_on.unwrap_or_else(|| now.date_naive()),
            product_id: product.id,
            quantity: input.quantity,
            beneficiary_name: input.beneficiary_name.trim().to_string(),
            beneficiary_phone: shared::normalize_optional(input.beneficiary_phone),
            reason: shared::normalize_optional(input.reason),
            status: IssuanceStatus::Saisie,
            is_locked: false,
            observations: None,
            ministry_id: product.ministry_id,
            structure_id: product.structure_id,
            created_by: actor.user_id,
            created_at: now,
            updated_at: now,
        };

        let entry = audit::entry(
            EntityType::Issuance,
            record.id,
            AuditAction::Create,
            "",
            record.status.as_str(),
            actor,
            None,
        );
        self.store.insert_issuance(&record, &entry).await?;

        tracing::info!(
            record_id = %record.id,
            numero = %record.number,
            role = %actor.role,
            "issuance created"
        );
        Ok(record)
    }

    pub async fn put_on_hold(
        &self,
        actor: &Actor,
        id: Uuid,
        observations: Option<String>,
    ) -> AppResult<IssuanceRecord> {
        self.transition(actor, id, WorkflowAction::PutOnHold, observations)
            .await
    }

    pub async fn approve(
        &self,
        actor: &Actor,
        id: Uuid,
        observations: Option<String>,
    ) -> AppResult<IssuanceRecord> {
        self.transition(actor, id, WorkflowAction::Approve, observations)
            .await
    }

    /// Reject an issuance; unlike intakes the record gets locked
    pub async fn reject(
        &self,
        actor: &Actor,
        id: Uuid,
        observations: Option<String>,
    ) -> AppResult<IssuanceRecord> {
        let observations = required_observations(observations)?;
        self.transition(actor, id, WorkflowAction::Reject, Some(observations))
            .await
    }

    /// Rework an issuance. Editing returns it to SAISIE; a rejected issuance
    /// stays editable despite its lock, which the edit clears.
    pub async fn edit(
        &self,
        actor: &Actor,
        id: Uuid,
        input: EditIssuanceInput,
    ) -> AppResult<IssuanceRecord> {
        check_quantity(input.quantity)?;
        input.validate()?;

        let record = self.load(id).await?;
        if !rules::may_enter(actor.role) {
            return Err(AppError::InvalidTransition {
                current_state: record.status.to_string(),
                message: format!("role {} may not edit issuance records", actor.role),
            });
        }
        ensure_scope(actor, record.ministry_id, record.structure_id)?;

        let rejected = record.status == IssuanceStatus::Rejected;
        if record.is_locked && !rejected {
            return Err(locked(&record));
        }
        if !rules::EDITABLE.contains(&record.status) {
            return Err(AppError::InvalidTransition {
                current_state: record.status.to_string(),
                message: "this issuance can no longer be edited".to_string(),
            });
        }

        let product_id = input.product_id.unwrap_or(record.product_id);
        let product = self.load_product(product_id).await?;
        if product_id != record.product_id {
            ensure_scope(actor, product.ministry_id, product.structure_id)?;
            check_available(product.quantity, input.quantity)?;
        } else if input.quantity != record.quantity {
            let pending = self
                .store
                .pending_issuance_quantity(product_id, Some(id))
                .await?;
            check_available(product.quantity - pending, input.quantity)?;
        }

        let next = IssuanceStatus::Saisie;
        let entry = (record.status != next).then(|| {
            audit::entry(
                EntityType::Issuance,
                id,
                AuditAction::Edit,
                record.status.as_str(),
                next.as_str(),
                actor,
                Some("Issuance edited and returned to SAISIE".to_string()),
            )
        });
        let update = IssuanceUpdate {
            id,
            expected: record.status,
            next,
            allow_locked: rejected,
            unlock: rejected,
            product_id: product.id,
            ministry_id: product.ministry_id,
            structure_id: product.structure_id,
            quantity: input.quantity,
            reference: shared::normalize_optional(input.reference).or(record.reference.clone()),
            issued_on: input.issued_on.unwrap_or(record.issued_on),
            beneficiary_name: input.beneficiary_name.trim().to_string(),
            beneficiary_phone: shared::normalize_optional(input.beneficiary_phone),
            reason: shared::normalize_optional(input.reason),
            observations: shared::normalize_optional(input.observations),
        };

        match self.store.update_issuance(&update, entry.as_ref()).await? {
            Some(updated) => {
                tracing::info!(
                    record_id = %id,
                    from = %record.status,
                    to = %updated.status,
                    "issuance edited"
                );
                Ok(updated)
            }
            None => Err(self.explain_lost_guard(id).await),
        }
    }

    /// Delete an issuance and its audit trail. Admins may delete locked ones.
    pub async fn delete(&self, actor: &Actor, id: Uuid) -> AppResult<()> {
        let record = self.load(id).await?;
        if !rules::may_enter(actor.role) && !actor.is_admin {
            return Err(AppError::InvalidTransition {
                current_state: record.status.to_string(),
                message: format!("role {} may not delete issuance records", actor.role),
            });
        }
        if IssuanceRecord::LOCK_POLICY.blocks_delete(record.is_locked, actor.is_admin) {
            return Err(locked(&record));
        }
        if !actor.is_admin {
            ensure_scope(actor, record.ministry_id, record.structure_id)?;
            if record.status != IssuanceStatus::Saisie {
                return Err(AppError::InvalidTransition {
                    current_state: record.status.to_string(),
                    message: "only issuances being entered can be deleted".to_string(),
                });
            }
        }

        if self
            .store
            .delete_issuance(id, record.status, actor.is_admin)
            .await?
        {
            tracing::info!(record_id = %id, numero = %record.number, "issuance deleted");
            Ok(())
        } else {
            Err(self.explain_lost_guard(id).await)
        }
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> AppResult<IssuanceRecord> {
        let record = self.load(id).await?;
        ensure_scope(actor, record.ministry_id, record.structure_id)?;
        Ok(record)
    }

    pub async fn list(&self, actor: &Actor) -> AppResult<Vec<IssuanceRecord>> {
        let scope = visible_scope(actor)?;
        Ok(self.store.list_issuances(scope).await?)
    }

    pub async fn history(&self, actor: &Actor, id: Uuid) -> AppResult<Vec<AuditEntry>> {
        self.get(actor, id).await?;
        self.audit_log.trail(EntityType::Issuance, id).await
    }

    async fn load(&self, id: Uuid) -> AppResult<IssuanceRecord> {
        self.store
            .get_issuance(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("issuance {}", id)))
    }

    async fn load_product(&self, id: Uuid) -> AppResult<Product> {
        self.store
            .get_product(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("product {}", id)))
    }

    async fn transition(
        &self,
        actor: &Actor,
        id: Uuid,
        action: WorkflowAction,
        observations: Option<String>,
    ) -> AppResult<IssuanceRecord> {
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
                    "issuance transition refused"
                );
                AppError::from(denied)
            })?;
        if record.is_locked {
            return Err(locked(&record));
        }

        let posting = if step.effect == Effect::PostStock {
            let product = self.load_product(record.product_id).await?;
            if let Err(shortfall) = check_available(product.quantity, record.quantity) {
                // The debit may be our own record's, applied by a concurrent approval
                if self.load(id).await?.status != step.from {
                    return Err(self.explain_lost_guard(id).await);
                }
                return Err(shortfall);
            }
            Some(StockLedger::issue(&record))
        } else {
            None
        };

        let change = StatusChange {
            id,
            expected: step.from,
            next: step.to,
            lock: step.effect.locks(),
            observations: observations.clone(),
        };
        let entry = audit::entry(
            EntityType::Issuance,
            id,
            action.audit_action(),
            step.from.as_str(),
            step.to.as_str(),
            actor,
            observations,
        );

        let committed = self
            .store
            .commit_issuance_transition(&change, posting.as_ref(), &entry)
            .await
            .map_err(|err| match err {
                StoreError::InsufficientStock { available } => {
                    tracing::debug!(record_id = %id, %available, "final debit refused");
                    AppError::InsufficientStock {
                        available,
                        requested: record.quantity,
                    }
                }
                other => other.into(),
            })?;

        match committed {
            Some(updated) => {
                tracing::info!(
                    record_id = %id,
                    numero = %updated.number,
                    from = %step.from,
                    to = %step.to,
                    role = %actor.role,
                    "issuance transition applied"
                );
                Ok(updated)
            }
            None => Err(self.explain_lost_guard(id).await),
        }
    }

    async fn explain_lost_guard(&self, id: Uuid) -> AppError {
        match self.store.get_issuance(id).await {
            Ok(Some(current)) => AppError::InvalidTransition {
                current_state: current.status.to_string(),
                message: "this issuance was changed by a concurrent request".to_string(),
            },
            Ok(None) => AppError::NotFound(format!("issuance {}", id)),
            Err(err) => err.into(),
        }
    }
}

fn check_quantity(quantity: Decimal) -> AppResult<()> {
    if quantity <= Decimal::ZERO {
        return Err(AppError::validation(
            "quantity",
            "Quantity must be greater than zero",
            "La quantité doit être supérieure à 0",
        ));
    }
    if shared::validate_scale(quantity, shared::QUANTITY_SCALE).is_err() {
        return Err(AppError::validation(
            "quantity",
            "Quantity allows at most 3 decimal places",
            "La quantité accepte au plus 3 décimales",
        ));
    }
    Ok(())
}

fn check_available(available: Decimal, requested: Decimal) -> AppResult<()> {
    if requested > available {
        return Err(AppError::InsufficientStock {
            available,
            requested,
        });
    }
    Ok(())
}

fn locked(record: &IssuanceRecord) -> AppError {
    AppError::RecordLocked(format!("issuance {} is locked", record.number))
}
