//! Persistence seam for the approval engine
//!
//! Services work exclusively through [`WorkflowStore`]. Every method that
//! writes more than one row is one atomic unit: either all of its writes
//! become visible or none do.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::numbering::SequenceKey;
use shared::{
    AuditEntry, EntityType, IntakeRecord, IntakeStatus, IssuanceRecord, IssuanceStatus,
    LedgerPosting, Product, ScopeFilter, StockMovement, Structure,
};
use thiserror::Error;
use uuid::Uuid;

/// Persistence-layer failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A guarded stock decrement found less than requested
    #[error("insufficient stock: {available} available")]
    InsufficientStock { available: Decimal },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("conflict: {0}")]
    Conflict(String),

    /// A stored value could not be mapped back to a domain type
    #[error("invalid stored data: {0}")]
    InvalidData(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A state change guarded by the state the caller last observed.
///
/// The store applies it only if the record is still in `expected` and
/// unlocked; otherwise nothing is written and `None` is returned.
#[derive(Debug, Clone)]
pub struct StatusChange<S> {
    pub id: Uuid,
    pub expected: S,
    pub next: S,
    pub lock: bool,
    /// Replaces the record's observations when present
    pub observations: Option<String>,
}

/// New field values for an intake edit, guarded like [`StatusChange`]
#[derive(Debug, Clone)]
pub struct IntakeUpdate {
    pub id: Uuid,
    pub expected: IntakeStatus,
    pub next: IntakeStatus,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub supplier_name: String,
    pub supplier_tax_id: Option<String>,
    pub observations: Option<String>,
}

/// New field values for an issuance edit
#[derive(Debug, Clone)]
pub struct IssuanceUpdate {
    pub id: Uuid,
    pub expected: IssuanceStatus,
    pub next: IssuanceStatus,
    /// Rejected issuances are locked yet stay editable
    pub allow_locked: bool,
    /// Clear the lock flag as part of the edit
    pub unlock: bool,
    pub product_id: Uuid,
    pub ministry_id: Uuid,
    pub structure_id: Uuid,
    pub quantity: Decimal,
    pub reference: Option<String>,
    pub issued_on: chrono::NaiveDate,
    pub beneficiary_name: String,
    pub beneficiary_phone: Option<String>,
    pub reason: Option<String>,
    pub observations: Option<String>,
}

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    // ── Reference data ──

    async fn ping(&self) -> StoreResult<()>;
    async fn get_product(&self, id: Uuid) -> StoreResult<Option<Product>>;
    async fn get_structure(&self, id: Uuid) -> StoreResult<Option<Structure>>;

    // ── Document numbering ──

    /// Atomically increment the counter for `key` and return the new value.
    async fn next_sequence(&self, key: &SequenceKey) -> StoreResult<i64>;

    // ── Intake records ──

    /// Insert a new record together with its creation audit entry.
    async fn insert_intake(&self, record: &IntakeRecord, audit: &AuditEntry) -> StoreResult<()>;
    async fn get_intake(&self, id: Uuid) -> StoreResult<Option<IntakeRecord>>;
    async fn list_intakes(&self, scope: ScopeFilter) -> StoreResult<Vec<IntakeRecord>>;

    /// Apply a guarded state change, the optional ledger posting and the audit
    /// entry in one atomic unit. `None` when the guard did not match.
    async fn commit_intake_transition(
        &self,
        change: &StatusChange<IntakeStatus>,
        posting: Option<&LedgerPosting>,
        audit: &AuditEntry,
    ) -> StoreResult<Option<IntakeRecord>>;

    async fn update_intake(
        &self,
        update: &IntakeUpdate,
        audit: Option<&AuditEntry>,
    ) -> StoreResult<Option<IntakeRecord>>;

    /// Delete an unlocked record in `expected` state and its audit trail.
    async fn delete_intake(&self, id: Uuid, expected: IntakeStatus) -> StoreResult<bool>;

    // ── Issuance records ──

    async fn insert_issuance(&self, record: &IssuanceRecord, audit: &AuditEntry)
        -> StoreResult<()>;
    async fn get_issuance(&self, id: Uuid) -> StoreResult<Option<IssuanceRecord>>;
    async fn list_issuances(&self, scope: ScopeFilter) -> StoreResult<Vec<IssuanceRecord>>;

    /// Like [`WorkflowStore::commit_intake_transition`]. An `Issue` posting
    /// fails with [`StoreError::InsufficientStock`] and rolls everything back
    /// when the product holds less than requested.
    async fn commit_issuance_transition(
        &self,
        change: &StatusChange<IssuanceStatus>,
        posting: Option<&LedgerPosting>,
        audit: &AuditEntry,
    ) -> StoreResult<Option<IssuanceRecord>>;

    async fn update_issuance(
        &self,
        update: &IssuanceUpdate,
        audit: Option<&AuditEntry>,
    ) -> StoreResult<Option<IssuanceRecord>>;

    async fn delete_issuance(
        &self,
        id: Uuid,
        expected: IssuanceStatus,
        allow_locked: bool,
    ) -> StoreResult<bool>;

    /// Sum of quantities of pending issuances of a product, one record excluded
    async fn pending_issuance_quantity(
        &self,
        product_id: Uuid,
        exclude: Option<Uuid>,
    ) -> StoreResult<Decimal>;

    // ── Audit trail and ledger (read side) ──

    /// Audit entries of one record, newest first
    async fn audit_trail(
        &self,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> StoreResult<Vec<AuditEntry>>;

    /// Movements of one product, newest first
    async fn movements_for_product(&self, product_id: Uuid) -> StoreResult<Vec<StockMovement>>;
}
