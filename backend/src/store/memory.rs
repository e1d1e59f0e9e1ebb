//! In-memory store for development, demos and tests
//!
//! One mutex guards the whole state, so every trait method is trivially
//! atomic. Multi-row writes stage their changes on copies and publish them
//! only once every check has passed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use shared::numbering::{DocumentKind, SequenceKey};
use shared::{
    AuditEntry, EntityType, IntakeRecord, IntakeStatus, IssuanceRecord, IssuanceStatus,
    LedgerPosting, Product, ProductMutation, ScopeFilter, StockMovement, Structure,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    IntakeUpdate, IssuanceUpdate, StatusChange, StoreError, StoreResult, WorkflowStore,
};

#[derive(Default)]
struct MemoryState {
    products: HashMap<Uuid, Product>,
    structures: HashMap<Uuid, Structure>,
    sequences: HashMap<(DocumentKind, String, i32), i64>,
    intakes: HashMap<Uuid, IntakeRecord>,
    issuances: HashMap<Uuid, IssuanceRecord>,
    audit: Vec<AuditEntry>,
    movements: Vec<StockMovement>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_next_commit: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_product(&self, product: Product) {
        self.state.lock().await.products.insert(product.id, product);
    }

    pub async fn insert_structure(&self, structure: Structure) {
        self.state
            .lock()
            .await
            .structures
            .insert(structure.id, structure);
    }

    /// Store a record as-is, bypassing the workflow (imports, fixtures)
    pub async fn put_intake(&self, record: IntakeRecord) {
        self.state.lock().await.intakes.insert(record.id, record);
    }

    pub async fn put_issuance(&self, record: IssuanceRecord) {
        self.state.lock().await.issuances.insert(record.id, record);
    }

    /// Make the next transition commit fail after staging its writes
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    fn take_injected_failure(&self) -> StoreResult<()> {
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected commit failure".into()));
        }
        Ok(())
    }
}

impl MemoryState {
    /// Stage a ledger posting against a copy of its product
    fn stage_posting(&self, posting: &LedgerPosting) -> StoreResult<Product> {
        let product_id = posting.product_id();
        let mut product = self
            .products
            .get(&product_id)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "product",
                id: product_id,
            })?;

        match posting.mutation {
            ProductMutation::Receive {
                quantity,
                unit_price,
            } => {
                product.quantity += quantity;
                product.unit_price = unit_price;
            }
            ProductMutation::Issue { quantity } => {
                if product.quantity < quantity {
                    return Err(StoreError::InsufficientStock {
                        available: product.quantity,
                    });
                }
                product.quantity -= quantity;
            }
        }
        product.updated_at = Utc::now();
        Ok(product)
    }

    fn highest_issued(&self, key: &SequenceKey) -> i64 {
        let numbers: Box<dyn Iterator<Item = &String> + '_> = match key.kind {
            DocumentKind::Intake => Box::new(self.intakes.values().map(|r| &r.number)),
            DocumentKind::Issuance => Box::new(self.issuances.values().map(|r| &r.number)),
        };
        numbers.filter_map(|n| key.parse(n)).max().unwrap_or(0)
    }
}

fn newest_first<T, F>(mut records: Vec<T>, created_at: F) -> Vec<T>
where
    F: Fn(&T) -> chrono::DateTime<Utc>,
{
    records.sort_by_key(|r| std::cmp::Reverse(created_at(r)));
    records
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn get_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn get_structure(&self, id: Uuid) -> StoreResult<Option<Structure>> {
        Ok(self.state.lock().await.structures.get(&id).cloned())
    }

    async fn next_sequence(&self, key: &SequenceKey) -> StoreResult<i64> {
        let mut state = self.state.lock().await;
        let counter_key = (key.kind, key.scope.clone(), key.year);
        let current = match state.sequences.get(&counter_key) {
            Some(value) => *value,
            None => state.highest_issued(key),
        };
        let next = current + 1;
        state.sequences.insert(counter_key, next);
        Ok(next)
    }

    // ── Intake records ──

    async fn insert_intake(&self, record: &IntakeRecord, audit: &AuditEntry) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if state.intakes.contains_key(&record.id) {
            return Err(StoreError::Conflict(format!("intake {} exists", record.id)));
        }
        state.intakes.insert(record.id, record.clone());
        state.audit.push(audit.clone());
        Ok(())
    }

    async fn get_intake(&self, id: Uuid) -> StoreResult<Option<IntakeRecord>> {
        Ok(self.state.lock().await.intakes.get(&id).cloned())
    }

    async fn list_intakes(&self, scope: ScopeFilter) -> StoreResult<Vec<IntakeRecord>> {
        let state = self.state.lock().await;
        let records = state
            .intakes
            .values()
            .filter(|r| scope.matches(r.ministry_id, r.structure_id))
            .cloned()
            .collect();
        Ok(newest_first(records, |r: &IntakeRecord| r.created_at))
    }

    async fn commit_intake_transition(
        &self,
        change: &StatusChange<IntakeStatus>,
        posting: Option<&LedgerPosting>,
        audit: &AuditEntry,
    ) -> StoreResult<Option<IntakeRecord>> {
        let mut state = self.state.lock().await;

        let mut record = match state.intakes.get(&change.id) {
            Some(r) if r.status == change.expected && !r.is_locked => r.clone(),
            _ => return Ok(None),
        };
        record.status = change.next;
        record.is_locked = record.is_locked || change.lock;
        if let Some(observations) = &change.observations {
            record.observations = Some(observations.clone());
        }
        record.updated_at = Utc::now();

        let product = posting.map(|p| state.stage_posting(p)).transpose()?;
        self.take_injected_failure()?;

        if let Some(product) = product {
            state.products.insert(product.id, product);
        }
        if let Some(posting) = posting {
            state.movements.push(posting.movement.clone());
        }
        state.audit.push(audit.clone());
        state.intakes.insert(record.id, record.clone());
        Ok(Some(record))
    }

    async fn update_intake(
        &self,
        update: &IntakeUpdate,
        audit: Option<&AuditEntry>,
    ) -> StoreResult<Option<IntakeRecord>> {
        let mut state = self.state.lock().await;

        let Some(record) = state.intakes.get_mut(&update.id) else {
            return Ok(None);
        };
        if record.status != update.expected || record.is_locked {
            return Ok(None);
        }
        record.status = update.next;
        record.quantity = update.quantity;
        record.unit_price = update.unit_price;
        record.supplier_name = update.supplier_name.clone();
        record.supplier_tax_id = update.supplier_tax_id.clone();
        if update.observations.is_some() {
            record.observations = update.observations.clone();
        }
        record.updated_at = Utc::now();
        let updated = record.clone();

        if let Some(audit) = audit {
            state.audit.push(audit.clone());
        }
        Ok(Some(updated))
    }

    async fn delete_intake(&self, id: Uuid, expected: IntakeStatus) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        match state.intakes.get(&id) {
            Some(r) if r.status == expected && !r.is_locked => {}
            _ => return Ok(false),
        }
        state
            .audit
            .retain(|e| !(e.entity_type == EntityType::Intake && e.entity_id == id));
        state.intakes.remove(&id);
        Ok(true)
    }

    // ── Issuance records ──

    async fn insert_issuance(
        &self,
        record: &IssuanceRecord,
        audit: &AuditEntry,
    ) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        if state.issuances.contains_key(&record.id) {
            return Err(StoreError::Conflict(format!(
                "issuance {} exists",
                record.id
            )));
        }
        state.issuances.insert(record.id, record.clone());
        state.audit.push(audit.clone());
        Ok(())
    }

    async fn get_issuance(&self, id: Uuid) -> StoreResult<Option<IssuanceRecord>> {
        Ok(self.state.lock().await.issuances.get(&id).cloned())
    }

    async fn list_issuances(&self, scope: ScopeFilter) -> StoreResult<Vec<IssuanceRecord>> {
        let state = self.state.lock().await;
        let records = state
            .issuances
            .values()
            .filter(|r| scope.matches(r.ministry_id, r.structure_id))
            .cloned()
            .collect();
        Ok(newest_first(records, |r: &IssuanceRecord| r.created_at))
    }

    async fn commit_issuance_transition(
        &self,
        change: &StatusChange<IssuanceStatus>,
        posting: Option<&LedgerPosting>,
        audit: &AuditEntry,
    ) -> StoreResult<Option<IssuanceRecord>> {
        let mut state = self.state.lock().await;

        let mut record = match state.issuances.get(&change.id) {
            Some(r) if r.status == change.expected && !r.is_locked => r.clone(),
            _ => return Ok(None),
        };
        record.status = change.next;
        record.is_locked = record.is_locked || change.lock;
        if let Some(observations) = &change.observations {
            record.observations = Some(observations.clone());
        }
        record.updated_at = Utc::now();

        let product = posting.map(|p| state.stage_posting(p)).transpose()?;
        self.take_injected_failure()?;

        if let Some(product) = product {
            state.products.insert(product.id, product);
        }
        if let Some(posting) = posting {
            state.movements.push(posting.movement.clone());
        }
        state.audit.push(audit.clone());
        state.issuances.insert(record.id, record.clone());
        Ok(Some(record))
    }

    async fn update_issuance(
        &self,
        update: &IssuanceUpdate,
        audit: Option<&AuditEntry>,
    ) -> StoreResult<Option<IssuanceRecord>> {
        let mut state = self.state.lock().await;

        let Some(record) = state.issuances.get_mut(&update.id) else {
            return Ok(None);
        };
        if record.status != update.expected || (record.is_locked && !update.allow_locked) {
            return Ok(None);
        }
        record.status = update.next;
        if update.unlock {
            record.is_locked = false;
        }
        record.product_id = update.product_id;
        record.ministry_id = update.ministry_id;
        record.structure_id = update.structure_id;
        record.quantity = update.quantity;
        record.reference = update.reference.clone();
        record.issued_on = update.issued_on;
        record.beneficiary_name = update.beneficiary_name.clone();
        record.beneficiary_phone = update.beneficiary_phone.clone();
        record.reason = update.reason.clone();
        if update.observations.is_some() {
            record.observations = update.observations.clone();
        }
        record.updated_at = Utc::now();
        let updated = record.clone();

        if let Some(audit) = audit {
            state.audit.push(audit.clone());
        }
        Ok(Some(updated))
    }

    async fn delete_issuance(
        &self,
        id: Uuid,
        expected: IssuanceStatus,
        allow_locked: bool,
    ) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        match state.issuances.get(&id) {
            Some(r) if r.status == expected && (allow_locked || !r.is_locked) => {}
            _ => return Ok(false),
        }
        state
            .audit
            .retain(|e| !(e.entity_type == EntityType::Issuance && e.entity_id == id));
        state.issuances.remove(&id);
        Ok(true)
    }

    async fn pending_issuance_quantity(
        &self,
        product_id: Uuid,
        exclude: Option<Uuid>,
    ) -> StoreResult<Decimal> {
        let state = self.state.lock().await;
        Ok(state
            .issuances
            .values()
            .filter(|r| r.product_id == product_id && r.status.is_pending())
            .filter(|r| Some(r.id) != exclude)
            .map(|r| r.quantity)
            .sum())
    }

    // ── Audit trail and ledger ──

    async fn audit_trail(
        &self,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> StoreResult<Vec<AuditEntry>> {
        let state = self.state.lock().await;
        Ok(state
            .audit
            .iter()
            .rev()
            .filter(|e| e.entity_type == entity_type && e.entity_id == entity_id)
            .cloned()
            .collect())
    }

    async fn movements_for_product(&self, product_id: Uuid) -> StoreResult<Vec<StockMovement>> {
        let state = self.state.lock().await;
        Ok(state
            .movements
            .iter()
            .rev()
            .filter(|m| m.product_id == product_id)
            .cloned()
            .collect())
    }
}
