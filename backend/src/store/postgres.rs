//! PostgreSQL store on sqlx
//!
//! Guarded writes use conditional `UPDATE ... WHERE status = $expected`
//! statements inside one transaction; a guard that matches no row rolls the
//! transaction back and reports `None` to the caller.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::numbering::{DocumentKind, SequenceKey};
use shared::{
    AuditAction, AuditEntry, EntityType, IntakeRecord, IntakeStatus, IssuanceRecord,
    IssuanceStatus, LedgerPosting, MovementKind, Product, ProductMutation, ScopeFilter,
    StockMovement, Structure,
};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use super::{
    IntakeUpdate, IssuanceUpdate, StatusChange, StoreError, StoreResult, WorkflowStore,
};

const PRODUCT_COLUMNS: &str = "id, name, unit, quantity, initial_quantity, unit_price, \
     ministry_id, structure_id, created_at, updated_at";

const INTAKE_COLUMNS: &str = "id, number, product_id, quantity, unit_price, supplier_name, \
     supplier_tax_id, status, is_locked, observations, ministry_id, structure_id, created_by, \
     created_at, updated_at";

const ISSUANCE_COLUMNS: &str = "id, number, reference, issued_on, product_id, quantity, \
     beneficiary_name, beneficiary_phone, reason, status, is_locked, observations, ministry_id, \
     structure_id, created_by, created_at, updated_at";

const AUDIT_COLUMNS: &str = "id, entity_type, entity_id, action, from_state, to_state, \
     actor_id, actor_role, observations, created_at";

const MOVEMENT_COLUMNS: &str = "id, kind, quantity, product_id, ministry_id, structure_id, \
     supplier_name, supplier_tax_id, beneficiary_name, beneficiary_phone, intake_id, \
     issuance_id, created_at";

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    unit: String,
    quantity: Decimal,
    initial_quantity: Decimal,
    unit_price: Decimal,
    ministry_id: Uuid,
    structure_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            unit: row.unit,
            quantity: row.quantity,
            initial_quantity: row.initial_quantity,
            unit_price: row.unit_price,
            ministry_id: row.ministry_id,
            structure_id: row.structure_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct StructureRow {
    id: Uuid,
    ministry_id: Uuid,
    name: String,
    abbreviation: Option<String>,
    ministry_abbreviation: Option<String>,
}

impl From<StructureRow> for Structure {
    fn from(row: StructureRow) -> Self {
        Structure {
            id: row.id,
            ministry_id: row.ministry_id,
            name: row.name,
            abbreviation: row.abbreviation,
            ministry_abbreviation: row.ministry_abbreviation,
        }
    }
}

#[derive(Debug, FromRow)]
struct IntakeRow {
    id: Uuid,
    number: String,
    product_id: Uuid,
    quantity: Decimal,
    unit_price: Decimal,
    supplier_name: String,
    supplier_tax_id: Option<String>,
    status: String,
    is_locked: bool,
    observations: Option<String>,
    ministry_id: Uuid,
    structure_id: Uuid,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<IntakeRow> for IntakeRecord {
    type Error = StoreError;

    fn try_from(row: IntakeRow) -> Result<Self, Self::Error> {
        let status = IntakeStatus::from_str(&row.status).ok_or_else(|| {
            StoreError::InvalidData(format!("intake status {}", row.status))
        })?;
        Ok(IntakeRecord {
            id: row.id,
            number: row.number,
            product_id: row.product_id,
            quantity: row.quantity,
            unit_price: row.unit_price,
            supplier_name: row.supplier_name,
            supplier_tax_id: row.supplier_tax_id,
            status,
            is_locked: row.is_locked,
            observations: row.observations,
            ministry_id: row.ministry_id,
            structure_id: row.structure_id,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct IssuanceRow {
    id: Uuid,
    number: String,
    reference: Option<String>,
    issued_on: NaiveDate,
    product_id: Uuid,
    quantity: Decimal,
    beneficiary_name: String,
    beneficiary_phone: Option<String>,
    reason: Option<String>,
    status: String,
    is_locked: bool,
    observations: Option<String>,
    ministry_id: Uuid,
    structure_id: Uuid,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<IssuanceRow> for IssuanceRecord {
    type Error = StoreError;

    fn try_from(row: IssuanceRow) -> Result<Self, Self::Error> {
        let status = IssuanceStatus::from_str(&row.status).ok_or_else(|| {
            StoreError::InvalidData(format!("issuance status {}", row.status))
        })?;
        Ok(IssuanceRecord {
            id: row.id,
            number: row.number,
            reference: row.reference,
            issued_on: row.issued_on,
            product_id: row.product_id,
            quantity: row.quantity,
            beneficiary_name: row.beneficiary_name,
            beneficiary_phone: row.beneficiary_phone,
            reason: row.reason,
            status,
            is_locked: row.is_locked,
            observations: row.observations,
            ministry_id: row.ministry_id,
            structure_id: row.structure_id,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct AuditRow {
    id: Uuid,
    entity_type: String,
    entity_id: Uuid,
    action: String,
    from_state: String,
    to_state: String,
    actor_id: Uuid,
    actor_role: String,
    observations: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<AuditRow> for AuditEntry {
    type Error = StoreError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let entity_type = EntityType::from_str(&row.entity_type).ok_or_else(|| {
            StoreError::InvalidData(format!("entity type {}", row.entity_type))
        })?;
        let action = AuditAction::from_str(&row.action)
            .ok_or_else(|| StoreError::InvalidData(format!("audit action {}", row.action)))?;
        Ok(AuditEntry {
            id: row.id,
            entity_type,
            entity_id: row.entity_id,
            action,
            from_state: row.from_state,
            to_state: row.to_state,
            actor_id: row.actor_id,
            actor_role: row.actor_role,
            observations: row.observations,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct MovementRow {
    id: Uuid,
    kind: String,
    quantity: Decimal,
    product_id: Uuid,
    ministry_id: Uuid,
    structure_id: Uuid,
    supplier_name: Option<String>,
    supplier_tax_id: Option<String>,
    beneficiary_name: Option<String>,
    beneficiary_phone: Option<String>,
    intake_id: Option<Uuid>,
    issuance_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MovementRow> for StockMovement {
    type Error = StoreError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        let kind = MovementKind::from_str(&row.kind)
            .ok_or_else(|| StoreError::InvalidData(format!("movement kind {}", row.kind)))?;
        Ok(StockMovement {
            id: row.id,
            kind,
            quantity: row.quantity,
            product_id: row.product_id,
            ministry_id: row.ministry_id,
            structure_id: row.structure_id,
            supplier_name: row.supplier_name,
            supplier_tax_id: row.supplier_tax_id,
            beneficiary_name: row.beneficiary_name,
            beneficiary_phone: row.beneficiary_phone,
            intake_id: row.intake_id,
            issuance_id: row.issuance_id,
            created_at: row.created_at,
        })
    }
}

// ============================================================================
// Shared Writes
// ============================================================================

/// Scope filter as nullable bind parameters (ministry, structure)
fn scope_binds(scope: ScopeFilter) -> (Option<Uuid>, Option<Uuid>) {
    match scope {
        ScopeFilter::All => (None, None),
        ScopeFilter::Ministry(id) => (Some(id), None),
        ScopeFilter::Structure(id) => (None, Some(id)),
    }
}

async fn insert_audit(conn: &mut PgConnection, entry: &AuditEntry) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_entries (id, entity_type, entity_id, action, from_state, to_state,
                                   actor_id, actor_role, observations, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(entry.id)
    .bind(entry.entity_type.as_str())
    .bind(entry.entity_id)
    .bind(entry.action.as_str())
    .bind(&entry.from_state)
    .bind(&entry.to_state)
    .bind(entry.actor_id)
    .bind(&entry.actor_role)
    .bind(&entry.observations)
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Apply the product mutation and insert the movement of a posting
async fn apply_posting(conn: &mut PgConnection, posting: &LedgerPosting) -> StoreResult<()> {
    let product_id = posting.product_id();

    match posting.mutation {
        ProductMutation::Receive {
            quantity,
            unit_price,
        } => {
            let updated = sqlx::query(
                r#"
                UPDATE products
                SET quantity = quantity + $1, unit_price = $2, updated_at = NOW()
                WHERE id = $3
                "#,
            )
            .bind(quantity)
            .bind(unit_price)
            .bind(product_id)
            .execute(&mut *conn)
            .await?;

            if updated.rows_affected() == 0 {
                return Err(StoreError::NotFound {
                    entity: "product",
                    id: product_id,
                });
            }
        }
        ProductMutation::Issue { quantity } => {
            // Single conditional decrement; concurrent issues serialize on the row
            let remaining = sqlx::query_scalar::<_, Decimal>(
                r#"
                UPDATE products
                SET quantity = quantity - $1, updated_at = NOW()
                WHERE id = $2 AND quantity >= $1
                RETURNING quantity
                "#,
            )
            .bind(quantity)
            .bind(product_id)
            .fetch_optional(&mut *conn)
            .await?;

            if remaining.is_none() {
                let available =
                    sqlx::query_scalar::<_, Decimal>("SELECT quantity FROM products WHERE id = $1")
                        .bind(product_id)
                        .fetch_optional(&mut *conn)
                        .await?;
                return Err(match available {
                    Some(available) => StoreError::InsufficientStock { available },
                    None => StoreError::NotFound {
                        entity: "product",
                        id: product_id,
                    },
                });
            }
        }
    }

    let movement = &posting.movement;
    sqlx::query(
        r#"
        INSERT INTO stock_movements (id, kind, quantity, product_id, ministry_id, structure_id,
                                     supplier_name, supplier_tax_id, beneficiary_name,
                                     beneficiary_phone, intake_id, issuance_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
    )
    .bind(movement.id)
    .bind(movement.kind.as_str())
    .bind(movement.quantity)
    .bind(movement.product_id)
    .bind(movement.ministry_id)
    .bind(movement.structure_id)
    .bind(&movement.supplier_name)
    .bind(&movement.supplier_tax_id)
    .bind(&movement.beneficiary_name)
    .bind(&movement.beneficiary_phone)
    .bind(movement.intake_id)
    .bind(movement.issuance_id)
    .bind(movement.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[async_trait]
impl WorkflowStore for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }

    async fn get_product(&self, id: Uuid) -> StoreResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn get_structure(&self, id: Uuid) -> StoreResult<Option<Structure>> {
        let row = sqlx::query_as::<_, StructureRow>(
            r#"
            SELECT s.id, s.ministry_id, s.name, s.abbreviation,
                   m.abbreviation AS ministry_abbreviation
            FROM structures s
            JOIN ministries m ON m.id = s.ministry_id
            WHERE s.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn next_sequence(&self, key: &SequenceKey) -> StoreResult<i64> {
        let table = match key.kind {
            DocumentKind::Intake => "intake_records",
            DocumentKind::Issuance => "issuance_records",
        };

        // First allocation for a key continues from the highest number on file
        let value = sqlx::query_scalar::<_, i64>(&format!(
            r#"
            INSERT INTO document_sequences (kind, scope, year, last_value)
            VALUES ($1, $2, $3, 1 + COALESCE((
                SELECT MAX(CASE
                    WHEN SUBSTRING(number FROM char_length($4) + 1) ~ '^[0-9]+$'
                    THEN CAST(SUBSTRING(number FROM char_length($4) + 1) AS BIGINT)
                END)
                FROM {table}
                WHERE LEFT(number, char_length($4)) = $4
            ), 0))
            ON CONFLICT (kind, scope, year)
            DO UPDATE SET last_value = document_sequences.last_value + 1
            RETURNING last_value
            "#,
        ))
        .bind(key.kind.as_str())
        .bind(&key.scope)
        .bind(key.year)
        .bind(&key.prefix)
        .fetch_one(&self.db)
        .await?;

        Ok(value)
    }

    // ── Intake records ──

    async fn insert_intake(&self, record: &IntakeRecord, audit: &AuditEntry) -> StoreResult<()> {
        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO intake_records (id, number, product_id, quantity, unit_price,
                                        supplier_name, supplier_tax_id, status, is_locked,
                                        observations, ministry_id, structure_id, created_by,
                                        created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(record.id)
        .bind(&record.number)
        .bind(record.product_id)
        .bind(record.quantity)
        .bind(record.unit_price)
        .bind(&record.supplier_name)
        .bind(&record.supplier_tax_id)
        .bind(record.status.as_str())
        .bind(record.is_locked)
        .bind(&record.observations)
        .bind(record.ministry_id)
        .bind(record.structure_id)
        .bind(record.created_by)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *tx)
        .await?;

        insert_audit(&mut tx, audit).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_intake(&self, id: Uuid) -> StoreResult<Option<IntakeRecord>> {
        let row = sqlx::query_as::<_, IntakeRow>(&format!(
            "SELECT {} FROM intake_records WHERE id = $1",
            INTAKE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list_intakes(&self, scope: ScopeFilter) -> StoreResult<Vec<IntakeRecord>> {
        let (ministry_id, structure_id) = scope_binds(scope);
        let rows = sqlx::query_as::<_, IntakeRow>(&format!(
            r#"
            SELECT {} FROM intake_records
            WHERE ($1::uuid IS NULL OR ministry_id = $1)
              AND ($2::uuid IS NULL OR structure_id = $2)
            ORDER BY created_at DESC
            "#,
            INTAKE_COLUMNS
        ))
        .bind(ministry_id)
        .bind(structure_id)
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn commit_intake_transition(
        &self,
        change: &StatusChange<IntakeStatus>,
        posting: Option<&LedgerPosting>,
        audit: &AuditEntry,
    ) -> StoreResult<Option<IntakeRecord>> {
        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, IntakeRow>(&format!(
            r#"
            UPDATE intake_records
            SET status = $1, is_locked = is_locked OR $2,
                observations = COALESCE($3, observations), updated_at = NOW()
            WHERE id = $4 AND status = $5 AND is_locked = FALSE
            RETURNING {}
            "#,
            INTAKE_COLUMNS
        ))
        .bind(change.next.as_str())
        .bind(change.lock)
        .bind(&change.observations)
        .bind(change.id)
        .bind(change.expected.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        if let Some(posting) = posting {
            apply_posting(&mut tx, posting).await?;
        }
        insert_audit(&mut tx, audit).await?;
        tx.commit().await?;

        Ok(Some(row.try_into()?))
    }

    async fn update_intake(
        &self,
        update: &IntakeUpdate,
        audit: Option<&AuditEntry>,
    ) -> StoreResult<Option<IntakeRecord>> {
        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, IntakeRow>(&format!(
            r#"
            UPDATE intake_records
            SET status = $1, quantity = $2, unit_price = $3, supplier_name = $4,
                supplier_tax_id = $5, observations = COALESCE($6, observations),
                updated_at = NOW()
            WHERE id = $7 AND status = $8 AND is_locked = FALSE
            RETURNING {}
            "#,
            INTAKE_COLUMNS
        ))
        .bind(update.next.as_str())
        .bind(update.quantity)
        .bind(update.unit_price)
        .bind(&update.supplier_name)
        .bind(&update.supplier_tax_id)
        .bind(&update.observations)
        .bind(update.id)
        .bind(update.expected.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        if let Some(audit) = audit {
            insert_audit(&mut tx, audit).await?;
        }
        tx.commit().await?;

        Ok(Some(row.try_into()?))
    }

    async fn delete_intake(&self, id: Uuid, expected: IntakeStatus) -> StoreResult<bool> {
        let mut tx = self.db.begin().await?;

        let target = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM intake_records
            WHERE id = $1 AND status = $2 AND is_locked = FALSE
            FOR UPDATE
            "#,
        )
        .bind(id)
        .bind(expected.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        if target.is_none() {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("DELETE FROM audit_entries WHERE entity_type = $1 AND entity_id = $2")
            .bind(EntityType::Intake.as_str())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM intake_records WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    // ── Issuance records ──

    async fn insert_issuance(
        &self,
        record: &IssuanceRecord,
        audit: &AuditEntry,
    ) -> StoreResult<()> {
        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO issuance_records (id, number, reference, issued_on, product_id, quantity,
                                          beneficiary_name, beneficiary_phone, reason, status,
                                          is_locked, observations, ministry_id, structure_id,
                                          created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(record.id)
        .bind(&record.number)
        .bind(&record.reference)
        .bind(record.issued_on)
        .bind(record.product_id)
        .bind(record.quantity)
        .bind(&record.beneficiary_name)
        .bind(&record.beneficiary_phone)
        .bind(&record.reason)
        .bind(record.status.as_str())
        .bind(record.is_locked)
        .bind(&record.observations)
        .bind(record.ministry_id)
        .bind(record.structure_id)
        .bind(record.created_by)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *tx)
        .await?;

        insert_audit(&mut tx, audit).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_issuance(&self, id: Uuid) -> StoreResult<Option<IssuanceRecord>> {
        let row = sqlx::query_as::<_, IssuanceRow>(&format!(
            "SELECT {} FROM issuance_records WHERE id = $1",
            ISSUANCE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list_issuances(&self, scope: ScopeFilter) -> StoreResult<Vec<IssuanceRecord>> {
        let (ministry_id, structure_id) = scope_binds(scope);
        let rows = sqlx::query_as::<_, IssuanceRow>(&format!(
            r#"
            SELECT {} FROM issuance_records
            WHERE ($1::uuid IS NULL OR ministry_id = $1)
              AND ($2::uuid IS NULL OR structure_id = $2)
            ORDER BY created_at DESC
            "#,
            ISSUANCE_COLUMNS
        ))
        .bind(ministry_id)
        .bind(structure_id)
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn commit_issuance_transition(
        &self,
        change: &StatusChange<IssuanceStatus>,
        posting: Option<&LedgerPosting>,
        audit: &AuditEntry,
    ) -> StoreResult<Option<IssuanceRecord>> {
        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, IssuanceRow>(&format!(
            r#"
            UPDATE issuance_records
            SET status = $1, is_locked = is_locked OR $2,
                observations = COALESCE($3, observations), updated_at = NOW()
            WHERE id = $4 AND status = $5 AND is_locked = FALSE
            RETURNING {}
            "#,
            ISSUANCE_COLUMNS
        ))
        .bind(change.next.as_str())
        .bind(change.lock)
        .bind(&change.observations)
        .bind(change.id)
        .bind(change.expected.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        // An insufficient-stock error drops `tx`, rolling back the status change
        if let Some(posting) = posting {
            apply_posting(&mut tx, posting).await?;
        }
        insert_audit(&mut tx, audit).await?;
        tx.commit().await?;

        Ok(Some(row.try_into()?))
    }

    async fn update_issuance(
        &self,
        update: &IssuanceUpdate,
        audit: Option<&AuditEntry>,
    ) -> StoreResult<Option<IssuanceRecord>> {
        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, IssuanceRow>(&format!(
            r#"
            UPDATE issuance_records
            SET status = $1, is_locked = CASE WHEN $2 THEN FALSE ELSE is_locked END,
                product_id = $3, ministry_id = $4, structure_id = $5, quantity = $6,
                reference = $7, issued_on = $8, beneficiary_name = $9,
                beneficiary_phone = $10, reason = $11,
                observations = COALESCE($12, observations), updated_at = NOW()
            WHERE id = $13 AND status = $14 AND (is_locked = FALSE OR $15)
            RETURNING {}
            "#,
            ISSUANCE_COLUMNS
        ))
        .bind(update.next.as_str())
        .bind(update.unlock)
        .bind(update.product_id)
        .bind(update.ministry_id)
        .bind(update.structure_id)
        .bind(update.quantity)
        .bind(&update.reference)
        .bind(update.issued_on)
        .bind(&update.beneficiary_name)
        .bind(&update.beneficiary_phone)
        .bind(&update.reason)
        .bind(&update.observations)
        .bind(update.id)
        .bind(update.expected.as_str())
        .bind(update.allow_locked)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        if let Some(audit) = audit {
            insert_audit(&mut tx, audit).await?;
        }
        tx.commit().await?;

        Ok(Some(row.try_into()?))
    }

    async fn delete_issuance(
        &self,
        id: Uuid,
        expected: IssuanceStatus,
        allow_locked: bool,
    ) -> StoreResult<bool> {
        let mut tx = self.db.begin().await?;

        let target = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM issuance_records
            WHERE id = $1 AND status = $2 AND (is_locked = FALSE OR $3)
            FOR UPDATE
            "#,
        )
        .bind(id)
        .bind(expected.as_str())
        .bind(allow_locked)
        .fetch_optional(&mut *tx)
        .await?;

        if target.is_none() {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("DELETE FROM audit_entries WHERE entity_type = $1 AND entity_id = $2")
            .bind(EntityType::Issuance.as_str())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM issuance_records WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn pending_issuance_quantity(
        &self,
        product_id: Uuid,
        exclude: Option<Uuid>,
    ) -> StoreResult<Decimal> {
        let pending: Vec<String> = IssuanceStatus::PENDING
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();

        let total = sqlx::query_scalar::<_, Decimal>(
            r#"
            SELECT COALESCE(SUM(quantity), 0)
            FROM issuance_records
            WHERE product_id = $1
              AND status = ANY($2)
              AND ($3::uuid IS NULL OR id <> $3)
            "#,
        )
        .bind(product_id)
        .bind(pending)
        .bind(exclude)
        .fetch_one(&self.db)
        .await?;

        Ok(total)
    }

    // ── Audit trail and ledger ──

    async fn audit_trail(
        &self,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> StoreResult<Vec<AuditEntry>> {
        let rows = sqlx::query_as::<_, AuditRow>(&format!(
            r#"
            SELECT {} FROM audit_entries
            WHERE entity_type = $1 AND entity_id = $2
            ORDER BY created_at DESC
            "#,
            AUDIT_COLUMNS
        ))
        .bind(entity_type.as_str())
        .bind(entity_id)
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn movements_for_product(&self, product_id: Uuid) -> StoreResult<Vec<StockMovement>> {
        let rows = sqlx::query_as::<_, MovementRow>(&format!(
            r#"
            SELECT {} FROM stock_movements
            WHERE product_id = $1
            ORDER BY created_at DESC
            "#,
            MOVEMENT_COLUMNS
        ))
        .bind(product_id)
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
    }
}
