//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use shared::{
    Actor, IntakeRecord, IntakeStatus, IssuanceRecord, IssuanceStatus, Product, Role, Structure,
};
use stock_approval::config::NumberingConfig;
use stock_approval::services::{IntakeService, IssuanceService, StockService};
use stock_approval::store::{MemoryStore, WorkflowStore};
use uuid::Uuid;

// Helper to create Decimal from string
pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// One ministry, one structure and one product in a fresh in-memory store
pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub ministry_id: Uuid,
    pub structure_id: Uuid,
    pub product_id: Uuid,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_stock(dec("100")).await
    }

    pub async fn with_stock(quantity: Decimal) -> Self {
        let store = Arc::new(MemoryStore::new());
        let ministry_id = Uuid::new_v4();
        let structure_id = Uuid::new_v4();

        store
            .insert_structure(Structure {
                id: structure_id,
                ministry_id,
                name: "Direction régionale de la santé".into(),
                abbreviation: Some("DRS".into()),
                ministry_abbreviation: Some("MSAS".into()),
            })
            .await;

        let fixture = Self {
            store,
            ministry_id,
            structure_id,
            product_id: Uuid::new_v4(),
        };
        fixture
            .add_product(fixture.product_id, structure_id, quantity)
            .await;
        fixture
    }

    pub async fn add_product(&self, id: Uuid, structure_id: Uuid, quantity: Decimal) {
        let now = Utc::now();
        self.store
            .insert_product(Product {
                id,
                name: "Gants d'examen".into(),
                unit: "carton".into(),
                quantity,
                initial_quantity: quantity,
                unit_price: dec("2"),
                ministry_id: self.ministry_id,
                structure_id,
                created_at: now,
                updated_at: now,
            })
            .await;
    }

    pub fn dyn_store(&self) -> Arc<dyn WorkflowStore> {
        self.store.clone()
    }

    pub fn intakes(&self) -> IntakeService {
        IntakeService::new(self.dyn_store(), NumberingConfig::default())
    }

    pub fn issuances(&self) -> IssuanceService {
        IssuanceService::new(self.dyn_store(), NumberingConfig::default())
    }

    pub fn stock(&self) -> StockService {
        StockService::new(self.dyn_store())
    }

    /// Actor of `role` scoped to the fixture's ministry and structure
    pub fn actor(&self, role: Role) -> Actor {
        Actor::new(Uuid::new_v4(), role).with_scope(self.ministry_id, self.structure_id)
    }

    pub fn admin(&self) -> Actor {
        Actor::new(Uuid::new_v4(), Role::Admin)
    }

    pub async fn product(&self) -> Product {
        self.store
            .get_product(self.product_id)
            .await
            .unwrap()
            .unwrap()
    }

    /// Store an intake directly in `status`, bypassing the workflow
    pub async fn seed_intake(&self, status: IntakeStatus, is_locked: bool) -> IntakeRecord {
        let now = Utc::now();
        let record = IntakeRecord {
            id: Uuid::new_v4(),
            number: format!("INT-SEED-{}", Uuid::new_v4().simple()),
            product_id: self.product_id,
            quantity: dec("10"),
            unit_price: dec("5"),
            supplier_name: "Acme".into(),
            supplier_tax_id: None,
            status,
            is_locked,
            observations: None,
            ministry_id: self.ministry_id,
            structure_id: self.structure_id,
            created_by: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        };
        self.store.put_intake(record.clone()).await;
        record
    }

    pub async fn seed_issuance(
        &self,
        status: IssuanceStatus,
        is_locked: bool,
        quantity: Decimal,
    ) -> IssuanceRecord {
        let now = Utc::now();
        let record = IssuanceRecord {
            id: Uuid::new_v4(),
            number: format!("ISS-SEED-{}", Uuid::new_v4().simple()),
            reference: None,
            issued_on: now.date_naive(),
            product_id: self.product_id,
            quantity,
            beneficiary_name: "Centre de santé de Pikine".into(),
            beneficiary_phone: None,
            reason: None,
            status,
            is_locked,
            observations: None,
            ministry_id: self.ministry_id,
            structure_id: self.structure_id,
            created_by: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        };
        self.store.put_issuance(record.clone()).await;
        record
    }
}
