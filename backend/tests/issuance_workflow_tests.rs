//! Issuance (octroi) workflow tests
//!
//! Covers entry with the advisory availability check, the approval chain and
//! its stock debit, rework of rejected records and deletion rules.

mod common;

use common::{dec, Fixture};
use shared::{Actor, AuditAction, EntityType, IssuanceStatus, MovementKind, Role};
use stock_approval::services::issuance::{CreateIssuanceInput, EditIssuanceInput};
use stock_approval::services::SequenceAllocator;
use stock_approval::store::WorkflowStore;
use stock_approval::AppError;
use uuid::Uuid;

fn create_input(fixture: &Fixture, quantity: &str) -> CreateIssuanceInput {
    CreateIssuanceInput {
        product_id: fixture.product_id,
        quantity: dec(quantity),
        beneficiary_name: "Poste de santé de Thiaroye".into(),
        beneficiary_phone: Some("+221 77 123 45 67".into()),
        reason: Some("Campagne de vaccination".into()),
        reference: None,
        issued_on: None,
    }
}

fn edit_input(quantity: &str) -> EditIssuanceInput {
    EditIssuanceInput {
        product_id: None,
        quantity: dec(quantity),
        beneficiary_name: "Poste de santé de Thiaroye".into(),
        beneficiary_phone: None,
        reason: None,
        reference: Some("REQ-12".into()),
        issued_on: None,
        observations: Some("quantité corrigée".into()),
    }
}

// ============================================================================
// Creation
// ============================================================================

#[tokio::test]
async fn test_create_starts_in_saisie_with_structure_number() {
    let fixture = Fixture::new().await;
    let agent = fixture.actor(Role::DataEntry);

    let record = fixture
        .issuances()
        .create(&agent, create_input(&fixture, "5"))
        .await
        .unwrap();

    let year = SequenceAllocator::current_year();
    assert_eq!(record.status, IssuanceStatus::Saisie);
    assert!(!record.is_locked);
    assert_eq!(record.number, format!("ISS-MSAS-DRS-{}-0001", year));
    assert_eq!(record.beneficiary_phone.as_deref(), Some("+221 77 123 45 67"));

    let second = fixture
        .issuances()
        .create(&fixture.actor(Role::Purchasing), create_input(&fixture, "1"))
        .await
        .unwrap();
    assert_eq!(second.number, format!("ISS-MSAS-DRS-{}-0002", year));

    let trail = fixture
        .store
        .audit_trail(EntityType::Issuance, record.id)
        .await
        .unwrap();
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].action, AuditAction::Create);
    assert_eq!(trail[0].from_state, "");
    assert_eq!(trail[0].to_state, "SAISIE");
    assert_eq!(trail[0].actor_role, "Agent de saisie");
}

/// Asking for more than is on hand creates nothing
#[tokio::test]
async fn test_create_beyond_stock_is_refused() {
    let fixture = Fixture::with_stock(dec("3")).await;
    let agent = fixture.actor(Role::DataEntry);

    let err = fixture
        .issuances()
        .create(&agent, create_input(&fixture, "5"))
        .await
        .unwrap_err();

    match err {
        AppError::InsufficientStock {
            available,
            requested,
        } => {
            assert_eq!(available, dec("3"));
            assert_eq!(requested, dec("5"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(fixture.issuances().list(&agent).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_validation() {
    let fixture = Fixture::new().await;
    let agent = fixture.actor(Role::DataEntry);

    let err = fixture
        .issuances()
        .create(&agent, create_input(&fixture, "0"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "quantity"));

    let mut input = create_input(&fixture, "2");
    input.beneficiary_phone = Some("abc".into());
    let err = fixture.issuances().create(&agent, input).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "beneficiary_phone"));

    let mut input = create_input(&fixture, "2");
    input.beneficiary_name = "   ".into();
    let err = fixture.issuances().create(&agent, input).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
}

#[tokio::test]
async fn test_create_rejects_excess_decimal_places() {
    let fixture = Fixture::new().await;
    let agent = fixture.actor(Role::DataEntry);

    let err = fixture
        .issuances()
        .create(&agent, create_input(&fixture, "0.0001"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "quantity"));
    assert!(fixture.issuances().list(&agent).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_role_and_scope() {
    let fixture = Fixture::new().await;

    let err = fixture
        .issuances()
        .create(&fixture.actor(Role::Finance), create_input(&fixture, "2"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));

    let other_structure = Actor::new(Uuid::new_v4(), Role::DataEntry)
        .with_scope(fixture.ministry_id, Uuid::new_v4());
    let err = fixture
        .issuances()
        .create(&other_structure, create_input(&fixture, "2"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

// ============================================================================
// Approval Chain
// ============================================================================

/// Director, finance, then head of entity; the last step debits the stock
#[tokio::test]
async fn test_full_approval_debits_stock() {
    let fixture = Fixture::new().await;
    let service = fixture.issuances();

    let record = service
        .create(&fixture.actor(Role::DataEntry), create_input(&fixture, "30"))
        .await
        .unwrap();

    let record = service
        .approve(&fixture.actor(Role::Director), record.id, None)
        .await
        .unwrap();
    assert_eq!(record.status, IssuanceStatus::ApprovedDirector);

    let record = service
        .approve(&fixture.actor(Role::Finance), record.id, None)
        .await
        .unwrap();
    assert_eq!(record.status, IssuanceStatus::ApprovedFinance);
    assert_eq!(fixture.product().await.quantity, dec("100"));

    let record = service
        .approve(&fixture.actor(Role::HeadOfEntity), record.id, None)
        .await
        .unwrap();
    assert_eq!(record.status, IssuanceStatus::ApprovedHead);
    assert!(record.is_locked);
    assert_eq!(fixture.product().await.quantity, dec("70"));

    let movements = fixture
        .store
        .movements_for_product(fixture.product_id)
        .await
        .unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].kind, MovementKind::Exit);
    assert_eq!(movements[0].quantity, dec("30"));
    assert_eq!(movements[0].issuance_id, Some(record.id));
    assert_eq!(
        movements[0].beneficiary_name.as_deref(),
        Some("Poste de santé de Thiaroye")
    );
}

#[tokio::test]
async fn test_director_hold_and_head_hold() {
    let fixture = Fixture::new().await;
    let service = fixture.issuances();
    let director = fixture.actor(Role::Director);

    let record = fixture
        .seed_issuance(IssuanceStatus::Saisie, false, dec("4"))
        .await;
    let record = service
        .put_on_hold(&director, record.id, Some("bénéficiaire à préciser".into()))
        .await
        .unwrap();
    assert_eq!(record.status, IssuanceStatus::PendingDirector);

    // Approval is still possible from PENDING_DIRECTOR
    let record = service.approve(&director, record.id, None).await.unwrap();
    assert_eq!(record.status, IssuanceStatus::ApprovedDirector);

    let record = fixture
        .seed_issuance(IssuanceStatus::ApprovedFinance, false, dec("4"))
        .await;
    let record = service
        .put_on_hold(&fixture.actor(Role::HeadOfEntity), record.id, None)
        .await
        .unwrap();
    assert_eq!(record.status, IssuanceStatus::PendingHead);

    let record = service
        .approve(&fixture.actor(Role::HeadOfEntity), record.id, None)
        .await
        .unwrap();
    assert_eq!(record.status, IssuanceStatus::ApprovedHead);
}

#[tokio::test]
async fn test_finance_before_director_is_refused() {
    let fixture = Fixture::new().await;
    let record = fixture
        .seed_issuance(IssuanceStatus::Saisie, false, dec("4"))
        .await;

    let err = fixture
        .issuances()
        .approve(&fixture.actor(Role::Finance), record.id, None)
        .await
        .unwrap_err();
    match err {
        AppError::InvalidTransition {
            current_state,
            message,
        } => {
            assert_eq!(current_state, "SAISIE");
            assert!(message.contains("approved by the director"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

/// Final approval re-checks the stock on hand
#[tokio::test]
async fn test_final_approval_with_short_stock() {
    let fixture = Fixture::with_stock(dec("3")).await;
    let record = fixture
        .seed_issuance(IssuanceStatus::ApprovedFinance, false, dec("5"))
        .await;

    let err = fixture
        .issuances()
        .approve(&fixture.actor(Role::HeadOfEntity), record.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { .. }));

    let unchanged = fixture.store.get_issuance(record.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, IssuanceStatus::ApprovedFinance);
    assert_eq!(fixture.product().await.quantity, dec("3"));
}

// ============================================================================
// Rejection and Rework
// ============================================================================

/// A rejected issuance is locked, yet its creator can still rework it
#[tokio::test]
async fn test_reject_locks_and_edit_reopens() {
    let fixture = Fixture::new().await;
    let service = fixture.issuances();
    let record = fixture
        .seed_issuance(IssuanceStatus::ApprovedFinance, false, dec("4"))
        .await;

    let err = service
        .reject(&fixture.actor(Role::HeadOfEntity), record.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    let rejected = service
        .reject(
            &fixture.actor(Role::HeadOfEntity),
            record.id,
            Some("dossier incomplet".into()),
        )
        .await
        .unwrap();
    assert_eq!(rejected.status, IssuanceStatus::Rejected);
    assert!(rejected.is_locked);

    let edited = service
        .edit(&fixture.actor(Role::DataEntry), record.id, edit_input("3"))
        .await
        .unwrap();
    assert_eq!(edited.status, IssuanceStatus::Saisie);
    assert!(!edited.is_locked);
    assert_eq!(edited.quantity, dec("3"));
    assert_eq!(edited.reference.as_deref(), Some("REQ-12"));

    let trail = service
        .history(&fixture.actor(Role::DataEntry), record.id)
        .await
        .unwrap();
    assert_eq!(trail[0].action, AuditAction::Edit);
    assert_eq!(trail[0].from_state, "REJECTED");
    assert_eq!(trail[0].to_state, "SAISIE");
    assert_eq!(trail[1].action, AuditAction::Reject);
}

#[tokio::test]
async fn test_edit_refused_after_director_approval() {
    let fixture = Fixture::new().await;
    let record = fixture
        .seed_issuance(IssuanceStatus::ApprovedDirector, false, dec("4"))
        .await;

    let err = fixture
        .issuances()
        .edit(&fixture.actor(Role::DataEntry), record.id, edit_input("3"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { ref current_state, .. } if current_state == "APPROVED_DIRECTOR"));

    let err = fixture
        .issuances()
        .edit(&fixture.actor(Role::Director), record.id, edit_input("3"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));
}

/// Increasing a quantity counts what other pending issuances already claim
#[tokio::test]
async fn test_edit_counts_other_pending_issuances() {
    let fixture = Fixture::with_stock(dec("10")).await;
    let agent = fixture.actor(Role::DataEntry);
    fixture
        .seed_issuance(IssuanceStatus::ApprovedDirector, false, dec("6"))
        .await;
    let record = fixture
        .seed_issuance(IssuanceStatus::Saisie, false, dec("2"))
        .await;

    let err = fixture
        .issuances()
        .edit(&agent, record.id, edit_input("5"))
        .await
        .unwrap_err();
    match err {
        AppError::InsufficientStock {
            available,
            requested,
        } => {
            assert_eq!(available, dec("4"));
            assert_eq!(requested, dec("5"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let edited = fixture
        .issuances()
        .edit(&agent, record.id, edit_input("4"))
        .await
        .unwrap();
    assert_eq!(edited.quantity, dec("4"));
}

/// Moving an issuance to another product checks that product's stock
#[tokio::test]
async fn test_edit_switches_product() {
    let fixture = Fixture::new().await;
    let agent = fixture.actor(Role::DataEntry);
    let other_product = Uuid::new_v4();
    fixture
        .add_product(other_product, fixture.structure_id, dec("2"))
        .await;
    let record = fixture
        .seed_issuance(IssuanceStatus::PendingDirector, false, dec("2"))
        .await;

    let mut input = edit_input("3");
    input.product_id = Some(other_product);
    let err = fixture
        .issuances()
        .edit(&agent, record.id, input)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { .. }));

    let mut input = edit_input("2");
    input.product_id = Some(other_product);
    let edited = fixture.issuances().edit(&agent, record.id, input).await.unwrap();
    assert_eq!(edited.product_id, other_product);
    assert_eq!(edited.status, IssuanceStatus::Saisie);
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn test_admin_may_delete_locked_issuance() {
    let fixture = Fixture::new().await;
    let record = fixture
        .seed_issuance(IssuanceStatus::Rejected, true, dec("4"))
        .await;

    let err = fixture
        .issuances()
        .delete(&fixture.actor(Role::DataEntry), record.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::RecordLocked(_)));

    fixture
        .issuances()
        .delete(&fixture.admin(), record.id)
        .await
        .unwrap();
    assert!(fixture.store.get_issuance(record.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_non_admin_deletes_only_in_saisie() {
    let fixture = Fixture::new().await;
    let agent = fixture.actor(Role::DataEntry);

    let in_review = fixture
        .seed_issuance(IssuanceStatus::PendingDirector, false, dec("4"))
        .await;
    let err = fixture
        .issuances()
        .delete(&agent, in_review.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));

    let draft = fixture
        .issuances()
        .create(&agent, create_input(&fixture, "1"))
        .await
        .unwrap();
    fixture.issuances().delete(&agent, draft.id).await.unwrap();
    assert!(fixture
        .store
        .audit_trail(EntityType::Issuance, draft.id)
        .await
        .unwrap()
        .is_empty());

    let err = fixture
        .issuances()
        .delete(&fixture.actor(Role::Finance), in_review.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));
}

// ============================================================================
// Atomicity
// ============================================================================

/// A failed final approval leaves state, lock, stock, movements and trail untouched
#[tokio::test]
async fn test_failed_final_approval_rolls_back() {
    let fixture = Fixture::new().await;
    let record = fixture
        .seed_issuance(IssuanceStatus::PendingHead, false, dec("30"))
        .await;
    let head = fixture.actor(Role::HeadOfEntity);

    fixture.store.fail_next_commit();
    let err = fixture
        .issuances()
        .approve(&head, record.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Persistence(_)));

    let unchanged = fixture.store.get_issuance(record.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, IssuanceStatus::PendingHead);
    assert!(!unchanged.is_locked);
    assert_eq!(fixture.product().await.quantity, dec("100"));
    assert!(fixture
        .store
        .movements_for_product(fixture.product_id)
        .await
        .unwrap()
        .is_empty());
    assert!(fixture
        .store
        .audit_trail(EntityType::Issuance, record.id)
        .await
        .unwrap()
        .is_empty());

    let approved = fixture
        .issuances()
        .approve(&head, record.id, None)
        .await
        .unwrap();
    assert!(approved.is_locked);
    assert_eq!(fixture.product().await.quantity, dec("70"));
}

/// A failed rejection neither moves nor locks the record
#[tokio::test]
async fn test_failed_reject_rolls_back() {
    let fixture = Fixture::new().await;
    let record = fixture
        .seed_issuance(IssuanceStatus::PendingHead, false, dec("4"))
        .await;
    let head = fixture.actor(Role::HeadOfEntity);

    fixture.store.fail_next_commit();
    let err = fixture
        .issuances()
        .reject(&head, record.id, Some("dossier incomplet".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Persistence(_)));

    let unchanged = fixture.store.get_issuance(record.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, IssuanceStatus::PendingHead);
    assert!(!unchanged.is_locked);
    assert_eq!(unchanged.observations, None);
    assert!(fixture
        .store
        .audit_trail(EntityType::Issuance, record.id)
        .await
        .unwrap()
        .is_empty());
    assert_eq!(fixture.product().await.quantity, dec("100"));
}

// ============================================================================
// Read Side
// ============================================================================

#[tokio::test]
async fn test_stock_status_after_issuance() {
    let fixture = Fixture::with_stock(dec("100")).await;
    let record = fixture
        .seed_issuance(IssuanceStatus::PendingHead, false, dec("92"))
        .await;

    fixture
        .issuances()
        .approve(&fixture.actor(Role::HeadOfEntity), record.id, None)
        .await
        .unwrap();

    let status = fixture
        .stock()
        .status(&fixture.actor(Role::Director), fixture.product_id)
        .await
        .unwrap();
    assert_eq!(status.quantity, dec("8"));
    assert_eq!(status.status.level, shared::stock::StockLevel::Alert);
    assert_eq!(status.status.percentage, 8);

    let movements = fixture
        .stock()
        .movements(&fixture.actor(Role::Director), fixture.product_id)
        .await
        .unwrap();
    assert_eq!(movements.len(), 1);
}
