//! Intake (alimentation) workflow tests
//!
//! Covers creation, the approval chain, rework and deletion rules and the
//! atomicity of final approval.

mod common;

use common::{dec, Fixture};
use shared::{AuditAction, EntityType, IntakeStatus, MovementKind, Role};
use stock_approval::services::intake::{CreateIntakeInput, EditIntakeInput};
use stock_approval::store::WorkflowStore;
use stock_approval::AppError;
use uuid::Uuid;

fn create_input(fixture: &Fixture, quantity: &str, price: &str) -> CreateIntakeInput {
    CreateIntakeInput {
        product_id: fixture.product_id,
        quantity: dec(quantity),
        unit_price: dec(price),
        supplier_name: "Acme".into(),
        supplier_tax_id: Some("NIF-0042".into()),
    }
}

fn edit_input(quantity: &str, price: &str) -> EditIntakeInput {
    EditIntakeInput {
        quantity: dec(quantity),
        unit_price: dec(price),
        supplier_name: "Acme SARL".into(),
        supplier_tax_id: None,
        observations: None,
    }
}

// ============================================================================
// Creation
// ============================================================================

/// Creation jumps straight to PENDING_FINANCE and records a CREATE entry
#[tokio::test]
async fn test_create_starts_pending_finance() {
    let fixture = Fixture::new().await;
    let buyer = fixture.actor(Role::Purchasing);

    let record = fixture
        .intakes()
        .create(&buyer, create_input(&fixture, "10", "5"))
        .await
        .unwrap();

    assert_eq!(record.status, IntakeStatus::PendingFinance);
    assert!(!record.is_locked);
    assert!(record.number.starts_with("INT-"));
    assert!(record.number.ends_with("-0001"));
    assert_eq!(record.structure_id, fixture.structure_id);

    let trail = fixture
        .store
        .audit_trail(EntityType::Intake, record.id)
        .await
        .unwrap();
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].action, AuditAction::Create);
    assert_eq!(trail[0].from_state, "");
    assert_eq!(trail[0].to_state, "PENDING_FINANCE");
    assert_eq!(trail[0].actor_role, "Responsable achats");
}

/// Zero quantity or price is refused and nothing is stored
#[tokio::test]
async fn test_create_rejects_non_positive_amounts() {
    let fixture = Fixture::new().await;
    let buyer = fixture.actor(Role::Purchasing);
    let service = fixture.intakes();

    let err = service
        .create(&buyer, create_input(&fixture, "0", "5"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "quantity"));

    let err = service
        .create(&buyer, create_input(&fixture, "10", "0"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "unit_price"));

    let err = service
        .create(&buyer, create_input(&fixture, "-3", "5"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    assert!(service.list(&buyer).await.unwrap().is_empty());
}

/// Amounts finer than the stored precision are refused, not rounded
#[tokio::test]
async fn test_create_rejects_excess_decimal_places() {
    let fixture = Fixture::new().await;
    let buyer = fixture.actor(Role::Purchasing);
    let service = fixture.intakes();

    for price in ["0.001", "1.005"] {
        let err = service
            .create(&buyer, create_input(&fixture, "10", price))
            .await
            .unwrap_err();
        assert!(
            matches!(err, AppError::Validation { ref field, .. } if field == "unit_price"),
            "{price}: {err:?}"
        );
    }

    let err = service
        .create(&buyer, create_input(&fixture, "0.0005", "5"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "quantity"));

    let record = service
        .create(&buyer, create_input(&fixture, "2.125", "1.50"))
        .await
        .unwrap();
    assert_eq!(record.unit_price, dec("1.5"));
    assert_eq!(service.list(&buyer).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_requires_purchasing_role() {
    let fixture = Fixture::new().await;

    for role in [Role::DataEntry, Role::Finance, Role::Director, Role::HeadOfEntity] {
        let err = fixture
            .intakes()
            .create(&fixture.actor(role), create_input(&fixture, "10", "5"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }), "{role:?}");
    }
}

#[tokio::test]
async fn test_create_outside_ministry_is_forbidden() {
    let fixture = Fixture::new().await;
    let outsider = shared::Actor::new(Uuid::new_v4(), Role::Purchasing)
        .with_scope(Uuid::new_v4(), Uuid::new_v4());

    let err = fixture
        .intakes()
        .create(&outsider, create_input(&fixture, "10", "5"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_create_unknown_product() {
    let fixture = Fixture::new().await;
    let mut input = create_input(&fixture, "10", "5");
    input.product_id = Uuid::new_v4();

    let err = fixture
        .intakes()
        .create(&fixture.actor(Role::Purchasing), input)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

// ============================================================================
// Approval Chain
// ============================================================================

/// Finance, director, then head of entity; the last step credits the stock
#[tokio::test]
async fn test_full_approval_credits_stock() {
    let fixture = Fixture::with_stock(dec("20")).await;
    let service = fixture.intakes();

    let record = service
        .create(&fixture.actor(Role::Purchasing), create_input(&fixture, "10", "5"))
        .await
        .unwrap();

    let record = service
        .approve(&fixture.actor(Role::Finance), record.id, None)
        .await
        .unwrap();
    assert_eq!(record.status, IntakeStatus::ApprovedFinance);

    let record = service
        .approve(&fixture.actor(Role::Director), record.id, Some("ok".into()))
        .await
        .unwrap();
    assert_eq!(record.status, IntakeStatus::ApprovedDirector);
    assert_eq!(fixture.product().await.quantity, dec("20"));

    let record = service
        .approve(&fixture.actor(Role::HeadOfEntity), record.id, None)
        .await
        .unwrap();
    assert_eq!(record.status, IntakeStatus::ApprovedHead);
    assert!(record.is_locked);

    let product = fixture.product().await;
    assert_eq!(product.quantity, dec("30"));
    assert_eq!(product.unit_price, dec("5"));

    let movements = fixture
        .store
        .movements_for_product(fixture.product_id)
        .await
        .unwrap();
    assert_eq!(movements.len(), 1);
    assert_eq!(movements[0].kind, MovementKind::Entry);
    assert_eq!(movements[0].quantity, dec("10"));
    assert_eq!(movements[0].intake_id, Some(record.id));
    assert_eq!(movements[0].supplier_name.as_deref(), Some("Acme"));

    let trail = service
        .history(&fixture.actor(Role::Purchasing), record.id)
        .await
        .unwrap();
    let actions: Vec<_> = trail.iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![
            AuditAction::Approve,
            AuditAction::Approve,
            AuditAction::Approve,
            AuditAction::Create
        ]
    );
    assert_eq!(trail[0].to_state, "APPROVED_HEAD");
}

/// Skipping a stage names the state the record is in
#[tokio::test]
async fn test_out_of_order_approval_names_current_state() {
    let fixture = Fixture::new().await;
    let record = fixture.seed_intake(IntakeStatus::PendingFinance, false).await;

    let err = fixture
        .intakes()
        .approve(&fixture.actor(Role::Director), record.id, None)
        .await
        .unwrap_err();

    match err {
        AppError::InvalidTransition {
            current_state,
            message,
        } => {
            assert_eq!(current_state, "PENDING_FINANCE");
            assert!(message.contains("approved by finance"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_head_may_approve_from_pending_head() {
    let fixture = Fixture::new().await;
    let record = fixture.seed_intake(IntakeStatus::PendingHead, false).await;

    let record = fixture
        .intakes()
        .approve(&fixture.actor(Role::HeadOfEntity), record.id, None)
        .await
        .unwrap();
    assert_eq!(record.status, IntakeStatus::ApprovedHead);
    assert_eq!(fixture.product().await.quantity, dec("110"));
}

#[tokio::test]
async fn test_holds_send_record_back() {
    let fixture = Fixture::new().await;
    let service = fixture.intakes();

    let record = fixture.seed_intake(IntakeStatus::ApprovedFinance, false).await;
    let record = service
        .put_on_hold(&fixture.actor(Role::Director), record.id, Some("prix à revoir".into()))
        .await
        .unwrap();
    assert_eq!(record.status, IntakeStatus::PendingFinance);
    assert_eq!(record.observations.as_deref(), Some("prix à revoir"));

    let record = fixture.seed_intake(IntakeStatus::ApprovedDirector, false).await;
    let record = service
        .put_on_hold(&fixture.actor(Role::HeadOfEntity), record.id, None)
        .await
        .unwrap();
    assert_eq!(record.status, IntakeStatus::ApprovedFinance);

    let trail = service
        .history(&fixture.admin(), record.id)
        .await
        .unwrap();
    assert_eq!(trail[0].action, AuditAction::Hold);
    assert_eq!(trail[0].from_state, "APPROVED_DIRECTOR");
}

/// Finance may keep a pending record on hold without moving it
#[tokio::test]
async fn test_keep_on_hold() {
    let fixture = Fixture::new().await;
    let service = fixture.intakes();
    let finance = fixture.actor(Role::Finance);
    let record = fixture.seed_intake(IntakeStatus::PendingFinance, false).await;

    let err = service
        .keep_on_hold(&finance, record.id, Some("  ".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    let err = service
        .keep_on_hold(&fixture.actor(Role::Director), record.id, Some("attente".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));

    let updated = service
        .keep_on_hold(&finance, record.id, Some("facture manquante".into()))
        .await
        .unwrap();
    assert_eq!(updated.status, IntakeStatus::PendingFinance);
    assert_eq!(updated.observations.as_deref(), Some("facture manquante"));

    let trail = service.history(&finance, record.id).await.unwrap();
    assert_eq!(trail[0].action, AuditAction::Hold);
    assert_eq!(trail[0].from_state, "PENDING_FINANCE");
    assert_eq!(trail[0].to_state, "PENDING_FINANCE");

    let approved = fixture.seed_intake(IntakeStatus::ApprovedFinance, false).await;
    let err = service
        .keep_on_hold(&finance, approved.id, Some("attente".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { ref current_state, .. } if current_state == "APPROVED_FINANCE"));
}

// ============================================================================
// Rejection
// ============================================================================

#[tokio::test]
async fn test_reject_requires_observations() {
    let fixture = Fixture::new().await;
    let head = fixture.actor(Role::HeadOfEntity);
    let record = fixture.seed_intake(IntakeStatus::ApprovedDirector, false).await;

    let err = fixture
        .intakes()
        .reject(&head, record.id, Some(String::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { ref field, .. } if field == "observations"));

    let err = fixture
        .intakes()
        .reject(&head, record.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    let unchanged = fixture.store.get_intake(record.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, IntakeStatus::ApprovedDirector);
}

/// Rejected intakes stay unlocked so purchasing can rework or delete them
#[tokio::test]
async fn test_reject_keeps_record_unlocked() {
    let fixture = Fixture::new().await;
    let record = fixture.seed_intake(IntakeStatus::ApprovedDirector, false).await;

    let rejected = fixture
        .intakes()
        .reject(
            &fixture.actor(Role::HeadOfEntity),
            record.id,
            Some("fournisseur non agréé".into()),
        )
        .await
        .unwrap();
    assert_eq!(rejected.status, IntakeStatus::Rejected);
    assert!(!rejected.is_locked);
    assert_eq!(fixture.product().await.quantity, dec("100"));

    fixture
        .intakes()
        .delete(&fixture.actor(Role::Purchasing), record.id)
        .await
        .unwrap();
    assert!(fixture.store.get_intake(record.id).await.unwrap().is_none());
}

// ============================================================================
// Edit
// ============================================================================

#[tokio::test]
async fn test_edit_returns_to_pending_finance() {
    let fixture = Fixture::new().await;
    let buyer = fixture.actor(Role::Purchasing);
    let record = fixture.seed_intake(IntakeStatus::ApprovedFinance, false).await;

    let edited = fixture
        .intakes()
        .edit(&buyer, record.id, edit_input("12", "4.5"))
        .await
        .unwrap();
    assert_eq!(edited.status, IntakeStatus::PendingFinance);
    assert_eq!(edited.quantity, dec("12"));
    assert_eq!(edited.unit_price, dec("4.5"));
    assert_eq!(edited.supplier_name, "Acme SARL");

    let trail = fixture
        .store
        .audit_trail(EntityType::Intake, record.id)
        .await
        .unwrap();
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].action, AuditAction::Edit);
    assert_eq!(trail[0].from_state, "APPROVED_FINANCE");
}

/// An edit in PENDING_FINANCE changes nothing about the state and is not audited
#[tokio::test]
async fn test_edit_in_pending_finance_writes_no_audit() {
    let fixture = Fixture::new().await;
    let record = fixture.seed_intake(IntakeStatus::PendingFinance, false).await;

    fixture
        .intakes()
        .edit(&fixture.actor(Role::Purchasing), record.id, edit_input("8", "5"))
        .await
        .unwrap();

    let trail = fixture
        .store
        .audit_trail(EntityType::Intake, record.id)
        .await
        .unwrap();
    assert!(trail.is_empty());
}

#[tokio::test]
async fn test_edit_rejected_only_by_admin() {
    let fixture = Fixture::new().await;
    let record = fixture.seed_intake(IntakeStatus::Rejected, false).await;

    let err = fixture
        .intakes()
        .edit(&fixture.actor(Role::Purchasing), record.id, edit_input("8", "5"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));

    let edited = fixture
        .intakes()
        .edit(&fixture.admin(), record.id, edit_input("8", "5"))
        .await
        .unwrap();
    assert_eq!(edited.status, IntakeStatus::PendingFinance);
}

#[tokio::test]
async fn test_edit_refused_for_other_roles_and_locked_records() {
    let fixture = Fixture::new().await;
    let record = fixture.seed_intake(IntakeStatus::PendingFinance, false).await;

    let err = fixture
        .intakes()
        .edit(&fixture.actor(Role::Finance), record.id, edit_input("8", "5"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));

    let locked = fixture.seed_intake(IntakeStatus::ApprovedHead, true).await;
    let err = fixture
        .intakes()
        .edit(&fixture.admin(), locked.id, edit_input("8", "5"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::RecordLocked(_)));
}

/// The trail names the role that authorised the step, even for admins
#[tokio::test]
async fn test_admin_approver_is_recorded_by_role() {
    let fixture = Fixture::new().await;
    let record = fixture.seed_intake(IntakeStatus::ApprovedDirector, false).await;
    let head = fixture.actor(Role::HeadOfEntity).with_admin(true);

    fixture.intakes().approve(&head, record.id, None).await.unwrap();

    let trail = fixture
        .store
        .audit_trail(EntityType::Intake, record.id)
        .await
        .unwrap();
    assert_eq!(trail[0].actor_role, "Ordonnateur");
    assert_eq!(trail[0].actor_id, head.user_id);
}

// ============================================================================
// Delete
// ============================================================================

/// A locked intake can never be deleted, not even by an admin
#[tokio::test]
async fn test_locked_intake_is_never_deleted() {
    let fixture = Fixture::new().await;
    let record = fixture.seed_intake(IntakeStatus::ApprovedHead, true).await;

    for actor in [fixture.admin(), fixture.actor(Role::Purchasing)] {
        let err = fixture.intakes().delete(&actor, record.id).await.unwrap_err();
        assert!(matches!(err, AppError::RecordLocked(_)));
    }
    assert!(fixture.store.get_intake(record.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_delete_state_rules() {
    let fixture = Fixture::new().await;
    let buyer = fixture.actor(Role::Purchasing);

    let approved = fixture.seed_intake(IntakeStatus::ApprovedFinance, false).await;
    let err = fixture.intakes().delete(&buyer, approved.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition { .. }));

    fixture
        .intakes()
        .delete(&fixture.admin(), approved.id)
        .await
        .unwrap();

    let err = fixture
        .intakes()
        .delete(&fixture.actor(Role::Director), Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

/// Deleting a record removes its audit trail with it
#[tokio::test]
async fn test_delete_cascades_audit_entries() {
    let fixture = Fixture::new().await;
    let buyer = fixture.actor(Role::Purchasing);
    let record = fixture
        .intakes()
        .create(&buyer, create_input(&fixture, "10", "5"))
        .await
        .unwrap();

    fixture.intakes().delete(&buyer, record.id).await.unwrap();

    let trail = fixture
        .store
        .audit_trail(EntityType::Intake, record.id)
        .await
        .unwrap();
    assert!(trail.is_empty());
}

// ============================================================================
// Atomicity
// ============================================================================

/// A failure inside the final approval unit leaves everything untouched
#[tokio::test]
async fn test_failed_final_approval_rolls_back() {
    let fixture = Fixture::new().await;
    let record = fixture.seed_intake(IntakeStatus::ApprovedDirector, false).await;

    fixture.store.fail_next_commit();
    let err = fixture
        .intakes()
        .approve(&fixture.actor(Role::HeadOfEntity), record.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Persistence(_)));

    let unchanged = fixture.store.get_intake(record.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, IntakeStatus::ApprovedDirector);
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
        .audit_trail(EntityType::Intake, record.id)
        .await
        .unwrap()
        .is_empty());

    // The same approval succeeds once the store recovers
    let approved = fixture
        .intakes()
        .approve(&fixture.actor(Role::HeadOfEntity), record.id, None)
        .await
        .unwrap();
    assert!(approved.is_locked);
}

// ============================================================================
// Read Side
// ============================================================================

#[tokio::test]
async fn test_listing_is_scoped() {
    let fixture = Fixture::new().await;
    fixture.seed_intake(IntakeStatus::PendingFinance, false).await;
    fixture.seed_intake(IntakeStatus::ApprovedFinance, false).await;

    let finance = fixture.actor(Role::Finance);
    assert_eq!(fixture.intakes().list(&finance).await.unwrap().len(), 2);

    let elsewhere = shared::Actor::new(Uuid::new_v4(), Role::Director)
        .with_scope(fixture.ministry_id, Uuid::new_v4());
    assert!(fixture.intakes().list(&elsewhere).await.unwrap().is_empty());

    let unscoped = shared::Actor::new(Uuid::new_v4(), Role::Finance);
    let err = fixture.intakes().list(&unscoped).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    assert_eq!(fixture.intakes().list(&fixture.admin()).await.unwrap().len(), 2);
}
