use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::str::FromStr;
use std::sync::Arc;

use rent_indexation::models::{AdjustmentIndex, LeaseChanges, LeaseDraft, LeaseStatus, PaymentDraft};
use rent_indexation::services::error::EngineError;
use rent_indexation::services::leases::{HAS_PAYMENTS_MESSAGE, OVERLAP_MESSAGE};
use rent_indexation::services::memory::MemoryStore;
use rent_indexation::Engine;

const OWNER: i64 = 1;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

struct Fixture {
    store: Arc<MemoryStore>,
    engine: Engine,
    property: i64,
    tenant: i64,
}

async fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let property = store.add_property_unit(OWNER).await;
    let tenant = store.add_tenant(OWNER).await;
    let engine = Engine::new(store.clone(), Vec::new(), "test-secret");
    Fixture {
        store,
        engine,
        property,
        tenant,
    }
}

fn draft(property: i64, tenant: i64, start: NaiveDate, end: NaiveDate) -> LeaseDraft {
    LeaseDraft {
        property_unit_id: Some(property),
        tenant_ids: vec![tenant],
        start_date: start,
        end_date: end,
        monthly_rent: dec("1000.00"),
        status: None,
        adjustment_index: None,
        adjustment_frequency_months: None,
        country_code: None,
    }
}

fn is_rule(err: &EngineError, message: &str) -> bool {
    matches!(err, EngineError::BusinessRule(m) if m == message)
}

#[tokio::test]
async fn create_applies_defaults() {
    let f = fixture().await;
    let lease = f
        .engine
        .leases
        .create(OWNER, draft(f.property, f.tenant, date(2024, 1, 1), date(2024, 12, 31)))
        .await
        .unwrap();

    assert_eq!(lease.status, LeaseStatus::Active);
    assert_eq!(lease.country_code, "AR");
    assert_eq!(lease.adjustment_index, AdjustmentIndex::Icl);
    assert_eq!(lease.adjustment_frequency_months, 12);
    assert!(!lease.deleted);
}

#[tokio::test]
async fn create_outside_argentina_defaults_to_fixed_rent() {
    let f = fixture().await;
    let mut d = draft(f.property, f.tenant, date(2024, 1, 1), date(2024, 12, 31));
    d.country_code = Some("es".to_string());
    let lease = f.engine.leases.create(OWNER, d).await.unwrap();

    assert_eq!(lease.country_code, "ES");
    assert_eq!(lease.adjustment_index, AdjustmentIndex::None);
}

#[tokio::test]
async fn create_requires_owned_property_and_tenants() {
    let f = fixture().await;
    let foreign_property = f.store.add_property_unit(99).await;
    let foreign_tenant = f.store.add_tenant(99).await;

    let err = f
        .engine
        .leases
        .create(OWNER, draft(foreign_property, f.tenant, date(2024, 1, 1), date(2024, 12, 31)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { entity: "PropertyUnit", .. }));

    let err = f
        .engine
        .leases
        .create(OWNER, draft(f.property, foreign_tenant, date(2024, 1, 1), date(2024, 12, 31)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { entity: "Tenant", .. }));

    let mut no_tenants = draft(f.property, f.tenant, date(2024, 1, 1), date(2024, 12, 31));
    no_tenants.tenant_ids.clear();
    assert!(f.engine.leases.create(OWNER, no_tenants).await.is_err());
}

#[tokio::test]
async fn short_or_inverted_leases_are_rejected() {
    let f = fixture().await;
    let err = f
        .engine
        .leases
        .create(OWNER, draft(f.property, f.tenant, date(2024, 1, 1), date(2024, 1, 20)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::BusinessRule(_)));

    let err = f
        .engine
        .leases
        .create(OWNER, draft(f.property, f.tenant, date(2024, 6, 1), date(2024, 1, 1)))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::BusinessRule(_)));
}

#[tokio::test]
async fn overlapping_active_leases_are_rejected_adjacent_ones_are_not() {
    let f = fixture().await;
    f.engine
        .leases
        .create(OWNER, draft(f.property, f.tenant, date(2024, 1, 1), date(2024, 12, 31)))
        .await
        .unwrap();

    let err = f
        .engine
        .leases
        .create(OWNER, draft(f.property, f.tenant, date(2024, 12, 31), date(2025, 6, 30)))
        .await
        .unwrap_err();
    assert!(is_rule(&err, OVERLAP_MESSAGE));

    f.engine
        .leases
        .create(OWNER, draft(f.property, f.tenant, date(2025, 1, 1), date(2025, 12, 31)))
        .await
        .unwrap();

    let other_property = f.store.add_property_unit(OWNER).await;
    f.engine
        .leases
        .create(OWNER, draft(other_property, f.tenant, date(2024, 6, 1), date(2024, 12, 31)))
        .await
        .unwrap();
}

#[tokio::test]
async fn terminated_lease_frees_the_slot_until_reactivated() {
    let f = fixture().await;
    let first = f
        .engine
        .leases
        .create(OWNER, draft(f.property, f.tenant, date(2024, 1, 1), date(2024, 12, 31)))
        .await
        .unwrap();

    let terminated = f.engine.leases.terminate(OWNER, first.id).await.unwrap();
    assert_eq!(terminated.status, LeaseStatus::Terminated);

    let second = f
        .engine
        .leases
        .create(OWNER, draft(f.property, f.tenant, date(2024, 6, 1), date(2024, 11, 30)))
        .await
        .unwrap();

    let err = f
        .engine
        .leases
        .reactivate_on(OWNER, first.id, date(2024, 7, 1))
        .await
        .unwrap_err();
    assert!(is_rule(&err, OVERLAP_MESSAGE));

    f.engine.leases.terminate(OWNER, second.id).await.unwrap();
    let reactivated = f
        .engine
        .leases
        .reactivate_on(OWNER, first.id, date(2024, 7, 1))
        .await
        .unwrap();
    assert_eq!(reactivated.status, LeaseStatus::Active);
}

#[tokio::test]
async fn reactivating_an_ended_lease_marks_it_expired() {
    let f = fixture().await;
    let lease = f
        .engine
        .leases
        .create(OWNER, draft(f.property, f.tenant, date(2023, 1, 1), date(2023, 12, 31)))
        .await
        .unwrap();
    f.engine.leases.terminate(OWNER, lease.id).await.unwrap();

    let reactivated = f
        .engine
        .leases
        .reactivate_on(OWNER, lease.id, date(2024, 3, 1))
        .await
        .unwrap();
    assert_eq!(reactivated.status, LeaseStatus::Expired);

    let err = f
        .engine
        .leases
        .reactivate_on(OWNER, lease.id, date(2024, 3, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::BusinessRule(_)));
}

#[tokio::test]
async fn update_rechecks_overlap_when_dates_move() {
    let f = fixture().await;
    f.engine
        .leases
        .create(OWNER, draft(f.property, f.tenant, date(2024, 1, 1), date(2024, 6, 30)))
        .await
        .unwrap();
    let later = f
        .engine
        .leases
        .create(OWNER, draft(f.property, f.tenant, date(2024, 7, 1), date(2024, 12, 31)))
        .await
        .unwrap();

    let moved = LeaseChanges {
        start_date: Some(date(2024, 6, 1)),
        ..Default::default()
    };
    let err = f.engine.leases.update(OWNER, later.id, moved).await.unwrap_err();
    assert!(is_rule(&err, OVERLAP_MESSAGE));

    let extended = LeaseChanges {
        end_date: Some(date(2025, 3, 31)),
        monthly_rent: Some(dec("1200.00")),
        ..Default::default()
    };
    let updated = f.engine.leases.update(OWNER, later.id, extended).await.unwrap();
    assert_eq!(updated.end_date, date(2025, 3, 31));
    assert_eq!(updated.monthly_rent, dec("1200.00"));
}

#[tokio::test]
async fn update_validates_index_against_country() {
    let f = fixture().await;
    let lease = f
        .engine
        .leases
        .create(OWNER, draft(f.property, f.tenant, date(2024, 1, 1), date(2024, 12, 31)))
        .await
        .unwrap();

    let to_spain = LeaseChanges {
        country_code: Some("ES".to_string()),
        ..Default::default()
    };
    assert!(f.engine.leases.update(OWNER, lease.id, to_spain).await.is_err());

    let to_spain_fixed = LeaseChanges {
        country_code: Some("ES".to_string()),
        adjustment_index: Some(AdjustmentIndex::None),
        ..Default::default()
    };
    let updated = f.engine.leases.update(OWNER, lease.id, to_spain_fixed).await.unwrap();
    assert_eq!(updated.country_code, "ES");
}

#[tokio::test]
async fn soft_delete_hides_and_restore_rechecks_overlap() {
    let f = fixture().await;
    let first = f
        .engine
        .leases
        .create(OWNER, draft(f.property, f.tenant, date(2024, 1, 1), date(2024, 12, 31)))
        .await
        .unwrap();

    let deleted = f.engine.leases.soft_delete(OWNER, first.id).await.unwrap();
    assert!(deleted.deleted);
    assert!(deleted.deleted_at.is_some());
    assert!(matches!(
        f.engine.leases.get(OWNER, first.id).await,
        Err(EngineError::NotFound { .. })
    ));
    assert!(f.engine.leases.list(OWNER).await.unwrap().is_empty());
    assert_eq!(f.engine.leases.list_deleted(OWNER).await.unwrap().len(), 1);

    let replacement = f
        .engine
        .leases
        .create(OWNER, draft(f.property, f.tenant, date(2024, 3, 1), date(2024, 9, 30)))
        .await
        .unwrap();

    let err = f.engine.leases.restore(OWNER, first.id).await.unwrap_err();
    assert!(is_rule(&err, OVERLAP_MESSAGE));

    f.engine.leases.terminate(OWNER, replacement.id).await.unwrap();
    let restored = f.engine.leases.restore(OWNER, first.id).await.unwrap();
    assert_eq!(restored.status, LeaseStatus::Active);
    assert!(!restored.deleted);
    assert!(restored.deleted_at.is_none());
    assert_eq!(f.engine.leases.list_deleted(OWNER).await.unwrap().len(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_overlapping_creates_have_one_winner() {
    let f = fixture().await;
    let engine = Arc::new(Engine::new(f.store.clone(), Vec::new(), "test-secret"));

    let mut handles = Vec::new();
    for offset in 0..8u32 {
        let engine = engine.clone();
        let d = draft(f.property, f.tenant, date(2024, 1, 1 + offset), date(2024, 12, 31));
        handles.push(tokio::spawn(async move { engine.leases.create(OWNER, d).await }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(err) => assert!(is_rule(&err, OVERLAP_MESSAGE), "unexpected error: {:?}", err),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(engine.leases.list(OWNER).await.unwrap().len(), 1);
}

#[tokio::test]
async fn hard_delete_is_refused_while_payments_exist() {
    let f = fixture().await;
    let lease = f
        .engine
        .leases
        .create(OWNER, draft(f.property, f.tenant, date(2024, 1, 1), date(2024, 12, 31)))
        .await
        .unwrap();
    let payment = f
        .engine
        .payments
        .create(
            OWNER,
            PaymentDraft {
                lease_id: lease.id,
                amount: dec("1000.00"),
                payment_date: date(2024, 1, 5),
                payment_type: None,
                status: None,
                description: None,
            },
        )
        .await
        .unwrap();

    let err = f.engine.leases.hard_delete(OWNER, lease.id).await.unwrap_err();
    assert!(is_rule(&err, HAS_PAYMENTS_MESSAGE));

    f.engine.payments.delete(OWNER, payment.id).await.unwrap();
    f.engine.leases.hard_delete(OWNER, lease.id).await.unwrap();
    assert!(f.engine.leases.get(OWNER, lease.id).await.is_err());
}

#[tokio::test]
async fn permanent_delete_only_applies_to_soft_deleted_leases() {
    let f = fixture().await;
    let lease = f
        .engine
        .leases
        .create(OWNER, draft(f.property, f.tenant, date(2024, 1, 1), date(2024, 12, 31)))
        .await
        .unwrap();

    assert!(matches!(
        f.engine.leases.permanently_delete(OWNER, lease.id).await,
        Err(EngineError::NotFound { .. })
    ));

    f.engine.leases.soft_delete(OWNER, lease.id).await.unwrap();
    f.engine.leases.permanently_delete(OWNER, lease.id).await.unwrap();
    assert!(f.engine.leases.list_deleted(OWNER).await.unwrap().is_empty());
}

#[tokio::test]
async fn queries_are_scoped_by_owner_property_tenant_and_date() {
    let f = fixture().await;
    let second_tenant = f.store.add_tenant(OWNER).await;
    let other_property = f.store.add_property_unit(OWNER).await;

    f.engine
        .leases
        .create(OWNER, draft(f.property, f.tenant, date(2024, 1, 1), date(2024, 6, 30)))
        .await
        .unwrap();
    f.engine
        .leases
        .create(OWNER, draft(other_property, second_tenant, date(2024, 5, 1), date(2024, 12, 31)))
        .await
        .unwrap();

    assert_eq!(f.engine.leases.list(OWNER).await.unwrap().len(), 2);
    assert!(f.engine.leases.list(2).await.unwrap().is_empty());
    assert_eq!(f.engine.leases.list_for_property(OWNER, other_property).await.unwrap().len(), 1);
    assert_eq!(f.engine.leases.list_for_tenant(OWNER, f.tenant).await.unwrap().len(), 1);
    assert!(f.engine.leases.list_for_property(2, f.property).await.is_err());

    assert_eq!(f.engine.leases.active_on(OWNER, date(2024, 5, 15)).await.unwrap().len(), 2);
    assert_eq!(f.engine.leases.active_on(OWNER, date(2024, 8, 1)).await.unwrap().len(), 1);

    assert!(f
        .engine
        .leases
        .has_overlap(f.property, date(2024, 6, 30), date(2024, 8, 1), None)
        .await
        .unwrap());
    assert!(!f
        .engine
        .leases
        .has_overlap(f.property, date(2024, 7, 1), date(2024, 8, 1), None)
        .await
        .unwrap());
}
