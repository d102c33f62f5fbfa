//! Ledger behaviour against a real (in-memory) SQLite database.
//!
//! Verifies:
//! - stock equals the net of recorded movements
//! - failed operations leave stock, movements and recharges untouched
//! - the recharge lifecycle (send, receive, double receive)
//! - concurrent withdrawals never overdraw

use chrono::{Duration, Utc};
use proptest::prelude::*;
use sqlx::SqlitePool;

use tonerledger_core::{LedgerError, ModelId, RechargeId, UserId, VendorId};
use tonerledger_infra::{
    connect_in_memory, AuditLog, CatalogRepository, MovementFilter, ReportQueries, TonerLedger,
    UserRepository,
};
use tonerledger_inventory::{MovementKind, NewMovement, NewVendor, RechargeStatus};

struct Fixture {
    pool: SqlitePool,
    ledger: TonerLedger,
    catalog: CatalogRepository,
    reports: ReportQueries,
    admin: UserId,
    model: ModelId,
    vendor: VendorId,
}

async fn setup() -> Fixture {
    let pool = connect_in_memory().await.unwrap();
    let users = UserRepository::new(pool.clone());
    let admin = users
        .bootstrap_admin("admin", "Administrator", "toner-admin-1")
        .await
        .unwrap();

    let catalog = CatalogRepository::new(pool.clone());
    let brand = catalog.create_brand(admin, "HP").await.unwrap();
    let model = catalog.create_model(admin, brand, "CF258A").await.unwrap();
    let vendor = catalog
        .create_vendor(
            admin,
            &NewVendor {
                name: "Recargas Sur".into(),
                contact: "Ana".into(),
                phone: "555-0101".into(),
            },
        )
        .await
        .unwrap();

    Fixture {
        ledger: TonerLedger::new(pool.clone()),
        reports: ReportQueries::new(pool.clone()),
        pool,
        catalog,
        admin,
        model,
        vendor,
    }
}

async fn movement_count(pool: &SqlitePool) -> i64 {
    let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM movimientos_toner")
        .fetch_one(pool)
        .await
        .unwrap();
    n
}

async fn recharge_count(pool: &SqlitePool) -> i64 {
    let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recargas_toner")
        .fetch_one(pool)
        .await
        .unwrap();
    n
}

#[tokio::test]
async fn unstocked_model_reads_zero() {
    let fx = setup().await;
    assert_eq!(fx.ledger.get_stock(fx.model).await.unwrap(), 0);
}

#[tokio::test]
async fn ingress_then_withdrawal_updates_stock() {
    let fx = setup().await;

    fx.ledger.load_stock(fx.admin, fx.model, 10, "purchase").await.unwrap();
    let id = fx
        .ledger
        .record_movement(
            fx.admin,
            NewMovement::new(fx.model, MovementKind::Withdrawal, 4).with_notes("  printer 3  "),
        )
        .await
        .unwrap();

    assert_eq!(fx.ledger.get_stock(fx.model).await.unwrap(), 6);

    let movement = fx.ledger.get_movement(id).await.unwrap();
    assert_eq!(movement.kind, MovementKind::Withdrawal);
    assert_eq!(movement.quantity, 4);
    assert_eq!(movement.user_id, fx.admin);
    assert_eq!(movement.notes, "printer 3");
}

#[tokio::test]
async fn overdraw_fails_and_changes_nothing() {
    let fx = setup().await;
    fx.ledger.load_stock(fx.admin, fx.model, 3, "").await.unwrap();
    let before = movement_count(&fx.pool).await;

    let err = fx
        .ledger
        .record_movement(fx.admin, NewMovement::new(fx.model, MovementKind::Withdrawal, 5))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        LedgerError::InsufficientStock {
            requested: 5,
            available: 3
        }
    );
    assert_eq!(fx.ledger.get_stock(fx.model).await.unwrap(), 3);
    assert_eq!(movement_count(&fx.pool).await, before);
}

#[tokio::test]
async fn withdrawing_everything_leaves_zero() {
    let fx = setup().await;
    fx.ledger.load_stock(fx.admin, fx.model, 5, "").await.unwrap();
    fx.ledger
        .record_movement(fx.admin, NewMovement::new(fx.model, MovementKind::Withdrawal, 5))
        .await
        .unwrap();
    assert_eq!(fx.ledger.get_stock(fx.model).await.unwrap(), 0);
}

#[tokio::test]
async fn non_positive_quantity_is_rejected() {
    let fx = setup().await;
    for quantity in [0, -4] {
        let err = fx
            .ledger
            .load_stock(fx.admin, fx.model, quantity, "")
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }
    assert_eq!(movement_count(&fx.pool).await, 0);
}

#[tokio::test]
async fn missing_references_are_not_found() {
    let fx = setup().await;

    let err = fx
        .ledger
        .load_stock(fx.admin, ModelId::new(9_999), 1, "")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));

    let err = fx
        .ledger
        .send_to_recharge(fx.admin, fx.model, 1, VendorId::new(9_999), "")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));

    let err = fx
        .ledger
        .receive_from_recharge(fx.admin, RechargeId::new(9_999), "")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));
}

#[tokio::test]
async fn inactive_actor_is_unauthorized() {
    let fx = setup().await;
    let users = UserRepository::new(fx.pool.clone());
    let clerk = users
        .create_user(fx.admin, "clerk", "Clerk", tonerledger_auth::Role::Operator, "clerk-pass-1")
        .await
        .unwrap();
    users.set_active(fx.admin, clerk, false).await.unwrap();

    let err = fx.ledger.load_stock(clerk, fx.model, 1, "").await.unwrap_err();
    assert!(matches!(err, LedgerError::Unauthorized(_)));
    assert_eq!(fx.ledger.get_stock(fx.model).await.unwrap(), 0);
}

#[tokio::test]
async fn recharge_round_trip_restores_stock() {
    let fx = setup().await;

    fx.ledger.load_stock(fx.admin, fx.model, 50, "").await.unwrap();
    let recharge = fx
        .ledger
        .send_to_recharge(fx.admin, fx.model, 20, fx.vendor, "empties")
        .await
        .unwrap();

    assert_eq!(fx.ledger.get_stock(fx.model).await.unwrap(), 30);
    let record = fx.ledger.get_recharge(recharge).await.unwrap();
    assert_eq!(record.status, RechargeStatus::Sent);
    assert_eq!(record.receive_movement_id, None);

    let received = fx
        .ledger
        .receive_from_recharge(fx.admin, recharge, "all back")
        .await
        .unwrap();

    assert_eq!(fx.ledger.get_stock(fx.model).await.unwrap(), 50);
    let record = fx.ledger.get_recharge(recharge).await.unwrap();
    assert_eq!(record.status, RechargeStatus::Received);
    assert_eq!(record.receive_movement_id, Some(received));
    assert_eq!(record.received_by, Some(fx.admin));
    assert_eq!(record.notes.as_deref(), Some("all back"));
    assert!(record.received_at.is_some());

    let movement = fx.ledger.get_movement(received).await.unwrap();
    assert_eq!(movement.kind, MovementKind::ReceiveFromRecharge);
    assert_eq!(movement.quantity, 20);
    assert_eq!(movement.vendor_id, Some(fx.vendor));
}

#[tokio::test]
async fn second_receive_is_invalid_state() {
    let fx = setup().await;
    fx.ledger.load_stock(fx.admin, fx.model, 10, "").await.unwrap();
    let recharge = fx
        .ledger
        .send_to_recharge(fx.admin, fx.model, 4, fx.vendor, "")
        .await
        .unwrap();
    fx.ledger.receive_from_recharge(fx.admin, recharge, "").await.unwrap();

    let err = fx
        .ledger
        .receive_from_recharge(fx.admin, recharge, "")
        .await
        .unwrap_err();
    assert_eq!(err, LedgerError::invalid_state("recharge already received"));
    assert_eq!(fx.ledger.get_stock(fx.model).await.unwrap(), 10);
}

#[tokio::test]
async fn send_without_stock_creates_no_record() {
    let fx = setup().await;
    fx.ledger.load_stock(fx.admin, fx.model, 2, "").await.unwrap();

    let err = fx
        .ledger
        .send_to_recharge(fx.admin, fx.model, 3, fx.vendor, "")
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::InsufficientStock { .. }));
    assert_eq!(recharge_count(&fx.pool).await, 0);
    assert_eq!(movement_count(&fx.pool).await, 1);
}

#[tokio::test]
async fn every_movement_records_its_author() {
    let fx = setup().await;
    let id = fx.ledger.load_stock(fx.admin, fx.model, 10, "").await.unwrap();

    assert_eq!(fx.ledger.get_movement(id).await.unwrap().user_id, fx.admin);
    assert_eq!(fx.ledger.get_stock(fx.model).await.unwrap(), 10);
}

#[tokio::test]
async fn direct_send_to_recharge_is_rejected() {
    let fx = setup().await;
    fx.ledger.load_stock(fx.admin, fx.model, 10, "").await.unwrap();

    let err = fx
        .ledger
        .record_movement(
            fx.admin,
            NewMovement::new(fx.model, MovementKind::SendToRecharge, 4).with_vendor(fx.vendor),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::Validation(_)));
    assert_eq!(fx.ledger.get_stock(fx.model).await.unwrap(), 10);
    assert_eq!(movement_count(&fx.pool).await, 1);
    assert_eq!(recharge_count(&fx.pool).await, 0);
}

#[tokio::test]
async fn direct_receive_from_recharge_is_rejected() {
    let fx = setup().await;
    fx.ledger.load_stock(fx.admin, fx.model, 10, "").await.unwrap();

    let err = fx
        .ledger
        .record_movement(
            fx.admin,
            NewMovement::new(fx.model, MovementKind::ReceiveFromRecharge, 100)
                .with_vendor(fx.vendor),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, LedgerError::Validation(_)));
    assert_eq!(fx.ledger.get_stock(fx.model).await.unwrap(), 10);
    assert_eq!(movement_count(&fx.pool).await, 1);
}

#[tokio::test]
async fn ingress_overflowing_stock_is_rejected() {
    let fx = setup().await;
    fx.ledger.load_stock(fx.admin, fx.model, i64::MAX, "").await.unwrap();

    let err = fx.ledger.load_stock(fx.admin, fx.model, 1, "").await.unwrap_err();

    assert_eq!(err, LedgerError::validation("quantity out of range"));
    assert_eq!(fx.ledger.get_stock(fx.model).await.unwrap(), i64::MAX);
    assert_eq!(movement_count(&fx.pool).await, 1);
}

#[tokio::test]
async fn vendor_only_on_recharge_movements() {
    let fx = setup().await;
    let err = fx
        .ledger
        .record_movement(
            fx.admin,
            NewMovement::new(fx.model, MovementKind::Ingress, 1).with_vendor(fx.vendor),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}

#[tokio::test]
async fn referenced_vendor_cannot_be_deleted() {
    let fx = setup().await;
    fx.ledger.load_stock(fx.admin, fx.model, 5, "").await.unwrap();
    let recharge = fx
        .ledger
        .send_to_recharge(fx.admin, fx.model, 5, fx.vendor, "")
        .await
        .unwrap();
    fx.ledger.receive_from_recharge(fx.admin, recharge, "").await.unwrap();

    let err = fx.catalog.delete_vendor(fx.admin, fx.vendor).await.unwrap_err();
    assert!(matches!(err, LedgerError::Validation(ref m) if m.contains("referenced")));
    assert!(fx.catalog.get_vendor(fx.vendor).await.is_ok());
}

#[tokio::test]
async fn every_movement_is_audited() {
    let fx = setup().await;
    let audit = AuditLog::new(fx.pool.clone());

    let id = fx.ledger.load_stock(fx.admin, fx.model, 5, "").await.unwrap();
    let entries = audit.for_record("movimientos_toner", id.get()).await.unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, "STOCK_INGRESS");
    assert_eq!(entries[0].user_id, Some(fx.admin));
}

#[tokio::test]
async fn concurrent_withdrawals_never_overdraw() {
    let fx = setup().await;
    fx.ledger.load_stock(fx.admin, fx.model, 10, "").await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let ledger = fx.ledger.clone();
        let (admin, model) = (fx.admin, fx.model);
        handles.push(tokio::spawn(async move {
            ledger
                .record_movement(admin, NewMovement::new(model, MovementKind::Withdrawal, 3))
                .await
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(LedgerError::InsufficientStock { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(accepted, 3);
    assert_eq!(fx.ledger.get_stock(fx.model).await.unwrap(), 1);
}

#[tokio::test]
async fn reports_reflect_the_ledger() {
    let fx = setup().await;
    fx.ledger.load_stock(fx.admin, fx.model, 12, "").await.unwrap();
    fx.ledger
        .record_movement(fx.admin, NewMovement::new(fx.model, MovementKind::Withdrawal, 2))
        .await
        .unwrap();
    let recharge = fx
        .ledger
        .send_to_recharge(fx.admin, fx.model, 4, fx.vendor, "")
        .await
        .unwrap();

    let stock = fx.reports.list_stock().await.unwrap();
    assert_eq!(stock.len(), 1);
    assert_eq!(stock[0].brand, "HP");
    assert_eq!(stock[0].quantity, 6);

    let window = MovementFilter::between(Utc::now() - Duration::hours(1), Utc::now() + Duration::hours(1));
    let all = fx.reports.list_movements(&window).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].kind, MovementKind::SendToRecharge);
    assert_eq!(all[0].vendor.as_deref(), Some("Recargas Sur"));
    assert_eq!(all[0].username, "admin");

    let withdrawals = fx
        .reports
        .list_movements(&window.clone().kind(MovementKind::Withdrawal))
        .await
        .unwrap();
    assert_eq!(withdrawals.len(), 1);

    let totals = fx
        .reports
        .movement_totals_by_model(window.from, window.to)
        .await
        .unwrap();
    assert_eq!((totals[0].total_in, totals[0].total_out), (12, 6));

    let open = fx.reports.list_recharges(Some(RechargeStatus::Sent)).await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id, recharge);
    assert_eq!(open[0].quantity, 4);
    assert!(fx
        .reports
        .list_recharges(Some(RechargeStatus::Received))
        .await
        .unwrap()
        .is_empty());

    let by_vendor = fx.reports.recharge_totals_by_vendor(None).await.unwrap();
    assert_eq!(by_vendor.len(), 1);
    assert_eq!((by_vendor[0].records, by_vendor[0].quantity), (1, 4));

    assert_eq!(fx.reports.low_stock(6).await.unwrap().len(), 1);
    assert!(fx.reports.low_stock(5).await.unwrap().is_empty());

    let check = fx.reports.verify_stock_consistency(fx.model).await.unwrap();
    assert!(check.is_consistent());
    assert_eq!(check.computed, 6);
}

#[tokio::test]
async fn consistency_check_reports_drift_without_fixing_it() {
    let fx = setup().await;
    fx.ledger.load_stock(fx.admin, fx.model, 5, "").await.unwrap();
    sqlx::query("UPDATE stock_toner SET cantidad = 2 WHERE id_modelo = ?1")
        .bind(fx.model.get())
        .execute(&fx.pool)
        .await
        .unwrap();

    let check = fx.reports.verify_stock_consistency(fx.model).await.unwrap();
    assert_eq!((check.stored, check.computed, check.drift()), (2, 5, -3));
    assert_eq!(fx.ledger.get_stock(fx.model).await.unwrap(), 2);
}

#[derive(Debug, Clone)]
enum Op {
    Ingress(i64),
    Withdraw(i64),
    Send(i64),
    ReceiveOldest,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1i64..20).prop_map(Op::Ingress),
        (1i64..20).prop_map(Op::Withdraw),
        (1i64..20).prop_map(Op::Send),
        Just(Op::ReceiveOldest),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn stock_always_equals_net_of_movements(ops in prop::collection::vec(op(), 1..30)) {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let fx = setup().await;
            let mut open = std::collections::VecDeque::new();

            for op in ops {
                let result = match op {
                    Op::Ingress(q) => fx.ledger.load_stock(fx.admin, fx.model, q, "").await.map(|_| ()),
                    Op::Withdraw(q) => fx
                        .ledger
                        .record_movement(fx.admin, NewMovement::new(fx.model, MovementKind::Withdrawal, q))
                        .await
                        .map(|_| ()),
                    Op::Send(q) => fx
                        .ledger
                        .send_to_recharge(fx.admin, fx.model, q, fx.vendor, "")
                        .await
                        .map(|id| open.push_back(id)),
                    Op::ReceiveOldest => match open.pop_front() {
                        Some(id) => fx.ledger.receive_from_recharge(fx.admin, id, "").await.map(|_| ()),
                        None => Ok(()),
                    },
                };
                match result {
                    Ok(()) | Err(LedgerError::InsufficientStock { .. }) => {}
                    Err(other) => panic!("unexpected error: {other}"),
                }

                let stock = fx.ledger.get_stock(fx.model).await.unwrap();
                assert!(stock >= 0);
                let check = fx.reports.verify_stock_consistency(fx.model).await.unwrap();
                assert!(check.is_consistent(), "drift after step: {check:?}");
            }
        });
    }
}
