use chrono::{DateTime, TimeZone, Utc};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{AccountId, AccountKind, Engine, EngineError, MoneyCents, MovementKind, NewAccount};
use migration::MigratorTrait;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 9, 30, 0).unwrap()
}

async fn account(engine: &Engine, number: &str, opening: Option<i64>) -> AccountId {
    engine
        .open_account(NewAccount {
            member_ref: "member-7".to_string(),
            number: number.to_string(),
            kind: AccountKind::Member,
            opening_deposit: opening.map(MoneyCents::new),
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn deposit_withdraw_deduct_keep_balance_in_sync() {
    let (engine, _db) = engine_with_db().await;
    let id = account(&engine, "ACC-001", None).await;

    engine
        .deposit(id, MoneyCents::new(100_000), Some("contribution"), at(2025, 1, 5))
        .await
        .unwrap();
    engine
        .withdraw(id, MoneyCents::new(30_000), None, at(2025, 1, 20))
        .await
        .unwrap();
    engine
        .apply_monthly_deduction(id, MoneyCents::new(2_500), Some("fleet fee"), at(2025, 2, 1))
        .await
        .unwrap();

    let account = engine.account(id).await.unwrap();
    assert_eq!(account.balance, MoneyCents::new(67_500));
    assert_eq!(account.version, 3);

    let movements = engine.movements(id).await.unwrap();
    let kinds: Vec<MovementKind> = movements.iter().map(|m| m.kind).collect();
    assert_eq!(
        kinds,
        vec![
            MovementKind::Deposit,
            MovementKind::Withdrawal,
            MovementKind::MonthlyDeduction
        ]
    );
    assert!(movements.iter().all(|m| m.amount.is_positive()));

    let check = engine.verify_balance(id).await.unwrap();
    assert!(check.consistent);
    assert_eq!(check.replayed, MoneyCents::new(67_500));
}

#[tokio::test]
async fn overdraft_is_refused_and_leaves_no_trace() {
    let (engine, _db) = engine_with_db().await;
    let id = account(&engine, "ACC-001", Some(10_000)).await;

    let err = engine
        .withdraw(id, MoneyCents::new(10_001), None, at(2025, 3, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds(_)));
    let err = engine
        .apply_monthly_deduction(id, MoneyCents::new(20_000), None, at(2025, 3, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InsufficientFunds(_)));

    assert_eq!(engine.account(id).await.unwrap().balance, MoneyCents::new(10_000));
    assert_eq!(engine.movements(id).await.unwrap().len(), 1);

    engine
        .withdraw(id, MoneyCents::new(10_000), None, at(2025, 3, 1))
        .await
        .unwrap();
    assert_eq!(engine.account(id).await.unwrap().balance, MoneyCents::ZERO);
}

#[tokio::test]
async fn non_positive_amounts_are_rejected() {
    let (engine, _db) = engine_with_db().await;
    let id = account(&engine, "ACC-001", None).await;

    for cents in [0, -100] {
        let err = engine
            .deposit(id, MoneyCents::new(cents), None, at(2025, 3, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }
    assert!(engine.movements(id).await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_account_is_not_found() {
    let (engine, _db) = engine_with_db().await;
    let err = engine
        .deposit(AccountId::new(), MoneyCents::new(100), None, at(2025, 3, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn account_numbers_are_unique() {
    let (engine, _db) = engine_with_db().await;
    let id = account(&engine, "ACC-001", Some(5_000)).await;

    let err = engine
        .open_account(NewAccount {
            member_ref: "member-8".to_string(),
            number: "ACC-001".to_string(),
            kind: AccountKind::Company,
            opening_deposit: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::AlreadyExists("ACC-001".to_string()));

    let found = engine.account_by_number("ACC-001").await.unwrap();
    assert_eq!(found.id, id);
    assert_eq!(found.balance, MoneyCents::new(5_000));
}

#[tokio::test]
async fn concurrent_withdrawals_never_overdraw() {
    let (engine, _db) = engine_with_db().await;
    let id = account(&engine, "ACC-001", Some(10_000)).await;

    let (a, b) = tokio::join!(
        engine.withdraw(id, MoneyCents::new(7_000), None, at(2025, 4, 1)),
        engine.withdraw(id, MoneyCents::new(7_000), None, at(2025, 4, 1))
    );
    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);

    let account = engine.account(id).await.unwrap();
    assert_eq!(account.balance, MoneyCents::new(3_000));
    assert!(engine.verify_balance(id).await.unwrap().consistent);
}

#[tokio::test]
async fn recompute_restores_tampered_balance() {
    let (engine, db) = engine_with_db().await;
    let id = account(&engine, "ACC-001", Some(40_000)).await;
    engine
        .withdraw(id, MoneyCents::new(15_000), None, at(2025, 4, 1))
        .await
        .unwrap();

    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "UPDATE member_accounts SET balance_minor = ? WHERE id = ?",
        vec![999_999_i64.into(), id.to_string().into()],
    ))
    .await
    .unwrap();
    let check = engine.verify_balance(id).await.unwrap();
    assert!(!check.consistent);
    assert_eq!(check.stored, MoneyCents::new(999_999));

    let repaired = engine.recompute_balance(id).await.unwrap();
    assert_eq!(repaired.balance, MoneyCents::new(25_000));
    assert!(engine.verify_balance(id).await.unwrap().consistent);
}

#[tokio::test]
async fn period_queries_and_totals() {
    let (engine, _db) = engine_with_db().await;
    let first = account(&engine, "ACC-001", None).await;
    let second = account(&engine, "ACC-002", None).await;

    engine
        .deposit(first, MoneyCents::new(50_000), None, at(2025, 1, 10))
        .await
        .unwrap();
    engine
        .deposit(second, MoneyCents::new(20_000), None, at(2025, 2, 10))
        .await
        .unwrap();
    engine
        .apply_monthly_deduction(first, MoneyCents::new(1_000), None, at(2025, 2, 1))
        .await
        .unwrap();
    engine
        .withdraw(first, MoneyCents::new(4_000), None, at(2025, 2, 15))
        .await
        .unwrap();

    let february = engine
        .movements_in_period(None, at(2025, 2, 1), at(2025, 2, 28))
        .await
        .unwrap();
    assert_eq!(february.len(), 3);
    let first_february = engine
        .movements_in_period(Some(first), at(2025, 2, 1), at(2025, 2, 28))
        .await
        .unwrap();
    assert_eq!(first_february.len(), 2);

    let totals = engine.totals_by_kind(first).await.unwrap();
    assert_eq!(totals.deposits, MoneyCents::new(50_000));
    assert_eq!(totals.withdrawals, MoneyCents::new(4_000));
    assert_eq!(totals.monthly_deductions, MoneyCents::new(1_000));
    assert_eq!(totals.net(), engine.account(first).await.unwrap().balance);

    let months = engine.monthly_movement_totals(2025).await.unwrap();
    assert_eq!(months.len(), 12);
    assert_eq!(months[0].totals.deposits, MoneyCents::new(50_000));
    assert_eq!(months[1].totals.deposits, MoneyCents::new(20_000));
    assert_eq!(months[1].totals.withdrawals, MoneyCents::new(4_000));
    assert_eq!(months[2].totals, engine::KindTotals::default());
}
