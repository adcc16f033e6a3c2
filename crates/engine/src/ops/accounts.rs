use chrono::{DateTime, Utc};
use sea_orm::{
    ConnectionTrait, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    AccountId, EngineError, MemberAccount, MoneyCents, Movement, MovementKind, NewAccount,
    ResultEngine, accounts, movements,
    util::{ensure_positive, ensure_window, month_index, year_bounds},
};

use super::{Engine, normalize_optional_text, normalize_required_text, with_tx};

/// Stored balance compared with the replayed movement history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BalanceCheck {
    pub account_id: AccountId,
    pub stored: MoneyCents,
    pub replayed: MoneyCents,
    pub consistent: bool,
}

/// Totals of one account per movement kind.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct KindTotals {
    pub deposits: MoneyCents,
    pub withdrawals: MoneyCents,
    pub monthly_deductions: MoneyCents,
}

impl KindTotals {
    fn add(&mut self, movement: &Movement) {
        match movement.kind {
            MovementKind::Deposit => self.deposits += movement.amount,
            MovementKind::Withdrawal => self.withdrawals += movement.amount,
            MovementKind::MonthlyDeduction => self.monthly_deductions += movement.amount,
        }
    }

    pub fn net(&self) -> MoneyCents {
        self.deposits - self.withdrawals - self.monthly_deductions
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MonthlyMovementTotals {
    /// 1..=12
    pub month: u32,
    #[serde(flatten)]
    pub totals: KindTotals,
}

impl Engine {
    /// Open a member account. A positive opening deposit is recorded as the
    /// first movement.
    pub async fn open_account(&self, input: NewAccount) -> ResultEngine<AccountId> {
        let number = normalize_required_text(&input.number, "account number")?;
        let member_ref = normalize_required_text(&input.member_ref, "member reference")?;
        if let Some(amount) = input.opening_deposit {
            ensure_positive(amount, "opening deposit")?;
        }

        with_tx!(self, |db_tx| {
            let exists = accounts::Entity::find()
                .filter(accounts::Column::Number.eq(number.clone()))
                .one(&db_tx)
                .await?
                .is_some();
            if exists {
                return Err(EngineError::AlreadyExists(number));
            }

            let now = Utc::now();
            let account = MemberAccount {
                id: AccountId::new(),
                member_ref,
                number,
                balance: MoneyCents::ZERO,
                kind: input.kind,
                version: 0,
                created_at: now,
            };
            accounts::ActiveModel::from(&account).insert(&db_tx).await?;
            info!(account = %account.id, number = %account.number, "account opened");

            if let Some(amount) = input.opening_deposit {
                append_movement(
                    &db_tx,
                    account.id,
                    MovementKind::Deposit,
                    amount,
                    Some("opening deposit".to_string()),
                    now,
                )
                .await?;
            }
            Ok(account.id)
        })
    }

    pub async fn account(&self, account_id: AccountId) -> ResultEngine<MemberAccount> {
        load_account(&self.database, account_id).await
    }

    pub async fn account_by_number(&self, number: &str) -> ResultEngine<MemberAccount> {
        let number = number.trim();
        let model = accounts::Entity::find()
            .filter(accounts::Column::Number.eq(number))
            .one(&self.database)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("account {number}")))?;
        MemberAccount::try_from(model)
    }

    /// Credit `amount` to the account.
    pub async fn deposit(
        &self,
        account_id: AccountId,
        amount: MoneyCents,
        description: Option<&str>,
        occurred_at: DateTime<Utc>,
    ) -> ResultEngine<Movement> {
        self.record(account_id, MovementKind::Deposit, amount, description, occurred_at)
            .await
    }

    /// Debit `amount`. Fails with `InsufficientFunds` when the balance would
    /// go negative.
    pub async fn withdraw(
        &self,
        account_id: AccountId,
        amount: MoneyCents,
        description: Option<&str>,
        occurred_at: DateTime<Utc>,
    ) -> ResultEngine<Movement> {
        self.record(account_id, MovementKind::Withdrawal, amount, description, occurred_at)
            .await
    }

    /// Debit the monthly fee. Same guard as [`Engine::withdraw`].
    pub async fn apply_monthly_deduction(
        &self,
        account_id: AccountId,
        amount: MoneyCents,
        description: Option<&str>,
        occurred_at: DateTime<Utc>,
    ) -> ResultEngine<Movement> {
        self.record(
            account_id,
            MovementKind::MonthlyDeduction,
            amount,
            description,
            occurred_at,
        )
        .await
    }

    async fn record(
        &self,
        account_id: AccountId,
        kind: MovementKind,
        amount: MoneyCents,
        description: Option<&str>,
        occurred_at: DateTime<Utc>,
    ) -> ResultEngine<Movement> {
        ensure_positive(amount, "amount")?;
        let description = normalize_optional_text(description);
        with_tx!(self, |db_tx| {
            append_movement(&db_tx, account_id, kind, amount, description, occurred_at).await
        })
    }

    /// Movements of an account in insertion order.
    pub async fn movements(&self, account_id: AccountId) -> ResultEngine<Vec<Movement>> {
        load_account(&self.database, account_id).await?;
        account_movements(&self.database, account_id).await
    }

    /// Movements dated in `[start, end]`, for one account or for all of them.
    pub async fn movements_in_period(
        &self,
        account_id: Option<AccountId>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ResultEngine<Vec<Movement>> {
        ensure_window(start, end)?;
        let mut query = movements::Entity::find()
            .filter(movements::Column::OccurredAt.gte(start))
            .filter(movements::Column::OccurredAt.lte(end));
        if let Some(account_id) = account_id {
            load_account(&self.database, account_id).await?;
            query = query.filter(movements::Column::AccountId.eq(account_id.to_string()));
        }
        query
            .order_by_asc(movements::Column::OccurredAt)
            .order_by_asc(movements::Column::RecordedAt)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Movement::try_from)
            .collect()
    }

    pub async fn totals_by_kind(&self, account_id: AccountId) -> ResultEngine<KindTotals> {
        let mut totals = KindTotals::default();
        for movement in self.movements(account_id).await? {
            totals.add(&movement);
        }
        Ok(totals)
    }

    /// Fleet-wide movement totals for each month of `year`.
    pub async fn monthly_movement_totals(
        &self,
        year: i32,
    ) -> ResultEngine<Vec<MonthlyMovementTotals>> {
        let (start, end) = year_bounds(year)?;
        let mut months: Vec<MonthlyMovementTotals> = (1..=12)
            .map(|month| MonthlyMovementTotals {
                month,
                totals: KindTotals::default(),
            })
            .collect();

        let models = movements::Entity::find()
            .filter(movements::Column::OccurredAt.gte(start))
            .filter(movements::Column::OccurredAt.lt(end))
            .all(&self.database)
            .await?;
        for model in models {
            let movement = Movement::try_from(model)?;
            if let Some(idx) = month_index(movement.occurred_at, year) {
                months[idx].totals.add(&movement);
            }
        }
        Ok(months)
    }

    /// Rebuild the stored balance from the movement history.
    ///
    /// Fails with `InvalidData` if the history itself ever drives the balance
    /// below zero.
    pub async fn recompute_balance(&self, account_id: AccountId) -> ResultEngine<MemberAccount> {
        with_tx!(self, |db_tx| {
            let account = load_account(&db_tx, account_id).await?;
            let replayed = replay(&account_movements(&db_tx, account_id).await?)?;
            if replayed == account.balance {
                return Ok(account);
            }

            warn!(
                account = %account_id,
                stored = %account.balance,
                replayed = %replayed,
                "stored balance diverged from movements, rewriting"
            );
            write_balance(&db_tx, &account, replayed).await?;
            Ok(MemberAccount {
                balance: replayed,
                version: account.version + 1,
                ..account
            })
        })
    }

    pub async fn verify_balance(&self, account_id: AccountId) -> ResultEngine<BalanceCheck> {
        let account = load_account(&self.database, account_id).await?;
        let replayed: MoneyCents = account_movements(&self.database, account_id)
            .await?
            .iter()
            .map(Movement::signed_amount)
            .sum();
        Ok(BalanceCheck {
            account_id,
            stored: account.balance,
            replayed,
            consistent: replayed == account.balance,
        })
    }
}

async fn load_account<C: ConnectionTrait>(
    db: &C,
    account_id: AccountId,
) -> ResultEngine<MemberAccount> {
    let model = accounts::Entity::find_by_id(account_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("account {account_id}")))?;
    MemberAccount::try_from(model)
}

async fn account_movements<C: ConnectionTrait>(
    db: &C,
    account_id: AccountId,
) -> ResultEngine<Vec<Movement>> {
    movements::Entity::find()
        .filter(movements::Column::AccountId.eq(account_id.to_string()))
        .order_by_asc(movements::Column::RecordedAt)
        .order_by_asc(movements::Column::OccurredAt)
        .all(db)
        .await?
        .into_iter()
        .map(Movement::try_from)
        .collect()
}

/// Every movement of every account, by date.
pub(super) async fn load_movements<C: ConnectionTrait>(db: &C) -> ResultEngine<Vec<Movement>> {
    movements::Entity::find()
        .order_by_asc(movements::Column::OccurredAt)
        .all(db)
        .await?
        .into_iter()
        .map(Movement::try_from)
        .collect()
}

/// Running balance over `history`, which must never dip below zero.
fn replay(history: &[Movement]) -> ResultEngine<MoneyCents> {
    let mut balance = MoneyCents::ZERO;
    for movement in history {
        balance = balance
            .checked_add(movement.signed_amount())
            .ok_or_else(|| EngineError::InvalidData("balance overflow".to_string()))?;
        if balance.is_negative() {
            return Err(EngineError::InvalidData(format!(
                "movement {} drives the balance negative",
                movement.id
            )));
        }
    }
    Ok(balance)
}

/// Append a movement and move the balance with it, inside the caller's
/// transaction.
async fn append_movement(
    db_tx: &DatabaseTransaction,
    account_id: AccountId,
    kind: MovementKind,
    amount: MoneyCents,
    description: Option<String>,
    occurred_at: DateTime<Utc>,
) -> ResultEngine<Movement> {
    let account = load_account(db_tx, account_id).await?;
    let movement = Movement::new(account_id, kind, amount, occurred_at, description)?;

    let balance = account
        .balance
        .checked_add(movement.signed_amount())
        .ok_or_else(|| EngineError::Validation("amount too large".to_string()))?;
    if balance.is_negative() {
        return Err(EngineError::InsufficientFunds(format!(
            "account {} holds {}, {} requested",
            account.number, account.balance, amount
        )));
    }

    movements::ActiveModel::from(&movement).insert(db_tx).await?;
    write_balance(db_tx, &account, balance).await?;

    info!(
        account = %account_id,
        kind = kind.as_str(),
        amount = %amount,
        balance = %balance,
        "movement recorded"
    );
    Ok(movement)
}

async fn write_balance(
    db_tx: &DatabaseTransaction,
    account: &MemberAccount,
    balance: MoneyCents,
) -> ResultEngine<()> {
    let result = accounts::Entity::update_many()
        .col_expr(accounts::Column::BalanceMinor, Expr::value(balance.cents()))
        .col_expr(accounts::Column::Version, Expr::value(account.version + 1))
        .filter(accounts::Column::Id.eq(account.id.to_string()))
        .filter(accounts::Column::Version.eq(account.version))
        .exec(db_tx)
        .await?;
    if result.rows_affected == 0 {
        return Err(EngineError::ConcurrencyConflict(format!(
            "account {} changed while being updated",
            account.id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use migration::MigratorTrait;
    use sea_orm::Database;

    use super::*;
    use crate::AccountKind;

    fn movement(kind: MovementKind, cents: i64) -> Movement {
        Movement::new(AccountId::new(), kind, MoneyCents::new(cents), Utc::now(), None).unwrap()
    }

    #[test]
    fn replay_sums_signed_amounts() {
        let history = vec![
            movement(MovementKind::Deposit, 10_000),
            movement(MovementKind::Withdrawal, 2_500),
            movement(MovementKind::MonthlyDeduction, 1_500),
        ];
        assert_eq!(replay(&history).unwrap(), MoneyCents::new(6_000));
    }

    #[test]
    fn replay_rejects_negative_history() {
        let history = vec![
            movement(MovementKind::Withdrawal, 100),
            movement(MovementKind::Deposit, 1_000),
        ];
        assert!(matches!(replay(&history), Err(EngineError::InvalidData(_))));
    }

    #[test]
    fn kind_totals_net() {
        let mut totals = KindTotals::default();
        totals.add(&movement(MovementKind::Deposit, 5_000));
        totals.add(&movement(MovementKind::MonthlyDeduction, 1_200));
        assert_eq!(totals.net(), MoneyCents::new(3_800));
    }

    #[tokio::test]
    async fn stale_balance_write_conflicts() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        let engine = Engine::builder().database(db.clone()).build().await.unwrap();

        let account_id = engine
            .open_account(NewAccount {
                member_ref: "member-1".to_string(),
                number: "ACC-001".to_string(),
                kind: AccountKind::Member,
                opening_deposit: Some(MoneyCents::new(10_000)),
            })
            .await
            .unwrap();
        let stale = engine.account(account_id).await.unwrap();
        engine
            .deposit(account_id, MoneyCents::new(500), None, Utc::now())
            .await
            .unwrap();

        let db_tx = db.begin().await.unwrap();
        let err = write_balance(&db_tx, &stale, MoneyCents::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ConcurrencyConflict(_)));
        db_tx.rollback().await.unwrap();

        let account = engine.account(account_id).await.unwrap();
        assert_eq!(account.balance, MoneyCents::new(10_500));
        assert_eq!(account.version, stale.version + 1);
        assert!(engine.verify_balance(account_id).await.unwrap().consistent);
    }
}
