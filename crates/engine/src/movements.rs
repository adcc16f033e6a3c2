//! Ledger movements.
//!
//! A `Movement` is an append-only entry against a member account. The amount
//! is always positive; the sign comes from the [`MovementKind`].

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};

use crate::{AccountId, EngineError, MoneyCents, MovementId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Deposit,
    Withdrawal,
    MonthlyDeduction,
}

impl MovementKind {
    pub const ALL: [MovementKind; 3] = [
        MovementKind::Deposit,
        MovementKind::Withdrawal,
        MovementKind::MonthlyDeduction,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Withdrawal => "withdrawal",
            Self::MonthlyDeduction => "monthly_deduction",
        }
    }

    /// Balance effect of a movement of this kind.
    pub fn signed(self, amount: MoneyCents) -> MoneyCents {
        match self {
            Self::Deposit => amount,
            Self::Withdrawal | Self::MonthlyDeduction => -amount,
        }
    }
}

impl TryFrom<&str> for MovementKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "deposit" => Ok(Self::Deposit),
            "withdrawal" => Ok(Self::Withdrawal),
            "monthly_deduction" => Ok(Self::MonthlyDeduction),
            other => Err(EngineError::InvalidData(format!(
                "invalid movement kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Movement {
    pub id: MovementId,
    pub account_id: AccountId,
    pub kind: MovementKind,
    pub amount: MoneyCents,
    pub occurred_at: DateTime<Utc>,
    /// When the movement was appended. Replays follow this order.
    pub recorded_at: DateTime<Utc>,
    pub description: Option<String>,
}

impl Movement {
    pub fn new(
        account_id: AccountId,
        kind: MovementKind,
        amount: MoneyCents,
        occurred_at: DateTime<Utc>,
        description: Option<String>,
    ) -> Result<Self, EngineError> {
        if !amount.is_positive() {
            return Err(EngineError::Validation(
                "movement amount must be > 0".to_string(),
            ));
        }
        Ok(Self {
            id: MovementId::new(),
            account_id,
            kind,
            amount,
            occurred_at,
            recorded_at: Utc::now(),
            description,
        })
    }

    pub fn signed_amount(&self) -> MoneyCents {
        self.kind.signed(self.amount)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub account_id: String,
    pub kind: String,
    pub amount_minor: i64,
    pub occurred_at: DateTimeUtc,
    pub recorded_at: DateTimeUtc,
    pub description: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountId",
        to = "super::accounts::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Accounts,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Movement> for ActiveModel {
    fn from(value: &Movement) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            account_id: ActiveValue::Set(value.account_id.to_string()),
            kind: ActiveValue::Set(value.kind.as_str().to_string()),
            amount_minor: ActiveValue::Set(value.amount.cents()),
            occurred_at: ActiveValue::Set(value.occurred_at),
            recorded_at: ActiveValue::Set(value.recorded_at),
            description: ActiveValue::Set(value.description.clone()),
        }
    }
}

impl TryFrom<Model> for Movement {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: MovementId::parse_stored(&model.id)?,
            account_id: AccountId::parse_stored(&model.account_id)?,
            kind: MovementKind::try_from(model.kind.as_str())?,
            amount: MoneyCents::new(model.amount_minor),
            occurred_at: model.occurred_at,
            recorded_at: model.recorded_at,
            description: model.description,
        })
    }
}
