//! Member accounts of the cooperative ledger.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{AccountId, EngineError, MoneyCents};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    Member,
    Company,
}

impl AccountKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Company => "company",
        }
    }
}

impl TryFrom<&str> for AccountKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "member" => Ok(Self::Member),
            "company" => Ok(Self::Company),
            other => Err(EngineError::InvalidData(format!(
                "invalid account kind: {other}"
            ))),
        }
    }
}

/// A member account.
///
/// `balance` is denormalized: it always equals the signed sum of the account
/// movements and is only written together with a new movement.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MemberAccount {
    pub id: AccountId,
    /// Opaque reference to the member owning the account.
    pub member_ref: String,
    pub number: String,
    pub balance: MoneyCents,
    pub kind: AccountKind,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewAccount {
    pub member_ref: String,
    pub number: String,
    pub kind: AccountKind,
    /// Recorded as a deposit movement when positive.
    pub opening_deposit: Option<MoneyCents>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "member_accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub member_ref: String,
    #[sea_orm(unique)]
    pub number: String,
    pub balance_minor: i64,
    pub kind: String,
    pub version: i64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::movements::Entity")]
    Movements,
}

impl Related<super::movements::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Movements.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&MemberAccount> for ActiveModel {
    fn from(value: &MemberAccount) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            member_ref: ActiveValue::Set(value.member_ref.clone()),
            number: ActiveValue::Set(value.number.clone()),
            balance_minor: ActiveValue::Set(value.balance.cents()),
            kind: ActiveValue::Set(value.kind.as_str().to_string()),
            version: ActiveValue::Set(value.version),
            created_at: ActiveValue::Set(value.created_at),
        }
    }
}

impl TryFrom<Model> for MemberAccount {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: AccountId::parse_stored(&model.id)?,
            member_ref: model.member_ref,
            number: model.number,
            balance: MoneyCents::new(model.balance_minor),
            kind: AccountKind::try_from(model.kind.as_str())?,
            version: model.version,
            created_at: model.created_at,
        })
    }
}
