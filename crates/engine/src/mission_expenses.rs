//! Expenses incurred during a mission.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, ExpenseId, MissionId, MoneyCents};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseNature {
    Fuel,
    /// Tolls, parking and other incidental charges.
    Ancillary,
}

impl ExpenseNature {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fuel => "fuel",
            Self::Ancillary => "ancillary",
        }
    }
}

impl TryFrom<&str> for ExpenseNature {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "fuel" => Ok(Self::Fuel),
            "ancillary" => Ok(Self::Ancillary),
            other => Err(EngineError::InvalidData(format!(
                "invalid expense nature: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MissionExpense {
    pub id: ExpenseId,
    pub mission_id: MissionId,
    pub nature: ExpenseNature,
    pub amount: MoneyCents,
    /// Reference to a receipt kept outside the system.
    pub justification: Option<String>,
    pub incurred_at: DateTime<Utc>,
}

/// Input for recording an expense on a mission.
#[derive(Clone, Debug)]
pub struct NewExpense {
    pub nature: ExpenseNature,
    pub amount: MoneyCents,
    pub justification: Option<String>,
    pub incurred_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "mission_expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub mission_id: String,
    pub nature: String,
    pub amount_minor: i64,
    pub justification: Option<String>,
    pub incurred_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::missions::Entity",
        from = "Column::MissionId",
        to = "super::missions::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Missions,
}

impl Related<super::missions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Missions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&MissionExpense> for ActiveModel {
    fn from(value: &MissionExpense) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            mission_id: ActiveValue::Set(value.mission_id.to_string()),
            nature: ActiveValue::Set(value.nature.as_str().to_string()),
            amount_minor: ActiveValue::Set(value.amount.cents()),
            justification: ActiveValue::Set(value.justification.clone()),
            incurred_at: ActiveValue::Set(value.incurred_at),
        }
    }
}

impl TryFrom<Model> for MissionExpense {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ExpenseId::parse_stored(&model.id)?,
            mission_id: MissionId::parse_stored(&model.mission_id)?,
            nature: ExpenseNature::try_from(model.nature.as_str())?,
            amount: MoneyCents::new(model.amount_minor),
            justification: model.justification,
            incurred_at: model.incurred_at,
        })
    }
}
