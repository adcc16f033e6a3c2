//! Missions: scheduled usage of one vehicle.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, MissionExpense, MissionId, MoneyCents, VehicleId};

/// Mission status. Transitions only move forward:
/// `Planned` → `Active` → `Closed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionStatus {
    Planned,
    Active,
    Closed,
}

impl MissionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }
}

impl TryFrom<&str> for MissionStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "planned" => Ok(Self::Planned),
            "active" => Ok(Self::Active),
            "closed" => Ok(Self::Closed),
            other => Err(EngineError::InvalidData(format!(
                "invalid mission status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Mission {
    pub id: MissionId,
    pub vehicle_id: VehicleId,
    pub label: String,
    pub status: MissionStatus,
    pub starts_at: DateTime<Utc>,
    /// `None` means the mission is open-ended.
    pub planned_end_at: Option<DateTime<Utc>>,
    /// Set when the mission is closed.
    pub ended_at: Option<DateTime<Utc>>,
    pub planned_distance_km: i64,
    pub actual_distance_km: Option<i64>,
    /// Sum of the mission expenses.
    pub cost: MoneyCents,
    pub observations: Option<String>,
    /// Ordered by `incurred_at`. Empty unless explicitly loaded.
    pub expenses: Vec<MissionExpense>,
}

impl Mission {
    /// Effective end when closed, planned end otherwise.
    pub fn end_or_planned(&self) -> Option<DateTime<Utc>> {
        self.ended_at.or(self.planned_end_at)
    }
}

/// Input for planning a mission.
#[derive(Clone, Debug)]
pub struct NewMission {
    pub vehicle_id: VehicleId,
    pub label: String,
    pub starts_at: DateTime<Utc>,
    pub planned_end_at: Option<DateTime<Utc>>,
    pub planned_distance_km: i64,
    pub observations: Option<String>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "missions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub vehicle_id: String,
    pub label: String,
    pub status: String,
    pub starts_at: DateTimeUtc,
    pub planned_end_at: Option<DateTimeUtc>,
    pub ended_at: Option<DateTimeUtc>,
    pub planned_distance_km: i64,
    pub actual_distance_km: Option<i64>,
    pub cost_minor: i64,
    pub observations: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::vehicles::Entity",
        from = "Column::VehicleId",
        to = "super::vehicles::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Vehicles,
    #[sea_orm(has_many = "super::mission_expenses::Entity")]
    Expenses,
}

impl Related<super::vehicles::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vehicles.def()
    }
}

impl Related<super::mission_expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Mission> for ActiveModel {
    fn from(value: &Mission) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            vehicle_id: ActiveValue::Set(value.vehicle_id.to_string()),
            label: ActiveValue::Set(value.label.clone()),
            status: ActiveValue::Set(value.status.as_str().to_string()),
            starts_at: ActiveValue::Set(value.starts_at),
            planned_end_at: ActiveValue::Set(value.planned_end_at),
            ended_at: ActiveValue::Set(value.ended_at),
            planned_distance_km: ActiveValue::Set(value.planned_distance_km),
            actual_distance_km: ActiveValue::Set(value.actual_distance_km),
            cost_minor: ActiveValue::Set(value.cost.cents()),
            observations: ActiveValue::Set(value.observations.clone()),
        }
    }
}

impl TryFrom<Model> for Mission {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: MissionId::parse_stored(&model.id)?,
            vehicle_id: VehicleId::parse_stored(&model.vehicle_id)?,
            label: model.label,
            status: MissionStatus::try_from(model.status.as_str())?,
            starts_at: model.starts_at,
            planned_end_at: model.planned_end_at,
            ended_at: model.ended_at,
            planned_distance_km: model.planned_distance_km,
            actual_distance_km: model.actual_distance_km,
            cost: MoneyCents::new(model.cost_minor),
            observations: model.observations,
            expenses: Vec::new(),
        })
    }
}
