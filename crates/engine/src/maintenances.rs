//! Maintenance events on a vehicle.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, MaintenanceId, MoneyCents, VehicleId};

/// Maintenance status, forward only: `Open` → `Active` → `Closed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceStatus {
    Open,
    Active,
    Closed,
}

impl MaintenanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }
}

impl TryFrom<&str> for MaintenanceStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "open" => Ok(Self::Open),
            "active" => Ok(Self::Active),
            "closed" => Ok(Self::Closed),
            other => Err(EngineError::InvalidData(format!(
                "invalid maintenance status: {other}"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceCategory {
    Preventive,
    Corrective,
}

impl MaintenanceCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Preventive => "preventive",
            Self::Corrective => "corrective",
        }
    }
}

impl TryFrom<&str> for MaintenanceCategory {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "preventive" => Ok(Self::Preventive),
            "corrective" => Ok(Self::Corrective),
            other => Err(EngineError::InvalidData(format!(
                "invalid maintenance category: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Maintenance {
    pub id: MaintenanceId,
    pub vehicle_id: VehicleId,
    pub status: MaintenanceStatus,
    pub category: MaintenanceCategory,
    pub reason: String,
    /// Scheduled (then actual) workshop entry.
    pub entered_at: DateTime<Utc>,
    /// Set when the event is closed.
    pub exited_at: Option<DateTime<Utc>>,
    /// Estimated cost until closure, final cost afterwards.
    pub cost: MoneyCents,
}

impl Maintenance {
    /// Exit when known, entry otherwise. Used to attribute the cost to a period.
    pub fn reference_date(&self) -> DateTime<Utc> {
        self.exited_at.unwrap_or(self.entered_at)
    }
}

/// Input for scheduling a maintenance event.
#[derive(Clone, Debug)]
pub struct NewMaintenance {
    pub vehicle_id: VehicleId,
    pub category: MaintenanceCategory,
    pub reason: String,
    pub entered_at: DateTime<Utc>,
    pub estimated_cost: MoneyCents,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "maintenances")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub vehicle_id: String,
    pub status: String,
    pub category: String,
    pub reason: String,
    pub entered_at: DateTimeUtc,
    pub exited_at: Option<DateTimeUtc>,
    pub cost_minor: i64,
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
}

impl Related<super::vehicles::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vehicles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Maintenance> for ActiveModel {
    fn from(value: &Maintenance) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            vehicle_id: ActiveValue::Set(value.vehicle_id.to_string()),
            status: ActiveValue::Set(value.status.as_str().to_string()),
            category: ActiveValue::Set(value.category.as_str().to_string()),
            reason: ActiveValue::Set(value.reason.clone()),
            entered_at: ActiveValue::Set(value.entered_at),
            exited_at: ActiveValue::Set(value.exited_at),
            cost_minor: ActiveValue::Set(value.cost.cents()),
        }
    }
}

impl TryFrom<Model> for Maintenance {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: MaintenanceId::parse_stored(&model.id)?,
            vehicle_id: VehicleId::parse_stored(&model.vehicle_id)?,
            status: MaintenanceStatus::try_from(model.status.as_str())?,
            category: MaintenanceCategory::try_from(model.category.as_str())?,
            reason: model.reason,
            entered_at: model.entered_at,
            exited_at: model.exited_at,
            cost: MoneyCents::new(model.cost_minor),
        })
    }
}
