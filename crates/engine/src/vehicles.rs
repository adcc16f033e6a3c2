//! The module contains the `Vehicle` struct and its operational state.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};

use crate::{EngineError, MoneyCents, VehicleId};

/// Operational state of a vehicle. A vehicle is in exactly one state.
///
/// `InMission` and `InMaintenance` are owned by the mission and maintenance
/// lifecycles; every other state is set administratively.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleState {
    Available,
    InMission,
    InMaintenance,
    OutOfService,
    Assigned,
    Broken,
}

impl VehicleState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::InMission => "in_mission",
            Self::InMaintenance => "in_maintenance",
            Self::OutOfService => "out_of_service",
            Self::Assigned => "assigned",
            Self::Broken => "broken",
        }
    }

    /// Whether the state is driven by a mission or maintenance lifecycle.
    pub fn is_lifecycle_owned(self) -> bool {
        matches!(self, Self::InMission | Self::InMaintenance)
    }
}

impl TryFrom<&str> for VehicleState {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "available" => Ok(Self::Available),
            "in_mission" => Ok(Self::InMission),
            "in_maintenance" => Ok(Self::InMaintenance),
            "out_of_service" => Ok(Self::OutOfService),
            "assigned" => Ok(Self::Assigned),
            "broken" => Ok(Self::Broken),
            other => Err(EngineError::InvalidData(format!(
                "invalid vehicle state: {other}"
            ))),
        }
    }
}

/// A fleet vehicle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Vehicle {
    pub id: VehicleId,
    /// Registration plate, unique across the fleet.
    pub registration: String,
    pub state: VehicleState,
    pub state_changed_at: DateTime<Utc>,
    pub acquired_at: DateTime<Utc>,
    pub acquisition_price: MoneyCents,
    /// Odometer in kilometres.
    pub distance_km: i64,
    /// Optimistic concurrency counter, bumped by every state or distance write.
    pub version: i64,
}

/// Input for registering a vehicle.
#[derive(Clone, Debug)]
pub struct NewVehicle {
    pub registration: String,
    pub acquired_at: DateTime<Utc>,
    pub acquisition_price: MoneyCents,
    pub distance_km: i64,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "vehicles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub registration: String,
    pub state: String,
    pub state_changed_at: DateTimeUtc,
    pub acquired_at: DateTimeUtc,
    pub acquisition_price_minor: i64,
    pub distance_km: i64,
    pub version: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::missions::Entity")]
    Missions,
    #[sea_orm(has_many = "super::maintenances::Entity")]
    Maintenances,
    #[sea_orm(has_many = "super::insurance_coverages::Entity")]
    Coverages,
}

impl Related<super::missions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Missions.def()
    }
}

impl Related<super::maintenances::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Maintenances.def()
    }
}

impl Related<super::insurance_coverages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Coverages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Vehicle> for ActiveModel {
    fn from(value: &Vehicle) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            registration: ActiveValue::Set(value.registration.clone()),
            state: ActiveValue::Set(value.state.as_str().to_string()),
            state_changed_at: ActiveValue::Set(value.state_changed_at),
            acquired_at: ActiveValue::Set(value.acquired_at),
            acquisition_price_minor: ActiveValue::Set(value.acquisition_price.cents()),
            distance_km: ActiveValue::Set(value.distance_km),
            version: ActiveValue::Set(value.version),
        }
    }
}

impl TryFrom<Model> for Vehicle {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: VehicleId::parse_stored(&model.id)?,
            registration: model.registration,
            state: VehicleState::try_from(model.state.as_str())?,
            state_changed_at: model.state_changed_at,
            acquired_at: model.acquired_at,
            acquisition_price: MoneyCents::new(model.acquisition_price_minor),
            distance_km: model.distance_km,
            version: model.version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_state_is_invalid_data() {
        assert!(matches!(
            VehicleState::try_from("parked"),
            Err(EngineError::InvalidData(_))
        ));
        assert_eq!(
            VehicleState::try_from(VehicleState::OutOfService.as_str()).unwrap(),
            VehicleState::OutOfService
        );
    }

    #[test]
    fn lifecycle_states() {
        assert!(VehicleState::InMission.is_lifecycle_owned());
        assert!(VehicleState::InMaintenance.is_lifecycle_owned());
        assert!(!VehicleState::Broken.is_lifecycle_owned());
    }
}
