//! Insurance policies and the vehicles they cover.

use chrono::{DateTime, Utc};
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::Serialize;

use crate::{EngineError, InsuranceId, MoneyCents, VehicleId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Insurance {
    pub id: InsuranceId,
    pub policy_number: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub annual_cost: MoneyCents,
    /// Covered vehicles. The annual cost is shared evenly between them.
    pub vehicle_ids: Vec<VehicleId>,
}

impl Insurance {
    /// End when known, start otherwise. Used to attribute the cost to a year.
    pub fn reference_date(&self) -> DateTime<Utc> {
        self.ends_at.unwrap_or(self.starts_at)
    }

    /// Share of the annual cost carried by one covered vehicle.
    pub fn share_per_vehicle(&self) -> MoneyCents {
        self.annual_cost.per_unit(self.vehicle_ids.len() as i64)
    }
}

#[derive(Clone, Debug)]
pub struct NewInsurance {
    pub policy_number: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub annual_cost: MoneyCents,
    pub vehicle_ids: Vec<VehicleId>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "insurances")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    #[sea_orm(unique)]
    pub policy_number: String,
    pub starts_at: DateTimeUtc,
    pub ends_at: Option<DateTimeUtc>,
    pub annual_cost_minor: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::insurance_coverages::Entity")]
    Coverages,
}

impl Related<super::insurance_coverages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Coverages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Insurance> for ActiveModel {
    fn from(value: &Insurance) -> Self {
        Self {
            id: ActiveValue::Set(value.id.to_string()),
            policy_number: ActiveValue::Set(value.policy_number.clone()),
            starts_at: ActiveValue::Set(value.starts_at),
            ends_at: ActiveValue::Set(value.ends_at),
            annual_cost_minor: ActiveValue::Set(value.annual_cost.cents()),
        }
    }
}

impl TryFrom<(Model, Vec<VehicleId>)> for Insurance {
    type Error = EngineError;

    fn try_from((model, vehicle_ids): (Model, Vec<VehicleId>)) -> Result<Self, Self::Error> {
        Ok(Self {
            id: InsuranceId::parse_stored(&model.id)?,
            policy_number: model.policy_number,
            starts_at: model.starts_at,
            ends_at: model.ends_at,
            annual_cost: MoneyCents::new(model.annual_cost_minor),
            vehicle_ids,
        })
    }
}
