//! Link table between insurance policies and vehicles.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "insurance_coverages")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub insurance_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub vehicle_id: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::insurances::Entity",
        from = "Column::InsuranceId",
        to = "super::insurances::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Insurances,
    #[sea_orm(
        belongs_to = "super::vehicles::Entity",
        from = "Column::VehicleId",
        to = "super::vehicles::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Vehicles,
}

impl Related<super::insurances::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Insurances.def()
    }
}

impl Related<super::vehicles::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vehicles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
