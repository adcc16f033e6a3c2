use chrono::{DateTime, Utc};
use sea_orm::{
    ConnectionTrait, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use tracing::{info, warn};

use crate::{
    EngineError, Maintenance, MaintenanceId, MaintenanceStatus, MoneyCents, NewMaintenance,
    ResultEngine, VehicleId, VehicleState, maintenances,
    util::{ensure_not_negative, ensure_window},
};

use super::{
    Engine, ensure_distance,
    missions::active_missions,
    normalize_required_text,
    vehicles::{load_vehicle, set_vehicle_distance, transition_vehicle},
    with_tx,
};

impl Engine {
    /// Schedule a maintenance event. Its cost starts as the estimate.
    pub async fn new_maintenance(&self, input: NewMaintenance) -> ResultEngine<MaintenanceId> {
        let reason = normalize_required_text(&input.reason, "maintenance reason")?;
        ensure_not_negative(input.estimated_cost, "estimated cost")?;

        with_tx!(self, |db_tx| {
            load_vehicle(&db_tx, input.vehicle_id).await?;

            let maintenance = Maintenance {
                id: MaintenanceId::new(),
                vehicle_id: input.vehicle_id,
                status: MaintenanceStatus::Open,
                category: input.category,
                reason,
                entered_at: input.entered_at,
                exited_at: None,
                cost: input.estimated_cost,
            };
            maintenances::ActiveModel::from(&maintenance)
                .insert(&db_tx)
                .await?;
            info!(
                maintenance = %maintenance.id,
                vehicle = %maintenance.vehicle_id,
                category = maintenance.category.as_str(),
                "maintenance scheduled"
            );
            Ok(maintenance.id)
        })
    }

    /// Bring the vehicle into the workshop: the event becomes `Active`, the
    /// entry is stamped now and the vehicle goes `InMaintenance`.
    pub async fn start_maintenance(&self, maintenance_id: MaintenanceId) -> ResultEngine<Maintenance> {
        with_tx!(self, |db_tx| {
            let maintenance = load_maintenance(&db_tx, maintenance_id).await?;
            if maintenance.status != MaintenanceStatus::Open {
                return Err(EngineError::InvalidStateTransition(format!(
                    "maintenance {maintenance_id} is {}, only open events can start",
                    maintenance.status.as_str()
                )));
            }

            let entered_at = Utc::now();
            claim_open(&db_tx, maintenance_id, entered_at).await?;

            let vehicle_id = maintenance.vehicle_id;
            if !active_missions(&db_tx, vehicle_id).await?.is_empty() {
                return Err(EngineError::InvalidStateTransition(format!(
                    "vehicle {vehicle_id} has an active mission"
                )));
            }
            let concurrent = maintenances::Entity::find()
                .filter(maintenances::Column::VehicleId.eq(vehicle_id.to_string()))
                .filter(maintenances::Column::Status.eq(MaintenanceStatus::Active.as_str()))
                .filter(maintenances::Column::Id.ne(maintenance_id.to_string()))
                .one(&db_tx)
                .await?;
            if concurrent.is_some() {
                return Err(EngineError::InvalidStateTransition(format!(
                    "vehicle {vehicle_id} is already under maintenance"
                )));
            }

            let vehicle = load_vehicle(&db_tx, vehicle_id).await?;
            if vehicle.state == VehicleState::InMission {
                return Err(EngineError::InvalidStateTransition(format!(
                    "vehicle {vehicle_id} is in mission"
                )));
            }
            transition_vehicle(&db_tx, vehicle, VehicleState::InMaintenance).await?;

            info!(maintenance = %maintenance_id, vehicle = %vehicle_id, "maintenance started");
            Ok(Maintenance {
                status: MaintenanceStatus::Active,
                entered_at,
                ..maintenance
            })
        })
    }

    /// Close a maintenance event and release the vehicle.
    ///
    /// `final_cost` replaces the estimate. `odometer_km` raises the vehicle
    /// odometer when it is ahead of it; a lower reading is ignored.
    pub async fn close_maintenance(
        &self,
        maintenance_id: MaintenanceId,
        final_cost: Option<MoneyCents>,
        odometer_km: Option<i64>,
    ) -> ResultEngine<Maintenance> {
        if let Some(cost) = final_cost {
            ensure_not_negative(cost, "maintenance cost")?;
        }
        if let Some(km) = odometer_km {
            ensure_distance(km, "odometer reading")?;
        }

        with_tx!(self, |db_tx| {
            let maintenance = load_maintenance(&db_tx, maintenance_id).await?;
            if maintenance.status == MaintenanceStatus::Closed {
                return Err(EngineError::InvalidStateTransition(format!(
                    "maintenance {maintenance_id} is already closed"
                )));
            }

            let cost = final_cost.unwrap_or(maintenance.cost);
            let exited_at = Utc::now();
            let closed = maintenances::Entity::update_many()
                .col_expr(
                    maintenances::Column::Status,
                    Expr::value(MaintenanceStatus::Closed.as_str()),
                )
                .col_expr(maintenances::Column::ExitedAt, Expr::value(exited_at))
                .col_expr(maintenances::Column::CostMinor, Expr::value(cost.cents()))
                .filter(maintenances::Column::Id.eq(maintenance_id.to_string()))
                .filter(maintenances::Column::Status.eq(maintenance.status.as_str()))
                .exec(&db_tx)
                .await?;
            if closed.rows_affected == 0 {
                return Err(EngineError::ConcurrencyConflict(format!(
                    "maintenance {maintenance_id} changed while being closed"
                )));
            }

            let vehicle = load_vehicle(&db_tx, maintenance.vehicle_id).await?;
            // An event that never started does not own the vehicle state.
            let mut vehicle = if maintenance.status == MaintenanceStatus::Active {
                transition_vehicle(&db_tx, vehicle, VehicleState::Available).await?
            } else {
                info!(
                    maintenance = %maintenance_id,
                    vehicle = %vehicle.id,
                    state = vehicle.state.as_str(),
                    "maintenance cancelled before start, vehicle state left unchanged"
                );
                vehicle
            };

            if let Some(reading) = odometer_km {
                if reading > vehicle.distance_km {
                    vehicle = set_vehicle_distance(&db_tx, vehicle, reading).await?;
                } else if reading < vehicle.distance_km {
                    warn!(
                        vehicle = %vehicle.id,
                        reading,
                        current = vehicle.distance_km,
                        "odometer reading below current distance ignored"
                    );
                }
            }

            info!(
                maintenance = %maintenance_id,
                vehicle = %vehicle.id,
                cost = %cost,
                "maintenance closed"
            );
            Ok(Maintenance {
                status: MaintenanceStatus::Closed,
                exited_at: Some(exited_at),
                cost,
                ..maintenance
            })
        })
    }

    /// Delete a maintenance event that is not in progress.
    pub async fn delete_maintenance(&self, maintenance_id: MaintenanceId) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let maintenance = load_maintenance(&db_tx, maintenance_id).await?;
            if maintenance.status == MaintenanceStatus::Active {
                return Err(EngineError::InvalidStateTransition(format!(
                    "maintenance {maintenance_id} is active"
                )));
            }
            let deleted = maintenances::Entity::delete_many()
                .filter(maintenances::Column::Id.eq(maintenance_id.to_string()))
                .filter(maintenances::Column::Status.ne(MaintenanceStatus::Active.as_str()))
                .exec(&db_tx)
                .await?;
            if deleted.rows_affected == 0 {
                return Err(EngineError::ConcurrencyConflict(format!(
                    "maintenance {maintenance_id} was started concurrently"
                )));
            }
            info!(maintenance = %maintenance_id, "maintenance deleted");
            Ok(())
        })
    }

    pub async fn maintenance(&self, maintenance_id: MaintenanceId) -> ResultEngine<Maintenance> {
        load_maintenance(&self.database, maintenance_id).await
    }

    /// Maintenance history of a vehicle, by entry date.
    pub async fn maintenances_for_vehicle(
        &self,
        vehicle_id: VehicleId,
    ) -> ResultEngine<Vec<Maintenance>> {
        load_vehicle(&self.database, vehicle_id).await?;
        maintenances::Entity::find()
            .filter(maintenances::Column::VehicleId.eq(vehicle_id.to_string()))
            .order_by_asc(maintenances::Column::EnteredAt)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Maintenance::try_from)
            .collect()
    }

    /// Events whose entry falls in `[start, end]`.
    pub async fn maintenances_scheduled_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ResultEngine<Vec<Maintenance>> {
        ensure_window(start, end)?;
        Ok(load_maintenances(&self.database)
            .await?
            .into_iter()
            .filter(|m| m.entered_at >= start && m.entered_at <= end)
            .collect())
    }
}

/// Flip an open event to active and stamp its entry, only if it is still open.
async fn claim_open(
    db_tx: &DatabaseTransaction,
    maintenance_id: MaintenanceId,
    entered_at: DateTime<Utc>,
) -> ResultEngine<()> {
    let claimed = maintenances::Entity::update_many()
        .col_expr(
            maintenances::Column::Status,
            Expr::value(MaintenanceStatus::Active.as_str()),
        )
        .col_expr(maintenances::Column::EnteredAt, Expr::value(entered_at))
        .filter(maintenances::Column::Id.eq(maintenance_id.to_string()))
        .filter(maintenances::Column::Status.eq(MaintenanceStatus::Open.as_str()))
        .exec(db_tx)
        .await?;
    if claimed.rows_affected == 0 {
        return Err(EngineError::ConcurrencyConflict(format!(
            "maintenance {maintenance_id} was started concurrently"
        )));
    }
    Ok(())
}

async fn load_maintenance<C: ConnectionTrait>(
    db: &C,
    maintenance_id: MaintenanceId,
) -> ResultEngine<Maintenance> {
    let model = maintenances::Entity::find_by_id(maintenance_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("maintenance {maintenance_id}")))?;
    Maintenance::try_from(model)
}

/// Every maintenance event, by entry date.
pub(super) async fn load_maintenances<C: ConnectionTrait>(
    db: &C,
) -> ResultEngine<Vec<Maintenance>> {
    maintenances::Entity::find()
        .order_by_asc(maintenances::Column::EnteredAt)
        .all(db)
        .await?
        .into_iter()
        .map(Maintenance::try_from)
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use migration::MigratorTrait;
    use sea_orm::Database;

    use super::*;
    use crate::{MaintenanceCategory, NewVehicle};

    #[tokio::test]
    async fn claim_of_a_closed_event_conflicts() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        migration::Migrator::up(&db, None).await.unwrap();
        let engine = Engine::builder().database(db.clone()).build().await.unwrap();

        let vehicle_id = engine
            .new_vehicle(NewVehicle {
                registration: "AB-123-CD".to_string(),
                acquired_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                acquisition_price: MoneyCents::new(1_000_000),
                distance_km: 0,
            })
            .await
            .unwrap();
        let maintenance_id = engine
            .new_maintenance(NewMaintenance {
                vehicle_id,
                category: MaintenanceCategory::Preventive,
                reason: "Service".to_string(),
                entered_at: Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap(),
                estimated_cost: MoneyCents::new(10_000),
            })
            .await
            .unwrap();
        engine
            .close_maintenance(maintenance_id, None, None)
            .await
            .unwrap();

        let db_tx = db.begin().await.unwrap();
        let err = claim_open(&db_tx, maintenance_id, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ConcurrencyConflict(_)));
        db_tx.rollback().await.unwrap();

        let maintenance = engine.maintenance(maintenance_id).await.unwrap();
        assert_eq!(maintenance.status, MaintenanceStatus::Closed);
        assert_eq!(
            engine.vehicle(vehicle_id).await.unwrap().state,
            VehicleState::Available
        );
    }
}
