use chrono::{DateTime, Utc};
use sea_orm::{
    ConnectionTrait, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use tracing::{debug, info};

use crate::{
    EngineError, MaintenanceStatus, MissionStatus, NewVehicle, ResultEngine, Vehicle,
    VehicleId, VehicleState, maintenances, missions,
    util::{ensure_not_negative, ensure_window, ranges_overlap},
    vehicles,
};

use super::{Engine, ensure_distance, normalize_required_text, with_tx};

impl Engine {
    /// Register a vehicle. It starts `Available`.
    pub async fn new_vehicle(&self, input: NewVehicle) -> ResultEngine<VehicleId> {
        let registration = normalize_required_text(&input.registration, "registration")?;
        ensure_not_negative(input.acquisition_price, "acquisition price")?;
        ensure_distance(input.distance_km, "distance")?;

        with_tx!(self, |db_tx| {
            let exists = vehicles::Entity::find()
                .filter(vehicles::Column::Registration.eq(registration.clone()))
                .one(&db_tx)
                .await?
                .is_some();
            if exists {
                return Err(EngineError::AlreadyExists(registration));
            }

            let now = Utc::now();
            let vehicle = Vehicle {
                id: VehicleId::new(),
                registration,
                state: VehicleState::Available,
                state_changed_at: now,
                acquired_at: input.acquired_at,
                acquisition_price: input.acquisition_price,
                distance_km: input.distance_km,
                version: 0,
            };
            vehicles::ActiveModel::from(&vehicle).insert(&db_tx).await?;
            info!(vehicle = %vehicle.id, registration = %vehicle.registration, "vehicle registered");
            Ok(vehicle.id)
        })
    }

    /// Return a vehicle snapshot from DB.
    pub async fn vehicle(&self, vehicle_id: VehicleId) -> ResultEngine<Vehicle> {
        load_vehicle(&self.database, vehicle_id).await
    }

    /// All vehicles, ordered by registration.
    pub async fn vehicles(&self) -> ResultEngine<Vec<Vehicle>> {
        load_vehicles(&self.database).await
    }

    /// Administrative state change (breakdown, decommission, assignment...).
    ///
    /// `InMission` and `InMaintenance` cannot be requested here, and a vehicle
    /// cannot leave them while the matching mission or maintenance is active.
    pub async fn set_vehicle_state(
        &self,
        vehicle_id: VehicleId,
        state: VehicleState,
    ) -> ResultEngine<Vehicle> {
        if state.is_lifecycle_owned() {
            return Err(EngineError::InvalidStateTransition(format!(
                "{} is driven by missions and maintenance",
                state.as_str()
            )));
        }

        with_tx!(self, |db_tx| {
            let vehicle = load_vehicle(&db_tx, vehicle_id).await?;
            match vehicle.state {
                VehicleState::InMission => {
                    let active = missions::Entity::find()
                        .filter(missions::Column::VehicleId.eq(vehicle_id.to_string()))
                        .filter(missions::Column::Status.eq(MissionStatus::Active.as_str()))
                        .one(&db_tx)
                        .await?;
                    if active.is_some() {
                        return Err(EngineError::InvalidStateTransition(format!(
                            "vehicle {vehicle_id} has an active mission"
                        )));
                    }
                }
                VehicleState::InMaintenance => {
                    let active = maintenances::Entity::find()
                        .filter(maintenances::Column::VehicleId.eq(vehicle_id.to_string()))
                        .filter(maintenances::Column::Status.eq(MaintenanceStatus::Active.as_str()))
                        .one(&db_tx)
                        .await?;
                    if active.is_some() {
                        return Err(EngineError::InvalidStateTransition(format!(
                            "vehicle {vehicle_id} has an active maintenance"
                        )));
                    }
                }
                _ => {}
            }
            transition_vehicle(&db_tx, vehicle, state).await
        })
    }

    /// Vehicles that are `Available` and free of any planned or active
    /// mission and of any active maintenance overlapping `[start, end]`.
    pub async fn available_vehicles(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ResultEngine<Vec<Vehicle>> {
        ensure_window(start, end)?;

        let candidates: Vec<Vehicle> = load_vehicles(&self.database)
            .await?
            .into_iter()
            .filter(|v| v.state == VehicleState::Available)
            .collect();

        let booked_missions = missions::Entity::find()
            .filter(missions::Column::Status.is_in([
                MissionStatus::Planned.as_str(),
                MissionStatus::Active.as_str(),
            ]))
            .all(&self.database)
            .await?;
        let active_maintenances = maintenances::Entity::find()
            .filter(maintenances::Column::Status.eq(MaintenanceStatus::Active.as_str()))
            .all(&self.database)
            .await?;

        let mut busy: Vec<String> = Vec::new();
        for mission in booked_missions {
            if ranges_overlap(mission.starts_at, mission.planned_end_at, start, Some(end)) {
                busy.push(mission.vehicle_id);
            }
        }
        for maintenance in active_maintenances {
            if ranges_overlap(maintenance.entered_at, maintenance.exited_at, start, Some(end)) {
                busy.push(maintenance.vehicle_id);
            }
        }

        Ok(candidates
            .into_iter()
            .filter(|v| !busy.contains(&v.id.to_string()))
            .collect())
    }
}

pub(super) async fn load_vehicle<C: ConnectionTrait>(
    db: &C,
    vehicle_id: VehicleId,
) -> ResultEngine<Vehicle> {
    let model = vehicles::Entity::find_by_id(vehicle_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("vehicle {vehicle_id}")))?;
    Vehicle::try_from(model)
}

pub(super) async fn load_vehicles<C: ConnectionTrait>(db: &C) -> ResultEngine<Vec<Vehicle>> {
    vehicles::Entity::find()
        .order_by_asc(vehicles::Column::Registration)
        .all(db)
        .await?
        .into_iter()
        .map(Vehicle::try_from)
        .collect()
}

/// Move `vehicle` to `target` inside the caller's transaction.
///
/// No-op when the vehicle is already in `target`. The write only applies if
/// the row still carries the version that was read.
pub(super) async fn transition_vehicle(
    db_tx: &DatabaseTransaction,
    vehicle: Vehicle,
    target: VehicleState,
) -> ResultEngine<Vehicle> {
    if vehicle.state == target {
        debug!(vehicle = %vehicle.id, state = target.as_str(), "vehicle already in state");
        return Ok(vehicle);
    }

    let now = Utc::now();
    let result = vehicles::Entity::update_many()
        .col_expr(vehicles::Column::State, Expr::value(target.as_str()))
        .col_expr(vehicles::Column::StateChangedAt, Expr::value(now))
        .col_expr(vehicles::Column::Version, Expr::value(vehicle.version + 1))
        .filter(vehicles::Column::Id.eq(vehicle.id.to_string()))
        .filter(vehicles::Column::Version.eq(vehicle.version))
        .exec(db_tx)
        .await?;
    if result.rows_affected == 0 {
        return Err(EngineError::ConcurrencyConflict(format!(
            "vehicle {} changed while being updated",
            vehicle.id
        )));
    }

    info!(
        vehicle = %vehicle.id,
        from = vehicle.state.as_str(),
        to = target.as_str(),
        "vehicle state changed"
    );
    Ok(Vehicle {
        state: target,
        state_changed_at: now,
        version: vehicle.version + 1,
        ..vehicle
    })
}

/// Set the odometer of `vehicle`, version-guarded like state changes.
pub(super) async fn set_vehicle_distance(
    db_tx: &DatabaseTransaction,
    vehicle: Vehicle,
    distance_km: i64,
) -> ResultEngine<Vehicle> {
    let result = vehicles::Entity::update_many()
        .col_expr(vehicles::Column::DistanceKm, Expr::value(distance_km))
        .col_expr(vehicles::Column::Version, Expr::value(vehicle.version + 1))
        .filter(vehicles::Column::Id.eq(vehicle.id.to_string()))
        .filter(vehicles::Column::Version.eq(vehicle.version))
        .exec(db_tx)
        .await?;
    if result.rows_affected == 0 {
        return Err(EngineError::ConcurrencyConflict(format!(
            "vehicle {} changed while being updated",
            vehicle.id
        )));
    }
    Ok(Vehicle {
        distance_km,
        version: vehicle.version + 1,
        ..vehicle
    })
}
