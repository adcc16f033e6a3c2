use chrono::{DateTime, Utc};
use sea_orm::{
    ConnectionTrait, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use tracing::info;

use crate::{
    EngineError, ExpenseId, MaintenanceStatus, Mission, MissionExpense, MissionId, MissionStatus,
    MoneyCents, NewExpense, NewMission, ResultEngine, VehicleId, VehicleState, maintenances,
    mission_expenses, missions,
    util::{ensure_positive, ensure_window, ranges_overlap},
};

use super::{
    Engine, ensure_distance, normalize_optional_text, normalize_required_text,
    vehicles::{load_vehicle, set_vehicle_distance, transition_vehicle},
    with_tx,
};

impl Engine {
    /// Plan a mission for an existing vehicle.
    pub async fn new_mission(&self, input: NewMission) -> ResultEngine<MissionId> {
        let label = normalize_required_text(&input.label, "mission label")?;
        if let Some(planned_end) = input.planned_end_at
            && planned_end < input.starts_at
        {
            return Err(EngineError::Validation(
                "planned end must not precede the start".to_string(),
            ));
        }
        ensure_distance(input.planned_distance_km, "planned distance")?;

        with_tx!(self, |db_tx| {
            load_vehicle(&db_tx, input.vehicle_id).await?;

            let mission = Mission {
                id: MissionId::new(),
                vehicle_id: input.vehicle_id,
                label,
                status: MissionStatus::Planned,
                starts_at: input.starts_at,
                planned_end_at: input.planned_end_at,
                ended_at: None,
                planned_distance_km: input.planned_distance_km,
                actual_distance_km: None,
                cost: MoneyCents::ZERO,
                observations: normalize_optional_text(input.observations.as_deref()),
                expenses: Vec::new(),
            };
            missions::ActiveModel::from(&mission).insert(&db_tx).await?;
            info!(mission = %mission.id, vehicle = %mission.vehicle_id, "mission planned");
            Ok(mission.id)
        })
    }

    /// Start a planned mission and put its vehicle `InMission`.
    ///
    /// The vehicle must not have another active mission or an active
    /// maintenance overlapping the mission window, and must be `Available`.
    pub async fn start_mission(&self, mission_id: MissionId) -> ResultEngine<Mission> {
        with_tx!(self, |db_tx| {
            let mission = load_mission(&db_tx, mission_id).await?;
            if mission.status != MissionStatus::Planned {
                return Err(EngineError::InvalidStateTransition(format!(
                    "mission {mission_id} is {}, only planned missions can start",
                    mission.status.as_str()
                )));
            }

            claim_planned(&db_tx, mission_id).await?;

            let vehicle_id = mission.vehicle_id;
            let others = active_missions(&db_tx, vehicle_id).await?;
            let clash = others.iter().any(|other| {
                other.id != mission_id
                    && ranges_overlap(
                        other.starts_at,
                        other.planned_end_at,
                        mission.starts_at,
                        mission.planned_end_at,
                    )
            });
            if clash {
                return Err(EngineError::InvalidStateTransition(format!(
                    "vehicle {vehicle_id} already has an active mission in this window"
                )));
            }

            let in_workshop = maintenances::Entity::find()
                .filter(maintenances::Column::VehicleId.eq(vehicle_id.to_string()))
                .filter(maintenances::Column::Status.eq(MaintenanceStatus::Active.as_str()))
                .all(&db_tx)
                .await?
                .into_iter()
                .any(|m| {
                    ranges_overlap(
                        m.entered_at,
                        m.exited_at,
                        mission.starts_at,
                        mission.planned_end_at,
                    )
                });
            if in_workshop {
                return Err(EngineError::InvalidStateTransition(format!(
                    "vehicle {vehicle_id} is under maintenance in this window"
                )));
            }

            let vehicle = load_vehicle(&db_tx, vehicle_id).await?;
            let other_active = others.iter().any(|other| other.id != mission_id);
            let ready = match vehicle.state {
                VehicleState::Available => true,
                VehicleState::InMission => !other_active,
                _ => false,
            };
            if !ready {
                return Err(EngineError::InvalidStateTransition(format!(
                    "vehicle {vehicle_id} is {}",
                    vehicle.state.as_str()
                )));
            }
            transition_vehicle(&db_tx, vehicle, VehicleState::InMission).await?;

            info!(mission = %mission_id, vehicle = %vehicle_id, "mission started");
            Ok(Mission {
                status: MissionStatus::Active,
                ..mission
            })
        })
    }

    /// Close an active mission.
    ///
    /// `actual_distance_km` is required. The cost becomes the sum of the
    /// expenses, the vehicle returns `Available` and its odometer grows by the
    /// distance travelled.
    pub async fn close_mission(
        &self,
        mission_id: MissionId,
        actual_distance_km: Option<i64>,
    ) -> ResultEngine<Mission> {
        let distance = actual_distance_km.ok_or_else(|| {
            EngineError::Validation("actual distance is required to close a mission".to_string())
        })?;
        ensure_distance(distance, "actual distance")?;

        with_tx!(self, |db_tx| {
            let mission = load_mission(&db_tx, mission_id).await?;
            match mission.status {
                MissionStatus::Active => {}
                MissionStatus::Planned => {
                    return Err(EngineError::InvalidStateTransition(format!(
                        "mission {mission_id} was never started"
                    )));
                }
                MissionStatus::Closed => {
                    return Err(EngineError::InvalidStateTransition(format!(
                        "mission {mission_id} is already closed"
                    )));
                }
            }

            let expenses = load_expenses(&db_tx, mission_id).await?;
            let cost: MoneyCents = expenses.iter().map(|e| e.amount).sum();
            let ended_at = Utc::now();

            let closed = missions::Entity::update_many()
                .col_expr(
                    missions::Column::Status,
                    Expr::value(MissionStatus::Closed.as_str()),
                )
                .col_expr(missions::Column::CostMinor, Expr::value(cost.cents()))
                .col_expr(missions::Column::ActualDistanceKm, Expr::value(distance))
                .col_expr(missions::Column::EndedAt, Expr::value(ended_at))
                .filter(missions::Column::Id.eq(mission_id.to_string()))
                .filter(missions::Column::Status.eq(MissionStatus::Active.as_str()))
                .exec(&db_tx)
                .await?;
            if closed.rows_affected == 0 {
                return Err(EngineError::ConcurrencyConflict(format!(
                    "mission {mission_id} was closed concurrently"
                )));
            }

            let vehicle = load_vehicle(&db_tx, mission.vehicle_id).await?;
            let vehicle = transition_vehicle(&db_tx, vehicle, VehicleState::Available).await?;
            let odometer = vehicle.distance_km + distance;
            set_vehicle_distance(&db_tx, vehicle, odometer).await?;

            info!(
                mission = %mission_id,
                cost = %cost,
                distance_km = distance,
                "mission closed"
            );
            Ok(Mission {
                status: MissionStatus::Closed,
                ended_at: Some(ended_at),
                actual_distance_km: Some(distance),
                cost,
                expenses,
                ..mission
            })
        })
    }

    /// Record an expense and refresh the mission total.
    pub async fn add_expense(
        &self,
        mission_id: MissionId,
        input: NewExpense,
    ) -> ResultEngine<MissionExpense> {
        ensure_positive(input.amount, "expense amount")?;

        with_tx!(self, |db_tx| {
            let mission = load_mission(&db_tx, mission_id).await?;
            if mission.status == MissionStatus::Closed {
                return Err(EngineError::InvalidStateTransition(format!(
                    "mission {mission_id} is closed"
                )));
            }

            let expense = MissionExpense {
                id: ExpenseId::new(),
                mission_id,
                nature: input.nature,
                amount: input.amount,
                justification: normalize_optional_text(input.justification.as_deref()),
                incurred_at: input.incurred_at,
            };
            mission_expenses::ActiveModel::from(&expense)
                .insert(&db_tx)
                .await?;

            let total: MoneyCents = load_expenses(&db_tx, mission_id)
                .await?
                .iter()
                .map(|e| e.amount)
                .sum();
            let updated = missions::Entity::update_many()
                .col_expr(missions::Column::CostMinor, Expr::value(total.cents()))
                .filter(missions::Column::Id.eq(mission_id.to_string()))
                .filter(missions::Column::Status.ne(MissionStatus::Closed.as_str()))
                .exec(&db_tx)
                .await?;
            if updated.rows_affected == 0 {
                return Err(EngineError::ConcurrencyConflict(format!(
                    "mission {mission_id} was closed concurrently"
                )));
            }

            info!(mission = %mission_id, amount = %expense.amount, total = %total, "expense recorded");
            Ok(expense)
        })
    }

    /// Delete a mission that is not running, together with its expenses.
    pub async fn delete_mission(&self, mission_id: MissionId) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let mission = load_mission(&db_tx, mission_id).await?;
            if mission.status == MissionStatus::Active {
                return Err(EngineError::InvalidStateTransition(format!(
                    "mission {mission_id} is active"
                )));
            }

            mission_expenses::Entity::delete_many()
                .filter(mission_expenses::Column::MissionId.eq(mission_id.to_string()))
                .exec(&db_tx)
                .await?;
            let deleted = missions::Entity::delete_many()
                .filter(missions::Column::Id.eq(mission_id.to_string()))
                .filter(missions::Column::Status.ne(MissionStatus::Active.as_str()))
                .exec(&db_tx)
                .await?;
            if deleted.rows_affected == 0 {
                return Err(EngineError::ConcurrencyConflict(format!(
                    "mission {mission_id} was started concurrently"
                )));
            }

            info!(mission = %mission_id, "mission deleted");
            Ok(())
        })
    }

    /// Return a mission with its expenses.
    pub async fn mission(&self, mission_id: MissionId) -> ResultEngine<Mission> {
        let mut mission = load_mission(&self.database, mission_id).await?;
        mission.expenses = load_expenses(&self.database, mission_id).await?;
        Ok(mission)
    }

    pub async fn mission_expenses(&self, mission_id: MissionId) -> ResultEngine<Vec<MissionExpense>> {
        load_mission(&self.database, mission_id).await?;
        load_expenses(&self.database, mission_id).await
    }

    /// Missions of a vehicle, by start date.
    pub async fn missions_for_vehicle(&self, vehicle_id: VehicleId) -> ResultEngine<Vec<Mission>> {
        load_vehicle(&self.database, vehicle_id).await?;
        missions::Entity::find()
            .filter(missions::Column::VehicleId.eq(vehicle_id.to_string()))
            .order_by_asc(missions::Column::StartsAt)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Mission::try_from)
            .collect()
    }

    pub async fn active_missions_for_vehicle(
        &self,
        vehicle_id: VehicleId,
    ) -> ResultEngine<Vec<Mission>> {
        load_vehicle(&self.database, vehicle_id).await?;
        active_missions(&self.database, vehicle_id).await
    }

    /// Missions whose scheduled window overlaps `[start, end]`. An open-ended
    /// mission overlaps every window after its start.
    pub async fn missions_in_period(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ResultEngine<Vec<Mission>> {
        ensure_window(start, end)?;
        let missions = load_missions(&self.database).await?;
        Ok(missions
            .into_iter()
            .filter(|m| ranges_overlap(m.starts_at, m.end_or_planned(), start, Some(end)))
            .collect())
    }
}

/// Flip a mission from planned to active, only if nobody did it first.
async fn claim_planned(db_tx: &DatabaseTransaction, mission_id: MissionId) -> ResultEngine<()> {
    let claimed = missions::Entity::update_many()
        .col_expr(
            missions::Column::Status,
            Expr::value(MissionStatus::Active.as_str()),
        )
        .filter(missions::Column::Id.eq(mission_id.to_string()))
        .filter(missions::Column::Status.eq(MissionStatus::Planned.as_str()))
        .exec(db_tx)
        .await?;
    if claimed.rows_affected == 0 {
        return Err(EngineError::ConcurrencyConflict(format!(
            "mission {mission_id} was started concurrently"
        )));
    }
    Ok(())
}

pub(super) async fn load_mission<C: ConnectionTrait>(
    db: &C,
    mission_id: MissionId,
) -> ResultEngine<Mission> {
    let model = missions::Entity::find_by_id(mission_id.to_string())
        .one(db)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("mission {mission_id}")))?;
    Mission::try_from(model)
}

/// Every mission, by start date, without expenses.
pub(super) async fn load_missions<C: ConnectionTrait>(db: &C) -> ResultEngine<Vec<Mission>> {
    missions::Entity::find()
        .order_by_asc(missions::Column::StartsAt)
        .all(db)
        .await?
        .into_iter()
        .map(Mission::try_from)
        .collect()
}

pub(super) async fn active_missions<C: ConnectionTrait>(
    db: &C,
    vehicle_id: VehicleId,
) -> ResultEngine<Vec<Mission>> {
    missions::Entity::find()
        .filter(missions::Column::VehicleId.eq(vehicle_id.to_string()))
        .filter(missions::Column::Status.eq(MissionStatus::Active.as_str()))
        .order_by_asc(missions::Column::StartsAt)
        .all(db)
        .await?
        .into_iter()
        .map(Mission::try_from)
        .collect()
}

async fn load_expenses(
    db: &impl ConnectionTrait,
    mission_id: MissionId,
) -> ResultEngine<Vec<MissionExpense>> {
    mission_expenses::Entity::find()
        .filter(mission_expenses::Column::MissionId.eq(mission_id.to_string()))
        .order_by_asc(mission_expenses::Column::IncurredAt)
        .order_by_asc(mission_expenses::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(MissionExpense::try_from)
        .collect()
}
