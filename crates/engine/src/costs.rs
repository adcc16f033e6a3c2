//! Cost aggregation over finalized histories.
//!
//! Everything here is pure: the engine loads the relevant rows and hands them
//! to these functions, so the arithmetic is testable without a database.
//!
//! Amortization is straight-line, 20% of the acquisition price per year for
//! five years. Once five years have elapsed the vehicle keeps a residual value
//! of 10% of its price.

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;

use crate::{
    Insurance, Maintenance, MaintenanceStatus, Mission, MissionStatus, MoneyCents, Movement,
    MovementKind, Vehicle, VehicleId,
    util::{in_year, month_index, touches_window},
};

const ANNUAL_AMORTIZATION_PCT: i64 = 20;
const AMORTIZATION_YEARS: i32 = 5;
const RESIDUAL_PCT: i64 = 10;

/// Total cost of ownership of one vehicle at a given instant.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TcoReport {
    pub vehicle_id: VehicleId,
    pub registration: String,
    pub as_of: DateTime<Utc>,
    pub years_elapsed: i32,
    pub acquisition_price: MoneyCents,
    pub amortization: MoneyCents,
    pub residual_value: MoneyCents,
    pub maintenance_costs: MoneyCents,
    pub insurance_costs: MoneyCents,
    pub mission_costs: MoneyCents,
    pub operational_costs: MoneyCents,
    pub tco: MoneyCents,
    pub distance_km: i64,
    pub cost_per_km: MoneyCents,
}

/// Yearly cost and profitability proxy of one vehicle.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VehicleProfitability {
    pub vehicle_id: VehicleId,
    pub registration: String,
    pub year: i32,
    pub amortization: MoneyCents,
    pub maintenance_costs: MoneyCents,
    pub insurance_costs: MoneyCents,
    pub mission_costs: MoneyCents,
    pub total_costs: MoneyCents,
    pub distance_km: i64,
    pub cost_per_km: MoneyCents,
    /// `(missions - maintenance - insurance) / price * 100`, two decimals.
    pub profitability_pct: f64,
}

/// Financial summary of a period.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Bilan {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub receipts: MoneyCents,
    pub mission_costs: MoneyCents,
    pub maintenance_costs: MoneyCents,
    pub insurance_costs: MoneyCents,
    pub total_costs: MoneyCents,
    pub balance: MoneyCents,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MonthlyBilan {
    /// 1..=12
    pub month: u32,
    pub deposits: MoneyCents,
    pub mission_costs: MoneyCents,
    pub maintenance_costs: MoneyCents,
    pub balance: MoneyCents,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BudgetBreakdown {
    pub year: i32,
    pub mission_costs: MoneyCents,
    pub maintenance_costs: MoneyCents,
    pub insurance_costs: MoneyCents,
    pub total: MoneyCents,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FleetTco {
    pub as_of: DateTime<Utc>,
    pub vehicles: Vec<TcoReport>,
    pub amortization: MoneyCents,
    pub operational_costs: MoneyCents,
    pub tco: MoneyCents,
    pub distance_km: i64,
    pub cost_per_km: MoneyCents,
}

/// Amortization accumulated after `years_elapsed` whole calendar years, with
/// the matching residual value.
pub fn amortization_to_date(price: MoneyCents, years_elapsed: i32) -> (MoneyCents, MoneyCents) {
    let amortization = if years_elapsed <= 0 {
        MoneyCents::ZERO
    } else if years_elapsed >= AMORTIZATION_YEARS {
        price - price.percent(RESIDUAL_PCT)
    } else {
        price.percent(ANNUAL_AMORTIZATION_PCT * i64::from(years_elapsed))
    };
    (amortization, price - amortization)
}

/// Amortization charged to `year`. Years before the acquisition and after the
/// fifth year of ownership carry none.
pub fn annual_amortization(price: MoneyCents, acquired_year: i32, year: i32) -> MoneyCents {
    let ownership_year = year - acquired_year + 1;
    if (1..=AMORTIZATION_YEARS).contains(&ownership_year) {
        price.percent(ANNUAL_AMORTIZATION_PCT)
    } else {
        MoneyCents::ZERO
    }
}

fn covers(insurance: &Insurance, vehicle_id: VehicleId) -> bool {
    insurance.vehicle_ids.contains(&vehicle_id)
}

fn mission_reference_date(mission: &Mission) -> DateTime<Utc> {
    mission.end_or_planned().unwrap_or(mission.starts_at)
}

/// TCO of `vehicle` at `as_of`.
///
/// Operational costs are closed maintenance, closed missions and the
/// vehicle's share of each covering policy, all restricted to records dated
/// no later than `as_of`.
pub fn tco(
    vehicle: &Vehicle,
    as_of: DateTime<Utc>,
    maintenances: &[Maintenance],
    missions: &[Mission],
    insurances: &[Insurance],
) -> TcoReport {
    let years_elapsed = as_of.year() - vehicle.acquired_at.year();
    let (amortization, residual_value) =
        amortization_to_date(vehicle.acquisition_price, years_elapsed);

    let maintenance_costs: MoneyCents = maintenances
        .iter()
        .filter(|m| m.vehicle_id == vehicle.id && m.status == MaintenanceStatus::Closed)
        .filter(|m| m.reference_date() <= as_of)
        .map(|m| m.cost)
        .sum();
    let mission_costs: MoneyCents = missions
        .iter()
        .filter(|m| m.vehicle_id == vehicle.id && m.status == MissionStatus::Closed)
        .filter(|m| m.ended_at.is_some_and(|end| end <= as_of))
        .map(|m| m.cost)
        .sum();
    let insurance_costs: MoneyCents = insurances
        .iter()
        .filter(|i| covers(i, vehicle.id) && i.starts_at <= as_of)
        .map(Insurance::share_per_vehicle)
        .sum();

    let operational_costs = maintenance_costs + insurance_costs + mission_costs;
    let tco = amortization + operational_costs;

    TcoReport {
        vehicle_id: vehicle.id,
        registration: vehicle.registration.clone(),
        as_of,
        years_elapsed,
        acquisition_price: vehicle.acquisition_price,
        amortization,
        residual_value,
        maintenance_costs,
        insurance_costs,
        mission_costs,
        operational_costs,
        tco,
        distance_km: vehicle.distance_km,
        cost_per_km: tco.per_unit(vehicle.distance_km),
    }
}

/// Costs of `vehicle` attributed to `year`.
///
/// Maintenance is dated by exit (else entry), insurance by end (else start),
/// missions by end (else start). Only missions closed within the year count
/// towards the distance. Every covered vehicle carries the full annual cost of
/// its policies; the per-vehicle split only applies to the TCO.
pub fn profitability(
    vehicle: &Vehicle,
    year: i32,
    maintenances: &[Maintenance],
    missions: &[Mission],
    insurances: &[Insurance],
) -> VehicleProfitability {
    let amortization =
        annual_amortization(vehicle.acquisition_price, vehicle.acquired_at.year(), year);

    let maintenance_costs: MoneyCents = maintenances
        .iter()
        .filter(|m| m.vehicle_id == vehicle.id && in_year(m.reference_date(), year))
        .map(|m| m.cost)
        .sum();
    let insurance_costs: MoneyCents = insurances
        .iter()
        .filter(|i| covers(i, vehicle.id) && in_year(i.reference_date(), year))
        .map(|i| i.annual_cost)
        .sum();
    let vehicle_missions = missions.iter().filter(|m| m.vehicle_id == vehicle.id);
    let mission_costs: MoneyCents = vehicle_missions
        .clone()
        .filter(|m| in_year(mission_reference_date(m), year))
        .map(|m| m.cost)
        .sum();
    let distance_km: i64 = vehicle_missions
        .filter(|m| m.status == MissionStatus::Closed)
        .filter(|m| m.ended_at.is_some_and(|end| in_year(end, year)))
        .filter_map(|m| m.actual_distance_km)
        .sum();

    let total_costs = amortization + maintenance_costs + insurance_costs + mission_costs;
    let profitability_pct = if vehicle.acquisition_price.is_zero() {
        0.0
    } else {
        let margin = mission_costs - maintenance_costs - insurance_costs;
        round2(margin.as_major() / vehicle.acquisition_price.as_major() * 100.0)
    };

    VehicleProfitability {
        vehicle_id: vehicle.id,
        registration: vehicle.registration.clone(),
        year,
        amortization,
        maintenance_costs,
        insurance_costs,
        mission_costs,
        total_costs,
        distance_km,
        cost_per_km: total_costs.per_unit(distance_km),
        profitability_pct,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Bilan of `[start, end]`.
///
/// Receipts are the deposits dated inside the window. A mission, maintenance
/// event or policy is counted when its start or its end falls inside the
/// window; one spanning the whole window without either date inside is not.
pub fn bilan(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    movements: &[Movement],
    missions: &[Mission],
    maintenances: &[Maintenance],
    insurances: &[Insurance],
) -> Bilan {
    let receipts: MoneyCents = movements
        .iter()
        .filter(|m| m.kind == MovementKind::Deposit)
        .filter(|m| m.occurred_at >= start && m.occurred_at <= end)
        .map(|m| m.amount)
        .sum();
    let mission_costs: MoneyCents = missions
        .iter()
        .filter(|m| touches_window(m.starts_at, m.end_or_planned(), start, end))
        .map(|m| m.cost)
        .sum();
    let maintenance_costs: MoneyCents = maintenances
        .iter()
        .filter(|m| touches_window(m.entered_at, m.exited_at, start, end))
        .map(|m| m.cost)
        .sum();
    let insurance_costs: MoneyCents = insurances
        .iter()
        .filter(|i| touches_window(i.starts_at, i.ends_at, start, end))
        .map(|i| i.annual_cost)
        .sum();

    let total_costs = mission_costs + maintenance_costs + insurance_costs;
    Bilan {
        start,
        end,
        receipts,
        mission_costs,
        maintenance_costs,
        insurance_costs,
        total_costs,
        balance: receipts - total_costs,
    }
}

/// Twelve monthly buckets of deposits against mission and maintenance costs.
pub fn monthly_evolution(
    year: i32,
    movements: &[Movement],
    missions: &[Mission],
    maintenances: &[Maintenance],
) -> Vec<MonthlyBilan> {
    let mut months: Vec<MonthlyBilan> = (1..=12)
        .map(|month| MonthlyBilan {
            month,
            deposits: MoneyCents::ZERO,
            mission_costs: MoneyCents::ZERO,
            maintenance_costs: MoneyCents::ZERO,
            balance: MoneyCents::ZERO,
        })
        .collect();

    for movement in movements
        .iter()
        .filter(|m| m.kind == MovementKind::Deposit)
    {
        if let Some(idx) = month_index(movement.occurred_at, year) {
            months[idx].deposits += movement.amount;
        }
    }
    for mission in missions {
        if let Some(idx) = month_index(mission_reference_date(mission), year) {
            months[idx].mission_costs += mission.cost;
        }
    }
    for maintenance in maintenances {
        if let Some(idx) = month_index(maintenance.reference_date(), year) {
            months[idx].maintenance_costs += maintenance.cost;
        }
    }
    for month in &mut months {
        month.balance = month.deposits - month.mission_costs - month.maintenance_costs;
    }
    months
}

/// Fleet-wide totals attributed to `year`, each policy counted once.
pub fn budget_breakdown(
    year: i32,
    missions: &[Mission],
    maintenances: &[Maintenance],
    insurances: &[Insurance],
) -> BudgetBreakdown {
    let mission_costs: MoneyCents = missions
        .iter()
        .filter(|m| in_year(mission_reference_date(m), year))
        .map(|m| m.cost)
        .sum();
    let maintenance_costs: MoneyCents = maintenances
        .iter()
        .filter(|m| in_year(m.reference_date(), year))
        .map(|m| m.cost)
        .sum();
    let insurance_costs: MoneyCents = insurances
        .iter()
        .filter(|i| in_year(i.reference_date(), year))
        .map(|i| i.annual_cost)
        .sum();

    BudgetBreakdown {
        year,
        mission_costs,
        maintenance_costs,
        insurance_costs,
        total: mission_costs + maintenance_costs + insurance_costs,
    }
}

/// Sum per-vehicle TCO reports into a fleet view.
pub fn fleet_tco(as_of: DateTime<Utc>, vehicles: Vec<TcoReport>) -> FleetTco {
    let amortization = vehicles.iter().map(|r| r.amortization).sum();
    let operational_costs = vehicles.iter().map(|r| r.operational_costs).sum();
    let tco: MoneyCents = vehicles.iter().map(|r| r.tco).sum();
    let distance_km = vehicles.iter().map(|r| r.distance_km).sum();

    FleetTco {
        as_of,
        vehicles,
        amortization,
        operational_costs,
        tco,
        distance_km,
        cost_per_km: tco.per_unit(distance_km),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::{InsuranceId, MaintenanceCategory, MaintenanceId, MissionId, VehicleState};

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
    }

    fn vehicle(price: i64, acquired_year: i32, distance_km: i64) -> Vehicle {
        Vehicle {
            id: VehicleId::new(),
            registration: "AB-123-CD".to_string(),
            state: VehicleState::Available,
            state_changed_at: at(acquired_year, 1, 1),
            acquired_at: at(acquired_year, 1, 1),
            acquisition_price: MoneyCents::new(price),
            distance_km,
            version: 0,
        }
    }

    fn closed_mission(
        vehicle_id: VehicleId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cost: i64,
        km: i64,
    ) -> Mission {
        Mission {
            id: MissionId::new(),
            vehicle_id,
            label: "delivery".to_string(),
            status: MissionStatus::Closed,
            starts_at: start,
            planned_end_at: Some(end),
            ended_at: Some(end),
            planned_distance_km: km,
            actual_distance_km: Some(km),
            cost: MoneyCents::new(cost),
            observations: None,
            expenses: Vec::new(),
        }
    }

    fn closed_maintenance(
        vehicle_id: VehicleId,
        entered: DateTime<Utc>,
        exited: DateTime<Utc>,
        cost: i64,
    ) -> Maintenance {
        Maintenance {
            id: MaintenanceId::new(),
            vehicle_id,
            status: MaintenanceStatus::Closed,
            category: MaintenanceCategory::Corrective,
            reason: "brakes".to_string(),
            entered_at: entered,
            exited_at: Some(exited),
            cost: MoneyCents::new(cost),
        }
    }

    fn policy(vehicle_ids: Vec<VehicleId>, start: DateTime<Utc>, annual: i64) -> Insurance {
        Insurance {
            id: InsuranceId::new(),
            policy_number: "POL-42".to_string(),
            starts_at: start,
            ends_at: None,
            annual_cost: MoneyCents::new(annual),
            vehicle_ids,
        }
    }

    #[test]
    fn amortization_schedule() {
        let price = MoneyCents::new(2_000_000);
        assert_eq!(amortization_to_date(price, 0).0, MoneyCents::ZERO);
        assert_eq!(amortization_to_date(price, 2).0, MoneyCents::new(800_000));
        assert_eq!(amortization_to_date(price, 4).1, MoneyCents::new(400_000));
        assert_eq!(amortization_to_date(price, 5).0, MoneyCents::new(1_800_000));
        assert_eq!(amortization_to_date(price, 12).1, MoneyCents::new(200_000));
    }

    #[test]
    fn annual_amortization_stops_after_five_years() {
        let price = MoneyCents::new(1_000_000);
        assert_eq!(annual_amortization(price, 2020, 2020), MoneyCents::new(200_000));
        assert_eq!(annual_amortization(price, 2020, 2024), MoneyCents::new(200_000));
        assert_eq!(annual_amortization(price, 2020, 2025), MoneyCents::ZERO);
        assert_eq!(annual_amortization(price, 2020, 2019), MoneyCents::ZERO);
    }

    #[test]
    fn brand_new_vehicle_without_history_costs_nothing() {
        let v = vehicle(2_000_000, 2025, 0);
        let report = tco(&v, at(2025, 6, 1), &[], &[], &[]);
        assert_eq!(report.amortization, MoneyCents::ZERO);
        assert_eq!(report.residual_value, MoneyCents::new(2_000_000));
        assert_eq!(report.tco, MoneyCents::ZERO);
        assert_eq!(report.cost_per_km, MoneyCents::ZERO);
    }

    #[test]
    fn tco_sums_closed_history_and_insurance_share() {
        let v = vehicle(1_000_000, 2022, 10_000);
        let other = VehicleId::new();
        let missions = vec![
            closed_mission(v.id, at(2023, 3, 1), at(2023, 3, 2), 5_000, 300),
            closed_mission(other, at(2023, 3, 1), at(2023, 3, 2), 9_999, 300),
        ];
        let mut open = closed_maintenance(v.id, at(2024, 1, 1), at(2024, 1, 2), 7_000);
        open.status = MaintenanceStatus::Active;
        open.exited_at = None;
        let maintenances = vec![
            closed_maintenance(v.id, at(2023, 5, 1), at(2023, 5, 3), 20_000),
            open,
        ];
        let insurances = vec![policy(vec![v.id, other], at(2022, 1, 1), 60_000)];

        let report = tco(&v, at(2024, 6, 1), &maintenances, &missions, &insurances);

        assert_eq!(report.years_elapsed, 2);
        assert_eq!(report.amortization, MoneyCents::new(400_000));
        assert_eq!(report.maintenance_costs, MoneyCents::new(20_000));
        assert_eq!(report.mission_costs, MoneyCents::new(5_000));
        assert_eq!(report.insurance_costs, MoneyCents::new(30_000));
        assert_eq!(report.tco, MoneyCents::new(455_000));
        assert_eq!(report.cost_per_km, MoneyCents::new(46));
    }

    #[test]
    fn profitability_attributes_by_reference_year() {
        let v = vehicle(1_000_000, 2023, 0);
        let missions = vec![
            closed_mission(v.id, at(2024, 12, 30), at(2025, 1, 2), 40_000, 500),
            closed_mission(v.id, at(2024, 6, 1), at(2024, 6, 2), 10_000, 100),
        ];
        let maintenances = vec![closed_maintenance(
            v.id,
            at(2024, 12, 20),
            at(2025, 1, 5),
            15_000,
        )];
        let insurances = vec![policy(vec![v.id], at(2025, 1, 1), 5_000)];

        let report = profitability(&v, 2025, &maintenances, &missions, &insurances);

        assert_eq!(report.amortization, MoneyCents::new(200_000));
        assert_eq!(report.mission_costs, MoneyCents::new(40_000));
        assert_eq!(report.maintenance_costs, MoneyCents::new(15_000));
        assert_eq!(report.insurance_costs, MoneyCents::new(5_000));
        assert_eq!(report.distance_km, 500);
        assert_eq!(report.total_costs, MoneyCents::new(260_000));
        assert_eq!(report.cost_per_km, MoneyCents::new(520));
        assert_eq!(report.profitability_pct, 2.0);
    }

    #[test]
    fn profitability_charges_full_policy_to_each_vehicle() {
        let first = vehicle(1_000_000, 2023, 0);
        let second = vehicle(1_000_000, 2023, 0);
        let insurances = vec![policy(vec![first.id, second.id], at(2025, 2, 1), 60_000)];

        for v in [&first, &second] {
            let report = profitability(v, 2025, &[], &[], &insurances);
            assert_eq!(report.insurance_costs, MoneyCents::new(60_000));
        }
        let report = tco(&first, at(2025, 6, 1), &[], &[], &insurances);
        assert_eq!(report.insurance_costs, MoneyCents::new(30_000));
    }

    #[test]
    fn profitability_of_free_vehicle_is_zero() {
        let v = vehicle(0, 2024, 0);
        let report = profitability(&v, 2024, &[], &[], &[]);
        assert_eq!(report.profitability_pct, 0.0);
        assert_eq!(report.cost_per_km, MoneyCents::ZERO);
    }

    #[test]
    fn bilan_counts_records_touching_the_window() {
        let vehicle_id = VehicleId::new();
        let start = at(2025, 3, 1);
        let end = at(2025, 3, 31);
        let deposit = |when, cents| Movement {
            id: crate::MovementId::new(),
            account_id: crate::AccountId::new(),
            kind: MovementKind::Deposit,
            amount: MoneyCents::new(cents),
            occurred_at: when,
            recorded_at: when,
            description: None,
        };
        let mut withdrawal = deposit(at(2025, 3, 10), 7_000);
        withdrawal.kind = MovementKind::Withdrawal;
        let movements = vec![
            deposit(at(2025, 3, 5), 100_000),
            deposit(at(2025, 4, 5), 50_000),
            withdrawal,
        ];
        let missions = vec![
            // ends exactly on the window start
            closed_mission(vehicle_id, at(2025, 2, 20), start, 3_000, 10),
            // spans the whole window without a date inside it
            closed_mission(vehicle_id, at(2025, 2, 1), at(2025, 4, 30), 8_000, 10),
        ];
        let maintenances = vec![closed_maintenance(
            vehicle_id,
            at(2025, 3, 30),
            at(2025, 4, 2),
            12_000,
        )];
        let insurances = vec![policy(vec![vehicle_id], at(2024, 1, 1), 60_000)];

        let report = bilan(start, end, &movements, &missions, &maintenances, &insurances);

        assert_eq!(report.receipts, MoneyCents::new(100_000));
        assert_eq!(report.mission_costs, MoneyCents::new(3_000));
        assert_eq!(report.maintenance_costs, MoneyCents::new(12_000));
        assert_eq!(report.insurance_costs, MoneyCents::ZERO);
        assert_eq!(report.balance, MoneyCents::new(85_000));
    }

    #[test]
    fn monthly_buckets_and_budget() {
        let vehicle_id = VehicleId::new();
        let missions = vec![closed_mission(
            vehicle_id,
            at(2025, 1, 30),
            at(2025, 2, 2),
            4_000,
            10,
        )];
        let maintenances = vec![closed_maintenance(
            vehicle_id,
            at(2025, 2, 10),
            at(2025, 2, 11),
            1_000,
        )];
        let insurances = vec![policy(vec![vehicle_id], at(2025, 5, 1), 9_000)];

        let months = monthly_evolution(2025, &[], &missions, &maintenances);
        assert_eq!(months.len(), 12);
        assert_eq!(months[0].mission_costs, MoneyCents::ZERO);
        assert_eq!(months[1].mission_costs, MoneyCents::new(4_000));
        assert_eq!(months[1].balance, MoneyCents::new(-5_000));

        let budget = budget_breakdown(2025, &missions, &maintenances, &insurances);
        assert_eq!(budget.total, MoneyCents::new(14_000));
        assert_eq!(budget_breakdown(2024, &missions, &maintenances, &insurances).total, MoneyCents::ZERO);
    }
}
