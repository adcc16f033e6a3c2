//! Read-only cost aggregation. Nothing here opens a transaction.

use chrono::{DateTime, Utc};

use crate::{
    Bilan, BudgetBreakdown, FleetTco, MonthlyBilan, MovementKind, ResultEngine, TcoReport,
    VehicleId, VehicleProfitability, costs, util::ensure_window,
};

use super::{
    Engine,
    accounts::load_movements,
    insurances::load_insurances,
    maintenances::load_maintenances,
    missions::load_missions,
    vehicles::{load_vehicle, load_vehicles},
};

impl Engine {
    /// Total cost of ownership of a vehicle today.
    pub async fn compute_tco(&self, vehicle_id: VehicleId) -> ResultEngine<TcoReport> {
        self.compute_tco_at(vehicle_id, Utc::now()).await
    }

    pub async fn compute_tco_at(
        &self,
        vehicle_id: VehicleId,
        as_of: DateTime<Utc>,
    ) -> ResultEngine<TcoReport> {
        let vehicle = load_vehicle(&self.database, vehicle_id).await?;
        let maintenances = load_maintenances(&self.database).await?;
        let missions = load_missions(&self.database).await?;
        let insurances = load_insurances(&self.database).await?;
        Ok(costs::tco(&vehicle, as_of, &maintenances, &missions, &insurances))
    }

    /// TCO of every vehicle plus fleet totals.
    pub async fn fleet_tco(&self, as_of: DateTime<Utc>) -> ResultEngine<FleetTco> {
        let vehicles = load_vehicles(&self.database).await?;
        let maintenances = load_maintenances(&self.database).await?;
        let missions = load_missions(&self.database).await?;
        let insurances = load_insurances(&self.database).await?;
        let reports = vehicles
            .iter()
            .map(|v| costs::tco(v, as_of, &maintenances, &missions, &insurances))
            .collect();
        Ok(costs::fleet_tco(as_of, reports))
    }

    /// Per-vehicle yearly costs and profitability.
    pub async fn compute_profitability(
        &self,
        year: i32,
    ) -> ResultEngine<Vec<VehicleProfitability>> {
        let vehicles = load_vehicles(&self.database).await?;
        let maintenances = load_maintenances(&self.database).await?;
        let missions = load_missions(&self.database).await?;
        let insurances = load_insurances(&self.database).await?;
        Ok(vehicles
            .iter()
            .map(|v| costs::profitability(v, year, &maintenances, &missions, &insurances))
            .collect())
    }

    /// Receipts against costs over `[start, end]`.
    pub async fn period_bilan(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ResultEngine<Bilan> {
        ensure_window(start, end)?;
        let deposits: Vec<_> = load_movements(&self.database)
            .await?
            .into_iter()
            .filter(|m| m.kind == MovementKind::Deposit)
            .collect();
        let missions = load_missions(&self.database).await?;
        let maintenances = load_maintenances(&self.database).await?;
        let insurances = load_insurances(&self.database).await?;
        Ok(costs::bilan(
            start,
            end,
            &deposits,
            &missions,
            &maintenances,
            &insurances,
        ))
    }

    pub async fn monthly_evolution(&self, year: i32) -> ResultEngine<Vec<MonthlyBilan>> {
        let movements = load_movements(&self.database).await?;
        let missions = load_missions(&self.database).await?;
        let maintenances = load_maintenances(&self.database).await?;
        Ok(costs::monthly_evolution(
            year,
            &movements,
            &missions,
            &maintenances,
        ))
    }

    pub async fn budget_breakdown(&self, year: i32) -> ResultEngine<BudgetBreakdown> {
        let missions = load_missions(&self.database).await?;
        let maintenances = load_maintenances(&self.database).await?;
        let insurances = load_insurances(&self.database).await?;
        Ok(costs::budget_breakdown(
            year,
            &missions,
            &maintenances,
            &insurances,
        ))
    }
}
