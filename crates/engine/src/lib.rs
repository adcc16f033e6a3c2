//! Domain core of the cooperative fleet.
//!
//! The [`Engine`] coordinates vehicle availability with the mission and
//! maintenance lifecycles, keeps member account balances consistent with
//! their movement history and aggregates costs over the resulting records.
//!
//! Every state-changing operation runs inside a single database transaction.

pub use accounts::{AccountKind, MemberAccount, NewAccount};
pub use costs::{
    Bilan, BudgetBreakdown, FleetTco, MonthlyBilan, TcoReport, VehicleProfitability,
};
pub use error::EngineError;
pub use ids::{AccountId, ExpenseId, InsuranceId, MaintenanceId, MissionId, MovementId, VehicleId};
pub use insurances::{Insurance, NewInsurance};
pub use maintenances::{Maintenance, MaintenanceCategory, MaintenanceStatus, NewMaintenance};
pub use mission_expenses::{ExpenseNature, MissionExpense, NewExpense};
pub use missions::{Mission, MissionStatus, NewMission};
pub use money::MoneyCents;
pub use movements::{Movement, MovementKind};
pub use ops::{BalanceCheck, Engine, EngineBuilder, KindTotals, MonthlyMovementTotals};
pub use vehicles::{NewVehicle, Vehicle, VehicleState};

mod accounts;
pub mod costs;
mod error;
mod ids;
mod insurance_coverages;
mod insurances;
mod maintenances;
mod mission_expenses;
mod missions;
mod money;
mod movements;
mod ops;
mod util;
mod vehicles;

type ResultEngine<T> = Result<T, EngineError>;
