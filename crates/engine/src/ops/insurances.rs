use std::collections::HashMap;

use sea_orm::{ActiveValue, ConnectionTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use tracing::info;

use crate::{
    EngineError, Insurance, InsuranceId, NewInsurance, ResultEngine, VehicleId,
    insurance_coverages, insurances, util::ensure_not_negative,
};

use super::{Engine, normalize_required_text, vehicles::load_vehicle, with_tx};

impl Engine {
    /// Register an insurance policy covering one or more vehicles.
    pub async fn new_insurance(&self, input: NewInsurance) -> ResultEngine<InsuranceId> {
        let policy_number = normalize_required_text(&input.policy_number, "policy number")?;
        ensure_not_negative(input.annual_cost, "annual cost")?;
        if let Some(ends_at) = input.ends_at
            && ends_at < input.starts_at
        {
            return Err(EngineError::Validation(
                "coverage end must not precede its start".to_string(),
            ));
        }
        let mut vehicle_ids = input.vehicle_ids;
        vehicle_ids.sort();
        vehicle_ids.dedup();
        if vehicle_ids.is_empty() {
            return Err(EngineError::Validation(
                "a policy must cover at least one vehicle".to_string(),
            ));
        }

        with_tx!(self, |db_tx| {
            let exists = insurances::Entity::find()
                .filter(insurances::Column::PolicyNumber.eq(policy_number.clone()))
                .one(&db_tx)
                .await?
                .is_some();
            if exists {
                return Err(EngineError::AlreadyExists(policy_number));
            }
            for vehicle_id in &vehicle_ids {
                load_vehicle(&db_tx, *vehicle_id).await?;
            }

            let insurance = Insurance {
                id: InsuranceId::new(),
                policy_number,
                starts_at: input.starts_at,
                ends_at: input.ends_at,
                annual_cost: input.annual_cost,
                vehicle_ids,
            };
            insurances::ActiveModel::from(&insurance)
                .insert(&db_tx)
                .await?;
            for vehicle_id in &insurance.vehicle_ids {
                insurance_coverages::ActiveModel {
                    insurance_id: ActiveValue::Set(insurance.id.to_string()),
                    vehicle_id: ActiveValue::Set(vehicle_id.to_string()),
                }
                .insert(&db_tx)
                .await?;
            }

            info!(
                insurance = %insurance.id,
                vehicles = insurance.vehicle_ids.len(),
                "insurance registered"
            );
            Ok(insurance.id)
        })
    }

    pub async fn insurance(&self, insurance_id: InsuranceId) -> ResultEngine<Insurance> {
        load_insurances(&self.database)
            .await?
            .into_iter()
            .find(|i| i.id == insurance_id)
            .ok_or_else(|| EngineError::NotFound(format!("insurance {insurance_id}")))
    }

    /// Policies covering a vehicle.
    pub async fn insurances_for_vehicle(
        &self,
        vehicle_id: VehicleId,
    ) -> ResultEngine<Vec<Insurance>> {
        load_vehicle(&self.database, vehicle_id).await?;
        Ok(load_insurances(&self.database)
            .await?
            .into_iter()
            .filter(|i| i.vehicle_ids.contains(&vehicle_id))
            .collect())
    }
}

/// Every policy with its covered vehicles, by coverage start.
pub(super) async fn load_insurances<C: ConnectionTrait>(db: &C) -> ResultEngine<Vec<Insurance>> {
    let mut covered: HashMap<String, Vec<VehicleId>> = HashMap::new();
    for coverage in insurance_coverages::Entity::find().all(db).await? {
        covered
            .entry(coverage.insurance_id)
            .or_default()
            .push(VehicleId::parse_stored(&coverage.vehicle_id)?);
    }

    insurances::Entity::find()
        .order_by_asc(insurances::Column::StartsAt)
        .all(db)
        .await?
        .into_iter()
        .map(|model| {
            let mut vehicle_ids = covered.remove(&model.id).unwrap_or_default();
            vehicle_ids.sort();
            Insurance::try_from((model, vehicle_ids))
        })
        .collect()
}
