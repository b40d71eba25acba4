use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use tracing::{info, warn};

use super::clock::{Clock, SystemClock};
use super::domain::{
    MaintenanceId, PenaltyId, PenaltyStatus, PenaltyTransaction, RecordStatus, RentalId,
};
use super::error::FleetError;
use super::ids::PENALTY_IDS;
use super::maintenance::MaintenanceService;
use super::repository::FleetStore;

/// Damage penalties charged to a rental, priced from the repair they triggered.
pub struct PenaltyService<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    maintenance: MaintenanceService<S>,
}

impl<S> PenaltyService<S>
where
    S: FleetStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        let maintenance = MaintenanceService::with_clock(store.clone(), clock.clone());
        Self {
            store,
            clock,
            maintenance,
        }
    }

    /// Stored job total when one has been recorded, otherwise a fresh computation.
    /// Never writes the computed value back.
    pub fn get_maintenance_cost(&self, maintenance_id: &MaintenanceId) -> Result<Decimal, FleetError> {
        let record = self.maintenance.maintenance(maintenance_id)?;
        if record.total_cost > Decimal::ZERO {
            return Ok(record.total_cost);
        }
        Ok(self.maintenance.calculate_total_cost(maintenance_id)?.total)
    }

    /// Issue an `UNPAID` penalty equal to the cost of the repair.
    pub fn create_penalty_from_maintenance(
        &self,
        penalty_id: Option<PenaltyId>,
        rental_id: &RentalId,
        maintenance_id: &MaintenanceId,
        date_issued: NaiveDate,
    ) -> Result<PenaltyTransaction, FleetError> {
        self.store
            .atomically(|| {
                if self.store.rentals().fetch(rental_id)?.is_none() {
                    return Err(FleetError::not_found("rental", rental_id));
                }
                let total_penalty = self.get_maintenance_cost(maintenance_id)?;
                if total_penalty <= Decimal::ZERO {
                    return Err(FleetError::validation(format!(
                        "maintenance {maintenance_id} has no billable cost"
                    )));
                }

                let penalty_id = match penalty_id {
                    Some(id) => id,
                    None => self.next_penalty_id(),
                };
                let penalty = self.store.penalties().insert(PenaltyTransaction {
                    penalty_id,
                    rental_id: rental_id.clone(),
                    maintenance_id: maintenance_id.clone(),
                    total_penalty,
                    penalty_status: PenaltyStatus::Unpaid,
                    date_issued,
                    status: RecordStatus::Active,
                })?;
                Ok(penalty)
            })
            .inspect(|penalty| {
                info!(
                    penalty_id = %penalty.penalty_id,
                    %rental_id,
                    %maintenance_id,
                    amount = %penalty.total_penalty,
                    "penalty issued"
                )
            })
            .inspect_err(|err| warn!(%rental_id, %maintenance_id, error = %err, "penalty rejected"))
    }

    /// Soft-delete an outstanding penalty. Settled penalties cannot be withdrawn.
    pub fn cancel_penalty(&self, penalty_id: &PenaltyId) -> Result<PenaltyTransaction, FleetError> {
        self.store
            .atomically(|| {
                let mut penalty = self.fetch_penalty(penalty_id)?;
                if penalty.status == RecordStatus::Inactive {
                    return Err(FleetError::invalid_state(format!(
                        "penalty {penalty_id} is already cancelled"
                    )));
                }
                if penalty.is_paid() {
                    return Err(FleetError::invalid_state(format!(
                        "penalty {penalty_id} has already been paid"
                    )));
                }
                self.store.penalties().deactivate(penalty_id)?;
                penalty.status = RecordStatus::Inactive;
                Ok(penalty)
            })
            .inspect(|_| info!(%penalty_id, "penalty cancelled"))
            .inspect_err(|err| warn!(%penalty_id, error = %err, "penalty cancellation rejected"))
    }

    pub fn update_penalty_payment(
        &self,
        penalty_id: &PenaltyId,
        penalty_status: PenaltyStatus,
    ) -> Result<PenaltyTransaction, FleetError> {
        self.store
            .atomically(|| {
                let mut penalty = self.fetch_penalty(penalty_id)?;
                if penalty.status == RecordStatus::Inactive {
                    return Err(FleetError::invalid_state(format!(
                        "penalty {penalty_id} is cancelled"
                    )));
                }
                penalty.penalty_status = penalty_status;
                self.store.penalties().update(penalty.clone())?;
                Ok(penalty)
            })
            .inspect(|penalty| {
                info!(%penalty_id, status = penalty.penalty_status.label(), "penalty payment updated")
            })
            .inspect_err(|err| warn!(%penalty_id, error = %err, "penalty payment update rejected"))
    }

    pub fn mark_penalty_paid(&self, penalty_id: &PenaltyId) -> Result<PenaltyTransaction, FleetError> {
        self.update_penalty_payment(penalty_id, PenaltyStatus::Paid)
    }

    pub fn penalty(&self, penalty_id: &PenaltyId) -> Result<PenaltyTransaction, FleetError> {
        self.fetch_penalty(penalty_id)
    }

    pub fn penalties_for_rental(
        &self,
        rental_id: &RentalId,
    ) -> Result<Vec<PenaltyTransaction>, FleetError> {
        Ok(self.store.penalties().by_rental(rental_id)?)
    }

    pub fn penalties_for_maintenance(
        &self,
        maintenance_id: &MaintenanceId,
    ) -> Result<Vec<PenaltyTransaction>, FleetError> {
        Ok(self.store.penalties().by_maintenance(maintenance_id)?)
    }

    pub fn unpaid_penalties(&self) -> Result<Vec<PenaltyTransaction>, FleetError> {
        Ok(self.store.penalties().unpaid()?)
    }

    fn fetch_penalty(&self, penalty_id: &PenaltyId) -> Result<PenaltyTransaction, FleetError> {
        self.store
            .penalties()
            .fetch(penalty_id)?
            .ok_or_else(|| FleetError::not_found("penalty", penalty_id))
    }

    fn next_penalty_id(&self) -> PenaltyId {
        let scan = self.store.penalties().list_including_inactive().map(|penalties| {
            penalties
                .into_iter()
                .map(|penalty| penalty.penalty_id.0)
                .collect()
        });
        PenaltyId::new(PENALTY_IDS.allocate(scan, self.clock.now()))
    }
}
