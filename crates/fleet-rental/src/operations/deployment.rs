use std::sync::Arc;

use tracing::{info, warn};

use super::clock::{Clock, SystemClock};
use super::domain::{
    DeploymentId, DeploymentStatus, DeploymentTransaction, LocationId, PlateId, RecordStatus,
    VehicleStatus,
};
use super::error::FleetError;
use super::ids::DEPLOYMENT_IDS;
use super::repository::FleetStore;

/// Tracks which branch a vehicle is stationed at as open-ended date intervals.
pub struct DeploymentService<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> DeploymentService<S>
where
    S: FleetStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Station a vehicle at `location_id`, closing its current interval elsewhere.
    pub fn deploy_vehicle(
        &self,
        plate_id: &PlateId,
        location_id: &LocationId,
    ) -> Result<DeploymentTransaction, FleetError> {
        self.store
            .atomically(|| {
                let vehicle = self
                    .store
                    .vehicles()
                    .fetch(plate_id)?
                    .ok_or_else(|| FleetError::not_found("vehicle", plate_id))?;
                if vehicle.status == VehicleStatus::Inactive {
                    return Err(FleetError::invalid_state(format!("vehicle {plate_id} is inactive")));
                }
                let location = self
                    .store
                    .locations()
                    .fetch(location_id)?
                    .ok_or_else(|| FleetError::not_found("location", location_id))?;
                if location.status != RecordStatus::Active {
                    return Err(FleetError::invalid_state(format!(
                        "location {location_id} is inactive"
                    )));
                }

                let today = self.clock.today();
                if let Some(mut current) = self.store.deployments().current_for_vehicle(plate_id)? {
                    if &current.location_id == location_id {
                        return Err(FleetError::invalid_state(format!(
                            "vehicle {plate_id} is already deployed at {location_id}"
                        )));
                    }
                    current.end_date = Some(today);
                    current.status = DeploymentStatus::Completed;
                    self.store.deployments().update(current.clone())?;
                    info!(deployment_id = %current.deployment_id, %plate_id, from = %current.location_id, "previous deployment closed");
                }

                let deployment = self.store.deployments().insert(DeploymentTransaction {
                    deployment_id: self.next_deployment_id(),
                    plate_id: plate_id.clone(),
                    location_id: location_id.clone(),
                    start_date: today,
                    end_date: None,
                    status: DeploymentStatus::Active,
                })?;
                Ok(deployment)
            })
            .inspect(|deployment| {
                info!(deployment_id = %deployment.deployment_id, %plate_id, %location_id, "vehicle deployed")
            })
            .inspect_err(|err| warn!(%plate_id, %location_id, error = %err, "deployment rejected"))
    }

    /// Close an open deployment as of today.
    pub fn complete_deployment(
        &self,
        deployment_id: &DeploymentId,
    ) -> Result<DeploymentTransaction, FleetError> {
        self.store
            .atomically(|| {
                let mut deployment = self.fetch_open_deployment(deployment_id)?;
                deployment.end_date = Some(self.clock.today());
                deployment.status = DeploymentStatus::Completed;
                self.store.deployments().update(deployment.clone())?;
                Ok(deployment)
            })
            .inspect(|_| info!(%deployment_id, "deployment completed"))
            .inspect_err(|err| warn!(%deployment_id, error = %err, "deployment completion rejected"))
    }

    /// Soft-cancel an open deployment; the row is kept with status `Cancelled`.
    pub fn cancel_deployment(
        &self,
        deployment_id: &DeploymentId,
    ) -> Result<DeploymentTransaction, FleetError> {
        self.store
            .atomically(|| {
                let mut deployment = self.fetch_open_deployment(deployment_id)?;
                self.store.deployments().deactivate(deployment_id)?;
                deployment.status = DeploymentStatus::Cancelled;
                Ok(deployment)
            })
            .inspect(|_| info!(%deployment_id, "deployment cancelled"))
            .inspect_err(|err| warn!(%deployment_id, error = %err, "deployment cancellation rejected"))
    }

    pub fn deployment(&self, deployment_id: &DeploymentId) -> Result<DeploymentTransaction, FleetError> {
        self.fetch_deployment(deployment_id)
    }

    pub fn current_deployment(
        &self,
        plate_id: &PlateId,
    ) -> Result<Option<DeploymentTransaction>, FleetError> {
        Ok(self.store.deployments().current_for_vehicle(plate_id)?)
    }

    /// Vehicles currently stationed at a branch.
    pub fn deployments_at_location(
        &self,
        location_id: &LocationId,
    ) -> Result<Vec<DeploymentTransaction>, FleetError> {
        Ok(self
            .store
            .deployments()
            .by_location(location_id)?
            .into_iter()
            .filter(DeploymentTransaction::is_current)
            .collect())
    }

    /// Every interval a vehicle has spent at any branch, oldest first.
    pub fn deployment_history(
        &self,
        plate_id: &PlateId,
    ) -> Result<Vec<DeploymentTransaction>, FleetError> {
        let mut history = self.store.deployments().by_vehicle(plate_id)?;
        history.sort_by(|left, right| {
            left.start_date
                .cmp(&right.start_date)
                .then_with(|| left.deployment_id.cmp(&right.deployment_id))
        });
        Ok(history)
    }

    fn fetch_deployment(&self, deployment_id: &DeploymentId) -> Result<DeploymentTransaction, FleetError> {
        self.store
            .deployments()
            .fetch(deployment_id)?
            .ok_or_else(|| FleetError::not_found("deployment", deployment_id))
    }

    fn fetch_open_deployment(
        &self,
        deployment_id: &DeploymentId,
    ) -> Result<DeploymentTransaction, FleetError> {
        let deployment = self.fetch_deployment(deployment_id)?;
        if !deployment.is_current() {
            return Err(FleetError::invalid_state(format!(
                "deployment {deployment_id} is already {}",
                deployment.status.label()
            )));
        }
        Ok(deployment)
    }

    fn next_deployment_id(&self) -> DeploymentId {
        let scan = self.store.deployments().list_including_inactive().map(|deployments| {
            deployments
                .into_iter()
                .map(|deployment| deployment.deployment_id.0)
                .collect()
        });
        DeploymentId::new(DEPLOYMENT_IDS.allocate(scan, self.clock.now()))
    }
}
