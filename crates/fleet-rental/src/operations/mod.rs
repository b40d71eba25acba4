//! Rental, payment, maintenance, penalty and deployment workflows.
//!
//! Services are stateless coordinators over a shared [`FleetStore`]. Every public mutation
//! runs as a single unit of work, so a rejected guard or failed write leaves no partial state.

pub mod clock;
pub mod deployment;
pub mod domain;
pub mod error;
pub mod ids;
pub mod maintenance;
pub mod memory;
pub mod money;
pub mod payment;
pub mod penalty;
pub mod rental;
pub mod repository;
pub mod router;

#[cfg(test)]
mod tests;

use std::sync::Arc;

pub use clock::{Clock, SystemClock};
pub use deployment::DeploymentService;
pub use domain::{
    Customer, CustomerId, DeploymentId, DeploymentStatus, DeploymentTransaction, LineItemKey,
    Location, LocationId, MaintenanceId, MaintenanceLineItem, MaintenanceTransaction, Part,
    PartId, PaymentId, PaymentTransaction, PenaltyId, PenaltyStatus, PenaltyTransaction, PlateId,
    Record, RecordStatus, RentalId, RentalPhase, RentalTransaction, SpecializationId, Technician,
    TechnicianId, UnknownStatus, Vehicle, VehicleStatus,
};
pub use error::FleetError;
pub use maintenance::{CostBreakdown, MaintenanceService, PartUsage, ScheduleMaintenance};
pub use memory::{seed_demo_fleet, InMemoryFleetStore, MemoryTable};
pub use payment::{rental_fee, PaymentService, MINIMUM_BILLABLE_HOURS};
pub use penalty::PenaltyService;
pub use rental::RentalService;
pub use repository::{FleetStore, RecordStore, RepositoryError};
pub use router::fleet_router;

/// All five services wired to one store and one clock.
pub struct FleetServices<S> {
    store: Arc<S>,
    pub rentals: RentalService<S>,
    pub payments: PaymentService<S>,
    pub maintenance: MaintenanceService<S>,
    pub penalties: PenaltyService<S>,
    pub deployments: DeploymentService<S>,
}

impl<S> FleetServices<S>
where
    S: FleetStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            rentals: RentalService::with_clock(store.clone(), clock.clone()),
            payments: PaymentService::with_clock(store.clone(), clock.clone()),
            maintenance: MaintenanceService::with_clock(store.clone(), clock.clone()),
            penalties: PenaltyService::with_clock(store.clone(), clock.clone()),
            deployments: DeploymentService::with_clock(store.clone(), clock),
            store,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}
