use super::domain::{
    Customer, CustomerId, DeploymentTransaction, LineItemKey, Location, LocationId,
    MaintenanceId, MaintenanceLineItem, MaintenanceTransaction, Part, PartId, PaymentTransaction,
    PenaltyTransaction, PlateId, Record, RentalId, RentalPhase, RentalTransaction, Technician,
    TechnicianId, Vehicle, VehicleStatus,
};
use super::ids::payment_id_for;

/// Error enumeration for persistence failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("write rejected: {0}")]
    Rejected(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// CRUD contract every table satisfies. Deletion is always a soft status flip.
pub trait RecordStore<T: Record>: Send + Sync {
    fn fetch(&self, id: &T::Id) -> Result<Option<T>, RepositoryError>;

    fn list_including_inactive(&self) -> Result<Vec<T>, RepositoryError>;

    fn list(&self) -> Result<Vec<T>, RepositoryError> {
        Ok(self
            .list_including_inactive()?
            .into_iter()
            .filter(|record| record.is_active())
            .collect())
    }

    fn insert(&self, record: T) -> Result<T, RepositoryError>;

    fn update(&self, record: T) -> Result<(), RepositoryError>;

    fn deactivate(&self, id: &T::Id) -> Result<(), RepositoryError>;

    fn reactivate(&self, id: &T::Id) -> Result<(), RepositoryError>;
}

/// Runs `matches` over every stored row, inactive ones included.
fn select<T, S>(store: &S, matches: impl Fn(&T) -> bool) -> Result<Vec<T>, RepositoryError>
where
    T: Record,
    S: RecordStore<T> + ?Sized,
{
    Ok(store
        .list_including_inactive()?
        .into_iter()
        .filter(|record| matches(record))
        .collect())
}

pub trait VehicleRepository: RecordStore<Vehicle> {
    fn update_status(&self, plate_id: &PlateId, status: VehicleStatus)
        -> Result<(), RepositoryError>;

    fn by_status(&self, status: VehicleStatus) -> Result<Vec<Vehicle>, RepositoryError> {
        select(self, |vehicle: &Vehicle| vehicle.status == status)
    }
}

pub trait CustomerRepository: RecordStore<Customer> {}

pub trait LocationRepository: RecordStore<Location> {}

pub trait TechnicianRepository: RecordStore<Technician> {}

pub trait RentalRepository: RecordStore<RentalTransaction> {
    fn by_customer(&self, customer_id: &CustomerId) -> Result<Vec<RentalTransaction>, RepositoryError> {
        select(self, |rental: &RentalTransaction| &rental.customer_id == customer_id)
    }

    fn by_vehicle(&self, plate_id: &PlateId) -> Result<Vec<RentalTransaction>, RepositoryError> {
        select(self, |rental: &RentalTransaction| &rental.plate_id == plate_id)
    }

    fn by_location(&self, location_id: &LocationId) -> Result<Vec<RentalTransaction>, RepositoryError> {
        select(self, |rental: &RentalTransaction| &rental.location_id == location_id)
    }

    fn in_phase(&self, phase: RentalPhase) -> Result<Vec<RentalTransaction>, RepositoryError> {
        select(self, |rental: &RentalTransaction| rental.phase() == phase)
    }
}

pub trait PaymentRepository: RecordStore<PaymentTransaction> {
    /// The rental's own `PAY-<rental>` row, whether or not it has been deactivated. Falls back
    /// to the first row recorded against the rental when that row is missing.
    fn by_rental(&self, rental_id: &RentalId) -> Result<Option<PaymentTransaction>, RepositoryError> {
        if let Some(payment) = self.fetch(&payment_id_for(rental_id))? {
            return Ok(Some(payment));
        }
        Ok(select(self, |payment: &PaymentTransaction| &payment.rental_id == rental_id)?
            .into_iter()
            .next())
    }
}

pub trait MaintenanceRepository: RecordStore<MaintenanceTransaction> {
    fn by_vehicle(&self, plate_id: &PlateId) -> Result<Vec<MaintenanceTransaction>, RepositoryError> {
        select(self, |record: &MaintenanceTransaction| &record.plate_id == plate_id)
    }

    fn by_technician(
        &self,
        technician_id: &TechnicianId,
    ) -> Result<Vec<MaintenanceTransaction>, RepositoryError> {
        select(self, |record: &MaintenanceTransaction| {
            record.technician_id.as_ref() == Some(technician_id)
        })
    }

    fn in_progress(&self) -> Result<Vec<MaintenanceTransaction>, RepositoryError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(MaintenanceTransaction::is_in_progress)
            .collect())
    }
}

pub trait LineItemRepository: RecordStore<MaintenanceLineItem> {
    fn by_maintenance(
        &self,
        maintenance_id: &MaintenanceId,
        include_inactive: bool,
    ) -> Result<Vec<MaintenanceLineItem>, RepositoryError> {
        select(self, |item: &MaintenanceLineItem| {
            &item.maintenance_id == maintenance_id && (include_inactive || item.is_active())
        })
    }

    fn fetch_item(
        &self,
        maintenance_id: &MaintenanceId,
        part_id: &PartId,
    ) -> Result<Option<MaintenanceLineItem>, RepositoryError> {
        self.fetch(&LineItemKey {
            maintenance_id: maintenance_id.clone(),
            part_id: part_id.clone(),
        })
    }
}

pub trait PartRepository: RecordStore<Part> {
    /// Must reject, leaving stock untouched, when `quantity` exceeds what is on hand.
    fn decrement_quantity(&self, part_id: &PartId, quantity: u32) -> Result<(), RepositoryError>;

    fn increment_quantity(&self, part_id: &PartId, quantity: u32) -> Result<(), RepositoryError>;
}

pub trait PenaltyRepository: RecordStore<PenaltyTransaction> {
    fn by_rental(&self, rental_id: &RentalId) -> Result<Vec<PenaltyTransaction>, RepositoryError> {
        select(self, |penalty: &PenaltyTransaction| &penalty.rental_id == rental_id)
    }

    fn by_maintenance(
        &self,
        maintenance_id: &MaintenanceId,
    ) -> Result<Vec<PenaltyTransaction>, RepositoryError> {
        select(self, |penalty: &PenaltyTransaction| {
            &penalty.maintenance_id == maintenance_id
        })
    }

    fn unpaid(&self) -> Result<Vec<PenaltyTransaction>, RepositoryError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|penalty| !penalty.is_paid())
            .collect())
    }
}

pub trait DeploymentRepository: RecordStore<DeploymentTransaction> {
    fn by_vehicle(&self, plate_id: &PlateId) -> Result<Vec<DeploymentTransaction>, RepositoryError> {
        select(self, |deployment: &DeploymentTransaction| &deployment.plate_id == plate_id)
    }

    fn by_location(
        &self,
        location_id: &LocationId,
    ) -> Result<Vec<DeploymentTransaction>, RepositoryError> {
        select(self, |deployment: &DeploymentTransaction| {
            &deployment.location_id == location_id
        })
    }

    fn current_for_vehicle(
        &self,
        plate_id: &PlateId,
    ) -> Result<Option<DeploymentTransaction>, RepositoryError> {
        Ok(self
            .by_vehicle(plate_id)?
            .into_iter()
            .find(DeploymentTransaction::is_current))
    }
}

/// Aggregate persistence port handed to the services.
///
/// `atomically` is not reentrant: services open one unit of work per public operation and
/// call the unwrapped internals of collaborating services from inside it.
pub trait FleetStore: Send + Sync + 'static {
    fn vehicles(&self) -> &dyn VehicleRepository;
    fn customers(&self) -> &dyn CustomerRepository;
    fn locations(&self) -> &dyn LocationRepository;
    fn rentals(&self) -> &dyn RentalRepository;
    fn payments(&self) -> &dyn PaymentRepository;
    fn maintenance(&self) -> &dyn MaintenanceRepository;
    fn line_items(&self) -> &dyn LineItemRepository;
    fn parts(&self) -> &dyn PartRepository;
    fn technicians(&self) -> &dyn TechnicianRepository;
    fn penalties(&self) -> &dyn PenaltyRepository;
    fn deployments(&self) -> &dyn DeploymentRepository;

    /// Every write made by `work` lands, or none does when it returns `Err`.
    fn atomically<T, E, F>(&self, work: F) -> Result<T, E>
    where
        Self: Sized,
        F: FnOnce() -> Result<T, E>;
}
