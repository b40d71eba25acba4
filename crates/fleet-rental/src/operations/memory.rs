use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::domain::{
    Customer, CustomerId, DeploymentId, DeploymentStatus, DeploymentTransaction, LineItemKey,
    Location, LocationId, MaintenanceId, MaintenanceLineItem, MaintenanceTransaction, Part,
    PartId, PaymentId, PaymentTransaction, PenaltyId, PenaltyTransaction, PlateId, Record,
    RecordStatus, RentalId, RentalTransaction, SpecializationId, Technician, TechnicianId,
    Vehicle, VehicleStatus,
};
use super::repository::{
    CustomerRepository, DeploymentRepository, FleetStore, LineItemRepository, LocationRepository,
    MaintenanceRepository, PartRepository, PaymentRepository, PenaltyRepository, RecordStore,
    RentalRepository, RepositoryError, TechnicianRepository, VehicleRepository,
};

/// Ordered, mutex-guarded table keyed by the record's primary key.
pub struct MemoryTable<T: Record> {
    rows: Arc<Mutex<BTreeMap<T::Id, T>>>,
}

impl<T: Record> Default for MemoryTable<T> {
    fn default() -> Self {
        Self {
            rows: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }
}

impl<T: Record> Clone for MemoryTable<T> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
        }
    }
}

impl<T: Record> MemoryTable<T> {
    fn rows(&self) -> Result<MutexGuard<'_, BTreeMap<T::Id, T>>, RepositoryError> {
        self.rows
            .lock()
            .map_err(|_| RepositoryError::Unavailable(format!("{} table lock poisoned", T::ENTITY)))
    }

    /// Apply `change` to a single row while holding the table lock.
    fn modify<F>(&self, id: &T::Id, change: F) -> Result<(), RepositoryError>
    where
        F: FnOnce(&mut T) -> Result<(), RepositoryError>,
    {
        let mut rows = self.rows()?;
        let row = rows.get_mut(id).ok_or(RepositoryError::NotFound)?;
        change(row)
    }

    fn snapshot(&self) -> BTreeMap<T::Id, T> {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn restore(&self, rows: BTreeMap<T::Id, T>) {
        *self.rows.lock().unwrap_or_else(PoisonError::into_inner) = rows;
    }
}

impl<T: Record> RecordStore<T> for MemoryTable<T> {
    fn fetch(&self, id: &T::Id) -> Result<Option<T>, RepositoryError> {
        Ok(self.rows()?.get(id).cloned())
    }

    fn list_including_inactive(&self) -> Result<Vec<T>, RepositoryError> {
        Ok(self.rows()?.values().cloned().collect())
    }

    fn insert(&self, record: T) -> Result<T, RepositoryError> {
        let mut rows = self.rows()?;
        let id = record.id();
        if rows.contains_key(&id) {
            return Err(RepositoryError::Conflict);
        }
        rows.insert(id, record.clone());
        Ok(record)
    }

    fn update(&self, record: T) -> Result<(), RepositoryError> {
        let mut rows = self.rows()?;
        match rows.get_mut(&record.id()) {
            Some(row) => {
                *row = record;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn deactivate(&self, id: &T::Id) -> Result<(), RepositoryError> {
        self.modify(id, |row| {
            row.set_active(false);
            Ok(())
        })
    }

    fn reactivate(&self, id: &T::Id) -> Result<(), RepositoryError> {
        self.modify(id, |row| {
            row.set_active(true);
            Ok(())
        })
    }
}

impl VehicleRepository for MemoryTable<Vehicle> {
    fn update_status(&self, plate_id: &PlateId, status: VehicleStatus) -> Result<(), RepositoryError> {
        self.modify(plate_id, |vehicle| {
            vehicle.status = status;
            Ok(())
        })
    }
}

impl PartRepository for MemoryTable<Part> {
    fn decrement_quantity(&self, part_id: &PartId, quantity: u32) -> Result<(), RepositoryError> {
        self.modify(part_id, |part| {
            let remaining = part.quantity.checked_sub(quantity).ok_or_else(|| {
                RepositoryError::Rejected(format!(
                    "part {} has {} on hand, {} requested",
                    part.part_id, part.quantity, quantity
                ))
            })?;
            part.quantity = remaining;
            Ok(())
        })
    }

    fn increment_quantity(&self, part_id: &PartId, quantity: u32) -> Result<(), RepositoryError> {
        self.modify(part_id, |part| {
            let restocked = part.quantity.checked_add(quantity).ok_or_else(|| {
                RepositoryError::Rejected(format!("part {} quantity overflow", part.part_id))
            })?;
            part.quantity = restocked;
            Ok(())
        })
    }
}

impl CustomerRepository for MemoryTable<Customer> {}
impl LocationRepository for MemoryTable<Location> {}
impl TechnicianRepository for MemoryTable<Technician> {}
impl RentalRepository for MemoryTable<RentalTransaction> {}
impl PaymentRepository for MemoryTable<PaymentTransaction> {}
impl MaintenanceRepository for MemoryTable<MaintenanceTransaction> {}
impl LineItemRepository for MemoryTable<MaintenanceLineItem> {}
impl PenaltyRepository for MemoryTable<PenaltyTransaction> {}
impl DeploymentRepository for MemoryTable<DeploymentTransaction> {}

/// Process-local fleet store. Transactions snapshot every table and restore on failure.
#[derive(Default)]
pub struct InMemoryFleetStore {
    vehicles: MemoryTable<Vehicle>,
    customers: MemoryTable<Customer>,
    locations: MemoryTable<Location>,
    rentals: MemoryTable<RentalTransaction>,
    payments: MemoryTable<PaymentTransaction>,
    maintenance: MemoryTable<MaintenanceTransaction>,
    line_items: MemoryTable<MaintenanceLineItem>,
    parts: MemoryTable<Part>,
    technicians: MemoryTable<Technician>,
    penalties: MemoryTable<PenaltyTransaction>,
    deployments: MemoryTable<DeploymentTransaction>,
    transaction_gate: Mutex<()>,
}

struct Snapshot {
    vehicles: BTreeMap<PlateId, Vehicle>,
    customers: BTreeMap<CustomerId, Customer>,
    locations: BTreeMap<LocationId, Location>,
    rentals: BTreeMap<RentalId, RentalTransaction>,
    payments: BTreeMap<PaymentId, PaymentTransaction>,
    maintenance: BTreeMap<MaintenanceId, MaintenanceTransaction>,
    line_items: BTreeMap<LineItemKey, MaintenanceLineItem>,
    parts: BTreeMap<PartId, Part>,
    technicians: BTreeMap<TechnicianId, Technician>,
    penalties: BTreeMap<PenaltyId, PenaltyTransaction>,
    deployments: BTreeMap<DeploymentId, DeploymentTransaction>,
}

impl InMemoryFleetStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            vehicles: self.vehicles.snapshot(),
            customers: self.customers.snapshot(),
            locations: self.locations.snapshot(),
            rentals: self.rentals.snapshot(),
            payments: self.payments.snapshot(),
            maintenance: self.maintenance.snapshot(),
            line_items: self.line_items.snapshot(),
            parts: self.parts.snapshot(),
            technicians: self.technicians.snapshot(),
            penalties: self.penalties.snapshot(),
            deployments: self.deployments.snapshot(),
        }
    }

    fn restore(&self, snapshot: Snapshot) {
        self.vehicles.restore(snapshot.vehicles);
        self.customers.restore(snapshot.customers);
        self.locations.restore(snapshot.locations);
        self.rentals.restore(snapshot.rentals);
        self.payments.restore(snapshot.payments);
        self.maintenance.restore(snapshot.maintenance);
        self.line_items.restore(snapshot.line_items);
        self.parts.restore(snapshot.parts);
        self.technicians.restore(snapshot.technicians);
        self.penalties.restore(snapshot.penalties);
        self.deployments.restore(snapshot.deployments);
    }
}

impl FleetStore for InMemoryFleetStore {
    fn vehicles(&self) -> &dyn VehicleRepository {
        &self.vehicles
    }

    fn customers(&self) -> &dyn CustomerRepository {
        &self.customers
    }

    fn locations(&self) -> &dyn LocationRepository {
        &self.locations
    }

    fn rentals(&self) -> &dyn RentalRepository {
        &self.rentals
    }

    fn payments(&self) -> &dyn PaymentRepository {
        &self.payments
    }

    fn maintenance(&self) -> &dyn MaintenanceRepository {
        &self.maintenance
    }

    fn line_items(&self) -> &dyn LineItemRepository {
        &self.line_items
    }

    fn parts(&self) -> &dyn PartRepository {
        &self.parts
    }

    fn technicians(&self) -> &dyn TechnicianRepository {
        &self.technicians
    }

    fn penalties(&self) -> &dyn PenaltyRepository {
        &self.penalties
    }

    fn deployments(&self) -> &dyn DeploymentRepository {
        &self.deployments
    }

    fn atomically<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let _gate = self
            .transaction_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let snapshot = self.snapshot();
        let outcome = work();
        if outcome.is_err() {
            self.restore(snapshot);
        }
        outcome
    }
}

/// Load a small branch network, fleet, workshop and customer roster.
pub fn seed_demo_fleet(store: &InMemoryFleetStore) -> Result<(), RepositoryError> {
    let vehicles = [
        ("ES-001", "E-Scooter", 50),
        ("ES-002", "E-Scooter", 50),
        ("EB-001", "E-Bike", 120),
        ("EC-001", "E-Car", 1_500),
    ];
    for (plate, vehicle_type, rate) in vehicles {
        store.vehicles().insert(Vehicle {
            plate_id: PlateId::from(plate),
            vehicle_type: vehicle_type.to_string(),
            status: VehicleStatus::Available,
            rental_price: Decimal::from(rate),
        })?;
    }

    for (id, name, contact) in [
        ("C-001", "Andrea Santos", "0917-555-0101"),
        ("C-002", "Miguel Reyes", "0917-555-0102"),
    ] {
        store.customers().insert(Customer {
            customer_id: CustomerId::from(id),
            name: name.to_string(),
            contact: contact.to_string(),
            status: RecordStatus::Active,
        })?;
    }

    for (id, name) in [("LOC-001", "Makati Hub"), ("LOC-002", "BGC Branch")] {
        store.locations().insert(Location {
            location_id: LocationId::from(id),
            name: name.to_string(),
            status: RecordStatus::Active,
        })?;
    }

    store.technicians().insert(Technician {
        technician_id: TechnicianId::from("T-001"),
        name: "Ramon Cruz".to_string(),
        specialization_id: SpecializationId::from("SPEC-EV"),
        rate: Decimal::from(350),
        status: RecordStatus::Active,
    })?;

    for (id, name, quantity, price) in [
        ("P-001", "Brake Pad", 20, Decimal::from(150)),
        ("P-002", "Inner Tube", 15, Decimal::from(95)),
        ("P-003", "Controller Board", 3, Decimal::new(2_450_00, 2)),
    ] {
        store.parts().insert(Part {
            part_id: PartId::from(id),
            part_name: name.to_string(),
            quantity,
            price,
            status: RecordStatus::Active,
        })?;
    }

    let opened = NaiveDate::from_ymd_opt(2025, 1, 6)
        .ok_or_else(|| RepositoryError::Rejected("invalid seed date".to_string()))?;
    for (index, plate) in ["ES-001", "ES-002", "EB-001", "EC-001"].into_iter().enumerate() {
        store.deployments().insert(DeploymentTransaction {
            deployment_id: DeploymentId::new(format!("DEP-{:04}", index + 1)),
            plate_id: PlateId::from(plate),
            location_id: LocationId::from("LOC-001"),
            start_date: opened,
            end_date: None,
            status: DeploymentStatus::Active,
        })?;
    }

    Ok(())
}
