use std::sync::{Arc, Mutex};

use axum::body::to_bytes;
use axum::response::Response;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::operations::clock::Clock;
use crate::operations::domain::{PartId, PlateId, Vehicle, VehicleStatus};
use crate::operations::memory::{seed_demo_fleet, InMemoryFleetStore};
use crate::operations::repository::{
    CustomerRepository, DeploymentRepository, FleetStore, LineItemRepository, LocationRepository,
    MaintenanceRepository, PartRepository, PaymentRepository, PenaltyRepository, RecordStore,
    RentalRepository, RepositoryError, TechnicianRepository, VehicleRepository,
};
use crate::operations::FleetServices;

/// Clock pinned to a settable instant.
pub(super) struct FixedClock {
    now: Mutex<NaiveDateTime>,
}

impl FixedClock {
    pub(super) fn at(now: NaiveDateTime) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    pub(super) fn set(&self, now: NaiveDateTime) {
        *self.now.lock().expect("clock mutex poisoned") = now;
    }

    pub(super) fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().expect("clock mutex poisoned");
        *guard += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

pub(super) fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 6).expect("valid date")
}

pub(super) fn at(hour: u32, minute: u32) -> NaiveDateTime {
    day().and_hms_opt(hour, minute, 0).expect("valid time")
}

pub(super) struct Fleet {
    pub(super) store: Arc<InMemoryFleetStore>,
    pub(super) clock: Arc<FixedClock>,
    pub(super) services: FleetServices<InMemoryFleetStore>,
}

/// Seeded in-memory fleet with the clock at 09:00 on the seed day.
pub(super) fn fleet() -> Fleet {
    let store = Arc::new(InMemoryFleetStore::new());
    seed_demo_fleet(&store).expect("seed fleet");
    let clock = FixedClock::at(at(9, 0));
    let services = FleetServices::with_clock(store.clone(), clock.clone());
    Fleet {
        store,
        clock,
        services,
    }
}

pub(super) fn vehicle_status(store: &InMemoryFleetStore, plate: &str) -> VehicleStatus {
    store
        .vehicles()
        .fetch(&PlateId::from(plate))
        .expect("fetch vehicle")
        .expect("vehicle present")
        .status
}

pub(super) fn part_stock(store: &InMemoryFleetStore, part: &str) -> u32 {
    store
        .parts()
        .fetch(&PartId::from(part))
        .expect("fetch part")
        .expect("part present")
        .quantity
}

pub(super) async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

/// Vehicle table whose status writes to `failing` are refused.
pub(super) struct FlakyVehicles {
    inner: Arc<InMemoryFleetStore>,
    failing: VehicleStatus,
}

impl RecordStore<Vehicle> for FlakyVehicles {
    fn fetch(&self, id: &PlateId) -> Result<Option<Vehicle>, RepositoryError> {
        self.inner.vehicles().fetch(id)
    }

    fn list_including_inactive(&self) -> Result<Vec<Vehicle>, RepositoryError> {
        self.inner.vehicles().list_including_inactive()
    }

    fn insert(&self, record: Vehicle) -> Result<Vehicle, RepositoryError> {
        self.inner.vehicles().insert(record)
    }

    fn update(&self, record: Vehicle) -> Result<(), RepositoryError> {
        self.inner.vehicles().update(record)
    }

    fn deactivate(&self, id: &PlateId) -> Result<(), RepositoryError> {
        self.inner.vehicles().deactivate(id)
    }

    fn reactivate(&self, id: &PlateId) -> Result<(), RepositoryError> {
        self.inner.vehicles().reactivate(id)
    }
}

impl VehicleRepository for FlakyVehicles {
    fn update_status(&self, plate_id: &PlateId, status: VehicleStatus) -> Result<(), RepositoryError> {
        if status == self.failing {
            return Err(RepositoryError::Unavailable(
                "vehicle status write timed out".to_string(),
            ));
        }
        self.inner.vehicles().update_status(plate_id, status)
    }
}

/// Store that delegates to a seeded in-memory fleet but cannot set one vehicle status.
pub(super) struct FaultyStore {
    inner: Arc<InMemoryFleetStore>,
    vehicles: FlakyVehicles,
}

impl FaultyStore {
    pub(super) fn failing_on(inner: Arc<InMemoryFleetStore>, failing: VehicleStatus) -> Self {
        Self {
            vehicles: FlakyVehicles {
                inner: inner.clone(),
                failing,
            },
            inner,
        }
    }
}

impl FleetStore for FaultyStore {
    fn vehicles(&self) -> &dyn VehicleRepository {
        &self.vehicles
    }

    fn customers(&self) -> &dyn CustomerRepository {
        self.inner.customers()
    }

    fn locations(&self) -> &dyn LocationRepository {
        self.inner.locations()
    }

    fn rentals(&self) -> &dyn RentalRepository {
        self.inner.rentals()
    }

    fn payments(&self) -> &dyn PaymentRepository {
        self.inner.payments()
    }

    fn maintenance(&self) -> &dyn MaintenanceRepository {
        self.inner.maintenance()
    }

    fn line_items(&self) -> &dyn LineItemRepository {
        self.inner.line_items()
    }

    fn parts(&self) -> &dyn PartRepository {
        self.inner.parts()
    }

    fn technicians(&self) -> &dyn TechnicianRepository {
        self.inner.technicians()
    }

    fn penalties(&self) -> &dyn PenaltyRepository {
        self.inner.penalties()
    }

    fn deployments(&self) -> &dyn DeploymentRepository {
        self.inner.deployments()
    }

    fn atomically<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        self.inner.atomically(work)
    }
}
