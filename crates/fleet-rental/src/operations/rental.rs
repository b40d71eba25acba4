use std::sync::Arc;

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use tracing::{info, warn};

use super::clock::{Clock, SystemClock};
use super::domain::{
    CustomerId, LocationId, PlateId, RecordStatus, RentalId, RentalPhase, RentalTransaction,
    VehicleStatus,
};
use super::error::FleetError;
use super::ids::RENTAL_IDS;
use super::payment::PaymentService;
use super::repository::FleetStore;

/// Orchestrates booking, pickup, completion and cancellation of rentals.
pub struct RentalService<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    payments: PaymentService<S>,
}

impl<S> RentalService<S>
where
    S: FleetStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        let payments = PaymentService::with_clock(store.clone(), clock.clone());
        Self {
            store,
            clock,
            payments,
        }
    }

    /// Reserve a vehicle. The vehicle stays `Available` until it is physically picked up.
    pub fn book_rental(
        &self,
        customer_id: &CustomerId,
        plate_id: &PlateId,
        location_id: &LocationId,
        pick_up_date_time: NaiveDateTime,
    ) -> Result<RentalTransaction, FleetError> {
        self.store
            .atomically(|| {
                let customer = self
                    .store
                    .customers()
                    .fetch(customer_id)?
                    .ok_or_else(|| FleetError::not_found("customer", customer_id))?;
                if customer.status != RecordStatus::Active {
                    return Err(FleetError::invalid_state(format!(
                        "customer {customer_id} is inactive"
                    )));
                }

                let vehicle = self
                    .store
                    .vehicles()
                    .fetch(plate_id)?
                    .ok_or_else(|| FleetError::not_found("vehicle", plate_id))?;
                if !vehicle.is_available() {
                    return Err(FleetError::invalid_state(format!(
                        "vehicle {plate_id} is {}",
                        vehicle.status.label()
                    )));
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

                let rental = self.store.rentals().insert(RentalTransaction {
                    rental_id: self.next_rental_id(),
                    customer_id: customer_id.clone(),
                    plate_id: plate_id.clone(),
                    location_id: location_id.clone(),
                    pick_up_date_time,
                    start_date_time: None,
                    end_date_time: None,
                    status: RecordStatus::Active,
                })?;
                self.payments.create_placeholder(&rental.rental_id)?;
                Ok(rental)
            })
            .inspect(|rental| {
                info!(rental_id = %rental.rental_id, %customer_id, %plate_id, %pick_up_date_time, "rental booked")
            })
            .inspect_err(|err| warn!(%customer_id, %plate_id, error = %err, "booking rejected"))
    }

    /// `Booked -> Active`: stamp the pickup time and put the vehicle in use.
    pub fn start_rental(&self, rental_id: &RentalId) -> Result<RentalTransaction, FleetError> {
        self.store
            .atomically(|| {
                let mut rental = self.fetch_rental(rental_id)?;
                match rental.phase() {
                    RentalPhase::Booked => {}
                    RentalPhase::Active => {
                        return Err(FleetError::invalid_state(format!(
                            "rental {rental_id} has already started"
                        )))
                    }
                    phase => {
                        return Err(FleetError::invalid_state(format!(
                            "rental {rental_id} is {}",
                            phase.label()
                        )))
                    }
                }

                let vehicle = self
                    .store
                    .vehicles()
                    .fetch(&rental.plate_id)?
                    .ok_or_else(|| FleetError::not_found("vehicle", &rental.plate_id))?;
                if !vehicle.is_available() {
                    return Err(FleetError::invalid_state(format!(
                        "vehicle {} is {}",
                        vehicle.plate_id,
                        vehicle.status.label()
                    )));
                }

                rental.start_date_time = Some(self.clock.now());
                self.store.rentals().update(rental.clone())?;
                // A failure here unwinds the start stamp with the rest of the unit of work.
                self.store
                    .vehicles()
                    .update_status(&rental.plate_id, VehicleStatus::InUse)?;
                Ok(rental)
            })
            .inspect(|rental| info!(%rental_id, plate_id = %rental.plate_id, "rental started"))
            .inspect_err(|err| warn!(%rental_id, error = %err, "rental start rejected"))
    }

    /// `Active -> Completed`: close the rental, settle its payment and release the vehicle.
    /// Returns the settled fee.
    pub fn complete_rental(&self, rental_id: &RentalId) -> Result<Decimal, FleetError> {
        self.store
            .atomically(|| {
                let mut rental = self.fetch_rental(rental_id)?;
                match rental.phase() {
                    RentalPhase::Active => {}
                    RentalPhase::Booked => {
                        return Err(FleetError::invalid_state(format!(
                            "rental {rental_id} has not been picked up"
                        )))
                    }
                    phase => {
                        return Err(FleetError::invalid_state(format!(
                            "rental {rental_id} is already {}",
                            phase.label()
                        )))
                    }
                }

                let now = self.clock.now();
                rental.end_date_time = Some(now);
                self.store.rentals().update(rental.clone())?;

                let fee = self.payments.calculate_rental_fee(rental_id)?;
                self.payments
                    .settle_rental_payment(rental_id, fee, now.date())?;
                self.store
                    .vehicles()
                    .update_status(&rental.plate_id, VehicleStatus::Available)?;
                Ok(fee)
            })
            .inspect(|fee| info!(%rental_id, %fee, "rental completed"))
            .inspect_err(|err| warn!(%rental_id, error = %err, "rental completion rejected"))
    }

    /// `Booked -> Cancelled`: soft-deletes the rental and its placeholder payment.
    pub fn cancel_rental(&self, rental_id: &RentalId) -> Result<RentalTransaction, FleetError> {
        self.store
            .atomically(|| {
                let rental = self.fetch_rental(rental_id)?;
                if rental.is_picked_up() {
                    return Err(FleetError::invalid_state(format!(
                        "rental {rental_id} was already picked up"
                    )));
                }
                if rental.phase() != RentalPhase::Booked {
                    return Err(FleetError::invalid_state(format!(
                        "rental {rental_id} is already {}",
                        rental.phase().label()
                    )));
                }

                self.payments.set_active_for_rental(rental_id, false)?;
                self.store.rentals().deactivate(rental_id)?;
                self.fetch_rental(rental_id)
            })
            .inspect(|_| info!(%rental_id, "rental cancelled"))
            .inspect_err(|err| warn!(%rental_id, error = %err, "rental cancellation rejected"))
    }

    /// Restore a cancelled booking, provided its vehicle can still be booked.
    pub fn reactivate_rental(&self, rental_id: &RentalId) -> Result<RentalTransaction, FleetError> {
        self.store
            .atomically(|| {
                let rental = self.fetch_rental(rental_id)?;
                if rental.phase() != RentalPhase::Cancelled {
                    return Err(FleetError::invalid_state(format!(
                        "rental {rental_id} is {}, not cancelled",
                        rental.phase().label()
                    )));
                }
                let vehicle = self
                    .store
                    .vehicles()
                    .fetch(&rental.plate_id)?
                    .ok_or_else(|| FleetError::not_found("vehicle", &rental.plate_id))?;
                if !vehicle.is_available() {
                    return Err(FleetError::invalid_state(format!(
                        "vehicle {} is {}",
                        vehicle.plate_id,
                        vehicle.status.label()
                    )));
                }

                self.store.rentals().reactivate(rental_id)?;
                self.payments.set_active_for_rental(rental_id, true)?;
                self.fetch_rental(rental_id)
            })
            .inspect(|_| info!(%rental_id, "rental reactivated"))
            .inspect_err(|err| warn!(%rental_id, error = %err, "rental reactivation rejected"))
    }

    pub fn rental(&self, rental_id: &RentalId) -> Result<RentalTransaction, FleetError> {
        self.fetch_rental(rental_id)
    }

    /// Every rental a customer ever made, cancelled ones included, oldest pickup first.
    pub fn rental_history(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<RentalTransaction>, FleetError> {
        let mut rentals = self.store.rentals().by_customer(customer_id)?;
        rentals.sort_by_key(|rental| rental.pick_up_date_time);
        Ok(rentals)
    }

    pub fn active_rentals(&self) -> Result<Vec<RentalTransaction>, FleetError> {
        Ok(self.store.rentals().in_phase(RentalPhase::Active)?)
    }

    pub fn booked_rentals(&self) -> Result<Vec<RentalTransaction>, FleetError> {
        Ok(self.store.rentals().in_phase(RentalPhase::Booked)?)
    }

    pub fn completed_rentals(&self) -> Result<Vec<RentalTransaction>, FleetError> {
        Ok(self.store.rentals().in_phase(RentalPhase::Completed)?)
    }

    pub fn rentals_for_vehicle(
        &self,
        plate_id: &PlateId,
    ) -> Result<Vec<RentalTransaction>, FleetError> {
        Ok(self.store.rentals().by_vehicle(plate_id)?)
    }

    pub fn rentals_at_location(
        &self,
        location_id: &LocationId,
    ) -> Result<Vec<RentalTransaction>, FleetError> {
        Ok(self.store.rentals().by_location(location_id)?)
    }

    fn fetch_rental(&self, rental_id: &RentalId) -> Result<RentalTransaction, FleetError> {
        self.store
            .rentals()
            .fetch(rental_id)?
            .ok_or_else(|| FleetError::not_found("rental", rental_id))
    }

    fn next_rental_id(&self) -> RentalId {
        let scan = self.store.rentals().list_including_inactive().map(|rentals| {
            rentals
                .into_iter()
                .map(|rental| rental.rental_id.0)
                .collect()
        });
        RentalId::new(RENTAL_IDS.allocate(scan, self.clock.now()))
    }
}
