use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use tracing::{info, warn};

use super::clock::{Clock, SystemClock};
use super::domain::{PaymentId, PaymentTransaction, RecordStatus, RentalId};
use super::error::FleetError;
use super::ids::payment_id_for;
use super::money::{elapsed_hours, round_currency, round_intermediate};
use super::repository::FleetStore;

/// Rentals shorter than this are billed as if they lasted this long.
pub const MINIMUM_BILLABLE_HOURS: Decimal = Decimal::ONE;

const HOURS_PER_DAY: i64 = 24;

/// `max(hours, 1) / 24 * daily_rate`, quotient held at ten places, result rounded half-up to cents.
pub fn rental_fee(
    start: NaiveDateTime,
    end: NaiveDateTime,
    daily_rate: Decimal,
) -> Result<Decimal, FleetError> {
    let hours = elapsed_hours(start, end).max(MINIMUM_BILLABLE_HOURS);
    let days = round_intermediate(hours / Decimal::from(HOURS_PER_DAY));
    days.checked_mul(daily_rate).map(round_currency).ok_or_else(|| {
        FleetError::validation(format!(
            "fee for {days} days at {daily_rate} per day is out of range"
        ))
    })
}

/// Fee computation and settlement of rental payments.
pub struct PaymentService<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> PaymentService<S>
where
    S: FleetStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Fee for the elapsed portion of a rental; ongoing rentals are priced up to now.
    pub fn calculate_rental_fee(&self, rental_id: &RentalId) -> Result<Decimal, FleetError> {
        let rental = self
            .store
            .rentals()
            .fetch(rental_id)?
            .ok_or_else(|| FleetError::not_found("rental", rental_id))?;
        let start = rental.start_date_time.ok_or_else(|| {
            FleetError::invalid_state(format!("rental {rental_id} has not been picked up"))
        })?;
        let vehicle = self
            .store
            .vehicles()
            .fetch(&rental.plate_id)?
            .ok_or_else(|| FleetError::not_found("vehicle", &rental.plate_id))?;

        let end = rental.end_date_time.unwrap_or_else(|| self.clock.now());
        rental_fee(start, end, vehicle.rental_price)
    }

    /// Record a standalone payment against an existing rental.
    pub fn process_payment(
        &self,
        payment_id: PaymentId,
        rental_id: &RentalId,
        amount: Decimal,
        payment_date: NaiveDate,
    ) -> Result<PaymentTransaction, FleetError> {
        if amount <= Decimal::ZERO {
            warn!(%payment_id, %amount, "payment rejected, amount must be positive");
            return Err(FleetError::validation(format!(
                "payment amount must be positive, got {amount}"
            )));
        }
        let payment = self.store.atomically(|| {
            if self.store.rentals().fetch(rental_id)?.is_none() {
                warn!(%payment_id, %rental_id, "payment rejected, unknown rental");
                return Err(FleetError::not_found("rental", rental_id));
            }
            Ok(self.store.payments().insert(PaymentTransaction {
                payment_id,
                rental_id: rental_id.clone(),
                amount,
                payment_date,
                status: RecordStatus::Active,
            })?)
        })?;
        info!(payment_id = %payment.payment_id, %rental_id, %amount, "payment recorded");
        Ok(payment)
    }

    /// Settle the rental's payment: update the existing row, or insert `PAY-<rental>` when absent.
    pub fn finalize_payment_for_rental(
        &self,
        rental_id: &RentalId,
        final_amount: Decimal,
        payment_date: NaiveDate,
    ) -> Result<PaymentTransaction, FleetError> {
        self.store
            .atomically(|| self.settle_rental_payment(rental_id, final_amount, payment_date))
    }

    pub fn payment_for_rental(
        &self,
        rental_id: &RentalId,
    ) -> Result<Option<PaymentTransaction>, FleetError> {
        Ok(self.store.payments().by_rental(rental_id)?)
    }

    pub fn payments(&self) -> Result<Vec<PaymentTransaction>, FleetError> {
        Ok(self.store.payments().list()?)
    }

    /// Body of `finalize_payment_for_rental` for callers already inside a unit of work.
    pub(crate) fn settle_rental_payment(
        &self,
        rental_id: &RentalId,
        final_amount: Decimal,
        payment_date: NaiveDate,
    ) -> Result<PaymentTransaction, FleetError> {
        if final_amount < Decimal::ZERO {
            return Err(FleetError::validation(format!(
                "final amount cannot be negative, got {final_amount}"
            )));
        }

        match self.store.payments().fetch(&payment_id_for(rental_id))? {
            Some(mut payment) => {
                payment.amount = final_amount;
                payment.payment_date = payment_date;
                self.store.payments().update(payment.clone())?;
                info!(payment_id = %payment.payment_id, %rental_id, amount = %final_amount, "payment finalized");
                Ok(payment)
            }
            None => {
                let payment = self.store.payments().insert(PaymentTransaction {
                    payment_id: payment_id_for(rental_id),
                    rental_id: rental_id.clone(),
                    amount: final_amount,
                    payment_date,
                    status: RecordStatus::Active,
                })?;
                warn!(payment_id = %payment.payment_id, %rental_id, "no placeholder payment, inserted settlement row");
                Ok(payment)
            }
        }
    }

    pub(crate) fn create_placeholder(
        &self,
        rental_id: &RentalId,
    ) -> Result<PaymentTransaction, FleetError> {
        let payment = self.store.payments().insert(PaymentTransaction {
            payment_id: payment_id_for(rental_id),
            rental_id: rental_id.clone(),
            amount: Decimal::ZERO,
            payment_date: self.clock.today(),
            status: RecordStatus::Active,
        })?;
        Ok(payment)
    }

    pub(crate) fn set_active_for_rental(
        &self,
        rental_id: &RentalId,
        active: bool,
    ) -> Result<(), FleetError> {
        match self.store.payments().fetch(&payment_id_for(rental_id))? {
            Some(payment) if active => self.store.payments().reactivate(&payment.payment_id)?,
            Some(payment) => self.store.payments().deactivate(&payment.payment_id)?,
            None => warn!(%rental_id, "rental has no payment row to update"),
        }
        Ok(())
    }
}
