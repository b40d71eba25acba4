use super::common::*;
use crate::operations::domain::{
    CustomerId, LocationId, PaymentId, PlateId, RecordStatus, RentalId, RentalTransaction,
};
use crate::operations::payment::rental_fee;
use crate::operations::repository::{FleetStore, RecordStore};
use crate::operations::FleetError;
use chrono::Duration;
use rust_decimal::Decimal;
use std::sync::{Arc, Barrier};
use std::thread;

fn started_rental(fleet: &Fleet, plate: &str) -> RentalId {
    let rental = fleet
        .services
        .rentals
        .book_rental(
            &CustomerId::from("C-002"),
            &PlateId::from(plate),
            &LocationId::from("LOC-002"),
            at(9, 0),
        )
        .expect("booking");
    fleet
        .services
        .rentals
        .start_rental(&rental.rental_id)
        .expect("start");
    rental.rental_id
}

#[test]
fn fee_for_two_and_three_quarter_hours_on_a_scooter() {
    assert_eq!(
        rental_fee(at(9, 0), at(11, 45), Decimal::from(50)),
        Ok(Decimal::new(573, 2))
    );
}

#[test]
fn short_rentals_bill_the_one_hour_minimum() {
    let one_hour = rental_fee(at(9, 0), at(10, 0), Decimal::from(120)).expect("fee");
    assert_eq!(rental_fee(at(9, 0), at(9, 10), Decimal::from(120)), Ok(one_hour));
    assert_eq!(one_hour, Decimal::from(5));
}

#[test]
fn full_day_costs_the_daily_rate() {
    let start = at(8, 0);
    assert_eq!(
        rental_fee(start, start + Duration::days(1), Decimal::from(1_500)),
        Ok(Decimal::from(1_500))
    );
}

#[test]
fn fee_beyond_decimal_range_is_rejected() {
    let start = at(8, 0);
    let result = rental_fee(start, start + Duration::days(30), Decimal::MAX);
    assert!(matches!(result, Err(FleetError::Validation(_))));
}

#[test]
fn ongoing_rental_is_quoted_up_to_now() {
    let fleet = fleet();
    let rental_id = started_rental(&fleet, "ES-002");
    fleet.clock.set(at(21, 0));

    let quote = fleet
        .services
        .payments
        .calculate_rental_fee(&rental_id)
        .expect("quote");
    assert_eq!(quote, Decimal::from(25));
}

#[test]
fn fee_requires_pickup_and_known_rental() {
    let fleet = fleet();
    let booked = fleet
        .services
        .rentals
        .book_rental(
            &CustomerId::from("C-001"),
            &PlateId::from("ES-001"),
            &LocationId::from("LOC-001"),
            at(12, 0),
        )
        .expect("booking");

    let not_started = fleet.services.payments.calculate_rental_fee(&booked.rental_id);
    assert!(matches!(not_started, Err(FleetError::InvalidState(_))));

    let unknown = fleet
        .services
        .payments
        .calculate_rental_fee(&RentalId::from("RNT-9999"));
    assert!(matches!(unknown, Err(FleetError::NotFound { .. })));
}

#[test]
fn process_payment_rejects_non_positive_amounts() {
    let fleet = fleet();
    let rental_id = started_rental(&fleet, "EB-001");

    for amount in [Decimal::ZERO, Decimal::from(-10)] {
        let result = fleet.services.payments.process_payment(
            PaymentId::from("PAY-EXTRA"),
            &rental_id,
            amount,
            day(),
        );
        assert!(matches!(result, Err(FleetError::Validation(_))));
    }

    let unknown = fleet.services.payments.process_payment(
        PaymentId::from("PAY-EXTRA"),
        &RentalId::from("RNT-4040"),
        Decimal::from(10),
        day(),
    );
    assert!(matches!(unknown, Err(FleetError::NotFound { .. })));
}

#[test]
fn process_payment_records_standalone_row() {
    let fleet = fleet();
    let rental_id = started_rental(&fleet, "EB-001");

    let payment = fleet
        .services
        .payments
        .process_payment(
            PaymentId::from("PAY-DEPOSIT"),
            &rental_id,
            Decimal::new(50000, 2),
            day(),
        )
        .expect("payment recorded");
    assert_eq!(payment.status, RecordStatus::Active);
    assert_eq!(fleet.services.payments.payments().expect("list").len(), 2);
}

#[test]
fn finalize_updates_existing_placeholder() {
    let fleet = fleet();
    let rental_id = started_rental(&fleet, "ES-001");
    let settled_on = day() + Duration::days(1);

    let payment = fleet
        .services
        .payments
        .finalize_payment_for_rental(&rental_id, Decimal::new(1234, 2), settled_on)
        .expect("finalize");

    assert_eq!(payment.payment_id.as_str(), "PAY-RNT-0001");
    assert_eq!(payment.amount, Decimal::new(1234, 2));
    assert_eq!(payment.payment_date, settled_on);
    assert_eq!(fleet.services.payments.payments().expect("list").len(), 1);
}

#[test]
fn finalize_inserts_deterministic_row_when_placeholder_missing() {
    let fleet = fleet();
    let rental_id = RentalId::from("RNT-0100");
    fleet
        .store
        .rentals()
        .insert(RentalTransaction {
            rental_id: rental_id.clone(),
            customer_id: CustomerId::from("C-001"),
            plate_id: PlateId::from("EC-001"),
            location_id: LocationId::from("LOC-001"),
            pick_up_date_time: at(8, 0),
            start_date_time: Some(at(8, 0)),
            end_date_time: Some(at(10, 0)),
            status: RecordStatus::Active,
        })
        .expect("legacy rental without payment");

    let payment = fleet
        .services
        .payments
        .finalize_payment_for_rental(&rental_id, Decimal::from(125), day())
        .expect("finalize inserts");
    assert_eq!(payment.payment_id.as_str(), "PAY-RNT-0100");
    assert_eq!(payment.rental_id, rental_id);
    assert_eq!(payment.amount, Decimal::from(125));
}

#[test]
fn finalize_rejects_negative_amounts() {
    let fleet = fleet();
    let rental_id = started_rental(&fleet, "ES-001");

    let result = fleet
        .services
        .payments
        .finalize_payment_for_rental(&rental_id, Decimal::from(-1), day());
    assert!(matches!(result, Err(FleetError::Validation(_))));
}

#[test]
fn completion_settles_the_placeholder_not_a_deposit() {
    let fleet = fleet();
    let rental_id = started_rental(&fleet, "ES-001");
    fleet
        .services
        .payments
        .process_payment(
            PaymentId::from("DEPOSIT-1"),
            &rental_id,
            Decimal::from(500),
            day(),
        )
        .expect("deposit");

    fleet.clock.set(at(11, 45));
    let fee = fleet
        .services
        .rentals
        .complete_rental(&rental_id)
        .expect("complete");
    assert_eq!(fee, Decimal::new(573, 2));

    let payments = fleet.store.payments();
    let deposit = payments
        .fetch(&PaymentId::from("DEPOSIT-1"))
        .expect("fetch")
        .expect("deposit present");
    assert_eq!(deposit.amount, Decimal::from(500));
    let placeholder = payments
        .fetch(&PaymentId::from("PAY-RNT-0001"))
        .expect("fetch")
        .expect("placeholder present");
    assert_eq!(placeholder.amount, fee);
    assert_eq!(
        fleet
            .services
            .payments
            .payment_for_rental(&rental_id)
            .expect("lookup")
            .map(|payment| payment.payment_id),
        Some(PaymentId::from("PAY-RNT-0001"))
    );
}

#[test]
fn cancellation_leaves_deposits_active() {
    let fleet = fleet();
    let rental = fleet
        .services
        .rentals
        .book_rental(
            &CustomerId::from("C-001"),
            &PlateId::from("ES-002"),
            &LocationId::from("LOC-001"),
            at(10, 0),
        )
        .expect("booking");
    fleet
        .services
        .payments
        .process_payment(
            PaymentId::from("DEPOSIT-1"),
            &rental.rental_id,
            Decimal::from(200),
            day(),
        )
        .expect("deposit");

    fleet
        .services
        .rentals
        .cancel_rental(&rental.rental_id)
        .expect("cancel");

    let active: Vec<_> = fleet
        .services
        .payments
        .payments()
        .expect("list")
        .into_iter()
        .map(|payment| payment.payment_id)
        .collect();
    assert_eq!(active, vec![PaymentId::from("DEPOSIT-1")]);
}

#[test]
fn payment_recorded_during_a_failed_unit_of_work_survives_its_rollback() {
    let fleet = fleet();
    let rental_id = started_rental(&fleet, "EB-001");
    let entered = Arc::new(Barrier::new(2));

    let failing = {
        let store = fleet.store.clone();
        let entered = entered.clone();
        thread::spawn(move || {
            store.atomically(|| {
                entered.wait();
                thread::sleep(std::time::Duration::from_millis(50));
                Err::<(), _>(FleetError::validation("abandoned"))
            })
        })
    };

    entered.wait();
    fleet
        .services
        .payments
        .process_payment(
            PaymentId::from("PAY-LATE"),
            &rental_id,
            Decimal::from(40),
            day(),
        )
        .expect("payment recorded");
    assert!(failing.join().expect("worker").is_err());

    let stored = fleet
        .store
        .payments()
        .fetch(&PaymentId::from("PAY-LATE"))
        .expect("fetch");
    assert!(stored.is_some());
}
