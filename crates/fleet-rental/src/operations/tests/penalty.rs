use super::common::*;
use crate::operations::domain::{
    CustomerId, LocationId, MaintenanceId, MaintenanceLineItem, PartId, PenaltyId,
    PenaltyStatus, PlateId, RecordStatus, RentalId, TechnicianId,
};
use crate::operations::maintenance::{PartUsage, ScheduleMaintenance};
use crate::operations::repository::{FleetStore, RecordStore};
use crate::operations::FleetError;
use rust_decimal::Decimal;

/// A completed rental of ES-001 followed by a repair that cost 1620.00.
fn damaged_rental(fleet: &Fleet) -> (RentalId, MaintenanceId) {
    let rental = fleet
        .services
        .rentals
        .book_rental(
            &CustomerId::from("C-001"),
            &PlateId::from("ES-001"),
            &LocationId::from("LOC-001"),
            at(6, 0),
        )
        .expect("booking");
    fleet.clock.set(at(6, 0));
    fleet
        .services
        .rentals
        .start_rental(&rental.rental_id)
        .expect("start");
    fleet.clock.set(at(7, 30));
    fleet
        .services
        .rentals
        .complete_rental(&rental.rental_id)
        .expect("complete");

    let maintenance = fleet
        .services
        .maintenance
        .schedule_maintenance(ScheduleMaintenance {
            maintenance_id: None,
            plate_id: PlateId::from("ES-001"),
            technician_id: TechnicianId::from("T-001"),
            notes: "cracked brake assembly after rental".to_string(),
            start_date_time: at(8, 0),
        })
        .expect("schedule");
    fleet
        .services
        .maintenance
        .complete_maintenance(
            &maintenance.maintenance_id,
            at(11, 30),
            &[
                PartUsage {
                    part_id: PartId::from("P-001"),
                    quantity: 2,
                },
                PartUsage {
                    part_id: PartId::from("P-002"),
                    quantity: 1,
                },
            ],
        )
        .expect("complete maintenance");

    (rental.rental_id, maintenance.maintenance_id)
}

#[test]
fn penalty_copies_maintenance_total() {
    let fleet = fleet();
    let (rental_id, maintenance_id) = damaged_rental(&fleet);

    let penalty = fleet
        .services
        .penalties
        .create_penalty_from_maintenance(None, &rental_id, &maintenance_id, day())
        .expect("penalty");

    assert_eq!(penalty.penalty_id.as_str(), "PEN-0001");
    assert_eq!(penalty.total_penalty, Decimal::new(162000, 2));
    assert_eq!(penalty.penalty_status, PenaltyStatus::Unpaid);
    assert_eq!(penalty.maintenance_id, maintenance_id);
    assert_eq!(
        fleet
            .services
            .penalties
            .penalties_for_rental(&rental_id)
            .expect("query")
            .len(),
        1
    );
}

#[test]
fn penalty_amount_is_not_recomputed_after_issue() {
    let fleet = fleet();
    let (rental_id, maintenance_id) = damaged_rental(&fleet);
    let penalty = fleet
        .services
        .penalties
        .create_penalty_from_maintenance(
            Some(PenaltyId::from("PEN-MANUAL")),
            &rental_id,
            &maintenance_id,
            day(),
        )
        .expect("penalty");

    fleet
        .services
        .maintenance
        .add_line_item_with_inventory(&maintenance_id, &PartId::from("P-003"), 1)
        .expect("extra part");

    let stored = fleet.services.penalties.penalty(&penalty.penalty_id).expect("penalty");
    assert_eq!(stored.total_penalty, Decimal::new(162000, 2));
    assert_eq!(
        fleet
            .services
            .penalties
            .get_maintenance_cost(&maintenance_id)
            .expect("cost"),
        Decimal::new(407000, 2)
    );
}

#[test]
fn cost_falls_back_to_live_calculation_without_write_back() {
    let fleet = fleet();
    let maintenance_id = fleet
        .services
        .maintenance
        .flag_vehicle_as_defective(&PlateId::from("ES-002"), "bent rim")
        .expect("flag")
        .maintenance_id;
    fleet
        .store
        .line_items()
        .insert(MaintenanceLineItem {
            maintenance_id: maintenance_id.clone(),
            part_id: PartId::from("P-002"),
            quantity_used: 2,
            status: RecordStatus::Active,
        })
        .expect("line item written directly");

    let cost = fleet
        .services
        .penalties
        .get_maintenance_cost(&maintenance_id)
        .expect("cost");
    assert_eq!(cost, Decimal::from(190));

    let record = fleet
        .services
        .maintenance
        .maintenance(&maintenance_id)
        .expect("record");
    assert_eq!(record.total_cost, Decimal::ZERO);
}

#[test]
fn zero_cost_maintenance_cannot_be_charged() {
    let fleet = fleet();
    let (rental_id, _) = damaged_rental(&fleet);
    let inspection = fleet
        .services
        .maintenance
        .flag_vehicle_as_defective(&PlateId::from("ES-002"), "routine check")
        .expect("flag");

    let result = fleet.services.penalties.create_penalty_from_maintenance(
        None,
        &rental_id,
        &inspection.maintenance_id,
        day(),
    );
    assert!(matches!(result, Err(FleetError::Validation(_))));
    assert!(fleet.services.penalties.unpaid_penalties().expect("query").is_empty());
}

#[test]
fn penalty_requires_known_rental() {
    let fleet = fleet();
    let (_, maintenance_id) = damaged_rental(&fleet);

    let result = fleet.services.penalties.create_penalty_from_maintenance(
        None,
        &RentalId::from("RNT-0404"),
        &maintenance_id,
        day(),
    );
    assert!(matches!(result, Err(FleetError::NotFound { .. })));
}

#[test]
fn paying_and_cancelling_penalties() {
    let fleet = fleet();
    let (rental_id, maintenance_id) = damaged_rental(&fleet);
    let penalties = &fleet.services.penalties;
    let first = penalties
        .create_penalty_from_maintenance(None, &rental_id, &maintenance_id, day())
        .expect("first");
    let second = penalties
        .create_penalty_from_maintenance(None, &rental_id, &maintenance_id, day())
        .expect("second");
    assert_eq!(second.penalty_id.as_str(), "PEN-0002");

    let paid = penalties.mark_penalty_paid(&first.penalty_id).expect("pay");
    assert!(paid.is_paid());
    let cancel_paid = penalties.cancel_penalty(&first.penalty_id);
    assert!(matches!(cancel_paid, Err(FleetError::InvalidState(_))));

    let cancelled = penalties.cancel_penalty(&second.penalty_id).expect("cancel");
    assert_eq!(cancelled.status, RecordStatus::Inactive);
    assert!(penalties.unpaid_penalties().expect("query").is_empty());

    let reopened = penalties.update_penalty_payment(&second.penalty_id, PenaltyStatus::Paid);
    assert!(matches!(reopened, Err(FleetError::InvalidState(_))));

    let reverted = penalties
        .update_penalty_payment(&first.penalty_id, PenaltyStatus::Unpaid)
        .expect("revert");
    assert!(!reverted.is_paid());
    assert_eq!(
        penalties
            .penalties_for_maintenance(&maintenance_id)
            .expect("by maintenance")
            .len(),
        2
    );
}
