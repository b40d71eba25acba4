use crate::infra::{build_store, parse_date, ScriptedClock};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use clap::Args;
use fleet_rental::error::AppError;
use fleet_rental::operations::{
    CustomerId, InMemoryFleetStore, LocationId, PartId, PartUsage, PlateId, ScheduleMaintenance,
    TechnicianId,
};
use fleet_rental::FleetServices;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Day the scenarios run on (YYYY-MM-DD). Defaults to 2025-01-06.
    #[arg(long, value_parser = parse_date)]
    pub(crate) day: Option<NaiveDate>,
    /// Stop after the rental scenario.
    #[arg(long)]
    pub(crate) rental_only: bool,
}

fn at(day: NaiveDate, hour: u32, minute: u32) -> NaiveDateTime {
    day.and_time(NaiveTime::default()) + Duration::minutes(i64::from(hour * 60 + minute))
}

fn default_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 6).unwrap_or_default()
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { day, rental_only } = args;
    let day = day.unwrap_or_else(default_day);

    let store = build_store(true)?;
    let clock = ScriptedClock::starting_at(at(day, 9, 0));
    let services = FleetServices::with_clock(store, clock.clone());

    println!("Fleet rental demo for {day}");
    rental_scenario(&services, &clock, day)?;
    if rental_only {
        return Ok(());
    }
    maintenance_scenario(&services, &clock, day)?;
    deployment_scenario(&services, &clock, day)?;
    Ok(())
}

fn rental_scenario(
    services: &FleetServices<InMemoryFleetStore>,
    clock: &Arc<ScriptedClock>,
    day: NaiveDate,
) -> Result<(), AppError> {
    println!("\nRental: ES-001 at 50.00/day, picked up 09:00, returned 11:45");
    let rental = services.rentals.book_rental(
        &CustomerId::from("C-001"),
        &PlateId::from("ES-001"),
        &LocationId::from("LOC-001"),
        at(day, 9, 0),
    )?;
    println!("- Booked {} for {}", rental.rental_id, rental.customer_id);

    clock.set(at(day, 9, 0));
    services.rentals.start_rental(&rental.rental_id)?;
    println!("- Picked up at 09:00, vehicle now In Use");

    clock.set(at(day, 11, 45));
    let fee = services.rentals.complete_rental(&rental.rental_id)?;
    println!("- Returned at 11:45, fee settled: {fee}");

    match services.rentals.complete_rental(&rental.rental_id) {
        Ok(_) => println!("  Second completion unexpectedly accepted"),
        Err(err) => println!("  Second completion refused: {err}"),
    }

    if let Some(payment) = services.payments.payment_for_rental(&rental.rental_id)? {
        println!(
            "- Payment {} recorded {} on {}",
            payment.payment_id, payment.amount, payment.payment_date
        );
    }
    Ok(())
}

fn maintenance_scenario(
    services: &FleetServices<InMemoryFleetStore>,
    clock: &Arc<ScriptedClock>,
    day: NaiveDate,
) -> Result<(), AppError> {
    println!("\nMaintenance: technician T-001 at 350.00/hr for 3.5 hours");
    clock.set(at(day, 12, 0));
    let job = services.maintenance.schedule_maintenance(ScheduleMaintenance {
        maintenance_id: None,
        plate_id: PlateId::from("ES-001"),
        technician_id: TechnicianId::from("T-001"),
        notes: "worn brake pads and punctured tube after return".to_string(),
        start_date_time: at(day, 12, 0),
    })?;
    println!("- Scheduled {} on {}", job.maintenance_id, job.plate_id);

    let parts = [
        PartUsage {
            part_id: PartId::from("P-001"),
            quantity: 2,
        },
        PartUsage {
            part_id: PartId::from("P-002"),
            quantity: 1,
        },
    ];
    let closed =
        services
            .maintenance
            .complete_maintenance(&job.maintenance_id, at(day, 15, 30), &parts)?;
    let breakdown = services.maintenance.calculate_total_cost(&job.maintenance_id)?;
    println!(
        "- Completed: labor {} + parts {} = {}",
        breakdown.labor, breakdown.parts, closed.total_cost
    );

    let rental_id = services
        .rentals
        .rentals_for_vehicle(&PlateId::from("ES-001"))?
        .into_iter()
        .next()
        .map(|rental| rental.rental_id);
    if let Some(rental_id) = rental_id {
        let penalty = services.penalties.create_penalty_from_maintenance(
            None,
            &rental_id,
            &job.maintenance_id,
            day,
        )?;
        println!(
            "- Penalty {} issued to {}: {} ({})",
            penalty.penalty_id,
            rental_id,
            penalty.total_penalty,
            penalty.penalty_status.label()
        );
    }
    Ok(())
}

fn deployment_scenario(
    services: &FleetServices<InMemoryFleetStore>,
    clock: &Arc<ScriptedClock>,
    day: NaiveDate,
) -> Result<(), AppError> {
    println!("\nDeployment: move ES-001 from LOC-001 to LOC-002");
    clock.set(at(day, 16, 0));
    let plate = PlateId::from("ES-001");
    let branch = LocationId::from("LOC-002");

    let deployment = services.deployments.deploy_vehicle(&plate, &branch)?;
    println!(
        "- Opened {} at {} from {}",
        deployment.deployment_id, deployment.location_id, deployment.start_date
    );
    for interval in services.deployments.deployment_history(&plate)? {
        let until = interval
            .end_date
            .map(|end| end.to_string())
            .unwrap_or_else(|| "open".to_string());
        println!(
            "  - {} {} {} -> {} ({})",
            interval.deployment_id,
            interval.location_id,
            interval.start_date,
            until,
            interval.status.label()
        );
    }

    match services.deployments.deploy_vehicle(&plate, &branch) {
        Ok(_) => println!("  Repeat deployment unexpectedly accepted"),
        Err(err) => println!("  Repeat deployment refused: {err}"),
    }
    Ok(())
}
