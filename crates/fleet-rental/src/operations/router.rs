use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::{
    CustomerId, DeploymentId, DeploymentTransaction, LocationId, MaintenanceId,
    MaintenanceLineItem, MaintenanceTransaction, PartId, PaymentId, PaymentTransaction, PenaltyId,
    PenaltyTransaction, PlateId, RentalId, RentalTransaction,
};
use super::maintenance::{CostBreakdown, PartUsage, ScheduleMaintenance};
use super::repository::FleetStore;
use super::FleetServices;
use crate::error::AppError;

type Services<S> = State<Arc<FleetServices<S>>>;

#[derive(Debug, Deserialize)]
pub struct BookRentalRequest {
    pub customer_id: CustomerId,
    pub plate_id: PlateId,
    pub location_id: LocationId,
    pub pick_up_date_time: NaiveDateTime,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeeView {
    pub rental_id: RentalId,
    pub fee: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct ProcessPaymentRequest {
    pub payment_id: PaymentId,
    pub rental_id: RentalId,
    pub amount: Decimal,
    pub payment_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct DefectReport {
    pub plate_id: PlateId,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Deserialize)]
pub struct CompleteMaintenanceRequest {
    pub end_date_time: NaiveDateTime,
    #[serde(default)]
    pub parts_used: Vec<PartUsage>,
}

#[derive(Debug, Deserialize)]
pub struct LineItemQuantity {
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct NewLineItem {
    pub part_id: PartId,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct CreatePenaltyRequest {
    #[serde(default)]
    pub penalty_id: Option<PenaltyId>,
    pub rental_id: RentalId,
    pub maintenance_id: MaintenanceId,
    pub date_issued: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct DeployVehicleRequest {
    pub plate_id: PlateId,
    pub location_id: LocationId,
}

/// Router exposing the fleet workflows under `/api/v1`.
pub fn fleet_router<S>(services: Arc<FleetServices<S>>) -> Router
where
    S: FleetStore,
{
    Router::new()
        .route("/api/v1/rentals", post(book_rental::<S>))
        .route("/api/v1/rentals/active", get(active_rentals::<S>))
        .route("/api/v1/rentals/:rental_id", get(get_rental::<S>))
        .route("/api/v1/rentals/:rental_id/start", post(start_rental::<S>))
        .route("/api/v1/rentals/:rental_id/complete", post(complete_rental::<S>))
        .route("/api/v1/rentals/:rental_id/cancel", post(cancel_rental::<S>))
        .route("/api/v1/rentals/:rental_id/fee", get(quote_fee::<S>))
        .route("/api/v1/rentals/:rental_id/payment", get(rental_payment::<S>))
        .route("/api/v1/customers/:customer_id/rentals", get(rental_history::<S>))
        .route("/api/v1/payments", post(process_payment::<S>))
        .route("/api/v1/maintenance", post(schedule_maintenance::<S>))
        .route("/api/v1/maintenance/defects", post(flag_defective::<S>))
        .route("/api/v1/maintenance/:maintenance_id", get(get_maintenance::<S>))
        .route(
            "/api/v1/maintenance/:maintenance_id/complete",
            post(complete_maintenance::<S>),
        )
        .route("/api/v1/maintenance/:maintenance_id/cost", get(maintenance_cost::<S>))
        .route(
            "/api/v1/maintenance/:maintenance_id/line-items",
            get(list_line_items::<S>).post(add_line_item::<S>),
        )
        .route(
            "/api/v1/maintenance/:maintenance_id/line-items/:part_id",
            put(update_line_item::<S>),
        )
        .route(
            "/api/v1/maintenance/:maintenance_id/line-items/:part_id/deactivate",
            post(deactivate_line_item::<S>),
        )
        .route(
            "/api/v1/maintenance/:maintenance_id/line-items/:part_id/reactivate",
            post(reactivate_line_item::<S>),
        )
        .route("/api/v1/penalties", post(create_penalty::<S>))
        .route("/api/v1/penalties/unpaid", get(unpaid_penalties::<S>))
        .route("/api/v1/penalties/:penalty_id/cancel", post(cancel_penalty::<S>))
        .route("/api/v1/penalties/:penalty_id/pay", post(pay_penalty::<S>))
        .route("/api/v1/deployments", post(deploy_vehicle::<S>))
        .route(
            "/api/v1/deployments/:deployment_id/complete",
            post(complete_deployment::<S>),
        )
        .route(
            "/api/v1/deployments/:deployment_id/cancel",
            post(cancel_deployment::<S>),
        )
        .route(
            "/api/v1/vehicles/:plate_id/deployment",
            get(current_deployment::<S>),
        )
        .with_state(services)
}

pub(crate) async fn book_rental<S: FleetStore>(
    State(services): Services<S>,
    Json(request): Json<BookRentalRequest>,
) -> Result<(StatusCode, Json<RentalTransaction>), AppError> {
    let rental = services.rentals.book_rental(
        &request.customer_id,
        &request.plate_id,
        &request.location_id,
        request.pick_up_date_time,
    )?;
    Ok((StatusCode::CREATED, Json(rental)))
}

pub(crate) async fn active_rentals<S: FleetStore>(
    State(services): Services<S>,
) -> Result<Json<Vec<RentalTransaction>>, AppError> {
    Ok(Json(services.rentals.active_rentals()?))
}

pub(crate) async fn get_rental<S: FleetStore>(
    State(services): Services<S>,
    Path(rental_id): Path<String>,
) -> Result<Json<RentalTransaction>, AppError> {
    Ok(Json(services.rentals.rental(&RentalId(rental_id))?))
}

pub(crate) async fn start_rental<S: FleetStore>(
    State(services): Services<S>,
    Path(rental_id): Path<String>,
) -> Result<Json<RentalTransaction>, AppError> {
    Ok(Json(services.rentals.start_rental(&RentalId(rental_id))?))
}

pub(crate) async fn complete_rental<S: FleetStore>(
    State(services): Services<S>,
    Path(rental_id): Path<String>,
) -> Result<Json<FeeView>, AppError> {
    let rental_id = RentalId(rental_id);
    let fee = services.rentals.complete_rental(&rental_id)?;
    Ok(Json(FeeView { rental_id, fee }))
}

pub(crate) async fn cancel_rental<S: FleetStore>(
    State(services): Services<S>,
    Path(rental_id): Path<String>,
) -> Result<Json<RentalTransaction>, AppError> {
    Ok(Json(services.rentals.cancel_rental(&RentalId(rental_id))?))
}

pub(crate) async fn quote_fee<S: FleetStore>(
    State(services): Services<S>,
    Path(rental_id): Path<String>,
) -> Result<Json<FeeView>, AppError> {
    let rental_id = RentalId(rental_id);
    let fee = services.payments.calculate_rental_fee(&rental_id)?;
    Ok(Json(FeeView { rental_id, fee }))
}

pub(crate) async fn rental_payment<S: FleetStore>(
    State(services): Services<S>,
    Path(rental_id): Path<String>,
) -> Result<Json<Option<PaymentTransaction>>, AppError> {
    Ok(Json(services.payments.payment_for_rental(&RentalId(rental_id))?))
}

pub(crate) async fn rental_history<S: FleetStore>(
    State(services): Services<S>,
    Path(customer_id): Path<String>,
) -> Result<Json<Vec<RentalTransaction>>, AppError> {
    Ok(Json(services.rentals.rental_history(&CustomerId(customer_id))?))
}

pub(crate) async fn process_payment<S: FleetStore>(
    State(services): Services<S>,
    Json(request): Json<ProcessPaymentRequest>,
) -> Result<(StatusCode, Json<PaymentTransaction>), AppError> {
    let payment = services.payments.process_payment(
        request.payment_id,
        &request.rental_id,
        request.amount,
        request.payment_date,
    )?;
    Ok((StatusCode::CREATED, Json(payment)))
}

pub(crate) async fn schedule_maintenance<S: FleetStore>(
    State(services): Services<S>,
    Json(request): Json<ScheduleMaintenance>,
) -> Result<(StatusCode, Json<MaintenanceTransaction>), AppError> {
    let record = services.maintenance.schedule_maintenance(request)?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub(crate) async fn flag_defective<S: FleetStore>(
    State(services): Services<S>,
    Json(report): Json<DefectReport>,
) -> Result<(StatusCode, Json<MaintenanceTransaction>), AppError> {
    let record = services
        .maintenance
        .flag_vehicle_as_defective(&report.plate_id, &report.notes)?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub(crate) async fn get_maintenance<S: FleetStore>(
    State(services): Services<S>,
    Path(maintenance_id): Path<String>,
) -> Result<Json<MaintenanceTransaction>, AppError> {
    Ok(Json(services.maintenance.maintenance(&MaintenanceId(maintenance_id))?))
}

pub(crate) async fn complete_maintenance<S: FleetStore>(
    State(services): Services<S>,
    Path(maintenance_id): Path<String>,
    Json(request): Json<CompleteMaintenanceRequest>,
) -> Result<Json<MaintenanceTransaction>, AppError> {
    let record = services.maintenance.complete_maintenance(
        &MaintenanceId(maintenance_id),
        request.end_date_time,
        &request.parts_used,
    )?;
    Ok(Json(record))
}

pub(crate) async fn maintenance_cost<S: FleetStore>(
    State(services): Services<S>,
    Path(maintenance_id): Path<String>,
) -> Result<Json<CostBreakdown>, AppError> {
    Ok(Json(
        services
            .maintenance
            .calculate_total_cost(&MaintenanceId(maintenance_id))?,
    ))
}

pub(crate) async fn list_line_items<S: FleetStore>(
    State(services): Services<S>,
    Path(maintenance_id): Path<String>,
) -> Result<Json<Vec<MaintenanceLineItem>>, AppError> {
    Ok(Json(services.maintenance.line_items(&MaintenanceId(maintenance_id))?))
}

pub(crate) async fn add_line_item<S: FleetStore>(
    State(services): Services<S>,
    Path(maintenance_id): Path<String>,
    Json(request): Json<NewLineItem>,
) -> Result<(StatusCode, Json<MaintenanceLineItem>), AppError> {
    let item = services.maintenance.add_line_item_with_inventory(
        &MaintenanceId(maintenance_id),
        &request.part_id,
        request.quantity,
    )?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub(crate) async fn update_line_item<S: FleetStore>(
    State(services): Services<S>,
    Path((maintenance_id, part_id)): Path<(String, String)>,
    Json(request): Json<LineItemQuantity>,
) -> Result<Json<MaintenanceLineItem>, AppError> {
    let item = services.maintenance.update_line_item_with_inventory(
        &MaintenanceId(maintenance_id),
        &PartId(part_id),
        request.quantity,
    )?;
    Ok(Json(item))
}

pub(crate) async fn deactivate_line_item<S: FleetStore>(
    State(services): Services<S>,
    Path((maintenance_id, part_id)): Path<(String, String)>,
) -> Result<Json<MaintenanceLineItem>, AppError> {
    let item = services
        .maintenance
        .deactivate_line_item_with_inventory(&MaintenanceId(maintenance_id), &PartId(part_id))?;
    Ok(Json(item))
}

pub(crate) async fn reactivate_line_item<S: FleetStore>(
    State(services): Services<S>,
    Path((maintenance_id, part_id)): Path<(String, String)>,
) -> Result<Json<MaintenanceLineItem>, AppError> {
    let item = services
        .maintenance
        .reactivate_line_item_with_inventory(&MaintenanceId(maintenance_id), &PartId(part_id))?;
    Ok(Json(item))
}

pub(crate) async fn create_penalty<S: FleetStore>(
    State(services): Services<S>,
    Json(request): Json<CreatePenaltyRequest>,
) -> Result<(StatusCode, Json<PenaltyTransaction>), AppError> {
    let penalty = services.penalties.create_penalty_from_maintenance(
        request.penalty_id,
        &request.rental_id,
        &request.maintenance_id,
        request.date_issued,
    )?;
    Ok((StatusCode::CREATED, Json(penalty)))
}

pub(crate) async fn unpaid_penalties<S: FleetStore>(
    State(services): Services<S>,
) -> Result<Json<Vec<PenaltyTransaction>>, AppError> {
    Ok(Json(services.penalties.unpaid_penalties()?))
}

pub(crate) async fn cancel_penalty<S: FleetStore>(
    State(services): Services<S>,
    Path(penalty_id): Path<String>,
) -> Result<Json<PenaltyTransaction>, AppError> {
    Ok(Json(services.penalties.cancel_penalty(&PenaltyId(penalty_id))?))
}

pub(crate) async fn pay_penalty<S: FleetStore>(
    State(services): Services<S>,
    Path(penalty_id): Path<String>,
) -> Result<Json<PenaltyTransaction>, AppError> {
    Ok(Json(services.penalties.mark_penalty_paid(&PenaltyId(penalty_id))?))
}

pub(crate) async fn deploy_vehicle<S: FleetStore>(
    State(services): Services<S>,
    Json(request): Json<DeployVehicleRequest>,
) -> Result<(StatusCode, Json<DeploymentTransaction>), AppError> {
    let deployment = services
        .deployments
        .deploy_vehicle(&request.plate_id, &request.location_id)?;
    Ok((StatusCode::CREATED, Json(deployment)))
}

pub(crate) async fn complete_deployment<S: FleetStore>(
    State(services): Services<S>,
    Path(deployment_id): Path<String>,
) -> Result<Json<DeploymentTransaction>, AppError> {
    Ok(Json(
        services
            .deployments
            .complete_deployment(&DeploymentId(deployment_id))?,
    ))
}

pub(crate) async fn cancel_deployment<S: FleetStore>(
    State(services): Services<S>,
    Path(deployment_id): Path<String>,
) -> Result<Json<DeploymentTransaction>, AppError> {
    Ok(Json(
        services
            .deployments
            .cancel_deployment(&DeploymentId(deployment_id))?,
    ))
}

pub(crate) async fn current_deployment<S: FleetStore>(
    State(services): Services<S>,
    Path(plate_id): Path<String>,
) -> Result<Json<Option<DeploymentTransaction>>, AppError> {
    Ok(Json(
        services.deployments.current_deployment(&PlateId(plate_id))?,
    ))
}
