use super::common::*;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Request, StatusCode};
use axum::response::IntoResponse;
use axum::Router;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::operations::fleet_router;
use crate::operations::memory::InMemoryFleetStore;
use crate::operations::FleetServices;

fn router() -> (Router, Arc<FixedClock>) {
    let Fleet {
        clock, services, ..
    } = fleet();
    (fleet_router(Arc::new(services)), clock)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).expect("serialize")))
        .expect("request")
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).expect("request")
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request")
}

#[tokio::test]
async fn booking_route_creates_rental() {
    let (router, _) = router();

    let response = router
        .oneshot(post_json(
            "/api/v1/rentals",
            json!({
                "customer_id": "C-001",
                "plate_id": "ES-001",
                "location_id": "LOC-001",
                "pick_up_date_time": "2025-01-06T09:00:00"
            }),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["rental_id"], "RNT-0001");
    assert_eq!(body["start_date_time"], Value::Null);
}

#[tokio::test]
async fn rental_lifecycle_over_http_reports_fee() {
    let (router, clock) = router();

    let booked = router
        .clone()
        .oneshot(post_json(
            "/api/v1/rentals",
            json!({
                "customer_id": "C-002",
                "plate_id": "ES-001",
                "location_id": "LOC-001",
                "pick_up_date_time": "2025-01-06T09:00:00"
            }),
        ))
        .await
        .expect("book");
    assert_eq!(booked.status(), StatusCode::CREATED);

    let started = router
        .clone()
        .oneshot(post_empty("/api/v1/rentals/RNT-0001/start"))
        .await
        .expect("start");
    assert_eq!(started.status(), StatusCode::OK);

    clock.set(at(11, 45));
    let completed = router
        .clone()
        .oneshot(post_empty("/api/v1/rentals/RNT-0001/complete"))
        .await
        .expect("complete");
    assert_eq!(completed.status(), StatusCode::OK);
    let body = json_body(completed).await;
    assert_eq!(body["fee"], "5.73");

    let again = router
        .oneshot(post_empty("/api/v1/rentals/RNT-0001/complete"))
        .await
        .expect("complete again");
    assert_eq!(again.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_rental_is_not_found() {
    let (router, _) = router();

    let response = router
        .oneshot(get("/api/v1/rentals/RNT-9999"))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert!(body["error"]
        .as_str()
        .is_some_and(|message| message.contains("RNT-9999")));
}

#[tokio::test]
async fn non_positive_payment_is_unprocessable() {
    let (router, _) = router();

    let response = router
        .oneshot(post_json(
            "/api/v1/payments",
            json!({
                "payment_id": "PAY-X",
                "rental_id": "RNT-0001",
                "amount": "0",
                "payment_date": "2025-01-06"
            }),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn maintenance_routes_complete_and_price_job() {
    let (router, _) = router();

    let scheduled = router
        .clone()
        .oneshot(post_json(
            "/api/v1/maintenance",
            json!({
                "plate_id": "ES-001",
                "technician_id": "T-001",
                "notes": "brake squeal",
                "start_date_time": "2025-01-06T08:00:00"
            }),
        ))
        .await
        .expect("schedule");
    assert_eq!(scheduled.status(), StatusCode::CREATED);

    let completed = router
        .clone()
        .oneshot(post_json(
            "/api/v1/maintenance/MNT-0001/complete",
            json!({
                "end_date_time": "2025-01-06T11:30:00",
                "parts_used": [
                    { "part_id": "P-001", "quantity": 2 },
                    { "part_id": "P-002", "quantity": 1 }
                ]
            }),
        ))
        .await
        .expect("complete");
    assert_eq!(completed.status(), StatusCode::OK);

    let cost = router
        .oneshot(get("/api/v1/maintenance/MNT-0001/cost"))
        .await
        .expect("cost");
    let body = json_body(cost).await;
    let amount = |field: &str| {
        body[field]
            .as_str()
            .and_then(|raw| raw.parse::<Decimal>().ok())
            .expect("decimal field")
    };
    assert_eq!(amount("labor"), Decimal::new(122500, 2));
    assert_eq!(amount("parts"), Decimal::from(395));
    assert_eq!(amount("total"), Decimal::new(162000, 2));
}

#[tokio::test]
async fn repeat_deployment_conflicts() {
    let (router, _) = router();
    let request = || {
        post_json(
            "/api/v1/deployments",
            json!({ "plate_id": "EB-001", "location_id": "LOC-002" }),
        )
    };

    let first = router.clone().oneshot(request()).await.expect("deploy");
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = router.oneshot(request()).await.expect("deploy again");
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn cancel_handler_rejects_started_rental() {
    let Fleet { services, .. } = fleet();
    let services: Arc<FleetServices<InMemoryFleetStore>> = Arc::new(services);
    let rental = services
        .rentals
        .book_rental(
            &"C-001".into(),
            &"ES-002".into(),
            &"LOC-001".into(),
            at(9, 0),
        )
        .expect("booking");
    services
        .rentals
        .start_rental(&rental.rental_id)
        .expect("start");

    let response = crate::operations::router::cancel_rental::<InMemoryFleetStore>(
        State(services),
        Path(rental.rental_id.0.clone()),
    )
    .await
    .into_response();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}
