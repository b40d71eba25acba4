use crate::cli::ServeArgs;
use crate::infra::{build_store, AppState};
use crate::routes::with_fleet_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use fleet_rental::config::AppConfig;
use fleet_rental::error::AppError;
use fleet_rental::telemetry;
use fleet_rental::FleetServices;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if args.no_seed {
        config.fleet.seed_demo_data = false;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = build_store(config.fleet.seed_demo_data)?;
    let services = Arc::new(FleetServices::new(store));

    let app = with_fleet_routes(services)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        seeded = config.fleet.seed_demo_data,
        "fleet rental service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
