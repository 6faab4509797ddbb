use crate::cli::ServeArgs;
use crate::infra::{load_store, AppState};
use crate::routes::with_allocation_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use elective_allocation::config::AppConfig;
use elective_allocation::error::AppError;
use elective_allocation::telemetry;
use elective_allocation::workflows::allocation::AllocationService;
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
    if let Some(data_dir) = args.data_dir.take() {
        config.allocation.data_dir = Some(data_dir);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = load_store(config.allocation.data_dir.as_deref())?;
    let packages = store.package_ids().map(|ids| ids.len()).unwrap_or_default();
    let allocation_service = Arc::new(AllocationService::new(
        Arc::new(store),
        config.allocation.settings(),
    ));

    let app = with_allocation_routes(allocation_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        packages,
        rerun_policy = ?config.allocation.rerun_policy,
        "elective allocation service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
