use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryRewardLedger, InMemoryTripStore};
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

use fareledger::config::AppConfig;
use fareledger::error::AppError;
use fareledger::persistence::local::LocalTripCache;
use fareledger::persistence::remote::RemoteGateway;
use fareledger::persistence::PersistenceGateway;
use fareledger::telemetry;
use fareledger::tracking::{trip_router, FixedRate, TripApi, FALLBACK_RATE_PER_KM};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let cache = match &config.gateway.cache_path {
        Some(path) => Arc::new(LocalTripCache::at_path(path.clone())?),
        None => Arc::new(LocalTripCache::in_memory()),
    };

    let trips = if config.gateway.base_url.is_some() {
        let remote = Arc::new(RemoteGateway::new(&config.gateway)?);
        let gateway = PersistenceGateway::new(remote.clone(), remote.clone(), cache);
        let api = Arc::new(TripApi::new(
            gateway,
            remote,
            config.costs.clone(),
            config.tracking.tick_interval,
        ));
        trip_router(api)
    } else {
        warn!("GATEWAY_BASE_URL not configured; trips persist to in-memory stores only");
        let store = Arc::new(InMemoryTripStore::default());
        let ledger = Arc::new(InMemoryRewardLedger::default());
        let gateway = PersistenceGateway::new(store, ledger, cache);
        let api = Arc::new(TripApi::new(
            gateway,
            Arc::new(FixedRate(FALLBACK_RATE_PER_KM)),
            config.costs.clone(),
            config.tracking.tick_interval,
        ));
        trip_router(api)
    };

    let app = with_service_routes(trips)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "trip earnings service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
