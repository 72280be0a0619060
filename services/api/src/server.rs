use crate::cli::ServeArgs;
use crate::infra::{seed_users, AppState};
use crate::routes::with_listing_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use listing_review::config::AppConfig;
use listing_review::error::AppError;
use listing_review::listings::{InMemoryEntityStore, ListingService};
use listing_review::telemetry;
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

    telemetry::init(&config.telemetry, config.environment)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryEntityStore::new());
    let seeded = seed_users(store.as_ref(), &args.seed_users)?;
    let listing_service = Arc::new(ListingService::new(
        store.clone(),
        store,
        config.listings,
    ));

    let app = with_listing_routes(listing_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        seeded,
        max_property_rows = config.listings.max_property_rows,
        user_delete_policy = config.listings.user_delete_policy.label(),
        "listing review service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
