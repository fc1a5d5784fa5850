use crate::cli::ServeArgs;
use crate::infra::{AppState, DevelopmentOracle, InMemoryAuditLog};
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use credit_ledger::config::AppConfig;
use credit_ledger::error::AppError;
use credit_ledger::ledger::CreditMarketplace;
use credit_ledger::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
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
    if let Some(owner) = args.owner.take() {
        config.ledger.owner = owner;
    }

    telemetry::init(&config.telemetry)?;

    let owner = config.ledger.owner_identity()?;
    let policy = config.ledger.offer_policy();

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let audit = Arc::new(InMemoryAuditLog::default());
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        audit: audit.clone(),
    };

    let marketplace = Arc::new(CreditMarketplace::new(
        owner.clone(),
        policy.clone(),
        Arc::new(DevelopmentOracle),
        audit,
    ));

    let app = with_service_routes(marketplace)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        %owner,
        score_range = ?policy.score_range(),
        max_interest_bps = policy.max_interest_bps(),
        "credit ledger ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
