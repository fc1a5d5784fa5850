use crate::infra::AppState;
use axum::extract::Query;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use credit_ledger::ledger::{
    ledger_router, AuditRecord, AuditSink, ConfidentialityOracle, CreditMarketplace,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

const DEFAULT_AUDIT_LIMIT: usize = 50;
const MAX_AUDIT_LIMIT: usize = 500;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct AuditQuery {
    #[serde(default)]
    pub(crate) limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AuditTrailResponse {
    pub(crate) total: usize,
    pub(crate) records: Vec<AuditRecord>,
}

pub(crate) fn with_service_routes<O, S>(marketplace: Arc<CreditMarketplace<O, S>>) -> axum::Router
where
    O: ConfidentialityOracle + 'static,
    S: AuditSink + 'static,
{
    ledger_router(marketplace)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route("/api/v1/audit", axum::routing::get(audit_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let (status, label) = if ready {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "initializing")
    };

    (status, Json(json!({ "status": label })))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn audit_endpoint(
    Extension(state): Extension<AppState>,
    Query(query): Query<AuditQuery>,
) -> Json<AuditTrailResponse> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_AUDIT_LIMIT)
        .min(MAX_AUDIT_LIMIT);

    Json(AuditTrailResponse {
        total: state.audit.len(),
        records: state.audit.latest(limit),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{encode_word, InMemoryAuditLog};
    use credit_ledger::ledger::{EncryptedAttributes, Identity};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::AtomicBool;

    fn state_with_log(audit: Arc<InMemoryAuditLog>, ready: bool) -> AppState {
        let recorder = PrometheusBuilder::new().build_recorder();
        AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(recorder.handle()),
            audit,
        }
    }

    #[tokio::test]
    async fn readiness_reflects_flag() {
        let audit = Arc::new(InMemoryAuditLog::default());

        let response = readiness_endpoint(Extension(state_with_log(audit.clone(), false)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = readiness_endpoint(Extension(state_with_log(audit, true)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn audit_endpoint_caps_and_tails_records() {
        use crate::infra::DevelopmentOracle;
        use credit_ledger::ledger::OfferPolicy;

        let audit = Arc::new(InMemoryAuditLog::default());
        let marketplace = CreditMarketplace::new(
            Identity::parse("owner").expect("identity"),
            OfferPolicy::default(),
            Arc::new(DevelopmentOracle),
            audit.clone(),
        );
        for name in ["0xA", "0xB", "0xC"] {
            marketplace
                .submit_attributes(
                    Identity::parse(name).expect("identity"),
                    EncryptedAttributes {
                        income: encode_word(1),
                        debt: encode_word(1),
                        payment_history: encode_word(1),
                        utilization: encode_word(1),
                    },
                )
                .expect("submitted");
        }

        let Json(body) = audit_endpoint(
            Extension(state_with_log(audit, true)),
            Query(AuditQuery { limit: Some(2) }),
        )
        .await;

        assert_eq!(body.total, 3);
        assert_eq!(body.records.len(), 2);
        assert_eq!(body.records[0].sequence, 1);
        assert_eq!(body.records[1].event.name(), "data_submitted");
    }
}
