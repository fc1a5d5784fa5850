use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use super::domain::{ApplicationId, EncryptedAttributes, Identity, LenderSummary, OfferId};
use super::error::LedgerError;
use super::events::AuditSink;
use super::marketplace::CreditMarketplace;
use super::oracle::ConfidentialityOracle;

/// Header carrying the authenticated caller identity, set by the gateway in front of us.
pub const CALLER_HEADER: &str = "x-ledger-identity";

#[derive(Debug, Deserialize)]
pub struct RegisterEvaluatorRequest {
    pub identity: Identity,
}

#[derive(Debug, Deserialize)]
pub struct QualificationRequest {
    pub subject: Identity,
    pub threshold: u16,
}

#[derive(Debug, Deserialize)]
pub struct CreateOfferRequest {
    pub amount: u128,
    pub min_score: u16,
    pub interest_rate_bps: u16,
}

#[derive(Debug, Serialize)]
pub struct LenderOffersView {
    pub offer_ids: Vec<OfferId>,
    pub summary: LenderSummary,
}

/// Router builder exposing the ledger operations over HTTP.
pub fn ledger_router<O, S>(service: Arc<CreditMarketplace<O, S>>) -> Router
where
    O: ConfidentialityOracle + 'static,
    S: AuditSink + 'static,
{
    Router::new()
        .route("/api/v1/attributes", post(submit_attributes_handler::<O, S>))
        .route(
            "/api/v1/attributes/:identity/status",
            get(data_status_handler::<O, S>),
        )
        .route("/api/v1/evaluators", post(register_evaluator_handler::<O, S>))
        .route(
            "/api/v1/evaluators/:identity",
            get(evaluator_status_handler::<O, S>),
        )
        .route("/api/v1/qualifications", post(qualification_handler::<O, S>))
        .route(
            "/api/v1/offers",
            post(create_offer_handler::<O, S>).get(active_offers_handler::<O, S>),
        )
        .route("/api/v1/offers/:offer_id", get(offer_handler::<O, S>))
        .route(
            "/api/v1/offers/:offer_id/withdraw",
            post(withdraw_offer_handler::<O, S>),
        )
        .route(
            "/api/v1/offers/:offer_id/applications",
            post(apply_handler::<O, S>),
        )
        .route(
            "/api/v1/applications/:application_id",
            get(application_handler::<O, S>),
        )
        .route(
            "/api/v1/applications/:application_id/approve",
            post(approve_handler::<O, S>),
        )
        .route(
            "/api/v1/borrowers/:identity/applications",
            get(borrower_applications_handler::<O, S>),
        )
        .route(
            "/api/v1/lenders/:identity/offers",
            get(lender_offers_handler::<O, S>),
        )
        .with_state(service)
}

/// Maps ledger failures onto HTTP statuses. Denials carry no detail.
pub(crate) fn error_response(error: LedgerError) -> Response {
    let status = match &error {
        LedgerError::AlreadySubmitted
        | LedgerError::OfferNotActive(_)
        | LedgerError::AlreadyApproved(_) => StatusCode::CONFLICT,
        LedgerError::Unauthorized | LedgerError::NotOfferOwner => {
            let payload = json!({ "error": "access denied" });
            return (StatusCode::FORBIDDEN, axum::Json(payload)).into_response();
        }
        LedgerError::NoData | LedgerError::NotQualified => StatusCode::UNPROCESSABLE_ENTITY,
        LedgerError::InvalidParameters(_) => StatusCode::BAD_REQUEST,
        LedgerError::OfferNotFound(_) | LedgerError::ApplicationNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        LedgerError::Oracle(_) if error.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
        LedgerError::Oracle(_) => StatusCode::BAD_GATEWAY,
        LedgerError::Poisoned(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = json!({
        "error": error.to_string(),
        "kind": error.kind(),
        "retryable": error.is_transient(),
    });
    (status, axum::Json(payload)).into_response()
}

fn caller(headers: &HeaderMap) -> Result<Identity, Response> {
    let unauthenticated = || {
        let payload = json!({ "error": format!("missing or empty {CALLER_HEADER} header") });
        (StatusCode::UNAUTHORIZED, axum::Json(payload)).into_response()
    };

    let raw = headers
        .get(CALLER_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(unauthenticated)?;
    Identity::parse(raw).map_err(|_| unauthenticated())
}

fn path_identity(raw: &str) -> Result<Identity, Response> {
    Identity::parse(raw).map_err(error_response)
}

/// Runs a marketplace call on the blocking pool.
///
/// Calls may wait on the ledger lock or on the oracle, neither of which may stall the
/// async workers.
async fn blocking<O, S, T, F>(
    service: Arc<CreditMarketplace<O, S>>,
    call: F,
) -> Result<T, Response>
where
    O: ConfidentialityOracle + 'static,
    S: AuditSink + 'static,
    T: Send + 'static,
    F: FnOnce(&CreditMarketplace<O, S>) -> Result<T, LedgerError> + Send + 'static,
{
    match tokio::task::spawn_blocking(move || call(&service)).await {
        Ok(outcome) => outcome.map_err(error_response),
        Err(err) => {
            error!(error = %err, "ledger task failed");
            let payload = json!({
                "error": "ledger task failed",
                "kind": "internal",
                "retryable": false,
            });
            Err((StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response())
        }
    }
}

pub(crate) async fn submit_attributes_handler<O, S>(
    State(service): State<Arc<CreditMarketplace<O, S>>>,
    headers: HeaderMap,
    axum::Json(fields): axum::Json<EncryptedAttributes>,
) -> Response
where
    O: ConfidentialityOracle + 'static,
    S: AuditSink + 'static,
{
    let identity = match caller(&headers) {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    let stored = identity.clone();
    match blocking(service, move |ledger| ledger.submit_attributes(stored, fields)).await {
        Ok(()) => {
            let payload = json!({ "identity": identity, "submitted": true });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(response) => response,
    }
}

pub(crate) async fn data_status_handler<O, S>(
    State(service): State<Arc<CreditMarketplace<O, S>>>,
    Path(identity): Path<String>,
) -> Response
where
    O: ConfidentialityOracle + 'static,
    S: AuditSink + 'static,
{
    let identity = match path_identity(&identity) {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    let subject = identity.clone();
    match blocking(service, move |ledger| ledger.data_status(&subject)).await {
        Ok(submitted) => {
            let payload = json!({ "identity": identity, "submitted": submitted });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(response) => response,
    }
}

pub(crate) async fn register_evaluator_handler<O, S>(
    State(service): State<Arc<CreditMarketplace<O, S>>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<RegisterEvaluatorRequest>,
) -> Response
where
    O: ConfidentialityOracle + 'static,
    S: AuditSink + 'static,
{
    let caller = match caller(&headers) {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    let outcome = blocking(service, move |ledger| {
        ledger.register_evaluator(&caller, request.identity)
    });
    match outcome.await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn evaluator_status_handler<O, S>(
    State(service): State<Arc<CreditMarketplace<O, S>>>,
    Path(identity): Path<String>,
) -> Response
where
    O: ConfidentialityOracle + 'static,
    S: AuditSink + 'static,
{
    let identity = match path_identity(&identity) {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    let subject = identity.clone();
    match blocking(service, move |ledger| ledger.is_registered(&subject)).await {
        Ok(registered) => {
            let payload = json!({ "identity": identity, "registered": registered });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(response) => response,
    }
}

pub(crate) async fn qualification_handler<O, S>(
    State(service): State<Arc<CreditMarketplace<O, S>>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<QualificationRequest>,
) -> Response
where
    O: ConfidentialityOracle + 'static,
    S: AuditSink + 'static,
{
    let evaluator = match caller(&headers) {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    let QualificationRequest { subject, threshold } = request;
    let checked = subject.clone();
    let outcome = blocking(service, move |ledger| {
        ledger.check_qualification(&evaluator, &checked, threshold)
    });
    match outcome.await {
        Ok(qualifies) => {
            let payload = json!({
                "subject": subject,
                "threshold": threshold,
                "qualifies": qualifies,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(response) => response,
    }
}

pub(crate) async fn create_offer_handler<O, S>(
    State(service): State<Arc<CreditMarketplace<O, S>>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<CreateOfferRequest>,
) -> Response
where
    O: ConfidentialityOracle + 'static,
    S: AuditSink + 'static,
{
    let lender = match caller(&headers) {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    let outcome = blocking(service, move |ledger| {
        ledger.create_offer(
            lender,
            request.amount,
            request.min_score,
            request.interest_rate_bps,
        )
    });
    match outcome.await {
        Ok(offer_id) => {
            let payload = json!({ "offer_id": offer_id });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(response) => response,
    }
}

pub(crate) async fn active_offers_handler<O, S>(
    State(service): State<Arc<CreditMarketplace<O, S>>>,
) -> Response
where
    O: ConfidentialityOracle + 'static,
    S: AuditSink + 'static,
{
    match blocking(service, |ledger| ledger.list_active_offers()).await {
        Ok(offer_ids) => {
            (StatusCode::OK, axum::Json(json!({ "offer_ids": offer_ids }))).into_response()
        }
        Err(response) => response,
    }
}

pub(crate) async fn offer_handler<O, S>(
    State(service): State<Arc<CreditMarketplace<O, S>>>,
    Path(offer_id): Path<u64>,
) -> Response
where
    O: ConfidentialityOracle + 'static,
    S: AuditSink + 'static,
{
    match blocking(service, move |ledger| ledger.get_offer(OfferId(offer_id))).await {
        Ok(offer) => (StatusCode::OK, axum::Json(offer.view())).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn withdraw_offer_handler<O, S>(
    State(service): State<Arc<CreditMarketplace<O, S>>>,
    headers: HeaderMap,
    Path(offer_id): Path<u64>,
) -> Response
where
    O: ConfidentialityOracle + 'static,
    S: AuditSink + 'static,
{
    let caller = match caller(&headers) {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    let outcome = blocking(service, move |ledger| {
        ledger.withdraw_offer(OfferId(offer_id), &caller)
    });
    match outcome.await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn apply_handler<O, S>(
    State(service): State<Arc<CreditMarketplace<O, S>>>,
    headers: HeaderMap,
    Path(offer_id): Path<u64>,
) -> Response
where
    O: ConfidentialityOracle + 'static,
    S: AuditSink + 'static,
{
    let applicant = match caller(&headers) {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    let outcome = blocking(service, move |ledger| {
        ledger.apply_for_loan(OfferId(offer_id), applicant)
    });
    match outcome.await {
        Ok(application_id) => {
            let payload = json!({ "application_id": application_id, "status": "pending" });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(response) => response,
    }
}

pub(crate) async fn application_handler<O, S>(
    State(service): State<Arc<CreditMarketplace<O, S>>>,
    Path(application_id): Path<u64>,
) -> Response
where
    O: ConfidentialityOracle + 'static,
    S: AuditSink + 'static,
{
    let outcome = blocking(service, move |ledger| {
        ledger.get_application(ApplicationId(application_id))
    });
    match outcome.await {
        Ok(application) => (StatusCode::OK, axum::Json(application.view())).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn approve_handler<O, S>(
    State(service): State<Arc<CreditMarketplace<O, S>>>,
    headers: HeaderMap,
    Path(application_id): Path<u64>,
) -> Response
where
    O: ConfidentialityOracle + 'static,
    S: AuditSink + 'static,
{
    let approver = match caller(&headers) {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    let outcome = blocking(service, move |ledger| {
        ledger.approve_loan(ApplicationId(application_id), &approver)
    });
    match outcome.await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn borrower_applications_handler<O, S>(
    State(service): State<Arc<CreditMarketplace<O, S>>>,
    Path(identity): Path<String>,
) -> Response
where
    O: ConfidentialityOracle + 'static,
    S: AuditSink + 'static,
{
    let applicant = match path_identity(&identity) {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    let subject = applicant.clone();
    let outcome = blocking(service, move |ledger| {
        ledger.applications_by_applicant(&subject)
    });
    match outcome.await {
        Ok(application_ids) => {
            let payload = json!({ "applicant": applicant, "application_ids": application_ids });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(response) => response,
    }
}

pub(crate) async fn lender_offers_handler<O, S>(
    State(service): State<Arc<CreditMarketplace<O, S>>>,
    Path(identity): Path<String>,
) -> Response
where
    O: ConfidentialityOracle + 'static,
    S: AuditSink + 'static,
{
    let lender = match path_identity(&identity) {
        Ok(identity) => identity,
        Err(response) => return response,
    };

    let outcome = blocking(service, move |ledger| {
        Ok(LenderOffersView {
            offer_ids: ledger.offers_by_lender(&lender)?,
            summary: ledger.lender_summary(&lender)?,
        })
    });
    match outcome.await {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(response) => response,
    }
}
