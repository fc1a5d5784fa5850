use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::Value;

use crate::ledger::domain::{Ciphertext, EncryptedAttributes, Identity};
use crate::ledger::events::{AuditError, AuditEvent, AuditRecord, AuditSink};
use crate::ledger::oracle::{ConfidentialityOracle, OracleError};
use crate::ledger::{CreditMarketplace, OfferPolicy};

pub(super) type TestMarketplace = CreditMarketplace<ScoreOracle, MemoryAudit>;

pub(super) fn identity(raw: &str) -> Identity {
    Identity::parse(raw).expect("valid identity")
}

pub(super) fn owner() -> Identity {
    identity("owner")
}

pub(super) fn lender_a() -> Identity {
    identity("0xLenderA")
}

pub(super) fn user_x() -> Identity {
    identity("0xUserX")
}

pub(super) fn user_y() -> Identity {
    identity("0xUserY")
}

/// Test encoding: the score the stub oracle should "compute" rides in the income field.
pub(super) fn fields_with_score(score: u16) -> EncryptedAttributes {
    EncryptedAttributes {
        income: Ciphertext::new(score.to_be_bytes().to_vec()),
        debt: Ciphertext::new(vec![0xde, 0xb7]),
        payment_history: Ciphertext::new(vec![0x55]),
        utilization: Ciphertext::new(vec![0x1e]),
    }
}

pub(super) fn good_fields() -> EncryptedAttributes {
    fields_with_score(720)
}

pub(super) fn weak_fields() -> EncryptedAttributes {
    fields_with_score(540)
}

/// Deterministic oracle that reads the score planted by `fields_with_score`.
#[derive(Default)]
pub(super) struct ScoreOracle {
    calls: AtomicUsize,
}

impl ScoreOracle {
    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ConfidentialityOracle for ScoreOracle {
    fn evaluate(
        &self,
        attributes: &EncryptedAttributes,
        threshold: u16,
    ) -> Result<bool, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let bytes: [u8; 2] = attributes
            .income
            .as_bytes()
            .try_into()
            .map_err(|_| OracleError::Malformed("expected two-byte score".to_string()))?;
        Ok(u16::from_be_bytes(bytes) >= threshold)
    }
}

pub(super) struct UnavailableOracle;

impl ConfidentialityOracle for UnavailableOracle {
    fn evaluate(
        &self,
        _attributes: &EncryptedAttributes,
        _threshold: u16,
    ) -> Result<bool, OracleError> {
        Err(OracleError::Unavailable("coprocessor offline".to_string()))
    }
}

pub(super) struct PanickingOracle;

impl ConfidentialityOracle for PanickingOracle {
    fn evaluate(
        &self,
        _attributes: &EncryptedAttributes,
        _threshold: u16,
    ) -> Result<bool, OracleError> {
        panic!("coprocessor driver crashed");
    }
}

/// Blocks inside `evaluate` until the test releases it, then approves.
pub(super) struct GatedOracle {
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

impl GatedOracle {
    /// Returns the oracle, a receiver signalled on entry and a sender that releases it.
    pub(super) fn new() -> (Self, Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let oracle = Self {
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        };
        (oracle, entered_rx, release_tx)
    }
}

impl ConfidentialityOracle for GatedOracle {
    fn evaluate(
        &self,
        _attributes: &EncryptedAttributes,
        _threshold: u16,
    ) -> Result<bool, OracleError> {
        let entered = self.entered.lock().expect("gate mutex poisoned");
        let _ = entered.send(());
        drop(entered);
        self.release
            .lock()
            .expect("gate mutex poisoned")
            .recv()
            .map_err(|_| OracleError::Unavailable("gate dropped".to_string()))?;
        Ok(true)
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryAudit {
    records: Arc<Mutex<Vec<AuditRecord>>>,
}

impl MemoryAudit {
    pub(super) fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().expect("audit mutex poisoned").clone()
    }

    pub(super) fn events(&self) -> Vec<AuditEvent> {
        self.records()
            .into_iter()
            .map(|record| record.event)
            .collect()
    }
}

impl AuditSink for MemoryAudit {
    fn record(&self, record: AuditRecord) -> Result<(), AuditError> {
        self.records
            .lock()
            .expect("audit mutex poisoned")
            .push(record);
        Ok(())
    }
}

pub(super) struct UnavailableAudit;

impl AuditSink for UnavailableAudit {
    fn record(&self, _record: AuditRecord) -> Result<(), AuditError> {
        Err(AuditError::Transport("collector offline".to_string()))
    }
}

pub(super) fn build_marketplace() -> (TestMarketplace, Arc<ScoreOracle>, Arc<MemoryAudit>) {
    let oracle = Arc::new(ScoreOracle::default());
    let audit = Arc::new(MemoryAudit::default());
    let marketplace = CreditMarketplace::new(
        owner(),
        OfferPolicy::default(),
        oracle.clone(),
        audit.clone(),
    );
    (marketplace, oracle, audit)
}

/// Owner registers `lender_a`, who publishes the reference 1_000_000 / 650 / 500 offer.
pub(super) fn marketplace_with_offer() -> (TestMarketplace, Arc<ScoreOracle>, Arc<MemoryAudit>) {
    let (marketplace, oracle, audit) = build_marketplace();
    marketplace
        .register_evaluator(&owner(), lender_a())
        .expect("owner registers lender");
    let offer_id = marketplace
        .create_offer(lender_a(), 1_000_000, 650, 500)
        .expect("offer created");
    assert_eq!(offer_id.0, 0);
    (marketplace, oracle, audit)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 4096)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
