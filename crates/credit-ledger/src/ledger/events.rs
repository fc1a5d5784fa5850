use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{ApplicationId, Identity, OfferId};

/// Append-only audit trail entries. None of them carry attribute ciphertexts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    DataSubmitted {
        identity: Identity,
    },
    EvaluatorRegistered {
        identity: Identity,
    },
    CreditCheckPerformed {
        evaluator: Identity,
        subject: Identity,
        qualifies: bool,
    },
    OfferCreated {
        offer_id: OfferId,
        lender: Identity,
        amount: u128,
        min_score: u16,
    },
    OfferWithdrawn {
        offer_id: OfferId,
        lender: Identity,
    },
    LoanApplied {
        application_id: ApplicationId,
        applicant: Identity,
        offer_id: OfferId,
    },
    LoanApproved {
        application_id: ApplicationId,
        applicant: Identity,
        lender: Identity,
    },
}

impl AuditEvent {
    pub const fn name(&self) -> &'static str {
        match self {
            AuditEvent::DataSubmitted { .. } => "data_submitted",
            AuditEvent::EvaluatorRegistered { .. } => "evaluator_registered",
            AuditEvent::CreditCheckPerformed { .. } => "credit_check_performed",
            AuditEvent::OfferCreated { .. } => "offer_created",
            AuditEvent::OfferWithdrawn { .. } => "offer_withdrawn",
            AuditEvent::LoanApplied { .. } => "loan_applied",
            AuditEvent::LoanApproved { .. } => "loan_approved",
        }
    }
}

/// Event stamped with its position in the ledger's audit sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    pub sequence: u64,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: AuditEvent,
}

/// Observer hook for audit records (log shippers, indexers, in-memory logs).
pub trait AuditSink: Send + Sync {
    fn record(&self, record: AuditRecord) -> Result<(), AuditError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit transport unavailable: {0}")]
    Transport(String),
}
