use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, warn};

use super::access::AccessRegistry;
use super::attributes::AttributeStore;
use super::domain::{Identity, QualificationResult};
use super::error::LedgerError;
use super::events::AuditEvent;
use super::oracle::{ConfidentialityOracle, OracleError};

/// Runs authorize → fetch → evaluate for a single qualification request.
///
/// Holds no state of its own; callers pass in the registry and store under whatever lock
/// guards them, so the bundle cannot change between fetch and evaluate.
pub struct QualificationEvaluator<O> {
    oracle: Arc<O>,
}

impl<O> QualificationEvaluator<O>
where
    O: ConfidentialityOracle,
{
    pub fn new(oracle: Arc<O>) -> Self {
        Self { oracle }
    }

    pub fn check(
        &self,
        registry: &AccessRegistry,
        store: &AttributeStore,
        evaluator: &Identity,
        subject: &Identity,
        threshold: u16,
    ) -> Result<QualificationResult, LedgerError> {
        if !registry.is_registered(evaluator) {
            warn!(%evaluator, "qualification check denied");
            return Err(LedgerError::Unauthorized);
        }

        let attributes = store.bundle(subject).ok_or(LedgerError::NoData)?;

        // The oracle runs under the ledger lock; a panic must not poison it.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.oracle.evaluate(attributes, threshold)
        }))
        .unwrap_or_else(|_| Err(OracleError::Unavailable("oracle panicked".to_string())));

        let qualifies = outcome.map_err(|err| {
            warn!(%evaluator, %subject, error = %err, "confidential evaluation failed");
            LedgerError::from(err)
        })?;

        debug!(%evaluator, %subject, threshold, qualifies, "qualification evaluated");

        Ok(QualificationResult {
            subject: subject.clone(),
            evaluator: evaluator.clone(),
            threshold,
            qualifies,
        })
    }
}

impl QualificationResult {
    pub fn audit_event(&self) -> AuditEvent {
        AuditEvent::CreditCheckPerformed {
            evaluator: self.evaluator.clone(),
            subject: self.subject.clone(),
            qualifies: self.qualifies,
        }
    }
}
