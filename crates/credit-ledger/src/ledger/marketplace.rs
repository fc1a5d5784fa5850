use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tracing::{debug, info, warn};

use super::access::AccessRegistry;
use super::applications::ApplicationLedger;
use super::attributes::AttributeStore;
use super::domain::{
    ApplicationId, EncryptedAttributes, Identity, LenderSummary, LoanApplication, LoanOffer,
    OfferId,
};
use super::error::LedgerError;
use super::evaluator::QualificationEvaluator;
use super::events::{AuditEvent, AuditRecord, AuditSink};
use super::offers::{OfferBook, OfferPolicy};
use super::oracle::ConfidentialityOracle;

/// Joint state of the four owning components, guarded by one lock so cross-component
/// invariants are always read consistently.
#[derive(Debug, Default)]
pub(crate) struct LedgerState {
    pub(crate) attributes: AttributeStore,
    pub(crate) access: AccessRegistry,
    pub(crate) offers: OfferBook,
    pub(crate) applications: ApplicationLedger,
}

/// Coordinator exposing every externally visible ledger operation.
///
/// Each call is one transaction: mutations hold the write lock from validation through the
/// last write (including the oracle round-trip inside `apply_for_loan`), and audit records
/// are stamped under the lock but delivered after it is released.
pub struct CreditMarketplace<O, S> {
    owner: Identity,
    state: RwLock<LedgerState>,
    evaluator: QualificationEvaluator<O>,
    audit: Arc<S>,
    sequence: AtomicU64,
}

impl<O, S> CreditMarketplace<O, S>
where
    O: ConfidentialityOracle + 'static,
    S: AuditSink + 'static,
{
    pub fn new(owner: Identity, policy: OfferPolicy, oracle: Arc<O>, audit: Arc<S>) -> Self {
        let state = LedgerState {
            offers: OfferBook::new(policy),
            ..LedgerState::default()
        };

        Self {
            owner,
            state: RwLock::new(state),
            evaluator: QualificationEvaluator::new(oracle),
            audit,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn owner(&self) -> &Identity {
        &self.owner
    }

    /// Stores a borrower's encrypted attributes. A second submission is refused.
    pub fn submit_attributes(
        &self,
        identity: Identity,
        fields: EncryptedAttributes,
    ) -> Result<(), LedgerError> {
        let record = {
            let mut state = self.write()?;
            if let Err(err) = state.attributes.submit(identity.clone(), fields, Utc::now()) {
                warn!(%identity, error = %err, "attribute submission rejected");
                return Err(err);
            }
            self.stamp(AuditEvent::DataSubmitted {
                identity: identity.clone(),
            })
        };

        info!(%identity, "encrypted attributes stored");
        self.publish([record]);
        Ok(())
    }

    pub fn data_status(&self, identity: &Identity) -> Result<bool, LedgerError> {
        Ok(self.read()?.attributes.has_submitted(identity))
    }

    /// Grants qualification-check access. Only the ledger owner may call this.
    pub fn register_evaluator(
        &self,
        caller: &Identity,
        identity: Identity,
    ) -> Result<(), LedgerError> {
        if caller != &self.owner {
            warn!(%caller, "evaluator registration denied");
            return Err(LedgerError::Unauthorized);
        }

        let record = {
            let mut state = self.write()?;
            if !state.access.register(identity.clone()) {
                debug!(%identity, "evaluator already registered");
                return Ok(());
            }
            self.stamp(AuditEvent::EvaluatorRegistered {
                identity: identity.clone(),
            })
        };

        info!(%identity, "evaluator registered");
        self.publish([record]);
        Ok(())
    }

    pub fn is_registered(&self, identity: &Identity) -> Result<bool, LedgerError> {
        Ok(self.read()?.access.is_registered(identity))
    }

    /// Runs a qualification check and returns only the boolean outcome.
    pub fn check_qualification(
        &self,
        evaluator: &Identity,
        subject: &Identity,
        threshold: u16,
    ) -> Result<bool, LedgerError> {
        let (qualifies, record) = {
            let state = self.read()?;
            let result = self.evaluator.check(
                &state.access,
                &state.attributes,
                evaluator,
                subject,
                threshold,
            )?;
            (result.qualifies, self.stamp(result.audit_event()))
        };

        info!(%evaluator, %subject, qualifies, "credit check performed");
        self.publish([record]);
        Ok(qualifies)
    }

    pub fn create_offer(
        &self,
        lender: Identity,
        amount: u128,
        min_score: u16,
        interest_rate_bps: u16,
    ) -> Result<OfferId, LedgerError> {
        let (offer_id, record) = {
            let mut state = self.write()?;
            let offer_id = state
                .offers
                .create(
                    lender.clone(),
                    amount,
                    min_score,
                    interest_rate_bps,
                    Utc::now(),
                )
                .map_err(|err| {
                    warn!(%lender, error = %err, "offer rejected");
                    err
                })?;
            let record = self.stamp(AuditEvent::OfferCreated {
                offer_id,
                lender: lender.clone(),
                amount,
                min_score,
            });
            (offer_id, record)
        };

        info!(%offer_id, %lender, amount, min_score, interest_rate_bps, "offer created");
        self.publish([record]);
        Ok(offer_id)
    }

    pub fn get_offer(&self, offer_id: OfferId) -> Result<LoanOffer, LedgerError> {
        self.read()?.offers.get(offer_id).cloned()
    }

    pub fn list_active_offers(&self) -> Result<Vec<OfferId>, LedgerError> {
        Ok(self.read()?.offers.active_ids())
    }

    /// Lets a lender pull an offer that has not been consumed yet.
    pub fn withdraw_offer(&self, offer_id: OfferId, caller: &Identity) -> Result<(), LedgerError> {
        let record = {
            let mut state = self.write()?;
            let lender = state.offers.withdraw(offer_id, caller).map_err(|err| {
                warn!(%offer_id, %caller, error = %err, "offer withdrawal rejected");
                err
            })?;
            self.stamp(AuditEvent::OfferWithdrawn { offer_id, lender })
        };

        info!(%offer_id, "offer withdrawn");
        self.publish([record]);
        Ok(())
    }

    pub fn offers_by_lender(&self, lender: &Identity) -> Result<Vec<OfferId>, LedgerError> {
        Ok(self.read()?.offers.by_lender(lender))
    }

    pub fn lender_summary(&self, lender: &Identity) -> Result<LenderSummary, LedgerError> {
        Ok(self.read()?.offers.lender_summary(lender))
    }

    /// Applies for an offer on behalf of `applicant`.
    ///
    /// The offer's lender acts as evaluator with the offer's minimum score as threshold.
    /// Applicants that do not qualify never reach the application ledger, and a failed
    /// attempt leaves no audit trace.
    pub fn apply_for_loan(
        &self,
        offer_id: OfferId,
        applicant: Identity,
    ) -> Result<ApplicationId, LedgerError> {
        let (application_id, records) = {
            let mut state = self.write()?;
            let offer = state.offers.get(offer_id)?;
            if !offer.active {
                return Err(LedgerError::OfferNotActive(offer_id));
            }
            let lender = offer.lender.clone();
            let threshold = offer.min_score;

            let result = self.evaluator.check(
                &state.access,
                &state.attributes,
                &lender,
                &applicant,
                threshold,
            )?;
            if !result.qualifies {
                warn!(%offer_id, %applicant, "applicant not qualified");
                return Err(LedgerError::NotQualified);
            }

            let LedgerState {
                offers,
                applications,
                ..
            } = &mut *state;
            let application_id =
                applications.record(offers, offer_id, applicant.clone(), Utc::now())?;

            let check = self.stamp(result.audit_event());
            let applied = self.stamp(AuditEvent::LoanApplied {
                application_id,
                applicant: applicant.clone(),
                offer_id,
            });
            (application_id, [check, applied])
        };

        info!(%application_id, %offer_id, %applicant, "loan application recorded");
        self.publish(records);
        Ok(application_id)
    }

    /// Approves a pending application and retires its offer.
    pub fn approve_loan(
        &self,
        application_id: ApplicationId,
        approver: &Identity,
    ) -> Result<(), LedgerError> {
        let (offer_id, record) = {
            let mut state = self.write()?;
            let LedgerState {
                offers,
                applications,
                ..
            } = &mut *state;

            let approved = applications
                .approve(offers, application_id, approver, Utc::now())
                .map_err(|err| {
                    warn!(%application_id, %approver, error = %err, "approval rejected");
                    err
                })?;
            let offer_id = approved.offer_id;
            let applicant = approved.applicant.clone();

            offers.deactivate(offer_id)?;

            let record = self.stamp(AuditEvent::LoanApproved {
                application_id,
                applicant,
                lender: approver.clone(),
            });
            (offer_id, record)
        };

        info!(%application_id, %offer_id, "loan approved; offer retired");
        self.publish([record]);
        Ok(())
    }

    pub fn get_application(
        &self,
        application_id: ApplicationId,
    ) -> Result<LoanApplication, LedgerError> {
        self.read()?.applications.get(application_id).cloned()
    }

    pub fn applications_by_applicant(
        &self,
        applicant: &Identity,
    ) -> Result<Vec<ApplicationId>, LedgerError> {
        Ok(self.read()?.applications.by_applicant(applicant))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, LedgerState>, LedgerError> {
        self.state
            .read()
            .map_err(|_| LedgerError::Poisoned("ledger state lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, LedgerState>, LedgerError> {
        self.state
            .write()
            .map_err(|_| LedgerError::Poisoned("ledger state lock poisoned"))
    }

    fn stamp(&self, event: AuditEvent) -> AuditRecord {
        AuditRecord {
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
            recorded_at: Utc::now(),
            event,
        }
    }

    fn publish<I>(&self, records: I)
    where
        I: IntoIterator<Item = AuditRecord>,
    {
        for record in records {
            let sequence = record.sequence;
            let name = record.event.name();
            if let Err(err) = self.audit.record(record) {
                warn!(sequence, event = name, error = %err, "audit record not delivered");
            }
        }
    }
}
