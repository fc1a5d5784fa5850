use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::domain::{ApplicationId, ApplicationStatus, Identity, LoanApplication, OfferId};
use super::error::LedgerError;
use super::offers::OfferBook;

/// Owns loan applications and the per-applicant index.
#[derive(Debug, Default)]
pub struct ApplicationLedger {
    applications: Vec<LoanApplication>,
    by_applicant: HashMap<Identity, Vec<ApplicationId>>,
}

impl ApplicationLedger {
    /// Records a pending application. Qualification is the caller's responsibility.
    pub fn record(
        &mut self,
        offers: &OfferBook,
        offer_id: OfferId,
        applicant: Identity,
        now: DateTime<Utc>,
    ) -> Result<ApplicationId, LedgerError> {
        let offer = offers.get(offer_id)?;
        if !offer.active {
            return Err(LedgerError::OfferNotActive(offer_id));
        }

        let id = ApplicationId(self.applications.len() as u64);
        self.applications.push(LoanApplication {
            id,
            offer_id,
            applicant: applicant.clone(),
            status: ApplicationStatus::Pending,
            applied_at: now,
            approved_at: None,
        });
        self.by_applicant.entry(applicant).or_default().push(id);
        Ok(id)
    }

    /// Moves a pending application to approved on behalf of the offer's lender.
    ///
    /// Checks run in order: unknown id, ownership, already approved, then whether the offer
    /// can still be consumed. Nothing is written unless all of them pass.
    pub fn approve(
        &mut self,
        offers: &OfferBook,
        application_id: ApplicationId,
        approver: &Identity,
        now: DateTime<Utc>,
    ) -> Result<&LoanApplication, LedgerError> {
        let index = usize::try_from(application_id.0)
            .ok()
            .filter(|index| *index < self.applications.len())
            .ok_or(LedgerError::ApplicationNotFound(application_id))?;

        let application = &self.applications[index];
        let offer = offers.get(application.offer_id)?;
        if &offer.lender != approver {
            return Err(LedgerError::NotOfferOwner);
        }
        if application.status == ApplicationStatus::Approved {
            return Err(LedgerError::AlreadyApproved(application_id));
        }
        if !offer.active {
            return Err(LedgerError::OfferNotActive(offer.id));
        }

        let application = &mut self.applications[index];
        application.status = ApplicationStatus::Approved;
        application.approved_at = Some(now);
        Ok(&*application)
    }

    pub fn get(&self, id: ApplicationId) -> Result<&LoanApplication, LedgerError> {
        usize::try_from(id.0)
            .ok()
            .and_then(|index| self.applications.get(index))
            .ok_or(LedgerError::ApplicationNotFound(id))
    }

    pub fn by_applicant(&self, applicant: &Identity) -> Vec<ApplicationId> {
        self.by_applicant.get(applicant).cloned().unwrap_or_default()
    }
}
