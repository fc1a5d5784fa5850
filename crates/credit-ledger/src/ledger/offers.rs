use std::collections::{BTreeSet, HashMap};
use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};

use super::domain::{Identity, LenderSummary, LoanOffer, OfferId};
use super::error::LedgerError;

/// Bounds every new offer must respect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferPolicy {
    score_range: RangeInclusive<u16>,
    max_interest_bps: u16,
}

impl OfferPolicy {
    pub const DEFAULT_SCORE_FLOOR: u16 = 300;
    pub const DEFAULT_SCORE_CEILING: u16 = 850;
    pub const DEFAULT_MAX_INTEREST_BPS: u16 = 2000;

    pub fn new(score_range: RangeInclusive<u16>, max_interest_bps: u16) -> Self {
        Self {
            score_range,
            max_interest_bps,
        }
    }

    pub fn score_range(&self) -> &RangeInclusive<u16> {
        &self.score_range
    }

    pub fn max_interest_bps(&self) -> u16 {
        self.max_interest_bps
    }

    pub fn validate(
        &self,
        amount: u128,
        min_score: u16,
        interest_rate_bps: u16,
    ) -> Result<(), LedgerError> {
        if amount == 0 {
            return Err(LedgerError::InvalidParameters(
                "amount must be greater than zero".to_string(),
            ));
        }
        if !self.score_range.contains(&min_score) {
            return Err(LedgerError::InvalidParameters(format!(
                "min_score {min_score} outside {}..={}",
                self.score_range.start(),
                self.score_range.end()
            )));
        }
        if interest_rate_bps > self.max_interest_bps {
            return Err(LedgerError::InvalidParameters(format!(
                "interest rate {interest_rate_bps} bps exceeds {} bps",
                self.max_interest_bps
            )));
        }
        Ok(())
    }
}

impl Default for OfferPolicy {
    fn default() -> Self {
        Self::new(
            Self::DEFAULT_SCORE_FLOOR..=Self::DEFAULT_SCORE_CEILING,
            Self::DEFAULT_MAX_INTEREST_BPS,
        )
    }
}

/// Owns every loan offer and the ordered index of active ones.
///
/// Offers live in a vector indexed by id; ids are assigned sequentially so the
/// `BTreeSet` index iterates in creation order.
#[derive(Debug, Default)]
pub struct OfferBook {
    policy: OfferPolicy,
    offers: Vec<LoanOffer>,
    active: BTreeSet<OfferId>,
    by_lender: HashMap<Identity, Vec<OfferId>>,
}

impl OfferBook {
    pub fn new(policy: OfferPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn create(
        &mut self,
        lender: Identity,
        amount: u128,
        min_score: u16,
        interest_rate_bps: u16,
        now: DateTime<Utc>,
    ) -> Result<OfferId, LedgerError> {
        self.policy.validate(amount, min_score, interest_rate_bps)?;

        let id = OfferId(self.offers.len() as u64);
        self.offers.push(LoanOffer {
            id,
            lender: lender.clone(),
            amount,
            min_score,
            interest_rate_bps,
            active: true,
            created_at: now,
        });
        self.active.insert(id);
        self.by_lender.entry(lender).or_default().push(id);
        Ok(id)
    }

    pub fn get(&self, id: OfferId) -> Result<&LoanOffer, LedgerError> {
        usize::try_from(id.0)
            .ok()
            .and_then(|index| self.offers.get(index))
            .ok_or(LedgerError::OfferNotFound(id))
    }

    pub fn active_ids(&self) -> Vec<OfferId> {
        self.active.iter().copied().collect()
    }

    /// Returns `true` when the offer flipped from active to inactive.
    pub fn deactivate(&mut self, id: OfferId) -> Result<bool, LedgerError> {
        let offer = usize::try_from(id.0)
            .ok()
            .and_then(|index| self.offers.get_mut(index))
            .ok_or(LedgerError::OfferNotFound(id))?;

        let was_active = offer.active;
        offer.active = false;
        self.active.remove(&id);
        Ok(was_active)
    }

    pub fn withdraw(&mut self, id: OfferId, caller: &Identity) -> Result<Identity, LedgerError> {
        let offer = self.get(id)?;
        if &offer.lender != caller {
            return Err(LedgerError::NotOfferOwner);
        }
        if !offer.active {
            return Err(LedgerError::OfferNotActive(id));
        }
        let lender = offer.lender.clone();
        self.deactivate(id)?;
        Ok(lender)
    }

    pub fn by_lender(&self, lender: &Identity) -> Vec<OfferId> {
        self.by_lender.get(lender).cloned().unwrap_or_default()
    }

    pub fn lender_summary(&self, lender: &Identity) -> LenderSummary {
        let offers: Vec<&LoanOffer> = self
            .by_lender(lender)
            .into_iter()
            .filter_map(|id| self.get(id).ok())
            .collect();
        let active: Vec<&LoanOffer> = offers.iter().copied().filter(|offer| offer.active).collect();

        let active_amount = active
            .iter()
            .fold(0u128, |total, offer| total.saturating_add(offer.amount));
        let average_interest_rate_bps = if active.is_empty() {
            None
        } else {
            let total: u64 = active
                .iter()
                .map(|offer| u64::from(offer.interest_rate_bps))
                .sum();
            Some((total / active.len() as u64) as u16)
        };

        LenderSummary {
            lender: lender.clone(),
            total_offers: offers.len(),
            active_offers: active.len(),
            active_amount,
            average_interest_rate_bps,
        }
    }
}
