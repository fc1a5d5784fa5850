//! Confidential credit ledger and eligibility-gated loan marketplace.
//!
//! Borrowers deposit encrypted attributes once, registered evaluators ask yes/no questions
//! about them through an injected [`ConfidentialityOracle`], and lenders publish offers that
//! only qualifying borrowers may apply to. [`CreditMarketplace`] owns the joint state and is
//! the only entry point that mutates it.

pub(crate) mod access;
pub(crate) mod applications;
pub(crate) mod attributes;
pub mod domain;
pub mod error;
pub(crate) mod evaluator;
pub mod events;
pub mod marketplace;
pub(crate) mod offers;
pub mod oracle;
pub mod router;

#[cfg(test)]
mod tests;

pub use domain::{
    ApplicationId, ApplicationStatus, ApplicationView, AttributeBundle, Ciphertext,
    EncryptedAttributes, Identity, LenderSummary, LoanApplication, LoanOffer, OfferId, OfferView,
    QualificationResult, ScoreTier,
};
pub use error::LedgerError;
pub use events::{AuditError, AuditEvent, AuditRecord, AuditSink};
pub use marketplace::CreditMarketplace;
pub use offers::OfferPolicy;
pub use oracle::{ConfidentialityOracle, OracleError};
pub use router::ledger_router;
