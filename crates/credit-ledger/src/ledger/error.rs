use super::domain::{ApplicationId, OfferId};
use super::oracle::OracleError;

/// Failure kinds surfaced by ledger operations.
///
/// Authorization failures render as a bare denial; error text never reveals registry
/// membership or offer ownership.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("attributes already submitted for this identity")]
    AlreadySubmitted,
    #[error("access denied")]
    Unauthorized,
    #[error("no attribute data submitted for subject")]
    NoData,
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("offer {0} not found")]
    OfferNotFound(OfferId),
    #[error("offer {0} is not active")]
    OfferNotActive(OfferId),
    #[error("applicant does not meet the offer's qualification threshold")]
    NotQualified,
    #[error("application {0} not found")]
    ApplicationNotFound(ApplicationId),
    #[error("access denied")]
    NotOfferOwner,
    #[error("application {0} already approved")]
    AlreadyApproved(ApplicationId),
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error("ledger state unavailable: {0}")]
    Poisoned(&'static str),
}

impl LedgerError {
    /// Whether the caller may retry the same request unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Oracle(OracleError::Unavailable(_)))
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            LedgerError::AlreadySubmitted => "already_submitted",
            LedgerError::Unauthorized => "unauthorized",
            LedgerError::NoData => "no_data",
            LedgerError::InvalidParameters(_) => "invalid_parameters",
            LedgerError::OfferNotFound(_) => "offer_not_found",
            LedgerError::OfferNotActive(_) => "offer_not_active",
            LedgerError::NotQualified => "not_qualified",
            LedgerError::ApplicationNotFound(_) => "not_found",
            LedgerError::NotOfferOwner => "not_offer_owner",
            LedgerError::AlreadyApproved(_) => "already_approved",
            LedgerError::Oracle(_) => "oracle_unavailable",
            LedgerError::Poisoned(_) => "internal",
        }
    }
}
