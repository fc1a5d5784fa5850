use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::error::LedgerError;

/// Opaque principal handle for borrowers, lenders, and the ledger owner.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    /// Trims surrounding whitespace and rejects the empty handle.
    pub fn parse(raw: &str) -> Result<Self, LedgerError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(LedgerError::InvalidParameters(
                "identity must not be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identity {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Identity> for String {
    fn from(value: Identity) -> Self {
        value.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sequential identifier of a loan offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfferId(pub u64);

impl fmt::Display for OfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sequential identifier of a loan application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub u64);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Encrypted value produced by the client-side encryption layer.
///
/// The ledger never interprets the bytes. On the wire they travel as lowercase hex and
/// `Debug` only reveals the length.
#[derive(Clone, PartialEq, Eq)]
pub struct Ciphertext(Vec<u8>);

impl Ciphertext {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn from_hex(raw: &str) -> Result<Self, LedgerError> {
        let digits = raw.trim().trim_start_matches("0x");
        hex::decode(digits)
            .map(Self)
            .map_err(|err| LedgerError::InvalidParameters(format!("ciphertext is not hex: {err}")))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Ciphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ciphertext({} bytes)", self.0.len())
    }
}

impl Serialize for Ciphertext {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Ciphertext {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_hex(&raw).map_err(serde::de::Error::custom)
    }
}

/// The four encrypted financial attributes a borrower submits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedAttributes {
    pub income: Ciphertext,
    pub debt: Ciphertext,
    pub payment_history: Ciphertext,
    pub utilization: Ciphertext,
}

impl EncryptedAttributes {
    pub(crate) fn validate(&self) -> Result<(), LedgerError> {
        let fields = [
            ("income", &self.income),
            ("debt", &self.debt),
            ("payment_history", &self.payment_history),
            ("utilization", &self.utilization),
        ];
        for (name, value) in fields {
            if value.is_empty() {
                return Err(LedgerError::InvalidParameters(format!(
                    "{name} ciphertext must not be empty"
                )));
            }
        }
        Ok(())
    }
}

/// Stored attribute record; immutable once written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeBundle {
    pub owner: Identity,
    pub fields: EncryptedAttributes,
    pub submitted: bool,
    pub submitted_at: DateTime<Utc>,
}

/// Transient outcome of a qualification check. Only `qualifies` leaves the evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualificationResult {
    pub subject: Identity,
    pub evaluator: Identity,
    pub threshold: u16,
    pub qualifies: bool,
}

/// Lender-published loan terms gated by a minimum score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanOffer {
    pub id: OfferId,
    pub lender: Identity,
    pub amount: u128,
    pub min_score: u16,
    pub interest_rate_bps: u16,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl LoanOffer {
    pub fn score_tier(&self) -> ScoreTier {
        ScoreTier::for_score(self.min_score)
    }

    pub fn view(&self) -> OfferView {
        OfferView {
            offer_id: self.id,
            lender: self.lender.clone(),
            amount: self.amount,
            min_score: self.min_score,
            score_tier: self.score_tier().label(),
            interest_rate_bps: self.interest_rate_bps,
            interest_rate_percent: format!("{:.2}%", f64::from(self.interest_rate_bps) / 100.0),
            active: self.active,
            created_at: self.created_at,
        }
    }
}

/// Public projection of an offer for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct OfferView {
    pub offer_id: OfferId,
    pub lender: Identity,
    pub amount: u128,
    pub min_score: u16,
    pub score_tier: &'static str,
    pub interest_rate_bps: u16,
    pub interest_rate_percent: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Band a score threshold falls into, as shown to borrowers browsing offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum ScoreTier {
    Poor,
    Fair,
    Good,
    VeryGood,
    Excellent,
}

impl ScoreTier {
    pub const fn for_score(score: u16) -> Self {
        match score {
            800..=u16::MAX => ScoreTier::Excellent,
            740..=799 => ScoreTier::VeryGood,
            670..=739 => ScoreTier::Good,
            580..=669 => ScoreTier::Fair,
            _ => ScoreTier::Poor,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            ScoreTier::Poor => "poor",
            ScoreTier::Fair => "fair",
            ScoreTier::Good => "good",
            ScoreTier::VeryGood => "very_good",
            ScoreTier::Excellent => "excellent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Pending,
    Approved,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Approved => "approved",
        }
    }
}

/// Borrower request against a specific offer, recorded only after qualification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanApplication {
    pub id: ApplicationId,
    pub offer_id: OfferId,
    pub applicant: Identity,
    pub status: ApplicationStatus,
    pub applied_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl LoanApplication {
    pub fn view(&self) -> ApplicationView {
        ApplicationView {
            application_id: self.id,
            offer_id: self.offer_id,
            applicant: self.applicant.clone(),
            status: self.status.label(),
            applied_at: self.applied_at,
            approved_at: self.approved_at,
        }
    }
}

/// Sanitized representation of an application's exposed status.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationView {
    pub application_id: ApplicationId,
    pub offer_id: OfferId,
    pub applicant: Identity,
    pub status: &'static str,
    pub applied_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
}

/// Aggregate view of one lender's book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LenderSummary {
    pub lender: Identity,
    pub total_offers: usize,
    pub active_offers: usize,
    pub active_amount: u128,
    pub average_interest_rate_bps: Option<u16>,
}
