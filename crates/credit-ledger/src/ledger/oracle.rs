use super::domain::EncryptedAttributes;

/// External confidential-computation boundary.
///
/// Implementations evaluate the encrypted attributes against a threshold and return only the
/// boolean outcome. The ledger treats the answer as authoritative and never sees plaintext.
pub trait ConfidentialityOracle: Send + Sync {
    fn evaluate(&self, attributes: &EncryptedAttributes, threshold: u16)
        -> Result<bool, OracleError>;
}

/// Transient failure of the confidential evaluation backend.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("confidential evaluation unavailable: {0}")]
    Unavailable(String),
    #[error("confidential evaluation rejected ciphertext: {0}")]
    Malformed(String),
}
