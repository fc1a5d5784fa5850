use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::domain::{AttributeBundle, EncryptedAttributes, Identity};
use super::error::LedgerError;

/// One encrypted attribute bundle per identity, written once.
#[derive(Debug, Default)]
pub struct AttributeStore {
    bundles: HashMap<Identity, AttributeBundle>,
}

impl AttributeStore {
    pub fn submit(
        &mut self,
        identity: Identity,
        fields: EncryptedAttributes,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        if self.bundles.contains_key(&identity) {
            return Err(LedgerError::AlreadySubmitted);
        }
        fields.validate()?;

        let bundle = AttributeBundle {
            owner: identity.clone(),
            fields,
            submitted: true,
            submitted_at: now,
        };
        self.bundles.insert(identity, bundle);
        Ok(())
    }

    pub fn has_submitted(&self, identity: &Identity) -> bool {
        self.bundles
            .get(identity)
            .map(|bundle| bundle.submitted)
            .unwrap_or(false)
    }

    /// Ciphertexts for the qualification evaluator; nothing else in the crate reads them.
    pub(crate) fn bundle(&self, identity: &Identity) -> Option<&EncryptedAttributes> {
        self.bundles
            .get(identity)
            .filter(|bundle| bundle.submitted)
            .map(|bundle| &bundle.fields)
    }
}
