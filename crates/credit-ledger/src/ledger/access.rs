use std::collections::HashMap;

use super::domain::Identity;

/// Identities allowed to run qualification checks. Access is only ever granted.
#[derive(Debug, Default)]
pub struct AccessRegistry {
    entries: HashMap<Identity, bool>,
}

impl AccessRegistry {
    /// Marks the identity active. Returns `false` when it already was.
    pub fn register(&mut self, identity: Identity) -> bool {
        let active = self.entries.entry(identity).or_insert(false);
        let newly_active = !*active;
        *active = true;
        newly_active
    }

    pub fn is_registered(&self, identity: &Identity) -> bool {
        self.entries.get(identity).copied().unwrap_or(false)
    }
}
