use serde::{Deserialize, Serialize};

/// Candidate contact read from one batch row. Immutable for the duration of
/// a run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub interest: String,
    pub entry_date: String,
    pub source: String,
}

/// Batch-local identity: email lowercased, phone verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub email: String,
    pub phone: String,
}

impl Lead {
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey { email: self.email.to_lowercase(), phone: self.phone.clone() }
    }

    /// At least one of email/phone must be present for dedup to be meaningful.
    pub fn has_identifier(&self) -> bool {
        !self.email.trim().is_empty() || !self.phone.trim().is_empty()
    }
}
