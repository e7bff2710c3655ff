use std::collections::HashSet;

use async_trait::async_trait;
use tracing::warn;

use crate::domain::lead::{DedupKey, Lead};
use crate::errors::CollaboratorError;

/// Search over the records the external system already owns.
#[async_trait]
pub trait DuplicateLookup: Send + Sync {
    async fn email_exists(&self, email: &str) -> Result<bool, CollaboratorError>;
    async fn phone_exists(&self, phone: &str) -> Result<bool, CollaboratorError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DuplicateReason {
    Batch,
    ExternalEmail,
    ExternalPhone,
}

/// Detects repeats within the current batch and against the external system.
///
/// External lookups run only when the batch-local check passes, email before
/// phone, each skipped when the field is empty. A failed lookup call is
/// treated as "not found": letting a possible duplicate through is preferred
/// over blocking the whole run on the dedup check, and the external system
/// enforces uniqueness on create anyway.
#[derive(Debug, Default)]
pub struct DuplicateDetector {
    seen: HashSet<DedupKey>,
}

impl DuplicateDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn check<L>(&self, lead: &Lead, lookup: &L) -> Option<DuplicateReason>
    where
        L: DuplicateLookup + ?Sized,
    {
        if self.seen.contains(&lead.dedup_key()) {
            return Some(DuplicateReason::Batch);
        }

        if !lead.email.is_empty() {
            match lookup.email_exists(&lead.email).await {
                Ok(true) => return Some(DuplicateReason::ExternalEmail),
                Ok(false) => {}
                Err(error) => warn!(
                    event_name = "distribution.lookup_degraded",
                    field = "email",
                    error = %error,
                    "external email lookup failed, treating lead as not found"
                ),
            }
        }

        if !lead.phone.is_empty() {
            match lookup.phone_exists(&lead.phone).await {
                Ok(true) => return Some(DuplicateReason::ExternalPhone),
                Ok(false) => {}
                Err(error) => warn!(
                    event_name = "distribution.lookup_degraded",
                    field = "phone",
                    error = %error,
                    "external phone lookup failed, treating lead as not found"
                ),
            }
        }

        None
    }

    /// Recorded only after a lead has survived dedup and been assigned, so a
    /// duplicate never poisons matching beyond its own key.
    pub fn record(&mut self, key: DedupKey) {
        self.seen.insert(key);
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::{DuplicateDetector, DuplicateLookup, DuplicateReason};
    use crate::domain::lead::Lead;
    use crate::errors::CollaboratorError;

    struct StubLookup {
        known_emails: Vec<String>,
        known_phones: Vec<String>,
        fail: bool,
    }

    impl StubLookup {
        fn empty() -> Self {
            Self { known_emails: Vec::new(), known_phones: Vec::new(), fail: false }
        }
    }

    #[async_trait]
    impl DuplicateLookup for StubLookup {
        async fn email_exists(&self, email: &str) -> Result<bool, CollaboratorError> {
            if self.fail {
                return Err(CollaboratorError::Unavailable("connection refused".to_string()));
            }
            Ok(self.known_emails.iter().any(|known| known.eq_ignore_ascii_case(email)))
        }

        async fn phone_exists(&self, phone: &str) -> Result<bool, CollaboratorError> {
            if self.fail {
                return Err(CollaboratorError::Unavailable("connection refused".to_string()));
            }
            Ok(self.known_phones.iter().any(|known| known == phone))
        }
    }

    fn lead(email: &str, phone: &str) -> Lead {
        Lead { email: email.to_string(), phone: phone.to_string(), ..Lead::default() }
    }

    #[tokio::test]
    async fn batch_repeat_is_reported_before_any_external_lookup() {
        let mut detector = DuplicateDetector::new();
        let first = lead("juan.perez@example.com", "600123456");
        detector.record(first.dedup_key());

        // would fail if the external lookup were consulted
        let lookup = StubLookup { fail: true, ..StubLookup::empty() };
        let repeat = lead("Juan.Perez@example.com", "600123456");
        assert_eq!(detector.check(&repeat, &lookup).await, Some(DuplicateReason::Batch));
    }

    #[tokio::test]
    async fn external_email_match_wins_over_phone() {
        let detector = DuplicateDetector::new();
        let lookup = StubLookup {
            known_emails: vec!["ana.gomez@example.com".to_string()],
            known_phones: vec!["600654321".to_string()],
            fail: false,
        };

        let candidate = lead("ana.gomez@example.com", "600654321");
        assert_eq!(
            detector.check(&candidate, &lookup).await,
            Some(DuplicateReason::ExternalEmail)
        );
    }

    #[tokio::test]
    async fn phone_is_checked_when_email_is_clean() {
        let detector = DuplicateDetector::new();
        let lookup = StubLookup {
            known_phones: vec!["600654321".to_string()],
            ..StubLookup::empty()
        };

        let candidate = lead("nuevo@example.com", "600654321");
        assert_eq!(
            detector.check(&candidate, &lookup).await,
            Some(DuplicateReason::ExternalPhone)
        );
    }

    #[tokio::test]
    async fn empty_fields_skip_their_external_lookup() {
        let detector = DuplicateDetector::new();
        let lookup = StubLookup { fail: true, ..StubLookup::empty() };

        // empty email and phone: no lookup is attempted, so the failing stub
        // is never hit and the lead passes
        assert_eq!(detector.check(&lead("", ""), &lookup).await, None);
    }

    #[tokio::test]
    async fn failed_lookup_is_lenient() {
        let detector = DuplicateDetector::new();
        let lookup = StubLookup { fail: true, ..StubLookup::empty() };

        let candidate = lead("juan.perez@example.com", "600123456");
        assert_eq!(detector.check(&candidate, &lookup).await, None);
    }
}
