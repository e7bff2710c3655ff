use thiserror::Error;

use crate::batch::BatchError;

/// Failures reported by the external collaborators (CRM query/lookup/create).
/// Lookup failures are recovered leniently by the duplicate detector; the
/// other variants surface per taxonomy as fatal or per-lead errors.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    #[error("record creation failed: {0}")]
    Creation(String),
    #[error("malformed collaborator response: {0}")]
    MalformedResponse(String),
}

/// Fatal conditions that abort a distribution run before or during setup.
/// Per-lead failures never surface here; they become `error:` outcomes.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("authentication failure: {0}")]
    Authentication(String),
    #[error("advisor roster unavailable: {0}")]
    Roster(String),
    #[error("today's assignment counts unavailable: {0}")]
    Counts(String),
    #[error("no active advisors found")]
    EmptyRoster,
    #[error(transparent)]
    Batch(#[from] BatchError),
}
