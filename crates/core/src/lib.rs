pub mod batch;
pub mod config;
pub mod distribution;
pub mod domain;
pub mod errors;

pub use batch::{read_batch, write_outcomes, BatchError, ParsedRow};
pub use distribution::allocator::{LeadDistributor, LeadWriter, RunMode};
pub use distribution::capacity::CapacityLedger;
pub use distribution::dedup::{DuplicateDetector, DuplicateLookup, DuplicateReason};
pub use distribution::recorder::{RunRecorder, RunSummary};
pub use domain::advisor::{Advisor, AdvisorId, AdvisorRoster};
pub use domain::lead::{DedupKey, Lead};
pub use domain::outcome::{AssignmentOutcome, OutcomeStatus};
pub use errors::{CollaboratorError, RunError};
