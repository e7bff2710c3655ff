use crate::domain::outcome::{AssignmentOutcome, OutcomeStatus};

/// Append-only accumulation of outcomes in processing order. Pure storage;
/// the tabular audit export lives in `batch::write_outcomes`.
#[derive(Debug, Default)]
pub struct RunRecorder {
    outcomes: Vec<AssignmentOutcome>,
}

impl RunRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, outcome: AssignmentOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn export(&self) -> &[AssignmentOutcome] {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> Vec<AssignmentOutcome> {
        self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// End-of-run counts surfaced to the operator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub planned: usize,
    pub created: usize,
    pub skipped_duplicate_batch: usize,
    pub skipped_duplicate_external: usize,
    pub skipped_no_capacity: usize,
    pub errors: usize,
}

impl RunSummary {
    pub fn tally(outcomes: &[AssignmentOutcome]) -> Self {
        let mut summary = Self::default();
        for outcome in outcomes {
            match &outcome.status {
                OutcomeStatus::Planned => summary.planned += 1,
                OutcomeStatus::Created => summary.created += 1,
                OutcomeStatus::SkippedDuplicateBatch => summary.skipped_duplicate_batch += 1,
                OutcomeStatus::SkippedDuplicateExternal => summary.skipped_duplicate_external += 1,
                OutcomeStatus::SkippedNoCapacity => summary.skipped_no_capacity += 1,
                OutcomeStatus::Error(_) => summary.errors += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.planned
            + self.created
            + self.skipped_duplicate_batch
            + self.skipped_duplicate_external
            + self.skipped_no_capacity
            + self.errors
    }
}
