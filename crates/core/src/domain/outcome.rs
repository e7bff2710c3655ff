use serde::{Deserialize, Serialize};

use crate::domain::advisor::AdvisorId;
use crate::domain::lead::Lead;

/// Final disposition of one input lead. Exactly one is produced per lead that
/// enters the allocator; outcomes are never mutated after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeStatus {
    /// Assigned in simulate mode; nothing was written to the CRM.
    Planned,
    /// Assigned and created in the CRM.
    Created,
    SkippedDuplicateBatch,
    SkippedDuplicateExternal,
    SkippedNoCapacity,
    /// Recovered per-lead failure; the run continues.
    Error(String),
}

impl OutcomeStatus {
    pub fn label(&self) -> String {
        match self {
            Self::Planned => "planned".to_string(),
            Self::Created => "created".to_string(),
            Self::SkippedDuplicateBatch => "skipped_duplicate_batch".to_string(),
            Self::SkippedDuplicateExternal => "skipped_duplicate_external".to_string(),
            Self::SkippedNoCapacity => "skipped_no_capacity".to_string(),
            Self::Error(detail) => format!("error: {detail}"),
        }
    }

    pub fn is_assignment(&self) -> bool {
        matches!(self, Self::Planned | Self::Created)
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentOutcome {
    pub lead: Lead,
    pub advisor_id: Option<AdvisorId>,
    pub advisor_name: Option<String>,
    /// CRM record id, populated only on real creation.
    pub record_id: Option<String>,
    pub status: OutcomeStatus,
}

impl AssignmentOutcome {
    pub fn unassigned(lead: Lead, status: OutcomeStatus) -> Self {
        Self { lead, advisor_id: None, advisor_name: None, record_id: None, status }
    }
}

#[cfg(test)]
mod tests {
    use super::OutcomeStatus;

    #[test]
    fn error_label_carries_detail() {
        let status = OutcomeStatus::Error("missing_identifier".to_string());
        assert_eq!(status.label(), "error: missing_identifier");
        assert!(!status.is_assignment());
    }

    #[test]
    fn assignment_statuses_are_planned_and_created() {
        assert!(OutcomeStatus::Planned.is_assignment());
        assert!(OutcomeStatus::Created.is_assignment());
        assert!(!OutcomeStatus::SkippedNoCapacity.is_assignment());
    }
}
