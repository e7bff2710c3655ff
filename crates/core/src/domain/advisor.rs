use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// CRM user id, e.g. `19x1`. Ordering is the deterministic tie-break used by
/// the allocator.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AdvisorId(pub String);

impl std::fmt::Display for AdvisorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Active sales advisor eligible to receive lead assignments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisor {
    pub id: AdvisorId,
    pub user_name: String,
}

/// Read-only snapshot of the active advisors for one run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AdvisorRoster {
    advisors: BTreeMap<AdvisorId, Advisor>,
}

impl AdvisorRoster {
    pub fn new(advisors: impl IntoIterator<Item = Advisor>) -> Self {
        Self {
            advisors: advisors
                .into_iter()
                .map(|advisor| (advisor.id.clone(), advisor))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.advisors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.advisors.len()
    }

    pub fn get(&self, id: &AdvisorId) -> Option<&Advisor> {
        self.advisors.get(id)
    }

    pub fn display_name(&self, id: &AdvisorId) -> Option<&str> {
        self.advisors.get(id).map(|advisor| advisor.user_name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Advisor> {
        self.advisors.values()
    }
}

#[cfg(test)]
mod tests {
    use super::{Advisor, AdvisorId, AdvisorRoster};

    #[test]
    fn roster_iterates_in_id_order() {
        let roster = AdvisorRoster::new(vec![
            Advisor { id: AdvisorId("20x1".to_string()), user_name: "asesor.dos".to_string() },
            Advisor { id: AdvisorId("19x1".to_string()), user_name: "asesor.uno".to_string() },
        ]);

        let ids: Vec<_> = roster.iter().map(|advisor| advisor.id.0.as_str()).collect();
        assert_eq!(ids, vec!["19x1", "20x1"]);
        assert_eq!(roster.display_name(&AdvisorId("19x1".to_string())), Some("asesor.uno"));
    }
}
