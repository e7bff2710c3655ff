use std::collections::{BTreeMap, HashMap};

use crate::domain::advisor::{Advisor, AdvisorId};

/// Remaining daily assignment slots per advisor, rebuilt fresh at the start
/// of every run from the CRM's already-assigned counts. Never incremented
/// during a run; `reserve` is the only mutation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CapacityLedger {
    remaining: BTreeMap<AdvisorId, u32>,
}

impl CapacityLedger {
    /// Advisors absent from `used_today` get the full daily quota.
    pub fn initialize<'a>(
        advisors: impl IntoIterator<Item = &'a Advisor>,
        used_today: &HashMap<AdvisorId, u32>,
        max_per_day: u32,
    ) -> Self {
        let remaining = advisors
            .into_iter()
            .map(|advisor| {
                let used = used_today.get(&advisor.id).copied().unwrap_or(0);
                (advisor.id.clone(), max_per_day.saturating_sub(used))
            })
            .collect();
        Self { remaining }
    }

    pub fn remaining(&self, id: &AdvisorId) -> u32 {
        self.remaining.get(id).copied().unwrap_or(0)
    }

    /// Decrements one slot and reports success; an advisor at zero is left
    /// untouched. No overdraft is ever permitted.
    pub fn reserve(&mut self, id: &AdvisorId) -> bool {
        match self.remaining.get_mut(id) {
            Some(slots) if *slots > 0 => {
                *slots -= 1;
                true
            }
            _ => false,
        }
    }

    /// Advisors with room, ordered by remaining descending then id ascending.
    /// The map iterates in id order, so the stable sort on remaining keeps the
    /// id tie-break.
    pub fn candidates_with_room(&self) -> Vec<AdvisorId> {
        let mut candidates: Vec<(AdvisorId, u32)> = self
            .remaining
            .iter()
            .filter(|(_, slots)| **slots > 0)
            .map(|(id, slots)| (id.clone(), *slots))
            .collect();
        candidates.sort_by(|a, b| b.1.cmp(&a.1));
        candidates.into_iter().map(|(id, _)| id).collect()
    }

    pub fn has_room(&self) -> bool {
        self.remaining.values().any(|slots| *slots > 0)
    }
}
