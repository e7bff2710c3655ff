use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::batch::ParsedRow;
use crate::distribution::capacity::CapacityLedger;
use crate::distribution::dedup::{DuplicateDetector, DuplicateLookup, DuplicateReason};
use crate::distribution::recorder::RunRecorder;
use crate::domain::advisor::{AdvisorId, AdvisorRoster};
use crate::domain::lead::Lead;
use crate::domain::outcome::{AssignmentOutcome, OutcomeStatus};
use crate::errors::CollaboratorError;

/// Real creation of a lead record in the external system, returning the new
/// record id.
#[async_trait]
pub trait LeadWriter: Send + Sync {
    async fn create_lead(
        &self,
        lead: &Lead,
        advisor_id: &AdvisorId,
    ) -> Result<String, CollaboratorError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    /// Assign without touching the external system; outcomes are `planned`.
    Simulate,
    /// Create each assigned lead in the external system.
    Apply,
}

/// Sequential distribution of one batch. Leads are processed strictly in
/// input order: capacity decisions for lead N are final before lead N+1 is
/// evaluated, which is what makes the unlocked ledger safe.
pub struct LeadDistributor<'a, L, W> {
    lookup: &'a L,
    writer: &'a W,
    mode: RunMode,
}

impl<'a, L, W> LeadDistributor<'a, L, W>
where
    L: DuplicateLookup,
    W: LeadWriter,
{
    pub fn new(lookup: &'a L, writer: &'a W, mode: RunMode) -> Self {
        Self { lookup, writer, mode }
    }

    /// Produces exactly one outcome per input row. Once no advisor has room,
    /// remaining leads are marked `skipped_no_capacity` without any further
    /// dedup or external work.
    pub async fn run(
        &self,
        rows: Vec<ParsedRow>,
        roster: &AdvisorRoster,
        ledger: &mut CapacityLedger,
    ) -> RunRecorder {
        let mut detector = DuplicateDetector::new();
        let mut recorder = RunRecorder::new();
        let mut exhausted = false;

        for row in rows {
            let lead = match row {
                ParsedRow::Lead(lead) => lead,
                ParsedRow::Malformed { line, detail } => {
                    warn!(
                        event_name = "distribution.malformed_row",
                        line,
                        detail = %detail,
                        "skipping malformed batch row"
                    );
                    recorder.append(AssignmentOutcome::unassigned(
                        Lead::default(),
                        OutcomeStatus::Error(format!("malformed row {line}: {detail}")),
                    ));
                    continue;
                }
            };

            if exhausted {
                recorder.append(AssignmentOutcome::unassigned(
                    lead,
                    OutcomeStatus::SkippedNoCapacity,
                ));
                continue;
            }

            if !lead.has_identifier() {
                recorder.append(AssignmentOutcome::unassigned(
                    lead,
                    OutcomeStatus::Error("missing_identifier".to_string()),
                ));
                continue;
            }

            // duplicates consume no capacity
            if let Some(reason) = detector.check(&lead, self.lookup).await {
                let status = match reason {
                    DuplicateReason::Batch => OutcomeStatus::SkippedDuplicateBatch,
                    DuplicateReason::ExternalEmail | DuplicateReason::ExternalPhone => {
                        OutcomeStatus::SkippedDuplicateExternal
                    }
                };
                info!(
                    event_name = "distribution.duplicate_skipped",
                    email = %lead.email,
                    phone = %lead.phone,
                    reason = ?reason,
                    "skipping duplicate lead"
                );
                recorder.append(AssignmentOutcome::unassigned(lead, status));
                continue;
            }

            let Some(advisor_id) = ledger.candidates_with_room().into_iter().next() else {
                warn!(
                    event_name = "distribution.capacity_exhausted",
                    "no advisor has remaining capacity, marking remaining leads"
                );
                exhausted = true;
                recorder.append(AssignmentOutcome::unassigned(
                    lead,
                    OutcomeStatus::SkippedNoCapacity,
                ));
                continue;
            };

            let reserved = ledger.reserve(&advisor_id);
            debug_assert!(reserved, "candidates_with_room only yields advisors with room");

            let advisor_name = roster.display_name(&advisor_id).unwrap_or_default().to_string();
            let key = lead.dedup_key();

            let outcome = match self.mode {
                RunMode::Simulate => {
                    info!(
                        event_name = "distribution.lead_planned",
                        email = %lead.email,
                        advisor = %advisor_id,
                        remaining = ledger.remaining(&advisor_id),
                        "assigned lead (simulation)"
                    );
                    AssignmentOutcome {
                        lead,
                        advisor_id: Some(advisor_id),
                        advisor_name: Some(advisor_name),
                        record_id: None,
                        status: OutcomeStatus::Planned,
                    }
                }
                RunMode::Apply => match self.writer.create_lead(&lead, &advisor_id).await {
                    Ok(record_id) => {
                        info!(
                            event_name = "distribution.lead_created",
                            email = %lead.email,
                            advisor = %advisor_id,
                            record_id = %record_id,
                            "lead created in external system"
                        );
                        AssignmentOutcome {
                            lead,
                            advisor_id: Some(advisor_id),
                            advisor_name: Some(advisor_name),
                            record_id: Some(record_id),
                            status: OutcomeStatus::Created,
                        }
                    }
                    // capacity stays spent: it measures advisor attention for
                    // the day, not successful CRM writes
                    Err(creation_error) => {
                        error!(
                            event_name = "distribution.lead_creation_failed",
                            email = %lead.email,
                            advisor = %advisor_id,
                            error = %creation_error,
                            "lead creation failed, continuing with next lead"
                        );
                        AssignmentOutcome {
                            lead,
                            advisor_id: Some(advisor_id),
                            advisor_name: Some(advisor_name),
                            record_id: None,
                            status: OutcomeStatus::Error(creation_error.to_string()),
                        }
                    }
                },
            };

            recorder.append(outcome);
            detector.record(key);
        }

        recorder
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{LeadDistributor, LeadWriter, RunMode};
    use crate::batch::ParsedRow;
    use crate::distribution::capacity::CapacityLedger;
    use crate::distribution::dedup::DuplicateLookup;
    use crate::distribution::recorder::RunSummary;
    use crate::domain::advisor::{Advisor, AdvisorId, AdvisorRoster};
    use crate::domain::lead::Lead;
    use crate::domain::outcome::OutcomeStatus;
    use crate::errors::CollaboratorError;

    #[derive(Default)]
    struct StubLookup {
        known_emails: Vec<String>,
    }

    #[async_trait]
    impl DuplicateLookup for StubLookup {
        async fn email_exists(&self, email: &str) -> Result<bool, CollaboratorError> {
            Ok(self.known_emails.iter().any(|known| known.eq_ignore_ascii_case(email)))
        }

        async fn phone_exists(&self, _phone: &str) -> Result<bool, CollaboratorError> {
            Ok(false)
        }
    }

    #[derive(Default)]
    struct StubWriter {
        created: Mutex<Vec<String>>,
        fail_for_email: Option<String>,
    }

    #[async_trait]
    impl LeadWriter for StubWriter {
        async fn create_lead(
            &self,
            lead: &Lead,
            _advisor_id: &AdvisorId,
        ) -> Result<String, CollaboratorError> {
            if self.fail_for_email.as_deref() == Some(lead.email.as_str()) {
                return Err(CollaboratorError::Creation("mandatory field missing".to_string()));
            }
            let mut created = self.created.lock().expect("writer lock");
            created.push(lead.email.clone());
            Ok(format!("10x{}", created.len()))
        }
    }

    fn roster() -> AdvisorRoster {
        AdvisorRoster::new(vec![
            Advisor { id: AdvisorId("19x1".to_string()), user_name: "asesor.uno".to_string() },
            Advisor { id: AdvisorId("20x1".to_string()), user_name: "asesor.dos".to_string() },
        ])
    }

    fn id(raw: &str) -> AdvisorId {
        AdvisorId(raw.to_string())
    }

    fn lead(name: &str, email: &str, phone: &str) -> ParsedRow {
        ParsedRow::Lead(Lead {
            name: name.to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
            interest: "Salud".to_string(),
            entry_date: "28/07/2025".to_string(),
            source: "Portales".to_string(),
        })
    }

    fn fresh_ledger(roster: &AdvisorRoster, max_per_day: u32) -> CapacityLedger {
        CapacityLedger::initialize(roster.iter(), &HashMap::new(), max_per_day)
    }

    #[tokio::test]
    async fn equal_capacity_splits_two_leads_across_both_advisors() {
        let roster = roster();
        let mut ledger = fresh_ledger(&roster, 25);
        let lookup = StubLookup::default();
        let writer = StubWriter::default();
        let distributor = LeadDistributor::new(&lookup, &writer, RunMode::Simulate);

        let recorder = distributor
            .run(
                vec![
                    lead("Juan Pérez", "juan.perez@example.com", "600123456"),
                    lead("Ana Gómez", "ana.gomez@example.com", "600654321"),
                ],
                &roster,
                &mut ledger,
            )
            .await;

        let outcomes = recorder.export();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.status == OutcomeStatus::Planned));
        // tie on 25/25 breaks to the lowest id, then the other advisor has
        // more remaining
        assert_eq!(outcomes[0].advisor_id, Some(id("19x1")));
        assert_eq!(outcomes[1].advisor_id, Some(id("20x1")));
        assert_eq!(ledger.remaining(&id("19x1")), 24);
        assert_eq!(ledger.remaining(&id("20x1")), 24);
    }

    #[tokio::test]
    async fn exhausted_advisor_never_receives_a_lead() {
        let roster = roster();
        let used = HashMap::from([(id("19x1"), 25u32)]);
        let mut ledger = CapacityLedger::initialize(roster.iter(), &used, 25);
        let lookup = StubLookup::default();
        let writer = StubWriter::default();
        let distributor = LeadDistributor::new(&lookup, &writer, RunMode::Simulate);

        let recorder = distributor
            .run(vec![lead("Juan Pérez", "juan.perez@example.com", "600123456")], &roster, &mut ledger)
            .await;

        assert_eq!(recorder.export()[0].advisor_id, Some(id("20x1")));
    }

    #[tokio::test]
    async fn batch_duplicate_yields_one_assignment_and_one_skip_in_order() {
        let roster = roster();
        let mut ledger = fresh_ledger(&roster, 25);
        let lookup = StubLookup::default();
        let writer = StubWriter::default();
        let distributor = LeadDistributor::new(&lookup, &writer, RunMode::Simulate);

        let recorder = distributor
            .run(
                vec![
                    lead("Juan Pérez", "juan.perez@example.com", "600123456"),
                    lead("Juan Pérez", "juan.perez@example.com", "600123456"),
                ],
                &roster,
                &mut ledger,
            )
            .await;

        let outcomes = recorder.export();
        assert_eq!(outcomes[0].status, OutcomeStatus::Planned);
        assert_eq!(outcomes[1].status, OutcomeStatus::SkippedDuplicateBatch);
    }

    #[tokio::test]
    async fn external_duplicate_is_skipped_before_any_capacity_is_reserved() {
        let roster = roster();
        let mut ledger = fresh_ledger(&roster, 25);
        let lookup = StubLookup { known_emails: vec!["juan.perez@example.com".to_string()] };
        let writer = StubWriter::default();
        let distributor = LeadDistributor::new(&lookup, &writer, RunMode::Simulate);

        let recorder = distributor
            .run(vec![lead("Juan Pérez", "juan.perez@example.com", "600123456")], &roster, &mut ledger)
            .await;

        assert_eq!(recorder.export()[0].status, OutcomeStatus::SkippedDuplicateExternal);
        assert_eq!(ledger.remaining(&id("19x1")), 25);
        assert_eq!(ledger.remaining(&id("20x1")), 25);
    }

    #[tokio::test]
    async fn fully_exhausted_roster_marks_every_lead_without_assignments() {
        let roster = roster();
        let used = HashMap::from([(id("19x1"), 25u32), (id("20x1"), 25u32)]);
        let mut ledger = CapacityLedger::initialize(roster.iter(), &used, 25);
        let lookup = StubLookup::default();
        let writer = StubWriter::default();
        let distributor = LeadDistributor::new(&lookup, &writer, RunMode::Simulate);

        let recorder = distributor
            .run(
                vec![
                    lead("Juan Pérez", "juan.perez@example.com", "600123456"),
                    lead("Ana Gómez", "ana.gomez@example.com", "600654321"),
                ],
                &roster,
                &mut ledger,
            )
            .await;

        let summary = RunSummary::tally(recorder.export());
        assert_eq!(summary.planned + summary.created, 0);
        assert_eq!(summary.skipped_no_capacity, 2);
        assert_eq!(summary.total(), 2);
    }

    #[tokio::test]
    async fn creation_failure_keeps_capacity_spent_and_run_continues() {
        let roster = roster();
        let mut ledger = fresh_ledger(&roster, 25);
        let writer = StubWriter {
            fail_for_email: Some("juan.perez@example.com".to_string()),
            ..StubWriter::default()
        };
        let lookup = StubLookup::default();
        let distributor = LeadDistributor::new(&lookup, &writer, RunMode::Apply);

        let recorder = distributor
            .run(
                vec![
                    lead("Juan Pérez", "juan.perez@example.com", "600123456"),
                    lead("Ana Gómez", "ana.gomez@example.com", "600654321"),
                ],
                &roster,
                &mut ledger,
            )
            .await;

        let outcomes = recorder.export();
        assert!(matches!(outcomes[0].status, OutcomeStatus::Error(_)));
        assert!(outcomes[0].status.label().starts_with("error: "));
        assert_eq!(outcomes[1].status, OutcomeStatus::Created);
        assert_eq!(outcomes[1].record_id.as_deref(), Some("10x1"));
        // the failed attempt still consumed 19x1's slot
        assert_eq!(ledger.remaining(&id("19x1")), 24);
        assert_eq!(ledger.remaining(&id("20x1")), 24);
    }

    #[tokio::test]
    async fn missing_identifier_routes_to_error_without_consuming_capacity() {
        let roster = roster();
        let mut ledger = fresh_ledger(&roster, 25);
        let lookup = StubLookup::default();
        let writer = StubWriter::default();
        let distributor = LeadDistributor::new(&lookup, &writer, RunMode::Simulate);

        let recorder = distributor
            .run(
                vec![lead("Anónimo", "", ""), lead("Ana Gómez", "ana.gomez@example.com", "600654321")],
                &roster,
                &mut ledger,
            )
            .await;

        let outcomes = recorder.export();
        assert_eq!(
            outcomes[0].status,
            OutcomeStatus::Error("missing_identifier".to_string())
        );
        assert_eq!(outcomes[1].status, OutcomeStatus::Planned);
        assert_eq!(ledger.remaining(&id("19x1")), 24);
        assert_eq!(ledger.remaining(&id("20x1")), 25);
    }

    #[tokio::test]
    async fn malformed_rows_become_error_outcomes_and_run_continues() {
        let roster = roster();
        let mut ledger = fresh_ledger(&roster, 25);
        let lookup = StubLookup::default();
        let writer = StubWriter::default();
        let distributor = LeadDistributor::new(&lookup, &writer, RunMode::Simulate);

        let recorder = distributor
            .run(
                vec![
                    ParsedRow::Malformed { line: 2, detail: "wrong field count".to_string() },
                    lead("Ana Gómez", "ana.gomez@example.com", "600654321"),
                ],
                &roster,
                &mut ledger,
            )
            .await;

        let outcomes = recorder.export();
        assert!(outcomes[0].status.label().contains("malformed row 2"));
        assert_eq!(outcomes[1].status, OutcomeStatus::Planned);
    }

    #[tokio::test]
    async fn capacity_invariant_holds_across_a_larger_batch() {
        let roster = roster();
        let used = HashMap::from([(id("19x1"), 23u32), (id("20x1"), 24u32)]);
        let mut ledger = CapacityLedger::initialize(roster.iter(), &used, 25);
        let lookup = StubLookup::default();
        let writer = StubWriter::default();
        let distributor = LeadDistributor::new(&lookup, &writer, RunMode::Simulate);

        let rows: Vec<_> = (0..6)
            .map(|n| lead(&format!("Lead {n}"), &format!("lead{n}@example.com"), &format!("60{n}")))
            .collect();
        let recorder = distributor.run(rows, &roster, &mut ledger).await;

        let summary = RunSummary::tally(recorder.export());
        // 2 + 1 slots total, the other 3 leads find no room
        assert_eq!(summary.planned, 3);
        assert_eq!(summary.skipped_no_capacity, 3);
        assert!(!ledger.has_room());
    }
}
