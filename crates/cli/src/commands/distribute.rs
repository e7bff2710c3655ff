use std::path::PathBuf;

use chrono::Local;
use tracing::info;

use leadflow_core::config::{AppConfig, LoadOptions};
use leadflow_core::{
    batch, CapacityLedger, LeadDistributor, RunError, RunMode, RunSummary,
};
use leadflow_crm::{active_advisors, assigned_today_counts, VtigerClient};

use crate::commands::CommandResult;

#[derive(Debug, Clone)]
pub struct DistributeArgs {
    pub input: PathBuf,
    pub apply: bool,
    pub output: PathBuf,
}

pub fn run(args: DistributeArgs) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "distribute",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    init_run_logging(&config);

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "distribute",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    match runtime.block_on(distribute(&config, &args)) {
        Ok(summary) => CommandResult::success("distribute", summary_message(&summary, args.apply)),
        Err(error) => {
            let error_class = match &error {
                RunError::Authentication(_) => "authentication",
                RunError::Roster(_) | RunError::Counts(_) => "collaborator_unavailable",
                RunError::EmptyRoster => "empty_roster",
                RunError::Batch(_) => "batch_io",
            };
            CommandResult::failure("distribute", error_class, error.to_string(), 4)
        }
    }
}

async fn distribute(config: &AppConfig, args: &DistributeArgs) -> Result<RunSummary, RunError> {
    let rows = batch::read_batch(&args.input)?;

    let client = VtigerClient::new(&config.crm)
        .map_err(|error| RunError::Authentication(error.to_string()))?;
    let session =
        client.login().await.map_err(|error| RunError::Authentication(error.to_string()))?;

    let roster =
        active_advisors(&session).await.map_err(|error| RunError::Roster(error.to_string()))?;
    if roster.is_empty() {
        return Err(RunError::EmptyRoster);
    }

    let today = Local::now().date_naive();
    let used_today = assigned_today_counts(&session, today)
        .await
        .map_err(|error| RunError::Counts(error.to_string()))?;

    let mut ledger =
        CapacityLedger::initialize(roster.iter(), &used_today, config.distribution.max_per_day);
    info!(
        event_name = "distribution.run_started",
        advisors = roster.len(),
        rows = rows.len(),
        max_per_day = config.distribution.max_per_day,
        apply = args.apply,
        "starting distribution run"
    );

    let mode = if args.apply { RunMode::Apply } else { RunMode::Simulate };
    let distributor = LeadDistributor::new(&session, &session, mode);
    let recorder = distributor.run(rows, &roster, &mut ledger).await;

    batch::write_outcomes(&args.output, recorder.export())?;

    let summary = RunSummary::tally(recorder.export());
    info!(
        event_name = "distribution.run_finished",
        created = summary.created,
        planned = summary.planned,
        skipped_duplicate_batch = summary.skipped_duplicate_batch,
        skipped_duplicate_external = summary.skipped_duplicate_external,
        skipped_no_capacity = summary.skipped_no_capacity,
        errors = summary.errors,
        output = %args.output.display(),
        "distribution run finished"
    );
    Ok(summary)
}

fn summary_message(summary: &RunSummary, applied: bool) -> String {
    let mode = if applied { "apply" } else { "simulate" };
    format!(
        "{} created, {} planned, {} duplicate in batch, {} duplicate in crm, {} without capacity, {} errors ({} leads, {mode} mode)",
        summary.created,
        summary.planned,
        summary.skipped_duplicate_batch,
        summary.skipped_duplicate_external,
        summary.skipped_no_capacity,
        summary.errors,
        summary.total(),
    )
}

/// Run progress goes to stderr so the structured command result on stdout
/// stays parseable.
fn init_run_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
