//! Tabular batch input/output. Input headers are the fixed strings produced
//! by the marketing export (Spanish, accented) and must match exactly.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::lead::Lead;
use crate::domain::outcome::AssignmentOutcome;

pub const INPUT_HEADERS: [&str; 6] =
    ["Nombre", "Email", "Teléfono", "Curso Interesado", "Fecha entrada", "Origen del leads"];

pub const OUTPUT_HEADERS: [&str; 8] = [
    "Nombre",
    "Email",
    "Teléfono",
    "Curso Interesado",
    "AssignedToID",
    "AssignedToName",
    "LeadID",
    "Status",
];

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("could not read batch file `{path}`: {source}")]
    Read { path: PathBuf, source: csv::Error },
    #[error("could not write output file `{path}`: {source}")]
    Write { path: PathBuf, source: csv::Error },
    #[error("could not flush output file `{path}`: {source}")]
    Flush { path: PathBuf, source: std::io::Error },
    #[error("batch header mismatch: expected {expected:?}, found {found:?}")]
    HeaderMismatch { expected: Vec<String>, found: Vec<String> },
}

/// One input row: either a lead snapshot or a recoverable parse failure that
/// the allocator turns into an `error:` outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParsedRow {
    Lead(Lead),
    Malformed { line: u64, detail: String },
}

pub fn read_batch(path: &Path) -> Result<Vec<ParsedRow>, BatchError> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|source| BatchError::Read { path: path.to_path_buf(), source })?;

    let headers = reader
        .headers()
        .map_err(|source| BatchError::Read { path: path.to_path_buf(), source })?
        .clone();
    if !headers.iter().eq(INPUT_HEADERS) {
        return Err(BatchError::HeaderMismatch {
            expected: INPUT_HEADERS.iter().map(|header| (*header).to_string()).collect(),
            found: headers.iter().map(str::to_string).collect(),
        });
    }

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        // header occupies line 1
        let line = index as u64 + 2;
        match record {
            Ok(record) => rows.push(ParsedRow::Lead(lead_from_record(&record))),
            Err(parse_error) => {
                rows.push(ParsedRow::Malformed { line, detail: parse_error.to_string() })
            }
        }
    }
    Ok(rows)
}

fn lead_from_record(record: &csv::StringRecord) -> Lead {
    let field = |index: usize| record.get(index).unwrap_or_default().to_string();
    Lead {
        name: field(0),
        email: field(1).trim().to_string(),
        phone: field(2).trim().to_string(),
        interest: field(3),
        entry_date: field(4),
        source: field(5),
    }
}

/// Audit artifact: fixed column order, header row first, one row per outcome
/// in insertion order.
pub fn write_outcomes(path: &Path, outcomes: &[AssignmentOutcome]) -> Result<(), BatchError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|source| BatchError::Write { path: path.to_path_buf(), source })?;

    writer
        .write_record(OUTPUT_HEADERS)
        .map_err(|source| BatchError::Write { path: path.to_path_buf(), source })?;

    for outcome in outcomes {
        let status = outcome.status.label();
        writer
            .write_record([
                outcome.lead.name.as_str(),
                outcome.lead.email.as_str(),
                outcome.lead.phone.as_str(),
                outcome.lead.interest.as_str(),
                outcome.advisor_id.as_ref().map(|id| id.0.as_str()).unwrap_or_default(),
                outcome.advisor_name.as_deref().unwrap_or_default(),
                outcome.record_id.as_deref().unwrap_or_default(),
                status.as_str(),
            ])
            .map_err(|source| BatchError::Write { path: path.to_path_buf(), source })?;
    }

    writer.flush().map_err(|source| BatchError::Flush { path: path.to_path_buf(), source })
}
