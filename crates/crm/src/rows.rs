//! Typed row schemas for the queries the allocator depends on. Shapes are
//! validated here at the boundary; a mismatch is a `MalformedResponse`, never
//! a missing-key failure deep inside the run.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde_json::Value;

use leadflow_core::domain::advisor::{Advisor, AdvisorId, AdvisorRoster};

use crate::client::{CrmError, CrmSession};

const ACTIVE_ADVISORS_QUERY: &str =
    "SELECT id, user_name FROM Users WHERE status='Active' AND deleted=0";

/// Row shape for the advisor roster query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdvisorRow {
    pub id: String,
    pub user_name: String,
}

/// Row shape for the per-owner assignment count query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnerCountRow {
    pub owner_id: String,
    pub count: u32,
}

pub fn advisor_from_row(row: &Value) -> Result<AdvisorRow, CrmError> {
    let id = string_field(row, "id", "users")?;
    let user_name = string_field(row, "user_name", "users")?;
    Ok(AdvisorRow { id, user_name })
}

pub fn owner_count_from_row(row: &Value) -> Result<OwnerCountRow, CrmError> {
    let owner_id = string_field(row, "smownerid", "owner counts")?;
    let count = count_field(row, "cnt", "owner counts")?;
    Ok(OwnerCountRow { owner_id, count })
}

fn string_field(row: &Value, key: &str, context: &'static str) -> Result<String, CrmError> {
    row.get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| CrmError::MalformedResponse {
            operation: "query",
            detail: format!("{context} row is missing string field `{key}`: {row}"),
        })
}

/// The endpoint serializes aggregates inconsistently: sometimes a JSON
/// number, sometimes a decimal string.
fn count_field(row: &Value, key: &str, context: &'static str) -> Result<u32, CrmError> {
    let raw = row.get(key).ok_or_else(|| CrmError::MalformedResponse {
        operation: "query",
        detail: format!("{context} row is missing field `{key}`: {row}"),
    })?;

    let parsed = match raw {
        Value::Number(number) => number.as_u64().and_then(|value| u32::try_from(value).ok()),
        Value::String(text) => text.trim().parse::<u32>().ok(),
        _ => None,
    };

    parsed.ok_or_else(|| CrmError::MalformedResponse {
        operation: "query",
        detail: format!("{context} row field `{key}` is not a count: {raw}"),
    })
}

/// Active, non-deleted CRM users eligible for assignment.
pub async fn active_advisors(session: &CrmSession) -> Result<AdvisorRoster, CrmError> {
    let rows = session.query(ACTIVE_ADVISORS_QUERY).await?;
    let mut advisors = Vec::with_capacity(rows.len());
    for row in &rows {
        let parsed = advisor_from_row(row)?;
        advisors.push(Advisor { id: AdvisorId(parsed.id), user_name: parsed.user_name });
    }
    Ok(AdvisorRoster::new(advisors))
}

/// Leads created today grouped by assigned owner, independent of this run.
pub async fn assigned_today_counts(
    session: &CrmSession,
    today: NaiveDate,
) -> Result<HashMap<AdvisorId, u32>, CrmError> {
    let query = format!(
        "SELECT smownerid, COUNT(*) AS cnt FROM vtiger_crmentity \
         WHERE deleted=0 AND setype='Leads' AND DATE(createdtime) = '{}' \
         GROUP BY smownerid",
        today.format("%Y-%m-%d")
    );
    let rows = session.query(&query).await?;

    let mut counts = HashMap::with_capacity(rows.len());
    for row in &rows {
        let parsed = owner_count_from_row(row)?;
        counts.insert(AdvisorId(parsed.owner_id), parsed.count);
    }
    Ok(counts)
}
