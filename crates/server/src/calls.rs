//! PBX call webhook: authenticate, buffer, and upsert into the CRM.
//!
//! The raw payload is buffered before the CRM push so a failed push can be
//! retried from the buffer without losing the event. Repeated deliveries of
//! the same `call_uuid` update the same CRM record instead of duplicating it.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::post,
    Router,
};
use chrono::{NaiveDateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, info};

use leadflow_core::config::CrmConfig;
use leadflow_crm::{CrmError, CrmSession, VtigerClient};
use leadflow_db::{CallBufferRepository, DbPool, SqlCallBufferRepository};

use crate::signature;

const SIGNATURE_HEADER: &str = "x-signature";
const CALL_ELEMENT_TYPE: &str = "Call";
const PBX_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Clone)]
pub struct CallsState {
    db_pool: DbPool,
    crm_config: CrmConfig,
    webhook_secret: SecretString,
    default_owner_id: String,
}

pub fn router(
    db_pool: DbPool,
    crm_config: CrmConfig,
    webhook_secret: SecretString,
    default_owner_id: String,
) -> Router {
    Router::new().route("/webhook/call", post(receive_call)).with_state(CallsState {
        db_pool,
        crm_config,
        webhook_secret,
        default_owner_id,
    })
}

#[derive(Debug, Serialize)]
struct CallAck {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    crm_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct CallError {
    error: String,
}

type CallResult = Result<Json<CallAck>, (StatusCode, Json<CallError>)>;

fn call_error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<CallError>) {
    (status, Json(CallError { error: message.into() }))
}

async fn receive_call(
    State(state): State<CallsState>,
    headers: HeaderMap,
    body: Bytes,
) -> CallResult {
    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| call_error(StatusCode::UNAUTHORIZED, "missing signature header"))?;
    if !signature::verify(state.webhook_secret.expose_secret().as_bytes(), &body, provided) {
        return Err(call_error(StatusCode::UNAUTHORIZED, "invalid signature"));
    }

    let mut payload: Value = serde_json::from_slice(&body)
        .map_err(|_| call_error(StatusCode::BAD_REQUEST, "invalid JSON payload"))?;

    let Some(call_uuid) = string_field(&payload, "call_uuid") else {
        return Err(call_error(StatusCode::UNPROCESSABLE_ENTITY, "missing call_uuid"));
    };

    normalize_duration(&mut payload);

    let repository = SqlCallBufferRepository::new(state.db_pool.clone());
    let inserted = repository
        .insert_if_new(&call_uuid, &payload.to_string(), Utc::now())
        .await
        .map_err(|db_error| {
            error!(
                event_name = "calls.buffer_write_failed",
                call_uuid = %call_uuid,
                error = %db_error,
                "could not buffer call payload"
            );
            call_error(StatusCode::INTERNAL_SERVER_ERROR, "buffer write failed")
        })?;
    if inserted {
        info!(
            event_name = "calls.buffered",
            call_uuid = %call_uuid,
            "call payload buffered"
        );
    }

    match upsert_call(&state, &payload, &call_uuid).await {
        Ok(crm_call_id) => {
            repository
                .mark_sent(&call_uuid, crm_call_id.as_deref(), Utc::now())
                .await
                .map_err(|db_error| {
                    error!(
                        event_name = "calls.buffer_update_failed",
                        call_uuid = %call_uuid,
                        error = %db_error,
                        "could not mark buffered call as sent"
                    );
                    call_error(StatusCode::INTERNAL_SERVER_ERROR, "buffer update failed")
                })?;
            info!(
                event_name = "calls.pushed",
                call_uuid = %call_uuid,
                crm_call_id = crm_call_id.as_deref().unwrap_or("unknown"),
                "call upserted into crm"
            );
            Ok(Json(CallAck { status: "ok", crm_call_id }))
        }
        Err(push_error) => {
            error!(
                event_name = "calls.push_failed",
                call_uuid = %call_uuid,
                error = %push_error,
                "crm push failed, call stays buffered for retry"
            );
            if let Err(db_error) = repository.mark_failed(&call_uuid, Utc::now()).await {
                error!(
                    event_name = "calls.buffer_update_failed",
                    call_uuid = %call_uuid,
                    error = %db_error,
                    "could not mark buffered call as failed"
                );
            }
            Err(call_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("crm push failed: {push_error}"),
            ))
        }
    }
}

#[derive(Debug, Error)]
enum UpsertError {
    #[error(transparent)]
    Crm(#[from] CrmError),
    #[error("existing call row carried no id")]
    MissingId,
}

async fn upsert_call(
    state: &CallsState,
    payload: &Value,
    call_uuid: &str,
) -> Result<Option<String>, UpsertError> {
    let session = VtigerClient::new(&state.crm_config)?.login().await?;

    let from_number = string_field(payload, "from");
    let to_number = string_field(payload, "to");
    let contact_id =
        resolve_contact(&session, from_number.as_deref(), to_number.as_deref()).await?;

    let existing = session
        .query(&format!("SELECT * FROM Calls WHERE cf_call_uuid = '{call_uuid}' LIMIT 1"))
        .await?;

    let mut element = call_element(payload, call_uuid, &state.default_owner_id);
    if let Some(contact_id) = contact_id {
        element["parent_id"] = json!(contact_id);
    }

    let result = if let Some(found) = existing.first() {
        let existing_id =
            found.get("id").and_then(Value::as_str).ok_or(UpsertError::MissingId)?;
        element["id"] = json!(existing_id);
        session.update(CALL_ELEMENT_TYPE, &element).await?
    } else {
        session.create(CALL_ELEMENT_TYPE, &element).await?
    };

    Ok(result.get("id").and_then(Value::as_str).map(str::to_string))
}

/// The caller's number identifies the contact; for inbound traffic that is
/// `from`, so it is tried first.
async fn resolve_contact(
    session: &CrmSession,
    from_number: Option<&str>,
    to_number: Option<&str>,
) -> Result<Option<String>, CrmError> {
    for number in [from_number, to_number].into_iter().flatten() {
        let rows = session
            .query(&format!("SELECT * FROM Contacts WHERE phone LIKE '{number}%' LIMIT 1"))
            .await?;
        if let Some(id) = rows.first().and_then(|row| row.get("id")).and_then(Value::as_str) {
            return Ok(Some(id.to_string()));
        }
    }
    Ok(None)
}

fn string_field(payload: &Value, key: &str) -> Option<String> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// When both timestamps are present the derived duration wins over whatever
/// the PBX sent; unparseable timestamps degrade to zero.
fn normalize_duration(payload: &mut Value) {
    let start = string_field(payload, "start_time");
    let end = string_field(payload, "end_time");
    if let (Some(start), Some(end)) = (start, end) {
        let seconds = derived_duration_seconds(&start, &end);
        if let Some(object) = payload.as_object_mut() {
            object.insert("duration_seconds".to_string(), json!(seconds));
        }
    }
}

fn derived_duration_seconds(start: &str, end: &str) -> i64 {
    let parse = |raw: &str| NaiveDateTime::parse_from_str(raw, PBX_TIME_FORMAT).ok();
    match (parse(start), parse(end)) {
        (Some(start), Some(end)) => (end - start).num_seconds(),
        _ => 0,
    }
}

fn call_element(payload: &Value, call_uuid: &str, default_owner_id: &str) -> Value {
    let from_number = string_field(payload, "from").unwrap_or_default();
    let to_number = string_field(payload, "to").unwrap_or_default();
    let inbound = string_field(payload, "direction").as_deref() == Some("inbound");
    let counterparty = if from_number.is_empty() { to_number.as_str() } else { from_number.as_str() };
    let start_time = string_field(payload, "start_time").unwrap_or_default();
    let duration = payload.get("duration_seconds").and_then(Value::as_i64).unwrap_or(0);
    let completed = matches!(
        string_field(payload, "status").as_deref(),
        Some("completed") | Some("answered")
    );
    let recording_url = string_field(payload, "recording_url").unwrap_or_default();

    json!({
        "subject": format!(
            "{} call from {counterparty}",
            if inbound { "Inbound" } else { "Outbound" }
        ),
        "assigned_user_id": string_field(payload, "assigned_user_id")
            .unwrap_or_else(|| default_owner_id.to_string()),
        "calltype": if inbound { "Inbound" } else { "Outbound" },
        "date_start": start_time.get(0..10).unwrap_or_default(),
        "time_start": start_time.get(11..16).unwrap_or_default(),
        "duration": duration.to_string(),
        "description": format!("Recording: {recording_url}"),
        "cf_call_uuid": call_uuid,
        "cf_from_number": from_number,
        "cf_to_number": to_number,
        "cf_recording_url": recording_url,
        "cf_pbx_system": string_field(payload, "pbx_system")
            .unwrap_or_else(|| "default".to_string()),
        "cf_duration_seconds": duration,
        "status": if completed { "Completed" } else { "Planned" },
    })
}
