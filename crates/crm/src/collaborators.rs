//! Collaborator trait implementations that let the allocator core drive a
//! live CRM session.

use async_trait::async_trait;
use serde_json::{json, Value};

use leadflow_core::distribution::allocator::LeadWriter;
use leadflow_core::distribution::dedup::DuplicateLookup;
use leadflow_core::domain::advisor::AdvisorId;
use leadflow_core::domain::lead::Lead;
use leadflow_core::errors::CollaboratorError;

use crate::client::{CrmSession, LookupKind};

const LEAD_MODULE: &str = "Leads";

#[async_trait]
impl DuplicateLookup for CrmSession {
    async fn email_exists(&self, email: &str) -> Result<bool, CollaboratorError> {
        self.lookup(LookupKind::Email, email, &[LEAD_MODULE])
            .await
            .map(|matches| !matches.is_empty())
            .map_err(|error| CollaboratorError::Unavailable(error.to_string()))
    }

    async fn phone_exists(&self, phone: &str) -> Result<bool, CollaboratorError> {
        self.lookup(LookupKind::Phone, phone, &[LEAD_MODULE])
            .await
            .map(|matches| !matches.is_empty())
            .map_err(|error| CollaboratorError::Unavailable(error.to_string()))
    }
}

pub(crate) fn lead_element(lead: &Lead, advisor_id: &AdvisorId) -> Value {
    json!({
        "nombre": lead.name,
        "curso": lead.interest,
        "email": lead.email,
        "telefono": lead.phone,
        "assigned_user_id": advisor_id.0,
        "origen": lead.source,
    })
}

#[async_trait]
impl LeadWriter for CrmSession {
    async fn create_lead(
        &self,
        lead: &Lead,
        advisor_id: &AdvisorId,
    ) -> Result<String, CollaboratorError> {
        let element = lead_element(lead, advisor_id);
        let created = self
            .create(LEAD_MODULE, &element)
            .await
            .map_err(|error| CollaboratorError::Creation(error.to_string()))?;

        created
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                CollaboratorError::MalformedResponse(
                    "create response carried no record id".to_string(),
                )
            })
    }
}
