//! HTTP client for the vTiger-style webservice endpoint.
//!
//! The session handshake is the documented two-step exchange: `getchallenge`
//! returns a short-lived token, and `login` expects the MD5 digest of
//! token + access key. Everything after login carries the opaque session name.

use std::time::Duration;

use md5::{Digest, Md5};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use leadflow_core::config::CrmConfig;

#[derive(Debug, Error)]
pub enum CrmError {
    #[error("transport failure during `{operation}`: {source}")]
    Transport { operation: &'static str, source: reqwest::Error },
    #[error("crm rejected `{operation}`: {detail}")]
    Api { operation: &'static str, detail: String },
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("malformed `{operation}` response: {detail}")]
    MalformedResponse { operation: &'static str, detail: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LookupKind {
    Email,
    Phone,
}

impl LookupKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
        }
    }
}

/// Unauthenticated client; consumed by [`VtigerClient::login`].
pub struct VtigerClient {
    http: Client,
    base_url: String,
    username: String,
    access_key: SecretString,
}

/// Authenticated session. The session name is opaque and passed through to
/// every operation.
pub struct CrmSession {
    http: Client,
    base_url: String,
    session_name: String,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    success: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

impl ApiEnvelope {
    fn into_result(self, operation: &'static str) -> Result<Value, CrmError> {
        if self.success {
            Ok(self.result.unwrap_or(Value::Null))
        } else {
            let detail = self
                .error
                .map(|error| error.to_string())
                .unwrap_or_else(|| "no error detail".to_string());
            Err(CrmError::Api { operation, detail })
        }
    }
}

pub(crate) fn access_digest(token: &str, access_key: &str) -> String {
    hex::encode(Md5::digest(format!("{token}{access_key}").as_bytes()))
}

impl VtigerClient {
    pub fn new(config: &CrmConfig) -> Result<Self, CrmError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|source| CrmError::Transport { operation: "client_init", source })?;

        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            access_key: config.access_key.clone(),
        })
    }

    async fn challenge(&self) -> Result<String, CrmError> {
        let envelope: ApiEnvelope = self
            .http
            .get(&self.base_url)
            .query(&[("operation", "getchallenge"), ("username", self.username.as_str())])
            .send()
            .await
            .map_err(|source| CrmError::Transport { operation: "getchallenge", source })?
            .json()
            .await
            .map_err(|source| CrmError::Transport { operation: "getchallenge", source })?;

        let result = envelope.into_result("getchallenge")?;
        result
            .get("token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| CrmError::Authentication("no challenge token received".to_string()))
    }

    pub async fn login(self) -> Result<CrmSession, CrmError> {
        let token = self.challenge().await?;
        let digest = access_digest(&token, self.access_key.expose_secret());

        let envelope: ApiEnvelope = self
            .http
            .post(&self.base_url)
            .form(&[
                ("operation", "login"),
                ("username", self.username.as_str()),
                ("accessKey", digest.as_str()),
            ])
            .send()
            .await
            .map_err(|source| CrmError::Transport { operation: "login", source })?
            .json()
            .await
            .map_err(|source| CrmError::Transport { operation: "login", source })?;

        let result = envelope
            .into_result("login")
            .map_err(|error| CrmError::Authentication(error.to_string()))?;
        let session_name = result
            .get("sessionName")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| CrmError::Authentication("login returned no sessionName".to_string()))?;

        info!(
            event_name = "crm.login",
            username = %self.username,
            "crm session established"
        );

        Ok(CrmSession { http: self.http, base_url: self.base_url, session_name })
    }
}

impl CrmSession {
    /// Runs a SOQL-like query; the endpoint requires a trailing semicolon.
    pub async fn query(&self, soql: &str) -> Result<Vec<Value>, CrmError> {
        let query = format!("{soql} ;");
        let envelope: ApiEnvelope = self
            .http
            .get(&self.base_url)
            .query(&[
                ("operation", "query"),
                ("sessionName", self.session_name.as_str()),
                ("query", query.as_str()),
            ])
            .send()
            .await
            .map_err(|source| CrmError::Transport { operation: "query", source })?
            .json()
            .await
            .map_err(|source| CrmError::Transport { operation: "query", source })?;

        match envelope.into_result("query")? {
            Value::Array(rows) => Ok(rows),
            Value::Null => Ok(Vec::new()),
            other => Err(CrmError::MalformedResponse {
                operation: "query",
                detail: format!("expected a row array, got {other}"),
            }),
        }
    }

    /// Duplicate search; an empty result means "no match". Transport and API
    /// failures are reported truthfully here — the duplicate detector decides
    /// whether to be lenient.
    pub async fn lookup(
        &self,
        kind: LookupKind,
        value: &str,
        modules: &[&str],
    ) -> Result<Vec<Value>, CrmError> {
        let search_in = serde_json::to_string(modules).unwrap_or_else(|_| "[]".to_string());
        let envelope: ApiEnvelope = self
            .http
            .get(&self.base_url)
            .query(&[
                ("operation", "lookup"),
                ("sessionName", self.session_name.as_str()),
                ("type", kind.as_str()),
                ("value", value),
                ("searchIn", search_in.as_str()),
            ])
            .send()
            .await
            .map_err(|source| CrmError::Transport { operation: "lookup", source })?
            .json()
            .await
            .map_err(|source| CrmError::Transport { operation: "lookup", source })?;

        match envelope.into_result("lookup")? {
            Value::Array(matches) => Ok(matches),
            Value::Null => Ok(Vec::new()),
            other => Err(CrmError::MalformedResponse {
                operation: "lookup",
                detail: format!("expected a match array, got {other}"),
            }),
        }
    }

    pub async fn create(&self, module: &str, element: &Value) -> Result<Value, CrmError> {
        self.mutate("create", module, element).await
    }

    pub async fn update(&self, module: &str, element: &Value) -> Result<Value, CrmError> {
        self.mutate("update", module, element).await
    }

    async fn mutate(
        &self,
        operation: &'static str,
        module: &str,
        element: &Value,
    ) -> Result<Value, CrmError> {
        let element_json = element.to_string();
        let envelope: ApiEnvelope = self
            .http
            .post(&self.base_url)
            .form(&[
                ("operation", operation),
                ("sessionName", self.session_name.as_str()),
                ("elementType", module),
                ("element", element_json.as_str()),
            ])
            .send()
            .await
            .map_err(|source| CrmError::Transport { operation, source })?
            .json()
            .await
            .map_err(|source| CrmError::Transport { operation, source })?;

        envelope.into_result(operation)
    }
}
