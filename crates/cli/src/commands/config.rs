use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;

use leadflow_core::config::{AppConfig, LoadOptions};

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |field: &str, env_var: &str| {
        field_source(field, env_var, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line("crm.url", &config.crm.url, source("crm.url", "LEADFLOW_CRM_URL")));
    lines.push(render_line(
        "crm.username",
        &config.crm.username,
        source("crm.username", "LEADFLOW_CRM_USERNAME"),
    ));
    let access_key =
        if config.crm.access_key.expose_secret().is_empty() { "<unset>" } else { "<redacted>" };
    lines.push(render_line(
        "crm.access_key",
        access_key,
        source("crm.access_key", "LEADFLOW_CRM_ACCESS_KEY"),
    ));
    lines.push(render_line(
        "distribution.max_per_day",
        &config.distribution.max_per_day.to_string(),
        source("distribution.max_per_day", "LEADFLOW_DISTRIBUTION_MAX_PER_DAY"),
    ));
    lines.push(render_line(
        "database.url",
        &config.database.url,
        source("database.url", "LEADFLOW_DATABASE_URL"),
    ));
    let webhook_secret = if config.webhook.secret.is_some() { "<redacted>" } else { "<unset>" };
    lines.push(render_line(
        "webhook.secret",
        webhook_secret,
        source("webhook.secret", "LEADFLOW_WEBHOOK_SECRET"),
    ));
    lines.push(render_line(
        "webhook.default_owner_id",
        &config.webhook.default_owner_id,
        source("webhook.default_owner_id", "LEADFLOW_WEBHOOK_DEFAULT_OWNER"),
    ));
    lines.push(render_line(
        "llm.base_url",
        &config.llm.base_url,
        source("llm.base_url", "LEADFLOW_LLM_BASE_URL"),
    ));
    let llm_api_key = if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" };
    lines.push(render_line("llm.api_key", llm_api_key, source("llm.api_key", "LEADFLOW_LLM_API_KEY")));
    lines.push(render_line("llm.model", &config.llm.model, source("llm.model", "LEADFLOW_LLM_MODEL")));
    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        source("server.bind_address", "LEADFLOW_SERVER_BIND_ADDRESS"),
    ));
    lines.push(render_line(
        "server.port",
        &config.server.port.to_string(),
        source("server.port", "LEADFLOW_SERVER_PORT"),
    ));
    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", "LEADFLOW_LOGGING_LEVEL"),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format).to_lowercase(),
        source("logging.format", "LEADFLOW_LOGGING_FORMAT"),
    ));

    lines.join("\n")
}

fn render_line(field: &str, value: &str, source: String) -> String {
    format!("- {field} = {value} ({source})")
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("leadflow.toml"), PathBuf::from("config/leadflow.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<toml::Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<toml::Value>().ok()
}

fn field_source(
    field: &str,
    env_var: &str,
    file_doc: Option<&toml::Value>,
    file_path: Option<&Path>,
) -> String {
    if env::var(env_var).map(|value| !value.trim().is_empty()).unwrap_or(false) {
        return format!("env: {env_var}");
    }

    if let (Some(doc), Some(path)) = (file_doc, file_path) {
        if file_has_key(doc, field) {
            return format!("file: {}", path.display());
        }
    }

    "default".to_string()
}

fn file_has_key(doc: &toml::Value, dotted_field: &str) -> bool {
    let mut current = doc;
    for segment in dotted_field.split('.') {
        match current.get(segment) {
            Some(next) => current = next,
            None => return false,
        }
    }
    true
}
