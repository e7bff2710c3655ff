use secrecy::SecretString;
use thiserror::Error;
use tracing::info;

use leadflow_core::config::{AppConfig, ConfigError, LoadOptions};
use leadflow_db::{connect_with_settings, migrations, DbPool};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub webhook_secret: SecretString,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("webhook.secret must be configured to run the server")]
    MissingWebhookSecret,
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    bootstrap_with_config(AppConfig::load(options)?).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    // the webhook surface is unauthenticated without it, so refuse to start
    let webhook_secret =
        config.webhook.secret.clone().ok_or(BootstrapError::MissingWebhookSecret)?;

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "server.bootstrap.database_connected",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "server.bootstrap.migrations_applied", "database migrations applied");

    Ok(Application { config, db_pool, webhook_secret })
}

#[cfg(test)]
mod tests {
    use leadflow_core::config::{AppConfig, ConfigOverrides, LoadOptions};

    use super::{bootstrap, bootstrap_with_config, BootstrapError};

    fn overrides(with_secret: bool) -> ConfigOverrides {
        ConfigOverrides {
            crm_username: Some("usuario_api".to_string()),
            crm_access_key: Some("k3y".to_string()),
            database_url: Some("sqlite::memory:".to_string()),
            webhook_secret: with_secret.then(|| "shhh".to_string()),
            ..ConfigOverrides::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_refuses_to_start_without_a_webhook_secret() {
        let mut config = AppConfig::default();
        config.database.url = "sqlite::memory:".to_string();
        config.webhook.secret = None;

        let result = bootstrap_with_config(config).await;
        assert!(matches!(result, Err(BootstrapError::MissingWebhookSecret)));
    }

    #[tokio::test]
    async fn bootstrap_connects_and_migrates_with_valid_overrides() {
        let app = bootstrap(LoadOptions { overrides: overrides(true), ..LoadOptions::default() })
            .await
            .expect("bootstrap should succeed");

        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'call_buffer'",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("call_buffer table should exist after bootstrap");
        assert_eq!(count, 1);
    }
}
