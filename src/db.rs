//! Control-plane database bootstrap.
//!
//! Connects the registry pool and brings the control-plane schema up to
//! date in one step: the provisioner cannot run against a database whose
//! `tenants` table is missing, so [`init_pool`] applies the registry
//! migrations before handing the connection out. Transient connection
//! failures are retried with exponential backoff per the configured policy.

use std::time::Duration;

use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::AppConfig;

/// Failures while bootstrapping or probing the control-plane database.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("failed to connect to control-plane database after {attempts} attempts: {source}")]
    ConnectFailed {
        attempts: u32,
        #[source]
        source: sea_orm::DbErr,
    },
    #[error("failed to apply control-plane migrations: {source}")]
    MigrationFailed {
        #[source]
        source: sea_orm::DbErr,
    },
    #[error("control-plane health check failed: {source}")]
    Unhealthy {
        #[source]
        source: sea_orm::DbErr,
    },
    #[error("invalid database configuration: {message}")]
    InvalidConfiguration { message: String },
}

/// Connects the control-plane pool and applies any outstanding registry
/// migrations, so the returned connection is immediately usable by the
/// tenant repository and schema manager.
pub async fn init_pool(cfg: &AppConfig) -> Result<DatabaseConnection, DatabaseError> {
    if cfg.database_url.is_empty() {
        return Err(DatabaseError::InvalidConfiguration {
            message: "database URL cannot be empty".to_string(),
        });
    }

    let mut options = ConnectOptions::new(&cfg.database_url);
    options
        .max_connections(cfg.db_max_connections)
        .acquire_timeout(Duration::from_millis(cfg.db_acquire_timeout_ms))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db = connect_with_retry(cfg, options).await?;

    Migrator::up(&db, None)
        .await
        .map_err(|source| DatabaseError::MigrationFailed { source })?;
    info!("Control-plane registry is up to date");

    Ok(db)
}

async fn connect_with_retry(
    cfg: &AppConfig,
    options: ConnectOptions,
) -> Result<DatabaseConnection, DatabaseError> {
    let attempts = cfg.db_connect_max_retries.max(1);
    let mut delay = Duration::from_millis(cfg.db_connect_retry_delay_ms);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match Database::connect(options.clone()).await {
            Ok(db) => {
                info!(attempt, "Connected to control-plane database");
                return Ok(db);
            }
            Err(err) => {
                warn!(
                    attempt,
                    attempts,
                    error = %err,
                    retry_in_ms = delay.as_millis() as u64,
                    "Control-plane connection attempt failed"
                );
                last_error = Some(err);
                if attempt < attempts {
                    sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }

    Err(DatabaseError::ConnectFailed {
        attempts,
        source: last_error
            .unwrap_or_else(|| sea_orm::DbErr::Custom("no connection attempt made".to_string())),
    })
}

/// Checks the control-plane connection with a trivial query.
pub async fn health_check(db: &DatabaseConnection) -> Result<(), DatabaseError> {
    let stmt = Statement::from_string(db.get_database_backend(), "SELECT 1".to_string());

    db.query_one(stmt)
        .await
        .map_err(|source| DatabaseError::Unhealthy { source })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tenant::Entity as Tenant;
    use sea_orm::EntityTrait;

    fn sqlite_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.database_url = "sqlite::memory:".to_string();
        config
    }

    #[tokio::test]
    async fn empty_database_url_is_rejected() {
        let mut config = sqlite_config();
        config.database_url.clear();

        let err = init_pool(&config).await.unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidConfiguration { .. }));
    }

    #[tokio::test]
    async fn init_pool_brings_the_registry_up() {
        let db = init_pool(&sqlite_config()).await.expect("init pool");
        health_check(&db).await.expect("healthy");

        // The tenants table exists and is queryable straight away.
        let tenants = Tenant::find().all(&db).await.expect("query registry");
        assert!(tenants.is_empty());
    }

    #[tokio::test]
    async fn connect_failure_reports_the_attempt_count() {
        let mut config = sqlite_config();
        // Read-only mode on a file that does not exist cannot connect.
        config.database_url = "sqlite:/nonexistent/tenancy-registry.db?mode=ro".to_string();
        config.db_connect_max_retries = 2;
        config.db_connect_retry_delay_ms = 1;

        let err = init_pool(&config).await.unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::ConnectFailed { attempts: 2, .. }
        ));
    }
}
