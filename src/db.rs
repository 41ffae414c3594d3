//! Database pool management.
//!
//! SeaORM pool over the configured `PORTAL_DATABASE_URL` (SQLite by default,
//! Postgres in hosted deployments).

use std::time::Duration;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::AppConfig;

const CONNECT_ATTEMPTS: u32 = 5;
const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Errors that can occur during database setup.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("failed to connect to database after {attempts} attempts: {source}")]
    ConnectionFailed {
        attempts: u32,
        #[source]
        source: DbErr,
    },
    #[error("invalid database configuration: {message}")]
    InvalidConfiguration { message: String },
    #[error("database health check failed: {0}")]
    Unhealthy(#[source] DbErr),
}

/// Opens the connection pool, retrying transient failures with exponential
/// backoff.
///
/// ```no_run
/// use forms_relay::{config::AppConfig, db::init_pool};
///
/// # async fn run() -> anyhow::Result<()> {
/// let db = init_pool(&AppConfig::default()).await?;
/// # Ok(())
/// # }
/// ```
pub async fn init_pool(cfg: &AppConfig) -> Result<DatabaseConnection, DatabaseError> {
    if cfg.database_url.trim().is_empty() {
        return Err(DatabaseError::InvalidConfiguration {
            message: "database URL cannot be empty".to_string(),
        });
    }

    let mut opt = ConnectOptions::new(&cfg.database_url);
    opt.max_connections(cfg.db_max_connections)
        .acquire_timeout(Duration::from_millis(cfg.db_acquire_timeout_ms))
        .idle_timeout(Duration::from_secs(600))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let mut retry_delay = INITIAL_RETRY_DELAY;
    let mut attempt = 1;
    loop {
        match Database::connect(opt.clone()).await {
            Ok(conn) => {
                info!(attempt, "Connected to database");
                return Ok(conn);
            }
            Err(source) if attempt >= CONNECT_ATTEMPTS => {
                error!(attempts = attempt, error = %source, "Giving up on database connection");
                return Err(DatabaseError::ConnectionFailed {
                    attempts: attempt,
                    source,
                });
            }
            Err(e) => {
                warn!(attempt, error = %e, ?retry_delay, "Database connection failed; retrying");
                sleep(retry_delay).await;
                retry_delay *= 2;
                attempt += 1;
            }
        }
    }
}

/// Runs `SELECT 1` against the pool.
pub async fn health_check(db: &DatabaseConnection) -> Result<(), DatabaseError> {
    let stmt = Statement::from_string(db.get_database_backend(), "SELECT 1".to_string());
    db.query_one(stmt).await.map_err(DatabaseError::Unhealthy)?;
    Ok(())
}
