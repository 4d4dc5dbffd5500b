//! PostgreSQL client implementation
//!
//! Wraps a deadpool connection pool. Each unit of work checks a connection
//! out with [`PostgreSQLClient::get_connection`] and returns it to the pool
//! when the handle is dropped.

use crate::config::schema::PostgreSQLConfig;
use crate::domain::{MeridianError, Result};
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use postgres_native_tls::MakeTlsConnector;
use secrecy::ExposeSecret;
use std::time::Duration;
use tokio_postgres::NoTls;

/// Schema and integrity function applied by [`PostgreSQLClient::ensure_schema`]
pub const SCHEMA_SQL: &str = include_str!("../../../migrations/001_initial_schema.sql");

/// PostgreSQL client for Meridian
pub struct PostgreSQLClient {
    /// Connection pool
    pool: Pool,

    /// Configuration
    config: PostgreSQLConfig,
}

impl PostgreSQLClient {
    /// Create a new PostgreSQL client
    ///
    /// No connection is opened here; the pool connects lazily.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection string is invalid or the TLS
    /// connector / pool cannot be built.
    pub fn new(config: PostgreSQLConfig) -> Result<Self> {
        let pg_config: tokio_postgres::Config = config
            .connection_string
            .expose_secret()
            .parse()
            .map_err(|e| {
                MeridianError::Configuration(format!("Invalid PostgreSQL connection string: {}", e))
            })?;

        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let manager = if config.requires_tls() {
            let connector = native_tls::TlsConnector::builder()
                .danger_accept_invalid_certs(config.ssl_mode == "require")
                .danger_accept_invalid_hostnames(config.ssl_mode != "verify-full")
                .build()
                .map_err(|e| {
                    MeridianError::Configuration(format!("Failed to build TLS connector: {}", e))
                })?;
            Manager::from_config(pg_config, MakeTlsConnector::new(connector), manager_config)
        } else {
            Manager::from_config(pg_config, NoTls, manager_config)
        };

        let timeout = Some(Duration::from_secs(config.connection_timeout_seconds));
        let pool = Pool::builder(manager)
            .max_size(config.max_connections)
            .runtime(deadpool_postgres::Runtime::Tokio1)
            .wait_timeout(timeout)
            .create_timeout(timeout)
            .recycle_timeout(timeout)
            .build()
            .map_err(|e| {
                MeridianError::Database(format!("Failed to create connection pool: {}", e))
            })?;

        tracing::debug!(
            target_db = %config.connection_string.expose_secret().redacted_dsn(),
            max_connections = config.max_connections,
            ssl_mode = %config.ssl_mode,
            "PostgreSQL pool created"
        );

        Ok(Self { pool, config })
    }

    /// Test the connection to PostgreSQL
    pub async fn test_connection(&self) -> Result<()> {
        let client = self.get_connection().await?;

        client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| MeridianError::Connection(format!("Connection test failed: {}", e)))?;

        tracing::info!(target_db = %self.connection_string_safe(), "PostgreSQL connection test successful");
        Ok(())
    }

    /// Create warehouse tables, indexes and `check_referential_integrity()`
    pub async fn ensure_schema(&self) -> Result<()> {
        let client = self.get_connection().await?;

        client
            .batch_execute(SCHEMA_SQL)
            .await
            .map_err(|e| MeridianError::Database(format!("Failed to execute migration: {}", e)))?;

        tracing::info!("PostgreSQL schema initialized successfully");
        Ok(())
    }

    /// Check a connection out of the pool with the statement timeout applied
    ///
    /// # Errors
    ///
    /// Returns [`MeridianError::Connection`] if no connection can be obtained.
    pub async fn get_connection(&self) -> Result<Object> {
        let client = self.pool.get().await.map_err(|e| {
            MeridianError::Connection(format!("Failed to get connection from pool: {}", e))
        })?;

        let timeout_query = format!(
            "SET statement_timeout = {}",
            self.config.statement_timeout_seconds * 1000
        );
        client
            .batch_execute(&timeout_query)
            .await
            .map_err(|e| MeridianError::Database(format!("Failed to set statement timeout: {}", e)))?;

        Ok(client)
    }

    /// Get the connection string (without credentials)
    pub fn connection_string_safe(&self) -> String {
        self.config.connection_string.expose_secret().redacted_dsn()
    }

    /// Get the pool statistics
    pub fn pool_status(&self) -> deadpool_postgres::Status {
        self.pool.status()
    }
}
