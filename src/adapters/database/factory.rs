//! Warehouse store factory
//!
//! This module builds the storage backend selected by configuration.

use crate::adapters::database::traits::WarehouseStore;
use crate::adapters::memory::MemoryStore;
use crate::adapters::postgresql::adapter::PostgreSQLAdapter;
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::config::schema::MeridianConfig;
use crate::domain::{MeridianError, Result};
use std::sync::Arc;

/// Create the warehouse store for `config`
///
/// Dry runs get an in-memory store; otherwise a pooled PostgreSQL store is
/// built. No connection is opened until first use.
///
/// # Errors
///
/// Returns a configuration error if PostgreSQL is selected but not configured
/// or its connection string is invalid.
pub fn create_warehouse_store(config: &MeridianConfig) -> Result<Arc<dyn WarehouseStore>> {
    if config.application.dry_run {
        tracing::info!("DRY RUN: using in-memory warehouse, nothing is written to PostgreSQL");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let pg_config = config.postgresql.as_ref().ok_or_else(|| {
        MeridianError::Configuration("postgresql configuration section is missing".to_string())
    })?;

    tracing::info!("Creating PostgreSQL warehouse store");
    let client = PostgreSQLClient::new(pg_config.clone())?;
    Ok(Arc::new(PostgreSQLAdapter::new(client)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{secret_string, PostgreSQLConfig};

    #[test]
    fn test_dry_run_uses_memory_store() {
        let mut config = MeridianConfig::default();
        config.application.dry_run = true;

        let store = create_warehouse_store(&config).unwrap();
        assert_eq!(store.backend_name(), "memory");
    }

    #[test]
    fn test_missing_postgresql_section() {
        let config = MeridianConfig::default();
        assert!(matches!(
            create_warehouse_store(&config),
            Err(MeridianError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_postgresql_store_is_lazy() {
        let mut config = MeridianConfig::default();
        config.postgresql = Some(PostgreSQLConfig {
            connection_string: secret_string("postgresql://u:p@localhost:5432/ehr".to_string()),
            max_connections: 2,
            connection_timeout_seconds: 5,
            statement_timeout_seconds: 60,
            ssl_mode: "disable".to_string(),
        });

        let store = create_warehouse_store(&config).unwrap();
        assert_eq!(store.backend_name(), "postgresql");
    }
}
