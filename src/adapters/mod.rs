//! External system integrations for Meridian.
//!
//! - [`database`] - Warehouse storage abstraction (trait-based) and factory
//! - [`postgresql`] - PostgreSQL warehouse
//! - [`memory`] - In-memory warehouse for dry runs and tests
//! - [`files`] - CSV/JSON source files and the SQLite snapshot
//!
//! # Design Pattern
//!
//! Adapters isolate external dependencies behind the
//! [`WarehouseStore`](database::WarehouseStore) trait so that pipeline
//! components can be exercised against the in-memory backend.
//!
//! ```rust,no_run
//! use meridian::adapters::database::create_warehouse_store;
//! use meridian::config::load_config;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("meridian.toml")?;
//! let store = create_warehouse_store(&config)?;
//! store.test_connection().await?;
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod files;
pub mod memory;
pub mod postgresql;
