//! PostgreSQL warehouse backend
//!
//! [`PostgreSQLClient`] owns the pooled connections and schema setup;
//! [`PostgreSQLAdapter`] maps it onto the [`WarehouseStore`] contract.
//!
//! [`WarehouseStore`]: crate::adapters::database::WarehouseStore

pub mod adapter;
pub mod client;
pub mod models;

pub use adapter::PostgreSQLAdapter;
pub use client::PostgreSQLClient;
