//! Warehouse storage abstraction
//!
//! This module provides the [`WarehouseStore`] trait that every pipeline
//! component receives explicitly, and a factory choosing the backend from
//! configuration.

pub mod factory;
pub mod traits;

pub use factory::create_warehouse_store;
pub use traits::{BatchInsertOutcome, EncounterIndexEntry, QueryResult, WarehouseStore};
