// Meridian - Healthcare data ETL pipeline
// Copyright (c) 2025 Meridian Contributors
// Licensed under the MIT License

//! # Meridian - Healthcare data ETL
//!
//! Meridian is a batch ETL pipeline that cleans heterogeneous healthcare
//! source files (CSV, JSON and a SQLite snapshot), loads them into a
//! PostgreSQL warehouse under foreign-key constraints and runs a fixed set
//! of analytical queries.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Cleaning** raw patient, observation, procedure, diagnosis and
//!   medication files into standardized intermediates
//! - **Reconciling** encounters: every dependent record is attached to an
//!   encounter, inferred by `(patient, calendar date)` when not given
//! - **Loading** in foreign-key order with idempotent, batched inserts
//! - **Validating** referential integrity after the load
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Pipeline logic (cleaning, load, reconcile, verification, queries)
//! - [`adapters`] - Warehouse stores (PostgreSQL, in-memory) and source files
//! - [`domain`] - Identifiers, records, source rows and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and operation timing
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use meridian::adapters::database::create_warehouse_store;
//! use meridian::config::load_config;
//! use meridian::core::load::DataLoader;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("meridian.toml")?;
//!     let store = create_warehouse_store(&config)?;
//!     store.ensure_schema().await?;
//!
//!     let outcome = DataLoader::from_config(store, &config).load_all().await?;
//!     println!("Loaded {} rows", outcome.summary.total_loaded());
//!     println!("Integrity: {}", outcome.integrity.status);
//!     Ok(())
//! }
//! ```
//!
//! ## Encounter Reconciliation
//!
//! Dependent records without an encounter reference are matched on the
//! calendar date of their relevant timestamp:
//!
//! ```rust
//! use meridian::core::reconcile::{EncounterKey, EncounterMap};
//! use meridian::domain::{EncounterId, PatientId};
//! use chrono::NaiveDate;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let patient = PatientId::new("P1")?;
//! let day = NaiveDate::from_ymd_opt(2023, 5, 1).ok_or("date")?;
//!
//! let mut map = EncounterMap::new();
//! map.register(EncounterKey::new(patient.clone(), day), EncounterId::new("E1")?);
//!
//! let at = day.and_hms_opt(23, 59, 0).ok_or("time")?;
//! assert_eq!(map.lookup(&patient, &at).map(|e| e.as_str()), Some("E1"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Meridian uses the [`domain::MeridianError`] type for all errors:
//!
//! ```rust,no_run
//! use meridian::domain::MeridianError;
//!
//! fn example() -> Result<(), MeridianError> {
//!     let config = meridian::config::load_config("meridian.toml")?;
//!     println!("{}", config.loading.batch_size);
//!     Ok(())
//! }
//! ```
//!
//! ## Logging
//!
//! Meridian uses structured logging with the `tracing` crate:
//!
//! ```rust,no_run
//! tracing::info!(table = "diagnoses", loaded = 42, "Table loaded");
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
