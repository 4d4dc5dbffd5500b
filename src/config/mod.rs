//! Configuration management for Meridian.
//!
//! Meridian reads a TOML file with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `MERIDIAN_<SECTION>_<KEY>` overrides
//! - Default values for optional settings
//! - Validation on load
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use meridian::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("meridian.toml")?;
//! println!("Raw data: {}", config.paths.raw_data.display());
//! println!("Batch size: {}", config.loading.batch_size);
//! # Ok(())
//! # }
//! ```
//!
//! # Example Configuration
//!
//! ```toml
//! [application]
//! log_level = "info"
//!
//! [paths]
//! raw_data = "data/raw"
//!
//! [loading]
//! batch_size = 1000
//!
//! [postgresql]
//! connection_string = "${MERIDIAN_DATABASE_URL}"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

pub use loader::{load_config, read_config};
pub use schema::{
    ApplicationConfig, LoadingConfig, LoggingConfig, MeridianConfig, PathsConfig,
    PostgreSQLConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
