//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{MeridianConfig, PostgreSQLConfig};
use super::secret::secret_string;
use crate::domain::errors::MeridianError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (`${VAR}` syntax)
/// 3. Parses the TOML into [`MeridianConfig`]
/// 4. Applies environment variable overrides (`MERIDIAN_*` prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns [`MeridianError::Configuration`] if the file is missing or
/// unreadable, a referenced variable is unset, parsing fails, or validation
/// fails.
///
/// # Examples
///
/// ```no_run
/// use meridian::config::loader::load_config;
///
/// let config = load_config("meridian.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<MeridianConfig> {
    let config = read_config(path)?;

    config.validate().map_err(|e| {
        MeridianError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Reads the TOML file with substitution and overrides applied, without validating
///
/// Callers that adjust the configuration further (CLI flags) validate afterwards.
pub fn read_config(path: impl AsRef<Path>) -> Result<MeridianConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MeridianError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        MeridianError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    let contents = substitute_env_vars(&contents)?;

    let mut config: MeridianConfig = toml::from_str(&contents)
        .map_err(|e| MeridianError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Substitutes environment variables in the format `${VAR_NAME}`
///
/// Comment lines are left untouched. All unset variables are reported together.
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| MeridianError::Other(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::new();
    let mut missing_vars = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{}}}", var_name);
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.contains(&var_name.to_string()) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(MeridianError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

fn parse_override<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        MeridianError::Configuration(format!("Invalid value '{value}' for {name}"))
    })
}

/// Applies environment variable overrides using the `MERIDIAN_*` prefix
///
/// Variables follow `MERIDIAN_<SECTION>_<KEY>`, e.g. `MERIDIAN_LOADING_BATCH_SIZE`.
/// The bare `BATCH_SIZE` variable is honoured when the prefixed one is unset.
fn apply_env_overrides(config: &mut MeridianConfig) -> Result<()> {
    // Application overrides
    if let Ok(val) = std::env::var("MERIDIAN_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Ok(val) = std::env::var("MERIDIAN_APPLICATION_DRY_RUN") {
        config.application.dry_run = parse_override("MERIDIAN_APPLICATION_DRY_RUN", &val)?;
    }

    // Path overrides
    if let Ok(val) = std::env::var("MERIDIAN_PATHS_RAW_DATA") {
        config.paths.raw_data = PathBuf::from(val);
    }
    if let Ok(val) = std::env::var("MERIDIAN_PATHS_PROCESSED_DATA") {
        config.paths.processed_data = PathBuf::from(val);
    }
    if let Ok(val) = std::env::var("MERIDIAN_PATHS_REPORTS") {
        config.paths.reports = PathBuf::from(val);
    }
    if let Ok(val) = std::env::var("MERIDIAN_PATHS_OUTPUT") {
        config.paths.output = PathBuf::from(val);
    }

    // Loading overrides
    if let Ok(val) = std::env::var("MERIDIAN_LOADING_BATCH_SIZE") {
        config.loading.batch_size = parse_override("MERIDIAN_LOADING_BATCH_SIZE", &val)?;
    } else if let Ok(val) = std::env::var("BATCH_SIZE") {
        config.loading.batch_size = parse_override("BATCH_SIZE", &val)?;
    }

    // PostgreSQL overrides
    if let Ok(val) = std::env::var("MERIDIAN_POSTGRESQL_CONNECTION_STRING") {
        match config.postgresql {
            Some(ref mut pg) => pg.connection_string = secret_string(val),
            None => {
                let section = format!(
                    "connection_string = {}",
                    toml::Value::String(val)
                );
                let pg: PostgreSQLConfig = toml::from_str(&section)?;
                config.postgresql = Some(pg);
            }
        }
    }
    if let Some(ref mut pg) = config.postgresql {
        if let Ok(val) = std::env::var("MERIDIAN_POSTGRESQL_MAX_CONNECTIONS") {
            pg.max_connections = parse_override("MERIDIAN_POSTGRESQL_MAX_CONNECTIONS", &val)?;
        }
        if let Ok(val) = std::env::var("MERIDIAN_POSTGRESQL_SSL_MODE") {
            pg.ssl_mode = val;
        }
    }

    // Logging overrides
    if let Ok(val) = std::env::var("MERIDIAN_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = parse_override("MERIDIAN_LOGGING_LOCAL_ENABLED", &val)?;
    }
    if let Ok(val) = std::env::var("MERIDIAN_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_substitute_env_vars() {
        std::env::set_var("MERIDIAN_LOADER_TEST_VAR", "test_value");
        let input = "password = \"${MERIDIAN_LOADER_TEST_VAR}\"";
        let result = substitute_env_vars(input).unwrap();
        assert_eq!(result, "password = \"test_value\"\n");
        std::env::remove_var("MERIDIAN_LOADER_TEST_VAR");
    }

    #[test]
    fn test_substitute_env_vars_missing() {
        std::env::remove_var("MERIDIAN_LOADER_MISSING_VAR");
        let input = "password = \"${MERIDIAN_LOADER_MISSING_VAR}\"";
        let err = substitute_env_vars(input).unwrap_err();
        assert!(err.to_string().contains("MERIDIAN_LOADER_MISSING_VAR"));
    }

    #[test]
    fn test_substitute_skips_comments() {
        let input = "# dsn = \"${MERIDIAN_LOADER_COMMENTED_VAR}\"";
        assert!(substitute_env_vars(input).is_ok());
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent.toml");
        assert!(matches!(result, Err(MeridianError::Configuration(_))));
    }

    #[test]
    fn test_load_config_dry_run_without_postgresql() {
        let toml_content = r#"
[application]
log_level = "debug"
dry_run = true

[paths]
raw_data = "fixtures/raw"

[logging]
local_enabled = false
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert!(config.application.dry_run);
        assert_eq!(config.paths.raw_data, PathBuf::from("fixtures/raw"));
        assert_eq!(config.paths.processed_data, PathBuf::from("data/processed"));
        assert!(config.postgresql.is_none());
    }

    #[test]
    fn test_read_config_defers_validation() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[loading]\nbatch_size = 0\n")
            .unwrap();
        temp_file.flush().unwrap();

        let config = read_config(temp_file.path()).unwrap();
        assert_eq!(config.loading.batch_size, 0);
        assert!(load_config(temp_file.path()).is_err());
    }
}
