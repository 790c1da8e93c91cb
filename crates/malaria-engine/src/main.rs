//! Cohort engine binary for the within-host malaria model.
//!
//! This is the main entry point that wires together configuration, the
//! shared infection parameters, and the cohort runner. It loads the YAML
//! configuration, validates every section, runs each host on its own
//! blocking worker, and logs the outcome.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `malaria-config.yaml` (or `MALARIA_CONFIG`)
//! 3. Validate infection parameters, immunity and cohort settings
//! 4. Run the cohort
//! 5. Log the result

mod cohort;
mod error;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use malaria_intrahost::{ConfigError, ImmunityConfig, InfectionParameters};
use serde::de::DeserializeOwned;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cohort::CohortConfig;
use crate::error::EngineError;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "malaria-config.yaml";

/// Environment variable overriding the configuration file path.
const CONFIG_PATH_ENV: &str = "MALARIA_CONFIG";

/// Every section of the engine configuration.
#[derive(Debug, Clone, Default)]
struct EngineConfig {
    infection: InfectionParameters,
    immunity: ImmunityConfig,
    cohort: CohortConfig,
}

/// Application entry point for the cohort engine.
///
/// # Errors
///
/// Returns an error if configuration is invalid or any host fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("malaria-engine starting");

    // 2. Load configuration.
    let path = config_path();
    let config = load_config(&path)?;

    // 3. Validate.
    config.infection.validate().map_err(EngineError::from)?;
    config.immunity.validate().map_err(EngineError::from)?;
    config.cohort.validate()?;
    info!(
        path = %path.display(),
        hosts = config.cohort.hosts,
        steps = config.cohort.steps,
        dt_days = config.cohort.dt_days,
        seed = config.cohort.seed,
        variant_slots = config.infection.variant_slots,
        gametocyte_stages = config.infection.gametocyte_stages,
        "Configuration loaded"
    );

    // 4. Run the cohort.
    let params = Arc::new(config.infection);
    let summary = cohort::run_cohort(&config.cohort, params, &config.immunity).await?;

    // 5. Log results.
    info!(
        infected = summary.infected_hosts(),
        deaths = summary.deaths(),
        still_infected = summary.still_infected(),
        "malaria-engine shutdown complete"
    );

    Ok(())
}

/// Resolve the configuration path from `MALARIA_CONFIG` or the default.
fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

/// Load every configuration section from `path`.
///
/// A missing file yields defaults; a missing section yields that
/// section's defaults.
fn load_config(path: &Path) -> Result<EngineConfig, EngineError> {
    if !path.exists() {
        info!(path = %path.display(), "Config file not found, using defaults");
        return Ok(EngineConfig::default());
    }
    let contents = std::fs::read_to_string(path).map_err(ConfigError::from)?;
    parse_config(&contents)
}

/// Parse every configuration section from YAML text.
fn parse_config(contents: &str) -> Result<EngineConfig, EngineError> {
    let raw: serde_yml::Value = serde_yml::from_str(contents).map_err(ConfigError::from)?;
    Ok(EngineConfig {
        infection: section(&raw, "infection")?,
        immunity: section(&raw, "immunity")?,
        cohort: section(&raw, "cohort")?,
    })
}

/// Deserialize the top-level `key` of `raw`, or the default if absent.
fn section<T>(raw: &serde_yml::Value, key: &str) -> Result<T, EngineError>
where
    T: DeserializeOwned + Default,
{
    raw.get(key).map_or_else(
        || Ok(T::default()),
        |value| {
            serde_yml::from_value(value.clone())
                .map_err(|e| EngineError::from(ConfigError::from(e)))
        },
    )
}
