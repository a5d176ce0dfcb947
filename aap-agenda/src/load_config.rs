//! `load_config` module: loads the static YAML config and injects the Agenda
//! secret from the environment.
//!
//! # Responsibilities
//! - Parse the user-supplied YAML file into type-safe structs
//! - Inject `AGENDA_SECRET_TOKEN` (optional) into the destination
//! - Report read and parse failures with the path and cause
//!
//! # Accepted YAML
//! ```yaml
//! destination:
//!   name: agenda
//!   assets_url: https://agenda.example.com/api
//! subscriber: agenda
//! store: ./records.json
//! lookups: ./lookups.json
//! ```
use aap_agenda_core::config::Destination;
use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Environment variable holding the destination's shared Agenda key.
pub const SECRET_TOKEN_ENV: &str = "AGENDA_SECRET_TOKEN";

#[derive(Debug, Deserialize)]
pub struct DestinationSection {
    pub name: String,
    pub assets_url: String,
}

fn default_subscriber() -> String {
    "agenda".to_string()
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    destination: DestinationSection,
    #[serde(default = "default_subscriber")]
    subscriber: String,
    store: PathBuf,
    #[serde(default)]
    lookups: Option<PathBuf>,
}

/// Loaded configuration, secrets included.
#[derive(Debug)]
pub struct CliConfig {
    pub destination: Destination,
    pub subscriber: String,
    /// JSON file holding the CMS records.
    pub store: PathBuf,
    /// JSON file holding the city/country/IPTC tables; empty tables if absent.
    pub lookups: Option<PathBuf>,
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let raw: RawConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    let mut destination = Destination::new(raw.destination.name, raw.destination.assets_url);
    match std::env::var(SECRET_TOKEN_ENV) {
        Ok(token) if !token.is_empty() => {
            info!("{SECRET_TOKEN_ENV} found in env");
            destination = destination.with_secret_token(token);
        }
        _ => info!("{SECRET_TOKEN_ENV} not set, pushes rely on per-user keys"),
    }
    destination.trace_loaded();

    Ok(CliConfig {
        destination,
        subscriber: raw.subscriber,
        store: raw.store,
        lookups: raw.lookups,
    })
}
