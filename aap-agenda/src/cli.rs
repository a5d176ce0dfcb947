//! CLI interface for aap-agenda: command parsing and orchestration only.
//!
//! All mapping and delivery logic lives in `aap-agenda-core`; this module wires
//! the loaded config, the JSON record store, the lookup tables and the HTTP
//! client together.
//!
//! - `format`: print the Agenda envelope for an item without touching the store.
//! - `push`: format an item and push it to the configured destination.
//! - `describe-error`: look up a registered error code.
use crate::file_store::JsonFileStore;
use crate::load_config::{load_config, CliConfig};
use aap_agenda_core::errors::describe;
use aap_agenda_core::formatter::{can_format, AgendaFormatter, FormattedItem, FORMAT_TYPE};
use aap_agenda_core::http::HttpAgendaClient;
use aap_agenda_core::lookup::LookupTableSet;
use aap_agenda_core::transmitter::AgendaPushTransmitter;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI for aap-agenda: publish CMS events and planning items to Agenda.
#[derive(Parser)]
#[clap(
    name = "aap-agenda",
    version,
    about = "Format and push CMS events and planning items to the Agenda scheduling system"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the Agenda JSON for an event or planning item
    Format {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Id of the event or planning item in the record store
        #[clap(long)]
        item: String,
    },
    /// Format an event or planning item and push it to Agenda
    Push {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Id of the event or planning item in the record store
        #[clap(long)]
        item: String,
    },
    /// Describe a registered error code
    DescribeError {
        code: u32,
    },
}

fn load_lookups(config: &CliConfig) -> Result<LookupTableSet> {
    match &config.lookups {
        Some(path) => LookupTableSet::load(path)
            .with_context(|| format!("Failed to load lookup tables from {:?}", path)),
        None => {
            tracing::warn!("No lookup tables configured, all lookups fall back to defaults");
            Ok(LookupTableSet::default())
        }
    }
}

async fn format_item(
    config: &CliConfig,
    store: &JsonFileStore,
    lookups: &LookupTableSet,
    id: &str,
) -> Result<FormattedItem> {
    let item = store.item(id).await?;
    if !can_format(FORMAT_TYPE, &item) {
        anyhow::bail!("Item {id} of type {} cannot be formatted for Agenda", item.kind());
    }
    let formatted = AgendaFormatter::new(store, lookups)
        .format(&item, &config.subscriber)
        .await
        .with_context(|| format!("Failed to format item {id}"))?;
    Ok(formatted)
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Format { config, item } => {
            let config = load_config(config)?;
            // Preview only: sequence numbers and write-backs stay in memory.
            let store = JsonFileStore::open_detached(&config.store)?;
            let lookups = load_lookups(&config)?;
            tracing::info!(command = "format", item = %item, "Formatting item");

            let formatted = format_item(&config, &store, &lookups, &item).await?;
            let json = serde_json::to_string_pretty(&formatted.envelope)?;
            println!("{json}");
            Ok(())
        }
        Commands::Push { config, item } => {
            let config = load_config(config)?;
            let store = JsonFileStore::open(&config.store)?;
            let lookups = load_lookups(&config)?;
            tracing::info!(
                command = "push",
                item = %item,
                destination = %config.destination.name,
                "Pushing item"
            );

            let formatted = format_item(&config, &store, &lookups, &item).await?;
            let api = HttpAgendaClient::new();
            match AgendaPushTransmitter::new(&api, &store)
                .push(&config.destination, &formatted)
                .await
            {
                Ok(report) => {
                    tracing::info!(command = "push", ?report, "Push complete");
                    println!("Push complete.\nReport:");
                    println!("{:#?}", report);
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(
                        command = "push",
                        error = %e,
                        code = e.code().code(),
                        "Push failed"
                    );
                    Err(anyhow::Error::new(e))
                }
            }
        }
        Commands::DescribeError { code } => match describe(code) {
            Some(description) => {
                println!("{code}: {description}");
                Ok(())
            }
            None => anyhow::bail!("Unknown error code {code}"),
        },
    }
}
