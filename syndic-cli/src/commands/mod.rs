//! Subcommand implementations.

pub mod init;
pub mod mirror;
pub mod process;
pub mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use syndic_catalog::CatalogClient;
use syndic_core::config::Config;
use syndic_core::types::InstanceName;

/// Load the configuration, from `--config` when given.
fn load_config(path: &Option<PathBuf>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_at(path),
        None => Config::load(),
    }?;
    Ok(config)
}

/// Decode one subcommand's JSON parameter blob.
fn parse_params<T: DeserializeOwned>(raw: &str) -> Result<T> {
    serde_json::from_str(raw).context("parsing the JSON parameter blob")
}

/// Build a client for a configured instance.
fn instance_client(config: &Config, name: &InstanceName) -> Result<CatalogClient> {
    let entry = config.instance(name)?;
    let client = CatalogClient::from_config(entry)
        .with_context(|| format!("building a client for instance {name}"))?;
    Ok(client)
}
