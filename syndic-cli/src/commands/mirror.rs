//! `syndic mirror` — one dataset from a foreign portal.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Deserialize;

use syndic_catalog::CatalogClient;
use syndic_core::types::{DatasetId, InstanceName};
use syndic_sync::{mirror, DatasetOutcome, MirrorParams};

use super::{instance_client, load_config, parse_params};

#[derive(Debug, Deserialize)]
struct MirrorBlob {
    source_url: String,
    target_instance: String,
    target_dataset: String,
    target_organization: String,
    #[serde(default)]
    user_agent: Option<String>,
}

/// Arguments for `syndic mirror`.
#[derive(Args, Debug)]
pub struct MirrorArgs {
    /// JSON object with source_url, target_instance, target_dataset,
    /// target_organization and user_agent.
    pub params: String,

    /// Configuration file (defaults to ~/.syndic/config.yaml).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl MirrorArgs {
    pub fn run(self) -> Result<()> {
        let blob: MirrorBlob = parse_params(&self.params)?;
        let config = load_config(&self.config)?;

        let params = MirrorParams {
            source_url: blob.source_url,
            target_instance: InstanceName::from(blob.target_instance),
            target_dataset: DatasetId::from(blob.target_dataset),
            target_organization: blob.target_organization,
            user_agent: blob.user_agent,
        };

        // The source portal is addressed by URL, not by a configured
        // instance, and is read anonymously.
        let (source_base, _) = mirror::split_dataset_url(&params.source_url)?;
        let source =
            CatalogClient::with_user_agent(source_base, None, params.user_agent.as_deref())?;
        let target = instance_client(&config, &params.target_instance)?;
        let http = download_client(params.user_agent.as_deref())?;

        let outcome =
            mirror::mirror_dataset(&source, &target, &http, &config.lock.settings(), &params)?;
        println!(
            "{}: {}",
            params.target_dataset,
            match outcome {
                DatasetOutcome::Created => "created",
                DatasetOutcome::Updated => "updated",
                DatasetOutcome::MetadataOnly => "metadata updated",
                DatasetOutcome::Unchanged => "unchanged",
            }
        );
        Ok(())
    }
}

fn download_client(user_agent: Option<&str>) -> Result<reqwest::blocking::Client> {
    let mut builder = reqwest::blocking::Client::builder();
    if let Some(agent) = user_agent {
        builder = builder.user_agent(agent);
    }
    builder.build().context("building the download client")
}
