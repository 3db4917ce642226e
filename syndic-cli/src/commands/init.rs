//! `syndic init` — first-time provisioning of an instance.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use serde::Deserialize;

use syndic_core::types::InstanceName;
use syndic_sync::initialize;

use super::{instance_client, load_config, parse_params};

#[derive(Debug, Deserialize)]
struct InitParams {
    instance: String,
    groups_file: PathBuf,
}

/// Arguments for `syndic init`.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// JSON object with instance and groups_file.
    pub params: String,

    /// Configuration file (defaults to ~/.syndic/config.yaml).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let params: InitParams = parse_params(&self.params)?;
        let config = load_config(&self.config)?;

        let instance = InstanceName::from(params.instance);
        let api = instance_client(&config, &instance)?;
        let defs = initialize::load_group_defs(&params.groups_file)?;

        let report = initialize::initialize_instance(&api, &defs)?;

        println!(
            "{}: settings group {}, {} topic group(s) created",
            instance,
            if report.settings_created {
                "created"
            } else {
                "present"
            },
            report.groups_created
        );
        Ok(())
    }
}
