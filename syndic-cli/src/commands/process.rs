//! `syndic process` — derived artifacts across an instance.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use serde::Deserialize;

use syndic_core::lock::LockMode;
use syndic_core::types::InstanceName;
use syndic_sync::{
    postprocess, ExternalConverter, GeometryTwinTask, ProcessingTask, SpreadsheetTwinTask,
};

use super::{instance_client, load_config, parse_params};

#[derive(Debug, Deserialize)]
struct ProcessParams {
    instance: String,
    task: String,
    /// Converter program; defaults to `csv2geojson` / `csv2xlsx` on PATH.
    #[serde(default)]
    converter: Option<String>,
    #[serde(default)]
    bypass_lock: bool,
}

/// Arguments for `syndic process`.
#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// JSON object with instance, task (geojson or xlsx), converter and
    /// bypass_lock.
    pub params: String,

    /// Configuration file (defaults to ~/.syndic/config.yaml).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl ProcessArgs {
    pub fn run(self) -> Result<()> {
        let params: ProcessParams = parse_params(&self.params)?;
        let config = load_config(&self.config)?;

        let instance = InstanceName::from(params.instance);
        let api = instance_client(&config, &instance)?;
        let http = reqwest::blocking::Client::new();

        let task: Box<dyn ProcessingTask> = match params.task.as_str() {
            "geojson" => {
                let converter =
                    ExternalConverter::new(params.converter.as_deref().unwrap_or("csv2geojson"));
                Box::new(GeometryTwinTask::new(http, converter))
            }
            "xlsx" => {
                let converter =
                    ExternalConverter::new(params.converter.as_deref().unwrap_or("csv2xlsx"));
                Box::new(SpreadsheetTwinTask::new(http, converter))
            }
            other => bail!("unknown processing task {other:?}; expected geojson or xlsx"),
        };
        let mode = if params.bypass_lock {
            LockMode::Bypass
        } else {
            LockMode::Exclusive
        };

        let stats = postprocess::process_instance(
            &api,
            &config.lock.settings(),
            &instance,
            task.as_ref(),
            mode,
        )?;

        println!(
            "processed {} dataset(s), attached {} artifact(s), {} error(s)",
            stats.datasets, stats.artifacts, stats.errors
        );
        if !stats.success() {
            bail!("processing finished with {} error(s)", stats.errors);
        }
        Ok(())
    }
}
