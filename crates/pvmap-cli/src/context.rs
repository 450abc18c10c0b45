//! Configuration and project source selection shared by the commands

use anyhow::{Context, Result};
use pvmap_core::config::{CliConfigOverrides, LayeredConfig};
use pvmap_core::ports::ProjectSource;
use pvmap_core::PvMapError;
use pvmap_geo::ClusterOptions;
use pvmap_store::{MemoryProjectSource, SupabaseSource};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::Cli;
use crate::errors;

/// Config file picked up from the working directory
pub const DEFAULT_CONFIG_FILE: &str = "pvmap.toml";

/// Load layered configuration: defaults, file, environment, then flags
pub fn load_config(cli: &Cli) -> Result<LayeredConfig> {
    let mut config = LayeredConfig::with_defaults();

    let file = match &cli.config {
        Some(path) => Some(path.clone()),
        None => Some(PathBuf::from(DEFAULT_CONFIG_FILE)).filter(|p| p.exists()),
    };
    if let Some(path) = file {
        config = config
            .load_from_file(&path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    }

    let mut config = config.load_from_env();
    config.update_from_cli(CliConfigOverrides {
        endpoint_url: cli.endpoint.clone(),
        cluster_radius: cli.cluster_radius,
        cluster_max_zoom: cli.cluster_max_zoom,
        debounce_ms: cli.debounce_ms,
    });

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Everything a command needs to talk to projects
pub struct AppContext {
    pub config: LayeredConfig,
    pub options: ClusterOptions,
    data: Option<PathBuf>,
}

impl AppContext {
    pub fn new(cli: &Cli) -> Result<Self> {
        let config = load_config(cli)?;
        let options = ClusterOptions::from_config(&config);

        Ok(Self { config, options, data: cli.data.clone() })
    }

    /// Open the project source; remote credentials are only required here
    pub fn source(&self) -> Result<Arc<dyn ProjectSource>> {
        open_source(self.data.as_deref(), &self.config)
    }

    pub fn data_file(&self) -> Option<&Path> {
        self.data.as_deref()
    }
}

/// A local data file when given, otherwise the remote API
fn open_source(data: Option<&Path>, config: &LayeredConfig) -> Result<Arc<dyn ProjectSource>> {
    if let Some(path) = data {
        if !path.exists() {
            return Err(errors::data_file_not_found(path).into());
        }
        let source = MemoryProjectSource::from_json_file(path)
            .with_context(|| format!("Failed to load projects from {}", path.display()))?;
        tracing::info!(count = source.len(), path = %path.display(), "Using local project data");
        return Ok(Arc::new(source));
    }

    match SupabaseSource::from_config(config) {
        Ok(source) => {
            tracing::debug!(url = source.base_url(), "Using remote project API");
            Ok(Arc::new(source))
        }
        Err(e @ PvMapError::ConfigMissing { .. }) => Err(errors::from_source_error(e)),
        Err(e) => Err(e).context("Failed to set up the remote project API"),
    }
}
