use crate::error::{PvMapError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Configuration source for tracking where values come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default value
    Default,
    /// Loaded from config file
    File,
    /// Loaded from environment variable
    Environment,
    /// Provided via CLI argument
    Cli,
}

impl ConfigSource {
    /// Returns the precedence level (higher = higher priority)
    pub fn precedence(&self) -> u8 {
        match self {
            ConfigSource::Default => 0,
            ConfigSource::File => 1,
            ConfigSource::Environment => 2,
            ConfigSource::Cli => 3,
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }

    /// Update the value if the new source has higher precedence
    pub fn update(&mut self, value: T, source: ConfigSource) {
        if source.precedence() > self.source.precedence() {
            self.value = value;
            self.source = source;
        }
    }
}

/// Layered configuration for the map engine
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub endpoint_url: ConfigValue<Option<String>>,
    pub anon_key: ConfigValue<Option<String>>,
    pub cluster_radius: ConfigValue<u32>,
    pub cluster_max_zoom: ConfigValue<u8>,
    pub max_expansion_zoom: ConfigValue<u8>,
    pub debounce_ms: ConfigValue<u64>,
    pub request_timeout_secs: ConfigValue<u64>,
}

/// Connection settings for the remote project source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub endpoint_url: String,
    pub anon_key: String,
    pub timeout: Duration,
}

impl LayeredConfig {
    /// Create a new configuration with default values
    pub fn with_defaults() -> Self {
        Self {
            endpoint_url: ConfigValue::new(None, ConfigSource::Default),
            anon_key: ConfigValue::new(None, ConfigSource::Default),
            cluster_radius: ConfigValue::new(60, ConfigSource::Default),
            cluster_max_zoom: ConfigValue::new(16, ConfigSource::Default),
            max_expansion_zoom: ConfigValue::new(18, ConfigSource::Default),
            debounce_ms: ConfigValue::new(400, ConfigSource::Default),
            request_timeout_secs: ConfigValue::new(30, ConfigSource::Default),
        }
    }

    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(PvMapError::ConfigFileNotFound { path: path.to_path_buf() });
        }

        let content = fs::read_to_string(path).map_err(|e| PvMapError::ConfigInvalid {
            key: "file".to_string(),
            reason: format!("Failed to read config file: {}", e),
        })?;

        let file_config: FileConfig =
            toml::from_str(&content).map_err(|e| PvMapError::ConfigInvalid {
                key: "file".to_string(),
                reason: format!("Failed to parse TOML: {}", e),
            })?;

        if let Some(url) = file_config.endpoint_url {
            self.endpoint_url.update(Some(url), ConfigSource::File);
        }

        if let Some(key) = file_config.anon_key {
            self.anon_key.update(Some(key), ConfigSource::File);
        }

        if let Some(radius) = file_config.cluster_radius {
            self.cluster_radius.update(radius, ConfigSource::File);
        }

        if let Some(zoom) = file_config.cluster_max_zoom {
            self.cluster_max_zoom.update(zoom, ConfigSource::File);
        }

        if let Some(zoom) = file_config.max_expansion_zoom {
            self.max_expansion_zoom.update(zoom, ConfigSource::File);
        }

        if let Some(ms) = file_config.debounce_ms {
            self.debounce_ms.update(ms, ConfigSource::File);
        }

        if let Some(secs) = file_config.request_timeout_secs {
            self.request_timeout_secs.update(secs, ConfigSource::File);
        }

        Ok(self)
    }

    /// Load configuration from environment variables
    pub fn load_from_env(mut self) -> Self {
        // SUPABASE_URL, falling back to the frontend build variable
        if let Some(url) = first_env(&["SUPABASE_URL", "VITE_SUPABASE_URL"]) {
            self.endpoint_url.update(Some(url), ConfigSource::Environment);
        }

        // SUPABASE_ANON_KEY
        if let Some(key) = first_env(&["SUPABASE_ANON_KEY", "VITE_SUPABASE_ANON_KEY"]) {
            self.anon_key.update(Some(key), ConfigSource::Environment);
        }

        if let Some(radius) = parse_env::<u32>("PVMAP_CLUSTER_RADIUS", "pixel radius") {
            self.cluster_radius.update(radius, ConfigSource::Environment);
        }

        if let Some(zoom) = parse_env::<u8>("PVMAP_CLUSTER_MAX_ZOOM", "zoom level") {
            self.cluster_max_zoom.update(zoom, ConfigSource::Environment);
        }

        if let Some(zoom) = parse_env::<u8>("PVMAP_MAX_EXPANSION_ZOOM", "zoom level") {
            self.max_expansion_zoom.update(zoom, ConfigSource::Environment);
        }

        if let Some(ms) = parse_env::<u64>("PVMAP_DEBOUNCE_MS", "milliseconds") {
            self.debounce_ms.update(ms, ConfigSource::Environment);
        }

        if let Some(secs) = parse_env::<u64>("PVMAP_REQUEST_TIMEOUT_SECS", "seconds") {
            self.request_timeout_secs.update(secs, ConfigSource::Environment);
        }

        self
    }

    /// Update configuration from CLI arguments
    pub fn update_from_cli(&mut self, overrides: CliConfigOverrides) {
        if let Some(url) = overrides.endpoint_url {
            self.endpoint_url.update(Some(url), ConfigSource::Cli);
        }

        if let Some(radius) = overrides.cluster_radius {
            self.cluster_radius.update(radius, ConfigSource::Cli);
        }

        if let Some(zoom) = overrides.cluster_max_zoom {
            self.cluster_max_zoom.update(zoom, ConfigSource::Cli);
        }

        if let Some(ms) = overrides.debounce_ms {
            self.debounce_ms.update(ms, ConfigSource::Cli);
        }
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.cluster_radius.value == 0 {
            return Err(PvMapError::ConfigInvalid {
                key: "cluster_radius".to_string(),
                reason: "radius must be at least one pixel".to_string(),
            });
        }

        if self.cluster_max_zoom.value >= 24 {
            return Err(PvMapError::ConfigInvalid {
                key: "cluster_max_zoom".to_string(),
                reason: format!("{} exceeds the highest map zoom", self.cluster_max_zoom.value),
            });
        }

        // Expansion must be able to reach the unclustered level
        if self.max_expansion_zoom.value <= self.cluster_max_zoom.value {
            return Err(PvMapError::ConfigInvalid {
                key: "max_expansion_zoom".to_string(),
                reason: format!(
                    "must be greater than cluster_max_zoom ({}), got {}",
                    self.cluster_max_zoom.value, self.max_expansion_zoom.value
                ),
            });
        }

        Ok(())
    }

    /// Remote connection settings; missing values are a startup error
    pub fn require_remote(&self) -> Result<RemoteConfig> {
        let endpoint_url = self
            .endpoint_url
            .value
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| PvMapError::ConfigMissing { key: "SUPABASE_URL".to_string() })?;

        let anon_key = self
            .anon_key
            .value
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| PvMapError::ConfigMissing { key: "SUPABASE_ANON_KEY".to_string() })?;

        Ok(RemoteConfig {
            endpoint_url: endpoint_url.trim_end_matches('/').to_string(),
            anon_key,
            timeout: Duration::from_secs(self.request_timeout_secs.value),
        })
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms.value)
    }

    /// Get all configuration values as a map for inspection
    pub fn to_inspection_map(&self) -> HashMap<String, (String, ConfigSource)> {
        let mut map = HashMap::new();

        map.insert(
            "endpoint_url".to_string(),
            (
                self.endpoint_url.value.clone().unwrap_or_else(|| "(unset)".to_string()),
                self.endpoint_url.source,
            ),
        );

        let key_display = match &self.anon_key.value {
            Some(_) => "(set)".to_string(),
            None => "(unset)".to_string(),
        };
        map.insert("anon_key".to_string(), (key_display, self.anon_key.source));

        map.insert(
            "cluster_radius".to_string(),
            (format!("{} px", self.cluster_radius.value), self.cluster_radius.source),
        );

        map.insert(
            "cluster_max_zoom".to_string(),
            (self.cluster_max_zoom.value.to_string(), self.cluster_max_zoom.source),
        );

        map.insert(
            "max_expansion_zoom".to_string(),
            (self.max_expansion_zoom.value.to_string(), self.max_expansion_zoom.source),
        );

        map.insert(
            "debounce_ms".to_string(),
            (format!("{} ms", self.debounce_ms.value), self.debounce_ms.source),
        );

        map.insert(
            "request_timeout_secs".to_string(),
            (format!("{} s", self.request_timeout_secs.value), self.request_timeout_secs.source),
        );

        map
    }
}

impl Default for LayeredConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Configuration loaded from TOML file
#[derive(Debug, Deserialize, Serialize)]
struct FileConfig {
    endpoint_url: Option<String>,
    anon_key: Option<String>,
    cluster_radius: Option<u32>,
    cluster_max_zoom: Option<u8>,
    max_expansion_zoom: Option<u8>,
    debounce_ms: Option<u64>,
    request_timeout_secs: Option<u64>,
}

/// CLI configuration overrides
#[derive(Debug, Default)]
pub struct CliConfigOverrides {
    pub endpoint_url: Option<String>,
    pub cluster_radius: Option<u32>,
    pub cluster_max_zoom: Option<u8>,
    pub debounce_ms: Option<u64>,
}

fn first_env(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| env::var(key).ok().filter(|v| !v.is_empty()))
}

fn parse_env<T: std::str::FromStr>(key: &str, expected: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Invalid {} value '{}': expected {}", key, raw, expected);
            None
        }
    }
}
