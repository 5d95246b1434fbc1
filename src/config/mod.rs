// ABOUTME: Configuration types and parsing for ephem.yml.
// ABOUTME: Handles YAML parsing, defaults, path rebasing, and environment overrides.

mod deserialize;
mod init;

pub use init::init_config;

use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::lifecycle::{ControllerSettings, EndpointSpec, MonitorSettings, NamePlanner, Scenario};
use crate::remote::ManagedTag;
use crate::store::CleanupPolicy;
use deserialize::deserialize_scenarios;

pub const CONFIG_FILENAME: &str = "ephem.yml";
pub const CONFIG_FILENAME_ALT: &str = "ephem.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".ephem/config.yml";

/// Overrides `state_dir` when set.
pub const STATE_DIR_ENV: &str = "EPHEM_STATE_DIR";

/// Upper bound for `timeout` and `scheduled_ttl` (ten years).
pub const MAX_DURATION: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Contact recorded on every target.
    pub owner: String,

    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default = "default_resource_prefix")]
    pub resource_prefix: String,

    #[serde(default = "default_operation_prefix")]
    pub operation_prefix: String,

    /// Provisioning template submitted for every scenario.
    pub template: PathBuf,

    #[serde(deserialize_with = "deserialize_scenarios")]
    pub scenarios: NonEmpty<Scenario>,

    #[serde(default)]
    pub cleanup_policy: CleanupPolicy,

    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    pub poll_interval: Duration,

    #[serde(default = "default_max_concurrent_polls")]
    pub max_concurrent_polls: usize,

    #[serde(default = "default_scheduled_ttl", with = "humantime_serde")]
    pub scheduled_ttl: Duration,

    #[serde(default = "default_spurious_verify_delay", with = "humantime_serde")]
    pub spurious_verify_delay: Duration,

    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,

    #[serde(default)]
    pub managed_tag: ManagedTag,

    #[serde(default)]
    pub endpoint: EndpointSpec,

    /// Branch recorded on deployments; detected from git when absent.
    #[serde(default)]
    pub branch: Option<String>,

    /// Azure CLI executable.
    #[serde(default = "default_az_path")]
    pub az_path: PathBuf,
}

fn default_region() -> String {
    "westeurope".to_string()
}

fn default_resource_prefix() -> String {
    "ephem-test".to_string()
}

fn default_operation_prefix() -> String {
    "ephem-deploy".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30 * 60)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_max_concurrent_polls() -> usize {
    4
}

fn default_scheduled_ttl() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_spurious_verify_delay() -> Duration {
    Duration::from_secs(3)
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".ephem/state")
}

fn default_results_dir() -> PathBuf {
    PathBuf::from(".ephem/results")
}

fn default_az_path() -> PathBuf {
    PathBuf::from("az")
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file, resolving relative paths against `base`.
    pub fn load(path: &Path, base: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_yaml(&content)?.rebase(base))
    }

    /// Find and load the config file for the project in `dir`.
    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ];

        for path in &candidates {
            if path.exists() {
                return Self::load(path, dir);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Apply environment overrides, resolving relative values against `base`.
    pub fn with_env_overrides(mut self, base: &Path) -> Self {
        if let Ok(dir) = std::env::var(STATE_DIR_ENV)
            && !dir.trim().is_empty()
        {
            self.state_dir = base.join(dir.trim());
        }
        self
    }

    fn validate(&self) -> Result<()> {
        if self.owner.trim().is_empty() {
            return Err(Error::InvalidConfig("owner cannot be empty".to_string()));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "poll_interval must be greater than zero".to_string(),
            ));
        }
        for (name, value) in [("timeout", self.timeout), ("scheduled_ttl", self.scheduled_ttl)] {
            if value > MAX_DURATION {
                return Err(Error::InvalidConfig(format!(
                    "{name} cannot exceed {} days",
                    MAX_DURATION.as_secs() / (24 * 60 * 60)
                )));
            }
        }
        if self.max_concurrent_polls == 0 {
            return Err(Error::InvalidConfig(
                "max_concurrent_polls must be at least 1".to_string(),
            ));
        }
        if self.managed_tag.key.trim().is_empty() || self.managed_tag.value.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "managed_tag key and value cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    fn rebase(mut self, base: &Path) -> Self {
        self.template = base.join(&self.template);
        self.state_dir = base.join(&self.state_dir);
        self.results_dir = base.join(&self.results_dir);
        for scenario in self.scenarios.iter_mut() {
            scenario.parameters = base.join(&scenario.parameters);
            if let Some(template) = scenario.template.as_mut() {
                *template = base.join(&*template);
            }
        }
        self
    }

    pub fn scenario(&self, name: &str) -> Result<&Scenario> {
        self.scenarios
            .iter()
            .find(|s| s.name.as_str() == name)
            .ok_or_else(|| Error::UnknownScenario(name.to_string()))
    }

    /// The named scenarios in the order given, or all of them when `names` is empty.
    pub fn select_scenarios(&self, names: &[String]) -> Result<Vec<Scenario>> {
        if names.is_empty() {
            return Ok(self.scenarios.iter().cloned().collect());
        }
        let mut seen = HashSet::new();
        let mut selected = Vec::new();
        for name in names {
            if seen.insert(name.as_str()) {
                selected.push(self.scenario(name)?.clone());
            }
        }
        Ok(selected)
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            timeout: self.timeout,
            poll_interval: self.poll_interval,
            max_concurrent_polls: self.max_concurrent_polls,
        }
    }

    /// Settings for the lifecycle orchestrator.
    pub fn controller_settings(&self, launched_from: impl Into<String>) -> ControllerSettings {
        ControllerSettings {
            owner: self.owner.clone(),
            region: self.region.clone(),
            template: self.template.clone(),
            names: NamePlanner::new(&self.resource_prefix, &self.operation_prefix),
            scheduled_ttl: self.scheduled_ttl,
            monitor: self.monitor_settings(),
            managed_tag: self.managed_tag.clone(),
            endpoint: self.endpoint.clone(),
            results_dir: self.results_dir.clone(),
            spurious_verify_delay: self.spurious_verify_delay,
            launched_from: launched_from.into(),
        }
    }
}
