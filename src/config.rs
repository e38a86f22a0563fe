use serde::Deserialize;
use std::{env, fs, path::PathBuf, str::FromStr};

pub const CONFIG_PATH_ENV: &str = "NOTEBOOK_BRIDGE_CONFIG";
pub const FLAVOR_ENV: &str = "NOTEBOOK_BRIDGE_FLAVOR";
pub const WORKER_THREADS_ENV: &str = "NOTEBOOK_BRIDGE_WORKER_THREADS";

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerFlavor {
    #[default]
    CurrentThread,
    MultiThread,
}

impl FromStr for SchedulerFlavor {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "current_thread" | "current" => Ok(Self::CurrentThread),
            "multi_thread" | "multi" => Ok(Self::MultiThread),
            other => Err(anyhow::anyhow!("Unknown scheduler flavor `{}`", other)),
        }
    }
}

/// Settings for schedulers the bridge builds on demand.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    #[serde(default)]
    pub flavor: SchedulerFlavor,
    /// Only used by the multi-thread flavor; tokio picks a default when unset.
    #[serde(default)]
    pub worker_threads: Option<usize>,
    #[serde(default = "default_thread_name")]
    pub thread_name: String,
}

fn default_thread_name() -> String {
    "notebook-bridge".to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            flavor: SchedulerFlavor::default(),
            worker_threads: None,
            thread_name: default_thread_name(),
        }
    }
}

impl BridgeConfig {
    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Apply `NOTEBOOK_BRIDGE_FLAVOR` and `NOTEBOOK_BRIDGE_WORKER_THREADS`.
    pub fn with_env_overrides(mut self) -> anyhow::Result<Self> {
        if let Ok(flavor) = env::var(FLAVOR_ENV) {
            self.flavor = flavor.parse()?;
        }
        if let Ok(workers) = env::var(WORKER_THREADS_ENV) {
            let workers = workers.trim().parse::<usize>().map_err(|e| {
                anyhow::anyhow!("Invalid {} value `{}`: {}", WORKER_THREADS_ENV, workers, e)
            })?;
            self.worker_threads = Some(workers);
        }
        Ok(self)
    }
}

pub fn resolve_config_path() -> Option<PathBuf> {
    env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from)
}

/// Load the config file named by `NOTEBOOK_BRIDGE_CONFIG` (or defaults),
/// then apply environment overrides.
pub fn load_bridge_config() -> anyhow::Result<BridgeConfig> {
    let base = match resolve_config_path() {
        Some(path) => {
            let raw = fs::read_to_string(&path).map_err(|e| {
                anyhow::anyhow!("Could not read bridge config {}: {}", path.display(), e)
            })?;
            BridgeConfig::from_json_str(&raw)?
        }
        None => BridgeConfig::default(),
    };

    base.with_env_overrides()
}
