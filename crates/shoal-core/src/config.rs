use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::executors::DockerSettings;
use crate::models::{CoreError, CoreErrorKind, CoreResult};
use crate::storage::validate_multiaddr;

pub const ENV_MODE: &str = "SHOAL_MODE";
pub const ENV_IPFS_API: &str = "SHOAL_IPFS_API";
pub const ENV_EXECUTOR_ID: &str = "SHOAL_EXECUTOR_ID";
pub const ENV_RESULTS_DIR: &str = "SHOAL_RESULTS_DIR";
pub const ENV_CACHE_DIR: &str = "SHOAL_CACHE_DIR";
pub const ENV_RUN_TIMEOUT_SECS: &str = "SHOAL_RUN_TIMEOUT_SECS";

const DEFAULT_IPFS_API: &str = "/ip4/127.0.0.1/tcp/5001";
const DEFAULT_EXECUTOR_ID: &str = "shoal-node";
const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum RegistryMode {
    /// Real backends: docker, language dispatch, python-wasm.
    #[default]
    Standard,
    /// One stub executor under every supported engine.
    Noop,
}

impl RegistryMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Noop => "noop",
        }
    }
}

impl Display for RegistryMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistryMode {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "noop" => Ok(Self::Noop),
            other => Err(CoreError::new(
                CoreErrorKind::Configuration,
                format!("unknown registry mode '{other}' (expected 'standard' or 'noop')"),
            )),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct NodeConfig {
    pub mode: RegistryMode,
    pub ipfs_api: String,
    pub executor_id: String,
    pub results_root: PathBuf,
    pub cache_root: PathBuf,
    pub run_timeout: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let temp = std::env::temp_dir();
        Self {
            mode: RegistryMode::default(),
            ipfs_api: DEFAULT_IPFS_API.to_string(),
            executor_id: DEFAULT_EXECUTOR_ID.to_string(),
            results_root: temp.join("shoal-results"),
            cache_root: temp.join("shoal-cache"),
            run_timeout: DEFAULT_RUN_TIMEOUT,
        }
    }
}

impl NodeConfig {
    pub fn from_env() -> CoreResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads overrides through `lookup`, falling back to defaults for unset keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> CoreResult<Self> {
        Self::from_lookup_with_mode(lookup, None)
    }

    /// Like [`NodeConfig::from_lookup`], but `mode` wins over `SHOAL_MODE`.
    /// Validation runs against the final mode.
    pub fn from_lookup_with_mode(
        lookup: impl Fn(&str) -> Option<String>,
        mode: Option<RegistryMode>,
    ) -> CoreResult<Self> {
        let mut config = Self::default();

        if let Some(mode) = mode {
            config.mode = mode;
        } else if let Some(mode) = lookup(ENV_MODE) {
            config.mode = mode.parse()?;
        }
        if let Some(ipfs_api) = lookup(ENV_IPFS_API) {
            config.ipfs_api = ipfs_api;
        }
        if let Some(executor_id) = lookup(ENV_EXECUTOR_ID) {
            config.executor_id = executor_id;
        }
        if let Some(results_root) = lookup(ENV_RESULTS_DIR) {
            config.results_root = PathBuf::from(results_root);
        }
        if let Some(cache_root) = lookup(ENV_CACHE_DIR) {
            config.cache_root = PathBuf::from(cache_root);
        }
        if let Some(seconds) = lookup(ENV_RUN_TIMEOUT_SECS) {
            let seconds = seconds.trim().parse::<u64>().map_err(|error| {
                CoreError::new(
                    CoreErrorKind::Configuration,
                    format!("{ENV_RUN_TIMEOUT_SECS} must be a whole number of seconds: {error}"),
                )
            })?;
            config.run_timeout = Duration::from_secs(seconds);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn mode(mut self, mode: RegistryMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn ipfs_api(mut self, ipfs_api: impl Into<String>) -> Self {
        self.ipfs_api = ipfs_api.into();
        self
    }

    pub fn executor_id(mut self, executor_id: impl Into<String>) -> Self {
        self.executor_id = executor_id.into();
        self
    }

    pub fn results_root(mut self, results_root: impl Into<PathBuf>) -> Self {
        self.results_root = results_root.into();
        self
    }

    pub fn cache_root(mut self, cache_root: impl Into<PathBuf>) -> Self {
        self.cache_root = cache_root.into();
        self
    }

    pub fn run_timeout(mut self, run_timeout: Duration) -> Self {
        self.run_timeout = run_timeout;
        self
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.run_timeout.is_zero() {
            return Err(CoreError::new(
                CoreErrorKind::Configuration,
                "run timeout must be greater than zero",
            ));
        }

        if self.mode == RegistryMode::Standard {
            if self.executor_id.trim().is_empty() {
                return Err(CoreError::new(
                    CoreErrorKind::Configuration,
                    "executor id must not be empty",
                ));
            }
            validate_multiaddr(&self.ipfs_api)?;

            for (name, root) in [("results", &self.results_root), ("cache", &self.cache_root)] {
                if !root.is_absolute() {
                    return Err(CoreError::new(
                        CoreErrorKind::Configuration,
                        format!("{name} directory '{}' must be an absolute path", root.display()),
                    ));
                }
            }
        }

        Ok(())
    }

    pub fn docker_settings(&self) -> DockerSettings {
        DockerSettings {
            results_root: self.results_root.clone(),
            run_timeout: self.run_timeout,
        }
    }
}
