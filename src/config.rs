//! Configuration types for Golder

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::golding::MAX_CONCURRENT_FETCHES;
use crate::network::FETCH_TIMEOUT_MS;
use crate::policy::RefreshPolicy;
use crate::{GolderError, Result};

/// What the interceptor does with URLs the suite did not declare
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnregisteredPolicy {
    /// Forward the request to the live transport unchanged
    #[default]
    PassThrough,
    /// Fail with `GolderError::UnregisteredRoute`
    Reject,
}

/// A test suite: its name, where snapshots live and which routes it golds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteConfig {
    /// Suite name, sanitized into the snapshot folder name
    pub name: String,
    /// Directory holding every suite's snapshot folder
    #[serde(default = "default_golds_dir")]
    pub golds_dir: PathBuf,
    /// Handling of requests to undeclared URLs
    #[serde(default)]
    pub unregistered: UnregisteredPolicy,
    /// Upper bound on a single upstream fetch
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    /// Routes golded concurrently by a batch gold
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    /// Declared routes, in registration order
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

/// A declared route as written by the test author
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Route name, sanitized into the snapshot file name
    pub name: String,
    /// Upstream URL, also the interception key
    pub url: Option<String>,
    /// Refresh policy name (hourly, daily, weekly, monthly)
    pub refresh: Option<String>,
}

fn default_golds_dir() -> PathBuf {
    PathBuf::from("test").join("golds")
}

fn default_fetch_timeout_ms() -> u64 {
    FETCH_TIMEOUT_MS
}

fn default_max_concurrent_fetches() -> usize {
    MAX_CONCURRENT_FETCHES
}

impl SuiteConfig {
    /// Create a suite with default settings and no routes
    #[must_use]
    pub fn new(name: impl Into<String>, golds_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            golds_dir: golds_dir.into(),
            unregistered: UnregisteredPolicy::default(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            routes: Vec::new(),
        }
    }

    /// Declare a route
    #[must_use]
    pub fn route(
        mut self,
        name: impl Into<String>,
        url: impl Into<String>,
        refresh: Option<RefreshPolicy>,
    ) -> Self {
        self.routes.push(RouteConfig {
            name: name.into(),
            url: Some(url.into()),
            refresh: refresh.map(|policy| policy.as_str().to_string()),
        });
        self
    }

    /// Set the unregistered-URL policy
    #[must_use]
    pub fn unregistered(mut self, policy: UnregisteredPolicy) -> Self {
        self.unregistered = policy;
        self
    }

    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GolderError::Configuration(format!("Failed to read config file: {e}"))
        })?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| GolderError::Configuration(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate settings that do not depend on routes
    ///
    /// Route validation happens when the registry is built.
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(GolderError::Configuration(
                "Golder requires a `name`".to_string(),
            ));
        }

        if self.fetch_timeout_ms == 0 {
            return Err(GolderError::Configuration(
                "fetch_timeout_ms must be > 0".to_string(),
            ));
        }

        if self.max_concurrent_fetches == 0 {
            return Err(GolderError::Configuration(
                "max_concurrent_fetches must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
