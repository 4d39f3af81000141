//! Route registry: validated routes indexed by URL

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::SuiteConfig;
use crate::policy::RefreshPolicy;
use crate::storage::{Filesystem, SNAPSHOT_EXTENSION};
use crate::{GolderError, Result};

/// A declared route after validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Route name as declared
    pub name: String,
    /// Upstream URL
    pub url: String,
    /// Refresh policy, `None` means never re-gold once captured
    pub refresh: Option<RefreshPolicy>,
}

/// A route and where its snapshot lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEntry {
    /// The route
    pub route: Route,
    /// Snapshot file
    pub path: PathBuf,
}

/// Routes of one suite, built once and read-only afterwards
#[derive(Debug)]
pub struct Registry {
    name: String,
    folder_name: String,
    folder_path: PathBuf,
    routes: Vec<RouteEntry>,
    by_url: HashMap<String, usize>,
}

/// Replace every character that is not an ASCII letter or digit with `-`
#[must_use]
pub fn sanitize(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

impl Registry {
    /// Validate `config` and create the suite's snapshot folders
    ///
    /// # Errors
    ///
    /// Returns `GolderError::Configuration` for an invalid suite or route and
    /// `GolderError::Io` if a folder cannot be created
    pub async fn build(config: &SuiteConfig, fs: &dyn Filesystem) -> Result<Self> {
        config.validate()?;

        let folder_name = sanitize(&config.name);
        let folder_path = config.golds_dir.join(&folder_name);

        let mut routes = Vec::with_capacity(config.routes.len());
        let mut by_url = HashMap::with_capacity(config.routes.len());
        let mut by_file: HashMap<PathBuf, &str> = HashMap::new();

        for declared in &config.routes {
            let route = validate_route(&config.name, declared)?;
            let path = folder_path
                .join(sanitize(&route.name))
                .with_extension(SNAPSHOT_EXTENSION);

            if by_url.contains_key(&route.url) {
                return Err(GolderError::Configuration(format!(
                    "Golder {}'s {} reuses url {} of another route",
                    config.name, route.name, route.url
                )));
            }
            if let Some(other) = by_file.insert(path.clone(), &declared.name) {
                return Err(GolderError::Configuration(format!(
                    "Golder {}'s routes {other} and {} share the snapshot file {}",
                    config.name,
                    route.name,
                    path.display()
                )));
            }

            by_url.insert(route.url.clone(), routes.len());
            routes.push(RouteEntry { route, path });
        }

        ensure_dir(fs, &config.golds_dir).await?;
        ensure_dir(fs, &folder_path).await?;

        info!(
            "Registered {} route(s) for '{}' in {}",
            routes.len(),
            config.name,
            folder_path.display()
        );

        Ok(Self {
            name: config.name.clone(),
            folder_name,
            folder_path,
            routes,
            by_url,
        })
    }

    /// Look up the route registered for `url`
    #[must_use]
    pub fn route_for_url(&self, url: &str) -> Option<&RouteEntry> {
        self.by_url.get(url).map(|&i| &self.routes[i])
    }

    /// Routes in registration order
    pub fn routes(&self) -> impl Iterator<Item = &RouteEntry> {
        self.routes.iter()
    }

    /// Number of routes
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the suite declares no routes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Suite name as declared
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sanitized suite name
    #[must_use]
    pub fn folder_name(&self) -> &str {
        &self.folder_name
    }

    /// Folder holding this suite's snapshots
    #[must_use]
    pub fn folder_path(&self) -> &Path {
        &self.folder_path
    }
}

fn validate_route(suite: &str, declared: &crate::config::RouteConfig) -> Result<Route> {
    if declared.name.trim().is_empty() {
        return Err(GolderError::Configuration(format!(
            "Golder {suite} has a route without a name"
        )));
    }

    let refresh = declared
        .refresh
        .as_deref()
        .map(str::parse::<RefreshPolicy>)
        .transpose()
        .map_err(|e| match e {
            GolderError::Configuration(msg) => {
                GolderError::Configuration(format!("Golder {suite}'s {} {msg}", declared.name))
            }
            other => other,
        })?;

    let url = match declared.url.as_deref() {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => {
            return Err(GolderError::Configuration(format!(
                "Golder {suite}'s {} is missing a url param",
                declared.name
            )))
        }
    };

    Ok(Route {
        name: declared.name.clone(),
        url,
        refresh,
    })
}

async fn ensure_dir(fs: &dyn Filesystem, path: &Path) -> Result<()> {
    match fs.create_dir(path).await {
        Ok(()) => {
            debug!("Created {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e.into()),
    }
}
