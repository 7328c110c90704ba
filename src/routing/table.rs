//! Prefix route table.
//!
//! # Responsibilities
//! - Parse the JSON route declaration into an immutable snapshot
//! - Swap in a new snapshot when the declaration's mtime advances
//! - Answer first-segment lookups for every inbound request
//!
//! # Design Decisions
//! - Snapshots are never mutated; a reload builds a new one and stores it
//!   with a single atomic pointer swap (`ArcSwap`)
//! - Reading and parsing happen before the swap, so lookups never wait on I/O
//! - A failed reload leaves the active snapshot untouched
//! - Prefix matching is exact and case-sensitive on the first segment only

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use arc_swap::ArcSwap;
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading a route declaration.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("failed to read route source {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse route source {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("route prefix '{0}' contains '/' and can never match a path segment")]
    InvalidPrefix(String),
}

/// Where route declarations are read from.
#[derive(Debug, Clone)]
pub struct RouteSource {
    path: PathBuf,
}

impl RouteSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Modification time of the declaration.
    pub fn modified(&self) -> Result<SystemTime, RouteError> {
        fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .map_err(|source| self.io_error(source))
    }

    fn read(&self) -> Result<String, RouteError> {
        fs::read_to_string(&self.path).map_err(|source| self.io_error(source))
    }

    fn io_error(&self, source: std::io::Error) -> RouteError {
        RouteError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RouteDeclaration {
    routes: HashMap<String, String>,
}

/// One immutable version of the route map.
#[derive(Debug)]
pub struct RouteSnapshot {
    routes: HashMap<String, String>,
    modified: SystemTime,
    version: u64,
}

impl RouteSnapshot {
    fn parse(source: &RouteSource, modified: SystemTime, version: u64) -> Result<Self, RouteError> {
        let content = source.read()?;
        let declaration: RouteDeclaration =
            serde_json::from_str(&content).map_err(|e| RouteError::Parse {
                path: source.path.clone(),
                source: e,
            })?;

        if let Some(prefix) = declaration.routes.keys().find(|p| p.contains('/')) {
            return Err(RouteError::InvalidPrefix(prefix.clone()));
        }

        Ok(Self {
            routes: declaration.routes,
            modified,
            version,
        })
    }

    /// Upstream segment mapped to `prefix`.
    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.routes.get(prefix).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Modification time of the source this snapshot was parsed from.
    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    /// Number of successful loads up to and including this one.
    pub fn version(&self) -> u64 {
        self.version
    }
}

/// Result of a successful lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    /// The matched first path segment.
    pub prefix: String,
    /// Upstream path fragment the prefix maps to.
    pub target: String,
    /// Everything after the first segment's trailing `/`, possibly empty.
    pub remainder: String,
}

/// What a reload attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// The source has not been modified since the active snapshot.
    Unchanged,
    /// A new snapshot with this many routes is now active.
    Reloaded(usize),
}

/// The process-wide route table.
#[derive(Debug)]
pub struct RouteTable {
    current: ArcSwap<RouteSnapshot>,
}

impl RouteTable {
    /// Load the initial table. Callers treat failure as fatal.
    pub fn load(source: &RouteSource) -> Result<Self, RouteError> {
        let modified = source.modified()?;
        let snapshot = RouteSnapshot::parse(source, modified, 1)?;
        Ok(Self {
            current: ArcSwap::from_pointee(snapshot),
        })
    }

    /// Build a table from in-memory routes. Any real source file counts as
    /// newer, so the first `reload_if_changed` replaces these routes.
    pub fn from_routes<I, K, V>(routes: I) -> Result<Self, RouteError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let routes: HashMap<String, String> = routes
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        if let Some(prefix) = routes.keys().find(|p| p.contains('/')) {
            return Err(RouteError::InvalidPrefix(prefix.clone()));
        }
        Ok(Self {
            current: ArcSwap::from_pointee(RouteSnapshot {
                routes,
                modified: SystemTime::UNIX_EPOCH,
                version: 1,
            }),
        })
    }

    /// Re-read `source` if its modification time moved past the active
    /// snapshot's. Must only be called from a single reloader.
    pub fn reload_if_changed(&self, source: &RouteSource) -> Result<ReloadOutcome, RouteError> {
        let (last_modified, version) = {
            let current = self.current.load();
            (current.modified, current.version)
        };
        let modified = source.modified()?;
        if modified <= last_modified {
            return Ok(ReloadOutcome::Unchanged);
        }

        let snapshot = RouteSnapshot::parse(source, modified, version + 1)?;
        let count = snapshot.len();
        self.current.store(Arc::new(snapshot));
        Ok(ReloadOutcome::Reloaded(count))
    }

    /// Look up the first segment of `path`.
    pub fn lookup(&self, path: &str) -> Option<RouteMatch> {
        let (prefix, remainder) = split_first_segment(path);
        let snapshot = self.current.load();
        snapshot.get(prefix).map(|target| RouteMatch {
            prefix: prefix.to_string(),
            target: target.to_string(),
            remainder: remainder.to_string(),
        })
    }

    /// The currently active snapshot.
    pub fn snapshot(&self) -> Arc<RouteSnapshot> {
        self.current.load_full()
    }

    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }
}

/// Split `/first/rest...` into `("first", "rest...")`.
pub fn split_first_segment(path: &str) -> (&str, &str) {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    trimmed.split_once('/').unwrap_or((trimmed, ""))
}
