//! Purpose: Resolve a store route string into an open `Store`.
//! Exports: `StoreRoute`.
//! Role: The one place that knows which backends exist and how they are named.
//! Invariants: `memory` is process-local; anything else names a JSON-lines file.
//! Invariants: `file:` prefixes are optional for file routes.
//! Invariants: Precedence is flag, route file, `MSGBOARD_DB`, then the default path.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::error::{Error, ErrorKind};
use crate::core::file_store::FileStore;
use crate::core::store::{MemoryStore, Store};
use crate::store_paths::{default_store_path, route_from_env};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StoreRoute {
    Memory,
    File(PathBuf),
}

impl StoreRoute {
    pub fn parse(input: &str) -> Result<Self, Error> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::new(ErrorKind::Usage)
                .with_message("store route is empty")
                .with_hint("Use `memory` or a path like ./records.jsonl."));
        }
        if input == "memory" || input == "memory:" {
            return Ok(StoreRoute::Memory);
        }
        if let Some(path) = input.strip_prefix("file:") {
            if path.is_empty() {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message("file store route is missing a path"));
            }
            return Ok(StoreRoute::File(PathBuf::from(path)));
        }
        if let Some((scheme, _)) = input.split_once("://") {
            return Err(Error::new(ErrorKind::Usage)
                .with_message(format!("unsupported store scheme {scheme:?}"))
                .with_hint("Supported routes are `memory` and file paths."));
        }
        Ok(StoreRoute::File(PathBuf::from(input)))
    }

    /// Picks the route from an explicit value, a file holding one, the environment, or the default.
    pub fn resolve(explicit: Option<&str>, route_file: Option<&Path>) -> Result<Self, Error> {
        match (explicit, route_file) {
            (Some(_), Some(_)) => Err(Error::new(ErrorKind::Usage)
                .with_message("--db cannot be combined with --db-file")
                .with_hint("Pass the route directly or point at a file that contains it.")),
            (Some(route), None) => Self::parse(route),
            (None, Some(path)) => Self::parse(&read_route_file(path)?),
            (None, None) => match route_from_env() {
                Some(route) => Self::parse(&route),
                None => Ok(Self::default()),
            },
        }
    }

    pub fn open(&self) -> Result<Arc<dyn Store>, Error> {
        match self {
            StoreRoute::Memory => Ok(Arc::new(MemoryStore::new())),
            StoreRoute::File(path) => Ok(Arc::new(FileStore::open(path)?)),
        }
    }
}

fn read_route_file(path: &Path) -> Result<String, Error> {
    let contents = std::fs::read_to_string(path).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("failed to read store route file")
            .with_path(path)
            .with_source(err)
    })?;
    let route = contents.trim();
    if route.is_empty() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("store route file is empty")
            .with_path(path));
    }
    Ok(route.to_string())
}

impl Default for StoreRoute {
    fn default() -> Self {
        StoreRoute::File(default_store_path())
    }
}

impl fmt::Display for StoreRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreRoute::Memory => f.write_str("memory"),
            StoreRoute::File(path) => write!(f, "file:{}", path.display()),
        }
    }
}
