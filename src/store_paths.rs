//! Purpose: Shared default store location and route environment lookup.
//! Exports: `default_store_path`, `route_from_env`, `STORE_ROUTE_ENV`.
//! Role: Keep CLI and API route semantics aligned from one source.
//! Invariants: Default store file remains `~/.msgboard/records.jsonl`.

use std::path::PathBuf;

pub const STORE_ROUTE_ENV: &str = "MSGBOARD_DB";

pub(crate) fn default_store_path() -> PathBuf {
    let home = std::env::var_os("HOME").unwrap_or_default();
    PathBuf::from(home).join(".msgboard").join("records.jsonl")
}

pub(crate) fn route_from_env() -> Option<String> {
    std::env::var(STORE_ROUTE_ENV)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
