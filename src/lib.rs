//! Purpose: Shared library crate used by the `msgboard` binary and tests.
//! Exports: `api` (records, stores, envelope, client, controller); `core` internals.
//! Role: Backs both the server and the terminal client.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
pub mod core;
pub(crate) mod store_paths;
