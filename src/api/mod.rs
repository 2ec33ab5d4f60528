//! Purpose: Define the public Rust API boundary for msgboard.
//! Exports: Record model, store backends, wire envelope, HTTP client, and UI controller.
//! Role: Stable surface for the CLI, the server, and integration tests.
//! Invariants: This module is the only public path to storage primitives.

mod client;
mod controller;
mod envelope;
mod route;

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::file_store::FileStore;
pub use crate::core::object_id::ObjectId;
pub use crate::core::record::{INVALID_INPUT, Record, RecordUpdate, invalid_input, validate_message};
pub use crate::core::store::{MemoryStore, Store};
pub use crate::store_paths::STORE_ROUTE_ENV;
pub use client::{ApiClient, DEFAULT_BASE_URL};
pub use controller::{Controller, PendingInputs, RecordService};
pub use envelope::{Envelope, ErrorBody, ErrorValue};
pub use route::StoreRoute;
