//! Purpose: Client-side UI controller holding the fetched list and pending form inputs.
//! Exports: `RecordService`, `Controller`, `PendingInputs`.
//! Role: Drives add/update/delete/reload and resynchronises by refetching the full list.
//! Invariants: Every action re-fetches the list, whether or not its request succeeded.
//! Invariants: A failed fetch leaves the previously rendered list in place.
#![allow(clippy::result_large_err)]

use tracing::{debug, warn};

use super::client::ApiClient;
use crate::core::error::Error;
use crate::core::record::{Record, RecordUpdate};

/// The four calls a controller needs from the backend.
pub trait RecordService {
    fn list_records(&self) -> Result<Vec<Record>, Error>;
    fn write_record(&self, message: &str) -> Result<(), Error>;
    fn delete_record(&self, id: &str) -> Result<(), Error>;
    fn update_record(&self, id: &str, update: &RecordUpdate) -> Result<(), Error>;
}

impl RecordService for ApiClient {
    fn list_records(&self) -> Result<Vec<Record>, Error> {
        ApiClient::list_records(self)
    }

    fn write_record(&self, message: &str) -> Result<(), Error> {
        ApiClient::write_record(self, message)
    }

    fn delete_record(&self, id: &str) -> Result<(), Error> {
        ApiClient::delete_record(self, id)
    }

    fn update_record(&self, id: &str, update: &RecordUpdate) -> Result<(), Error> {
        ApiClient::update_record(self, id, update)
    }
}

/// Values typed into the add, update, and delete forms but not yet submitted.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PendingInputs {
    pub message: String,
    pub update_id: String,
    pub update_message: String,
    pub delete_id: String,
}

pub struct Controller<S> {
    service: S,
    records: Option<Vec<Record>>,
    pending: PendingInputs,
}

impl<S: RecordService> Controller<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            records: None,
            pending: PendingInputs::default(),
        }
    }

    /// Records from the last successful fetch; `None` until one succeeds.
    pub fn records(&self) -> Option<&[Record]> {
        self.records.as_deref()
    }

    pub fn pending(&self) -> &PendingInputs {
        &self.pending
    }

    pub fn set_message(&mut self, message: impl Into<String>) {
        self.pending.message = message.into();
    }

    pub fn set_update(&mut self, id: impl Into<String>, message: impl Into<String>) {
        self.pending.update_id = id.into();
        self.pending.update_message = message.into();
    }

    pub fn set_delete_id(&mut self, id: impl Into<String>) {
        self.pending.delete_id = id.into();
    }

    /// Initial fetch when the view first appears.
    pub fn mount(&mut self) -> Result<(), Error> {
        self.reload()
    }

    pub fn reload(&mut self) -> Result<(), Error> {
        match self.service.list_records() {
            Ok(records) => {
                debug!(count = records.len(), "refreshed records");
                self.records = Some(records);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "failed to refresh records");
                Err(err)
            }
        }
    }

    pub fn submit_add(&mut self) -> Result<(), Error> {
        let message = std::mem::take(&mut self.pending.message);
        let result = self.service.write_record(&message);
        self.finish("add", result)
    }

    pub fn submit_update(&mut self) -> Result<(), Error> {
        let id = std::mem::take(&mut self.pending.update_id);
        let message = std::mem::take(&mut self.pending.update_message);
        let result = self
            .service
            .update_record(&id, &RecordUpdate::message(message));
        self.finish("update", result)
    }

    pub fn submit_delete(&mut self) -> Result<(), Error> {
        let id = std::mem::take(&mut self.pending.delete_id);
        let result = self.service.delete_record(&id);
        self.finish("delete", result)
    }

    fn finish(&mut self, action: &str, result: Result<(), Error>) -> Result<(), Error> {
        if let Err(err) = &result {
            warn!(action, error = %err, "request failed");
        }
        let refreshed = self.reload();
        result.and(refreshed)
    }
}
