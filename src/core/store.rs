// Document store boundary plus the process-local in-memory backend.
use std::sync::{Mutex, MutexGuard};

use time::OffsetDateTime;

use crate::core::error::{Error, ErrorKind};
use crate::core::object_id::ObjectId;
use crate::core::record::{Record, RecordUpdate};

pub type Clock = fn() -> OffsetDateTime;

/// Persistence operations backing the four endpoints.
///
/// Implementations own every persisted record; callers never cache results
/// across calls. Each method is atomic with respect to other calls on the
/// same store, nothing more.
pub trait Store: Send + Sync {
    fn insert(&self, message: String) -> Result<Record, Error>;

    /// Every record, in insertion order.
    fn find_all(&self) -> Result<Vec<Record>, Error>;

    /// Removes the record if present and returns it. Unknown ids yield `None`.
    fn delete_by_id(&self, id: &ObjectId) -> Result<Option<Record>, Error>;

    /// Applies `update` to the record if present and returns the new state.
    fn update_by_id(&self, id: &ObjectId, update: &RecordUpdate)
    -> Result<Option<Record>, Error>;

    fn describe(&self) -> String;
}

pub struct MemoryStore {
    records: Mutex<Vec<Record>>,
    clock: Clock,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(OffsetDateTime::now_utc)
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            clock,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<Record>>, Error> {
        self.records
            .lock()
            .map_err(|_| Error::new(ErrorKind::Store).with_message("memory store lock poisoned"))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn insert(&self, message: String) -> Result<Record, Error> {
        let record = Record::create(message, (self.clock)())?;
        self.lock()?.push(record.clone());
        Ok(record)
    }

    fn find_all(&self) -> Result<Vec<Record>, Error> {
        Ok(self.lock()?.clone())
    }

    fn delete_by_id(&self, id: &ObjectId) -> Result<Option<Record>, Error> {
        let mut records = self.lock()?;
        Ok(remove_record(&mut records, id))
    }

    fn update_by_id(
        &self,
        id: &ObjectId,
        update: &RecordUpdate,
    ) -> Result<Option<Record>, Error> {
        let mut records = self.lock()?;
        Ok(update_record(&mut records, id, update, (self.clock)()))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

pub(crate) fn remove_record(records: &mut Vec<Record>, id: &ObjectId) -> Option<Record> {
    let index = records.iter().position(|record| &record.id == id)?;
    Some(records.remove(index))
}

pub(crate) fn update_record(
    records: &mut [Record],
    id: &ObjectId,
    update: &RecordUpdate,
    now: OffsetDateTime,
) -> Option<Record> {
    let record = records.iter_mut().find(|record| &record.id == id)?;
    update.apply(record, now);
    Some(record.clone())
}
