// The persisted message record plus the partial update applied to it.
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::core::error::{Error, ErrorKind};
use crate::core::object_id::ObjectId;

/// Wire text for every rejected client input.
pub const INVALID_INPUT: &str = "Invalid input.";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "_id", alias = "id")]
    pub id: ObjectId,
    pub message: String,
    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(rename = "updatedAt", with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Record {
    /// Builds a new record stamped at `now`; rejects an empty message.
    pub fn create(message: impl Into<String>, now: OffsetDateTime) -> Result<Self, Error> {
        let message = validate_message(Some(message.into()))?;
        let seconds = u32::try_from(now.unix_timestamp()).map_err(|_| {
            Error::new(ErrorKind::Internal)
                .with_message(format!("clock time {now} is outside the record id range"))
        })?;
        Ok(Self {
            id: ObjectId::generate(seconds)?,
            message,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RecordUpdate {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.message.is_none()
    }

    /// Applies the set fields to `record`. Returns false when nothing was set.
    pub fn apply(&self, record: &mut Record, now: OffsetDateTime) -> bool {
        if self.is_empty() {
            return false;
        }
        if let Some(message) = &self.message {
            record.message = message.clone();
        }
        record.updated_at = now;
        true
    }
}

pub fn validate_message(message: Option<String>) -> Result<String, Error> {
    match message {
        Some(message) if !message.is_empty() => Ok(message),
        _ => Err(invalid_input()),
    }
}

pub fn invalid_input() -> Error {
    Error::new(ErrorKind::Validation).with_message(INVALID_INPUT)
}
