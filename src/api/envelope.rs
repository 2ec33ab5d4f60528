//! Purpose: The `{success, data|error}` wrapper shared by server and client.
//! Exports: `Envelope`, `ErrorValue`, `ErrorBody`.
//! Role: Single definition of the wire contract so both ends decode the same shapes.
//! Invariants: Validation failures travel as a bare string; store failures as `{kind, message}`.
//! Invariants: `data` and `error` are omitted when absent.

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorValue>,
}

impl<T> Envelope<T> {
    pub fn ok() -> Self {
        Self {
            success: true,
            data: None,
            error: None,
        }
    }

    pub fn with_data(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(err: &Error) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorValue::from_error(err)),
        }
    }

    pub fn into_result(self) -> Result<Option<T>, Error> {
        if self.success {
            return Ok(self.data);
        }
        Err(match self.error {
            Some(value) => value.into_error(),
            None => Error::new(ErrorKind::Internal).with_message("request failed without detail"),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorValue {
    Text(String),
    Detail(ErrorBody),
}

impl ErrorValue {
    pub fn from_error(err: &Error) -> Self {
        if err.kind() == ErrorKind::Validation {
            return ErrorValue::Text(err.message().unwrap_or("invalid input").to_string());
        }
        ErrorValue::Detail(ErrorBody::from_error(err))
    }

    pub fn into_error(self) -> Error {
        match self {
            ErrorValue::Text(message) => Error::new(ErrorKind::Validation).with_message(message),
            ErrorValue::Detail(body) => body.into_error(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorBody {
    pub fn from_error(err: &Error) -> Self {
        Self {
            kind: err.kind().as_str().to_string(),
            message: err.message().unwrap_or("error").to_string(),
            hint: err.hint().map(str::to_string),
        }
    }

    pub fn into_error(self) -> Error {
        let kind = ErrorKind::parse(&self.kind).unwrap_or(ErrorKind::Internal);
        let mut err = Error::new(kind).with_message(self.message);
        if let Some(hint) = self.hint {
            err = err.with_hint(hint);
        }
        err
    }
}
