use std::error::Error as StdError;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    Usage,
    Validation,
    Store,
    Corrupt,
    Busy,
    Io,
}

impl ErrorKind {
    /// True for failures raised by the persistence layer rather than by the caller.
    pub fn is_store_failure(self) -> bool {
        matches!(self, ErrorKind::Store | ErrorKind::Corrupt | ErrorKind::Busy)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Internal => "Internal",
            ErrorKind::Usage => "Usage",
            ErrorKind::Validation => "Validation",
            ErrorKind::Store => "Store",
            ErrorKind::Corrupt => "Corrupt",
            ErrorKind::Busy => "Busy",
            ErrorKind::Io => "Io",
        }
    }

    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "Internal" => Some(ErrorKind::Internal),
            "Usage" => Some(ErrorKind::Usage),
            "Validation" => Some(ErrorKind::Validation),
            "Store" => Some(ErrorKind::Store),
            "Corrupt" => Some(ErrorKind::Corrupt),
            "Busy" => Some(ErrorKind::Busy),
            "Io" => Some(ErrorKind::Io),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    hint: Option<String>,
    path: Option<PathBuf>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            hint: None,
            path: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {})", path.display())?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::Usage => 2,
        ErrorKind::Validation => 3,
        ErrorKind::Store => 4,
        ErrorKind::Corrupt => 5,
        ErrorKind::Busy => 6,
        ErrorKind::Io => 7,
    }
}
