use std::fmt;

#[derive(Debug)]
pub enum QuiverError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Configuration(String),
    Execution(String),
    Schema(String),
    Storage(String),
    Transaction(String),
    Index(String),
    Security(String),
    NotFound(String),
    AlreadyExists { name: String },
    InvalidState(String),
    Timeout(String),
    Lock(String),
    Type(String),
    Internal(String),
}

impl fmt::Display for QuiverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO Error: {e}"),
            Self::Json(e) => write!(f, "JSON Error: {e}"),
            Self::Configuration(s) => write!(f, "Configuration Error: {s}"),
            Self::Execution(s) => write!(f, "Execution Error: {s}"),
            Self::Schema(s) => write!(f, "Schema Error: {s}"),
            Self::Storage(s) => write!(f, "Storage Error: {s}"),
            Self::Transaction(s) => write!(f, "Transaction Error: {s}"),
            Self::Index(s) => write!(f, "Index Error: {s}"),
            Self::Security(s) => write!(f, "Security Error: {s}"),
            Self::NotFound(s) => write!(f, "Not Found: {s}"),
            Self::AlreadyExists { name } => write!(f, "Resource already exists: {name}"),
            Self::InvalidState(s) => write!(f, "Invalid State: {s}"),
            Self::Timeout(s) => write!(f, "Timeout: {s}"),
            Self::Lock(s) => write!(f, "Lock Error: {s}"),
            Self::Type(s) => write!(f, "Type Error: {s}"),
            Self::Internal(s) => write!(f, "Internal Error: {s}"),
        }
    }
}

impl std::error::Error for QuiverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

// Manual From implementations
impl From<std::io::Error> for QuiverError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for QuiverError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

impl QuiverError {
    /// Shorthand for a poisoned-lock error on one of the session's `RwLock`s.
    #[must_use]
    pub fn poisoned(what: &str) -> Self {
        Self::Lock(format!("poisoned lock on {what}"))
    }
}
