use thiserror::Error;

/// Failures that stop a run.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Snapshot catalog unavailable at {url}: {reason}")]
    CatalogUnavailable { url: String, reason: String },

    #[error("Invalid target domain: {0}")]
    InvalidDomain(String),

    #[error("Invalid years selection: {0}")]
    InvalidYears(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Result store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker pool error: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

/// Reasons a single snapshot is abandoned. Never escapes the query engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("throttled (HTTP 503) on all {attempts} attempts")]
    Throttled { attempts: u32 },

    #[error("unexpected HTTP status {status}")]
    Status { status: u16 },

    #[error("transport failure after {attempts} attempts: {message}")]
    Transport { attempts: u32, message: String },

    #[error("invalid query endpoint {endpoint}")]
    InvalidEndpoint { endpoint: String },
}

/// A response line that could not be turned into an archived URL.
#[derive(Error, Debug)]
pub enum RecordParseError {
    #[error("malformed JSON line: {0}")]
    Json(#[from] serde_json::Error),

    #[error("line has no string `url` field")]
    MissingUrl,
}

/// Transport-level failure reported by a `Fetcher`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        let kind = if e.is_timeout() {
            "timeout"
        } else if e.is_connect() {
            "connection error"
        } else {
            "request error"
        };
        Self::new(format!("{}: {}", kind, e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
