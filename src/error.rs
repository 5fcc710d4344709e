//! Error taxonomy for the job and text-translation flows.
//! Backend failures are mapped into `JobError` / `TranslateError` at the
//! point where they terminate a state machine.

/// Failure at the backend seam (transport, status code, payload shape).
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Http(String),
    #[error("unexpected status {code}: {message}")]
    Status { code: u16, message: String },
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("request timed out")]
    TimedOut,
    #[error("request cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            BackendError::TimedOut
        } else if e.is_decode() {
            BackendError::Decode(e.to_string())
        } else {
            BackendError::Http(e.to_string())
        }
    }
}

/// Errors that terminate a document job.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// Pre-flight validation, no network call was made.
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("a translation job is already running")]
    Busy,
    #[error("upload failed: {0}")]
    Upload(String),
    #[error("status check failed: {0}")]
    StatusCheck(String),
    #[error("translation timed out after {attempts} status checks")]
    Timeout { attempts: u32 },
    /// The server reported the `error` phase.
    #[error("translation failed: {0}")]
    JobFailed(String),
    #[error("download failed: {0}")]
    Download(String),
    /// 2xx result call with a zero-byte body.
    #[error("translated document is empty")]
    EmptyResult,
    #[error("failed to save translated document: {0}")]
    Sink(#[from] std::io::Error),
}

/// Errors on the interactive text path.
#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("translation failed")]
    Failure(#[source] BackendError),
    #[error("translation superseded")]
    Cancelled,
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<BackendError> for TranslateError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Cancelled => TranslateError::Cancelled,
            other => TranslateError::Failure(other),
        }
    }
}

/// Errors loading or saving session state.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session store error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Failure wiring the client together at startup.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Session(#[from] SessionError),
}
