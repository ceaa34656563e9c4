use thiserror::Error;

/// Result type for curlwrap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for curlwrap
///
/// Transfer failures (DNS, connect, timeout, TLS, redirects) are not reported
/// through this type: they are captured on the session and read back with
/// [`Session::error`](crate::Session::error). These variants cover misuse of
/// the session and local failures that happen before any transfer starts.
#[derive(Error, Debug)]
pub enum Error {
    /// The transport handle has been released by `close()`
    #[error("Session is closed; call reset() to start a new one")]
    SessionClosed,

    /// The transport handle could not be allocated
    #[error("Failed to initialize transport handle: {0}")]
    Init(String),

    /// Invalid request configuration
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A metadata key that the last transfer did not produce
    #[error("Unknown info key: {0}")]
    UnknownInfoKey(String),

    /// Local IO errors, e.g. reading an upload file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a new initialization error
    pub fn init(message: impl Into<String>) -> Self {
        Error::Init(message.into())
    }

    /// Create a new invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Error::InvalidRequest(message.into())
    }

    /// Create a new unknown info key error
    pub fn unknown_info_key(key: impl Into<String>) -> Self {
        Error::UnknownInfoKey(key.into())
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    /// Check if this error comes from using a closed session
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::SessionClosed)
    }

    /// Check if this is an unknown info key error
    pub fn is_unknown_info_key(&self) -> bool {
        matches!(self, Error::UnknownInfoKey(_))
    }

    /// Check if this is an invalid request error
    pub fn is_invalid_request(&self) -> bool {
        matches!(self, Error::InvalidRequest(_))
    }
}

impl From<http::header::InvalidHeaderName> for Error {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Error::InvalidRequest(format!("Invalid header name: {}", err))
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Error::InvalidRequest(format!("Invalid header value: {}", err))
    }
}

/// Render a transfer error with its whole source chain, the way it is kept
/// on the session.
pub(crate) fn describe(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
