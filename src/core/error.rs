//! Error types for streams and combinators.

use std::sync::Arc;
use std::time::Duration;

/// The main error type for streams and combinators.
///
/// Errors are `Clone` so that a stream which failed can hand the same error
/// to every later read.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// A source failed while producing a value
    #[error("Source error: {0}")]
    Source(Arc<dyn std::error::Error + Send + Sync>),

    /// A transform function or inner stream failed
    #[error("Transform error: {0}")]
    Transform(Arc<dyn std::error::Error + Send + Sync>),

    /// The stream already has an active reader or writer
    #[error("Stream is locked to another reader or writer")]
    Locked,

    /// The stream was closed before the operation
    #[error("Stream is closed")]
    Closed,

    /// The stream was cancelled by its consumer
    #[error("Stream was cancelled")]
    Cancelled,

    /// An interval was configured with a zero period
    #[error("Interval period must be positive, got {period:?}")]
    InvalidInterval { period: Duration },

    /// `race` was given no input streams
    #[error("Race requires at least one input stream")]
    EmptyRace,

    /// An event target refused a listener registration
    #[error("Failed to register listener for event `{event}`: {reason}")]
    Listener { event: String, reason: String },

    /// A spawned stream task panicked
    #[error("Stream task failed: {0}")]
    Task(String),

    /// A custom error with a message
    #[error("{0}")]
    Custom(String),
}

impl Error {
    /// Create a source error from any error type
    pub fn source<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Error::Source(Arc::new(error))
    }

    /// Create a transform error from any error type
    pub fn transform<E: std::error::Error + Send + Sync + 'static>(error: E) -> Self {
        Error::Transform(Arc::new(error))
    }

    /// Create a listener registration error
    pub fn listener<S: Into<String>, R: Into<String>>(event: S, reason: R) -> Self {
        Error::Listener {
            event: event.into(),
            reason: reason.into(),
        }
    }

    /// Create a custom error with a message
    pub fn custom<S: Into<String>>(message: S) -> Self {
        Error::Custom(message.into())
    }

    /// Whether this error only reports that the stream already ended.
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::Closed | Error::Cancelled)
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_cancelled() {
            Error::Cancelled
        } else {
            Error::Task(err.to_string())
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Custom(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Custom(s.to_string())
    }
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Helper trait for converting foreign errors into our Error type
pub trait IntoError<T> {
    fn into_source_error(self) -> Result<T>;
    fn into_transform_error(self) -> Result<T>;
}

impl<T, E> IntoError<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn into_source_error(self) -> Result<T> {
        self.map_err(Error::source)
    }

    fn into_transform_error(self) -> Result<T> {
        self.map_err(Error::transform)
    }
}
