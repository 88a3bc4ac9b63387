//! Error taxonomy shared by every subsystem.
//!
//! # Responsibilities
//! - Classify failures (timeout, abort, malformed input, wrapped)
//! - Coerce arbitrary thrown values into an [`Error`]
//! - Keep internal messages out of user-facing text
//!
//! # Design Decisions
//! - One error enum, classified through [`Error::kind`]
//! - Only malformed input is returned as `Err` directly; everything else
//!   surfaces through an [`Outcome`](crate::resilience::timeouts::Outcome)

use std::any::Any;
use std::fmt;

use thiserror::Error;

/// User-facing text used when the real cause must not be exposed.
pub const DEFAULT_ERROR_MESSAGE: &str = "Oops! Something went wrong on our end. We're fixing it";

/// Status code attached to [`Error::Unauthorized`] unless overridden.
pub const DEFAULT_UNAUTHORIZED_STATUS: u16 = 401;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A deadline elapsed.
    Timeout,
    /// An externally supplied signal fired.
    Aborted,
    /// Malformed input, e.g. a non-signal handed to the combinator.
    Type,
    /// Any other failure, coerced from whatever the operation produced.
    Wrapped,
    /// Authentication was rejected.
    Unauthorized,
    /// The remote side answered with an error status.
    Api,
}

impl ErrorKind {
    /// Stable lowercase label, used for log fields and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::Aborted => "aborted",
            ErrorKind::Type => "type",
            ErrorKind::Wrapped => "wrapped",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Api => "api",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for the whole crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The deadline elapsed before the operation settled.
    #[error("Timeout Error: {message}")]
    Timeout { message: String },

    /// An externally supplied signal fired before the operation settled.
    #[error("The operation was aborted: {message}")]
    Aborted { message: String },

    /// An element handed to the combinator was not a signal.
    #[error("All elements must be signal instances (element {index} is {found})")]
    InvalidSignal { index: usize, found: String },

    #[error("Unauthorized Error: {message}")]
    Unauthorized { message: String, status: u16 },

    /// The remote side answered with a status of 400 or above.
    #[error("API Error")]
    Api {
        status: u16,
        body: serde_json::Value,
        method: String,
        url: String,
    },

    /// A non-error value that was coerced into an error.
    #[error("{message}")]
    Message { message: String },

    /// A native error, passed through unchanged.
    #[error(transparent)]
    Source(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Aborted { .. } => ErrorKind::Aborted,
            Error::InvalidSignal { .. } => ErrorKind::Type,
            Error::Unauthorized { .. } => ErrorKind::Unauthorized,
            Error::Api { .. } => ErrorKind::Api,
            Error::Message { .. } | Error::Source(_) => ErrorKind::Wrapped,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Error::Timeout {
            message: message.into(),
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Error::Message {
            message: message.into(),
        }
    }

    /// Unauthorized error with the default 401 status.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::unauthorized_with_status(message, DEFAULT_UNAUTHORIZED_STATUS)
    }

    pub fn unauthorized_with_status(message: impl Into<String>, status: u16) -> Self {
        Error::Unauthorized {
            message: message.into(),
            status,
        }
    }

    /// Log `internal` and return an error that only shows `exposed`.
    ///
    /// `exposed` falls back to [`DEFAULT_ERROR_MESSAGE`].
    pub fn exposed(internal: &str, exposed: Option<&str>) -> Self {
        tracing::error!(message = %internal, "Unexpected failure");
        Self::message(exposed.unwrap_or(DEFAULT_ERROR_MESSAGE))
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Unauthorized { status, .. } | Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }

    pub fn is_aborted(&self) -> bool {
        self.kind() == ErrorKind::Aborted
    }
}

/// Anything an operation can fail with.
///
/// Converted into an [`Error`] with [`cast_error`].
#[derive(Debug)]
pub enum Thrown {
    /// Already one of ours.
    Error(Error),
    /// A native error from another library.
    Source(Box<dyn std::error::Error + Send + Sync>),
    Text(String),
    /// A number, kept as its decimal rendering.
    Number(String),
    /// Anything else, kept as its rendering. `None` stands for a missing value.
    Unknown(Option<String>),
}

impl Thrown {
    pub fn source<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Thrown::Source(Box::new(error))
    }

    /// An opaque value, rendered through its `Debug` form.
    pub fn unknown(value: impl fmt::Debug) -> Self {
        Thrown::Unknown(Some(format!("{value:?}")))
    }

    /// The absence of a value.
    pub fn null() -> Self {
        Thrown::Unknown(None)
    }

    /// Payload of a caught panic.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let payload = match payload.downcast::<String>() {
            Ok(message) => return Thrown::Text(*message),
            Err(payload) => payload,
        };
        match payload.downcast::<&'static str>() {
            Ok(message) => Thrown::Text((*message).to_string()),
            Err(_) => Thrown::Unknown(Some("opaque panic payload".to_string())),
        }
    }
}

impl From<Error> for Thrown {
    fn from(error: Error) -> Self {
        Thrown::Error(error)
    }
}

impl From<String> for Thrown {
    fn from(message: String) -> Self {
        Thrown::Text(message)
    }
}

impl From<&str> for Thrown {
    fn from(message: &str) -> Self {
        Thrown::Text(message.to_string())
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for Thrown {
    fn from(error: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Thrown::Source(error)
    }
}

impl From<std::io::Error> for Thrown {
    fn from(error: std::io::Error) -> Self {
        Thrown::source(error)
    }
}

impl From<serde_json::Error> for Thrown {
    fn from(error: serde_json::Error) -> Self {
        Thrown::source(error)
    }
}

impl From<reqwest::Error> for Thrown {
    fn from(error: reqwest::Error) -> Self {
        Thrown::source(error)
    }
}

impl From<std::convert::Infallible> for Thrown {
    fn from(never: std::convert::Infallible) -> Self {
        match never {}
    }
}

macro_rules! thrown_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Thrown {
                fn from(value: $ty) -> Self {
                    Thrown::Number(value.to_string())
                }
            }
        )*
    };
}

thrown_from_number!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64);

/// Coerce a thrown value into an [`Error`].
///
/// Errors pass through unchanged, text and numbers become an error with that
/// text, anything else becomes `Unknown error: <rendering>`.
pub fn cast_error(thrown: impl Into<Thrown>) -> Error {
    match thrown.into() {
        Thrown::Error(error) => error,
        Thrown::Source(error) => Error::Source(error),
        Thrown::Text(message) | Thrown::Number(message) => Error::Message { message },
        Thrown::Unknown(rendering) => Error::Message {
            message: format!(
                "Unknown error: {}",
                rendering.as_deref().unwrap_or("null")
            ),
        },
    }
}
