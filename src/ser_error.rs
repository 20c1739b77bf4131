use std::{fmt, io};

/// Error type used by the object graph serializer.
///
/// This type is re-exported as `saphyr_graph::ser::Error` and is returned by
/// the public serialization APIs (for example `saphyr_graph::to_string`).
///
/// Variants wrapping concrete failures:
/// - `Format` wraps a `std::fmt::Error` produced when writing to a
///   `fmt::Write` target.
/// - `IO` wraps a `std::io::Error` produced when writing to an `io::Write`
///   target.
/// - `Unexpected` is used internally for invariant violations of the event
///   stream (e.g., a mapping end without a start).
#[derive(Debug)]
pub enum Error {
    /// Free-form error, also produced by user type converters.
    Message { msg: String },
    /// Wrapper for formatting errors.
    Format { error: fmt::Error },
    /// Wrapper for I/O errors.
    IO { error: io::Error },
    /// Malformed event sequence handed to an emitter.
    Unexpected { msg: String },
    /// Options used would produce invalid YAML (0 indentation, etc)
    InvalidOptions(String),
    /// The object graph is nested deeper than `max_recursion`.
    RecursionLimitExceeded { limit: usize },
    /// Roundtrip mode was requested for a type that cannot be instantiated back.
    MissingDefaultConstructor { type_name: String },
    /// JSON output has no concept of aliases.
    AliasInJson { anchor: String },
    /// Value shape not supported by the traversal.
    Unsupported { type_name: String },
}

impl serde::ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Message {
            msg: msg.to_string(),
        }
    }
}

impl From<fmt::Error> for Error {
    fn from(error: fmt::Error) -> Self {
        Error::Format { error }
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::IO { error }
    }
}

impl From<String> for Error {
    fn from(message: String) -> Self {
        Error::Message { msg: message }
    }
}

impl From<&str> for Error {
    fn from(message: &str) -> Self {
        Error::Message {
            msg: message.to_string(),
        }
    }
}

impl Error {
    #[cold]
    #[inline(never)]
    pub(crate) fn unexpected(message: &str) -> Self {
        Error::Unexpected {
            msg: message.to_string(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Message { msg } => f.write_str(msg),
            Error::Format { error } => write!(f, "formatting error: {error}"),
            Error::IO { error } => write!(f, "I/O error: {error}"),
            Error::Unexpected { msg } => write!(f, "malformed event stream: {msg}"),
            Error::InvalidOptions(msg) => write!(f, "invalid serialization options: {msg}"),
            Error::RecursionLimitExceeded { limit } => {
                write!(f, "too much recursion: object graph deeper than {limit} levels")
            }
            Error::MissingDefaultConstructor { type_name } => write!(
                f,
                "type `{type_name}` has no default constructor and no converter, it cannot be serialized in roundtrip mode"
            ),
            Error::AliasInJson { anchor } => write!(
                f,
                "alias `{anchor}` cannot be represented in JSON, disable aliases or remove shared references"
            ),
            Error::Unsupported { type_name } => {
                write!(f, "values of type `{type_name}` cannot be serialized")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Format { error } => Some(error),
            Error::IO { error } => Some(error),
            _ => None,
        }
    }
}
