//! Defines the deserialization error and its location
use std::fmt;

#[cfg(feature = "deserialize")]
use saphyr_parser::{ScanError, Span};
use serde::de;

use crate::events::Events;

/// Row/column location within the source YAML document (1-indexed).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Location {
    /// 1-indexed row number in the input stream.
    pub(crate) row: u32,
    /// 1-indexed column number in the input stream.
    pub(crate) column: u32,
}

impl Location {
    /// Sentinel value meaning "location unknown".
    ///
    /// Used when a precise position is not yet available at error creation time.
    pub const UNKNOWN: Self = Self { row: 0, column: 0 };

    /// Create a new location record from 1-indexed coordinates.
    pub const fn new(row: usize, column: usize) -> Self {
        // Error reporting only, a document with more than 4G lines is not a concern.
        Self {
            row: row as u32,
            column: column as u32,
        }
    }

    /// 1-indexed line number.
    pub fn line(&self) -> u64 {
        self.row as u64
    }

    /// 1-indexed column number.
    pub fn column(&self) -> u64 {
        self.column as u64
    }
}

/// Convert a `saphyr_parser::Span` to a 1-indexed `Location`.
///
/// Called by:
/// - The live events adapter for each raw parser event.
#[cfg(feature = "deserialize")]
pub(crate) fn location_from_span(span: &Span) -> Location {
    let start = &span.start;
    Location::new(start.line(), start.col() + 1)
}

/// Name of the alias written at character offset `index` of `input`.
#[cfg(feature = "deserialize")]
fn alias_name_at(input: &str, index: usize) -> Option<String> {
    let mut chars = input.chars().skip(index);
    if chars.next() != Some('*') {
        return None;
    }
    let name: String = chars
        .take_while(|c| !c.is_whitespace() && !matches!(c, ',' | '[' | ']' | '{' | '}'))
        .collect();
    (!name.is_empty()).then_some(name)
}

/// Error returned while reading an object graph from YAML.
#[derive(Debug)]
pub enum Error {
    /// Free-form error with optional source location.
    Message { msg: String, location: Location },
    /// Unexpected end of input.
    Eof { location: Location },
    /// Structural mismatch: something else than the expected event was seen.
    Unexpected {
        expected: &'static str,
        location: Location,
    },
    /// Alias references an anchor that has not been defined (yet).
    ///
    /// Aliases rejected by the parser itself have no id (`anchor` is 0) but
    /// carry the anchor name.
    UnknownAnchor {
        anchor: usize,
        name: Option<String>,
        location: Location,
    },
    /// A node carries a tag that maps to no known type while strict tags are enabled.
    UnknownTag { tag: String, location: Location },
    /// Mapping key has no matching member on the target class.
    UnmatchedProperty {
        name: String,
        type_name: String,
        location: Location,
    },
    /// The same key appears twice in one mapping.
    DuplicateKey { key: String, location: Location },
    /// Scalar text or aliased value cannot be converted to the expected type.
    Conversion {
        value: String,
        target: String,
        location: Location,
    },
    /// No node deserializer claimed the node.
    NoDeserializer { type_name: String, location: Location },
    /// Nesting exceeded the configured maximum depth.
    RecursionLimitExceeded { limit: usize, location: Location },
    /// Class cannot be instantiated by the object factory.
    MissingDefaultConstructor { type_name: String, location: Location },
    /// Unexpected I/O error. This may happen only when deserializing from a reader.
    IOError { cause: std::io::Error },
}

impl Error {
    /// Construct a `Message` error with no known location.
    pub(crate) fn msg<S: Into<String>>(s: S) -> Self {
        Error::Message {
            msg: s.into(),
            location: Location::UNKNOWN,
        }
    }

    /// Convenience for an `Unexpected` error pre-filled with a human phrase.
    ///
    /// Arguments:
    /// - `what`: short description like "sequence start".
    pub(crate) fn unexpected(what: &'static str) -> Self {
        Error::Unexpected {
            expected: what,
            location: Location::UNKNOWN,
        }
    }

    /// Construct an unexpected end-of-input error with unknown location.
    pub(crate) fn eof() -> Self {
        Error::Eof {
            location: Location::UNKNOWN,
        }
    }

    pub(crate) fn unknown_anchor(anchor: usize) -> Self {
        Error::UnknownAnchor {
            anchor,
            name: None,
            location: Location::UNKNOWN,
        }
    }

    pub(crate) fn unknown_tag(tag: &str) -> Self {
        Error::UnknownTag {
            tag: tag.to_owned(),
            location: Location::UNKNOWN,
        }
    }

    pub(crate) fn unmatched_property(name: &str, type_name: &str) -> Self {
        Error::UnmatchedProperty {
            name: name.to_owned(),
            type_name: type_name.to_owned(),
            location: Location::UNKNOWN,
        }
    }

    pub(crate) fn duplicate_key(key: &str) -> Self {
        Error::DuplicateKey {
            key: key.to_owned(),
            location: Location::UNKNOWN,
        }
    }

    pub(crate) fn conversion<V: fmt::Display, T: fmt::Display>(value: V, target: T) -> Self {
        Error::Conversion {
            value: value.to_string(),
            target: target.to_string(),
            location: Location::UNKNOWN,
        }
    }

    pub(crate) fn no_deserializer(type_name: &str) -> Self {
        Error::NoDeserializer {
            type_name: type_name.to_owned(),
            location: Location::UNKNOWN,
        }
    }

    pub(crate) fn recursion_limit(limit: usize) -> Self {
        Error::RecursionLimitExceeded {
            limit,
            location: Location::UNKNOWN,
        }
    }

    pub(crate) fn missing_default_constructor(type_name: &str) -> Self {
        Error::MissingDefaultConstructor {
            type_name: type_name.to_owned(),
            location: Location::UNKNOWN,
        }
    }

    /// Attach a concrete location to this error unless it already carries one.
    ///
    /// Errors created deep inside a nested call keep the position they were
    /// raised at; outer frames only fill the gap.
    pub(crate) fn with_location(mut self, set_location: Location) -> Self {
        if let Some(location) = self.location_mut() {
            if *location == Location::UNKNOWN {
                *location = set_location;
            }
        }
        self
    }

    /// Attach the location of the last event pulled from `events`.
    pub(crate) fn with_event_location(self, events: &dyn Events) -> Self {
        self.with_location(events.last_location())
    }

    fn location_mut(&mut self) -> Option<&mut Location> {
        match self {
            Error::Message { location, .. }
            | Error::Eof { location }
            | Error::Unexpected { location, .. }
            | Error::UnknownAnchor { location, .. }
            | Error::UnknownTag { location, .. }
            | Error::UnmatchedProperty { location, .. }
            | Error::DuplicateKey { location, .. }
            | Error::Conversion { location, .. }
            | Error::NoDeserializer { location, .. }
            | Error::RecursionLimitExceeded { location, .. }
            | Error::MissingDefaultConstructor { location, .. } => Some(location),
            Error::IOError { .. } => None, // this error does not support location
        }
    }

    /// If the error has a known location, return it.
    pub fn location(&self) -> Option<Location> {
        match self {
            Error::Message { location, .. }
            | Error::Eof { location }
            | Error::Unexpected { location, .. }
            | Error::UnknownAnchor { location, .. }
            | Error::UnknownTag { location, .. }
            | Error::UnmatchedProperty { location, .. }
            | Error::DuplicateKey { location, .. }
            | Error::Conversion { location, .. }
            | Error::NoDeserializer { location, .. }
            | Error::RecursionLimitExceeded { location, .. }
            | Error::MissingDefaultConstructor { location, .. } => {
                if location != &Location::UNKNOWN {
                    Some(*location)
                } else {
                    None
                }
            }
            Error::IOError { .. } => None,
        }
    }

    /// Map a `saphyr_parser::ScanError` into our error type with location.
    ///
    /// `input` is the parsed text, used to recover the name of an undefined
    /// anchor from the alias position.
    #[cfg(feature = "deserialize")]
    pub(crate) fn from_scan_error(err: ScanError, input: &str) -> Self {
        let mark = err.marker();
        let location = Location::new(mark.line(), mark.col() + 1);
        if err.info().ends_with("found unknown anchor") {
            return Error::UnknownAnchor {
                anchor: 0,
                name: alias_name_at(input, mark.index()),
                location,
            };
        }
        Error::Message {
            msg: err.info().to_owned(),
            location,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Message { msg, location } => fmt_with_location(f, msg, location),
            Error::Eof { location } => fmt_with_location(f, "unexpected end of input", location),
            Error::Unexpected { expected, location } => {
                fmt_with_location(f, &format!("unexpected event: expected {expected}"), location)
            }
            Error::UnknownAnchor {
                name: Some(name),
                location,
                ..
            } => fmt_with_location(
                f,
                &format!("alias references unknown anchor `{name}`"),
                location,
            ),
            Error::UnknownAnchor {
                anchor, location, ..
            } => fmt_with_location(
                f,
                &format!("alias references unresolved anchor id {anchor}"),
                location,
            ),
            Error::UnknownTag { tag, location } => {
                fmt_with_location(f, &format!("unknown tag `{tag}`"), location)
            }
            Error::UnmatchedProperty {
                name,
                type_name,
                location,
            } => fmt_with_location(
                f,
                &format!("property `{name}` not found on type `{type_name}`"),
                location,
            ),
            Error::DuplicateKey { key, location } => {
                fmt_with_location(f, &format!("duplicate mapping key: {key}"), location)
            }
            Error::Conversion {
                value,
                target,
                location,
            } => fmt_with_location(
                f,
                &format!("cannot convert `{value}` to `{target}`"),
                location,
            ),
            Error::NoDeserializer {
                type_name,
                location,
            } => fmt_with_location(
                f,
                &format!("no node deserializer was able to deserialize the node into `{type_name}`"),
                location,
            ),
            Error::RecursionLimitExceeded { limit, location } => fmt_with_location(
                f,
                &format!("maximum nesting depth of {limit} exceeded"),
                location,
            ),
            Error::MissingDefaultConstructor {
                type_name,
                location,
            } => fmt_with_location(
                f,
                &format!("type `{type_name}` cannot be instantiated (no default constructor)"),
                location,
            ),
            Error::IOError { cause } => write!(f, "IO error: {cause}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IOError { cause } => Some(cause),
            _ => None,
        }
    }
}

impl de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::msg(msg.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(cause: std::io::Error) -> Self {
        Error::IOError { cause }
    }
}

/// Print a message optionally suffixed with "at line X, column Y".
fn fmt_with_location(f: &mut fmt::Formatter<'_>, msg: &str, location: &Location) -> fmt::Result {
    if location != &Location::UNKNOWN {
        write!(
            f,
            "{msg} at line {}, column {}",
            location.row, location.column
        )
    } else {
        write!(f, "{msg}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_is_appended_once_known() {
        let err = Error::duplicate_key("a").with_location(Location::new(3, 5));
        assert_eq!(err.to_string(), "duplicate mapping key: a at line 3, column 5");
        assert_eq!(err.location(), Some(Location::new(3, 5)));
    }

    #[test]
    fn inner_location_wins_over_outer() {
        let err = Error::msg("bad")
            .with_location(Location::new(2, 1))
            .with_location(Location::new(9, 9));
        assert_eq!(err.location(), Some(Location::new(2, 1)));
    }

    #[test]
    fn alias_name_is_read_back_from_input() {
        assert_eq!(alias_name_at("a: *node\n", 3).as_deref(), Some("node"));
        assert_eq!(alias_name_at("[*x, 1]", 1).as_deref(), Some("x"));
        assert_eq!(alias_name_at("a: b", 3), None);
    }

    #[test]
    fn unknown_location_is_not_reported() {
        let err = Error::eof();
        assert_eq!(err.location(), None);
        assert_eq!(err.to_string(), "unexpected end of input");
    }
}
