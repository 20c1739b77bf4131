//! Pluggable per-type conversion.
//!
//! A [`TypeConverter`] takes over both directions for the types it accepts.
//! A [`YamlConvertible`] hook attached to a class does the same for that class
//! only, operating on an instance the object factory already created.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};

use crate::error::Error;
use crate::events::{Ev, Event, Events, ScalarStyle};
use crate::ser_error::Error as SerError;
use crate::tags::TAG_TIMESTAMP;
use crate::types::Type;
use crate::value::{ObjectRef, Value};

/// Read-side access handed to converters.
pub trait ValueReader {
    /// The event source, positioned at the node to read.
    fn events(&mut self) -> &mut dyn Events;
    /// Deserialize one nested node through the full pipeline.
    fn deserialize(&mut self, ty: &Type) -> Result<Value, Error>;
}

/// Write-side access handed to converters.
pub trait ValueWriter {
    /// Emit a raw event.
    fn emit(&mut self, event: Event) -> Result<(), SerError>;
    /// Serialize a nested value through the full pipeline.
    fn serialize(&mut self, value: &Value, ty: &Type) -> Result<(), SerError>;
}

/// Converts values of some types to and from YAML by hand.
pub trait TypeConverter: Send + Sync {
    fn accepts(&self, ty: &Type) -> bool;
    fn read_yaml(&self, ty: &Type, reader: &mut dyn ValueReader) -> Result<Value, Error>;
    fn write_yaml(
        &self,
        value: &Value,
        ty: &Type,
        writer: &mut dyn ValueWriter,
    ) -> Result<(), SerError>;
}

/// Self-describing class: reads and writes its own representation.
pub trait YamlConvertible: Send + Sync {
    fn read(&self, target: &ObjectRef, reader: &mut dyn ValueReader) -> Result<(), Error>;
    fn write(&self, source: &ObjectRef, writer: &mut dyn ValueWriter) -> Result<(), SerError>;
}

/// Timestamps in custom chrono formats.
///
/// The first format is used for writing; all are tried in order when reading.
/// Formats without an offset are interpreted as UTC.
pub struct DateTimeConverter {
    formats: Vec<String>,
}

impl DateTimeConverter {
    pub fn new<I, S>(formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            formats: formats.into_iter().map(Into::into).collect(),
        }
    }

    fn parse(&self, text: &str) -> Option<DateTime<chrono::FixedOffset>> {
        self.formats.iter().find_map(|fmt| {
            DateTime::parse_from_str(text, fmt).ok().or_else(|| {
                NaiveDateTime::parse_from_str(text, fmt)
                    .ok()
                    .map(|naive| Utc.from_utc_datetime(&naive).fixed_offset())
            })
        })
    }
}

impl Default for DateTimeConverter {
    fn default() -> Self {
        Self::new(["%Y-%m-%dT%H:%M:%S%.f%:z"])
    }
}

impl TypeConverter for DateTimeConverter {
    fn accepts(&self, ty: &Type) -> bool {
        matches!(ty.unwrap_nullable(), Type::Timestamp)
    }

    fn read_yaml(&self, _ty: &Type, reader: &mut dyn ValueReader) -> Result<Value, Error> {
        let events = reader.events();
        match events.next()? {
            Some(Ev::Scalar { value, location, .. }) => self
                .parse(&value)
                .map(Value::Timestamp)
                .ok_or_else(|| Error::conversion(&value, "timestamp").with_location(location)),
            Some(other) => Err(Error::unexpected("timestamp scalar").with_location(other.location())),
            None => Err(Error::eof().with_location(events.last_location())),
        }
    }

    fn write_yaml(
        &self,
        value: &Value,
        _ty: &Type,
        writer: &mut dyn ValueWriter,
    ) -> Result<(), SerError> {
        let Value::Timestamp(ts) = value else {
            return writer.serialize(value, &value.runtime_type());
        };
        let text = match self.formats.first() {
            Some(fmt) => ts.format(fmt).to_string(),
            None => ts.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        };
        writer.emit(Event::Scalar {
            anchor: None,
            tag: Some(TAG_TIMESTAMP.to_owned()),
            value: text,
            style: ScalarStyle::Any,
            plain_implicit: true,
            quoted_implicit: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_every_configured_format() {
        let conv = DateTimeConverter::new(["%d/%m/%Y %H:%M", "%Y-%m-%d %H:%M:%S %z"]);
        let a = conv.parse("14/12/2001 21:59").unwrap();
        assert_eq!(a.to_rfc3339(), "2001-12-14T21:59:00+00:00");
        let b = conv.parse("2001-12-14 21:59:00 +0200").unwrap();
        assert_eq!(b.offset().local_minus_utc(), 7200);
        assert!(conv.parse("tomorrow").is_none());
    }

    #[test]
    fn accepts_nullable_timestamps() {
        let conv = DateTimeConverter::default();
        assert!(conv.accepts(&Type::nullable(Type::Timestamp)));
        assert!(!conv.accepts(&Type::String));
    }
}
