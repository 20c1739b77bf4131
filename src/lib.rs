//! YAML object graph serialization.
//!
//! Converts between YAML event streams and in-memory object graphs described
//! by [`Type`] and [`Value`]. Shared and cyclic references become anchors and
//! aliases, polymorphic members become tags, and any type can take over its
//! own conversion through a [`TypeConverter`].
//!
//! ```rust
//! use saphyr_graph::{ClassType, Type, from_str, to_string};
//!
//! let point = ClassType::builder("geo.Point")
//!     .field("x", Type::I32)
//!     .field("y", Type::I32)
//!     .build();
//! let ty = Type::Class(point);
//!
//! let value = from_str("x: 1\ny: 2\n", &ty).unwrap();
//! assert_eq!(to_string(&value, &ty).unwrap(), "x: 1\ny: 2\n");
//! ```

use std::{fmt, io};

pub use component_list::{Position, UnknownComponent};
pub use converter::{DateTimeConverter, TypeConverter, ValueReader, ValueWriter, YamlConvertible};
pub use descriptor::ValueDescriptor;
pub use error::{Error, Location};
pub use events::{
    CollectionStyle, Emitter, Ev, EvKind, Event, EventRecorder, EventReplay, Events, ScalarStyle,
};
pub use factory::{DefaultObjectFactory, ObjectFactory};
pub use inspector::{
    CachedTypeInspector, MemberDescriptor, ReadableMembersInspector, TypeInspector,
    WritableMembersInspector,
};
pub use options::Options;
pub use resolver::{DynamicTypeResolver, StaticTypeResolver, TypeResolver};
pub use serializer_options::{DefaultValuesHandling, SerializerOptions, TypeResolution};
pub use tags::TagMappings;
pub use types::{ClassType, ClassTypeBuilder, EnumType, MemberDef, Type};
pub use value::{EnumValue, MapRef, ObjectRef, SeqRef, Value};

#[cfg(feature = "deserialize")]
pub use de::{Deserializer, DeserializerBuilder};
#[cfg(feature = "deserialize")]
pub use live_events::LiveEvents;
#[cfg(feature = "serialize")]
pub use ser::{Serializer, SerializerBuilder, YamlWriter};

mod component_list;
mod converter;
mod descriptor;
mod error;
mod events;
mod factory;
mod inspector;
mod macros;
pub mod options;
mod parse_scalars;
mod resolver;
mod ser_error;
mod serializer_options;
pub mod tags;
mod types;
mod value;

#[cfg(feature = "deserialize")]
pub mod de;
#[cfg(feature = "deserialize")]
mod live_events;

#[cfg(feature = "serialize")]
pub mod ser;
#[cfg(feature = "serialize")]
mod ser_quoting;

/// Serialize `value`, declared as `ty`, into a YAML string.
///
/// Example: an object referenced twice is written once and aliased.
///
/// ```rust
/// use saphyr_graph::{SeqRef, Type, Value};
///
/// let shared = Value::Sequence(SeqRef::with_items(
///     Type::list(Type::I32),
///     vec![1i32.into(), 2i32.into()],
/// ));
/// let outer = SeqRef::with_items(Type::list(Type::Any), vec![shared.clone(), shared]);
///
/// let yaml = saphyr_graph::to_string(&Value::Sequence(outer), &Type::list(Type::Any)).unwrap();
/// assert_eq!(yaml, "- &o0\n  - 1\n  - 2\n- *o0\n");
/// ```
#[cfg(feature = "serialize")]
pub fn to_string(value: &Value, ty: &Type) -> Result<String, ser::Error> {
    Serializer::default().serialize_to_string(value, ty)
}

/// Serialize into a YAML string with configurable [`SerializerOptions`].
///
/// ```rust
/// use saphyr_graph::{Type, Value};
///
/// let options = saphyr_graph::serializer_options! { json: true };
/// let yaml = saphyr_graph::to_string_with_options(&Value::from("on"), &Type::String, options)
///     .unwrap();
/// assert_eq!(yaml, "\"on\"\n");
/// ```
#[cfg(feature = "serialize")]
pub fn to_string_with_options(
    value: &Value,
    ty: &Type,
    options: SerializerOptions,
) -> Result<String, ser::Error> {
    Serializer::builder()
        .with_options(options)
        .build()?
        .serialize_to_string(value, ty)
}

/// Serialize into any `fmt::Write` target.
#[cfg(feature = "serialize")]
pub fn to_fmt_writer<W: fmt::Write>(out: &mut W, value: &Value, ty: &Type) -> Result<(), ser::Error> {
    let yaml = to_string(value, ty)?;
    out.write_str(&yaml)?;
    Ok(())
}

/// Serialize into any `io::Write` target. The output is UTF-8.
#[cfg(feature = "serialize")]
pub fn to_io_writer<W: io::Write>(out: &mut W, value: &Value, ty: &Type) -> Result<(), ser::Error> {
    let yaml = to_string(value, ty)?;
    out.write_all(yaml.as_bytes())?;
    Ok(())
}

/// Serialize into the primitive events an emitter would receive.
///
/// The result can be replayed into the deserializer without going through text:
///
/// ```rust
/// use saphyr_graph::{EventRecorder, SerializerOptions, Type, Value};
///
/// let events = saphyr_graph::to_events(&Value::I32(5), &Type::I32, SerializerOptions::default())
///     .unwrap();
/// let mut recorder = EventRecorder::new();
/// for event in events {
///     saphyr_graph::Emitter::emit(&mut recorder, event).unwrap();
/// }
/// let mut replay = recorder.into_replay();
/// let back = saphyr_graph::Deserializer::default().deserialize(&mut replay, &Type::I32).unwrap();
/// assert_eq!(back, Value::I32(5));
/// ```
#[cfg(feature = "serialize")]
pub fn to_events(
    value: &Value,
    ty: &Type,
    options: SerializerOptions,
) -> Result<Vec<Event>, ser::Error> {
    let serializer = Serializer::builder().with_options(options).build()?;
    let mut recorder = EventRecorder::new();
    serializer.serialize(&mut recorder, value, ty)?;
    Ok(recorder.into_events())
}

/// Deserialize a single YAML document as `ty`.
///
/// If the input contains multiple documents, this returns an error advising
/// to use [`from_multiple`].
///
/// ```rust
/// use saphyr_graph::{Type, Value};
///
/// let yaml = "
///     name: My Application
///     retries: 5
/// ";
/// let value = saphyr_graph::from_str(yaml, &Type::map(Type::String, Type::Any)).unwrap();
/// let map = value.as_mapping().unwrap();
/// assert_eq!(map.get("retries"), Some(Value::I64(5)));
/// ```
#[cfg(feature = "deserialize")]
pub fn from_str(input: &str, ty: &Type) -> Result<Value, Error> {
    from_str_with_options(input, ty, Options::default())
}

/// Deserialize a single YAML document with configurable [`Options`].
#[cfg(feature = "deserialize")]
pub fn from_str_with_options(input: &str, ty: &Type, options: Options) -> Result<Value, Error> {
    Deserializer::builder()
        .with_options(options)
        .build()?
        .deserialize_str(input, ty)
}

/// Deserialize every document of a multi-document stream.
///
/// ```rust
/// use saphyr_graph::{Type, Value};
///
/// let values = saphyr_graph::from_multiple("--- 1\n--- 2\n", &Type::I32).unwrap();
/// assert_eq!(values, [Value::I32(1), Value::I32(2)]);
/// ```
#[cfg(feature = "deserialize")]
pub fn from_multiple(input: &str, ty: &Type) -> Result<Vec<Value>, Error> {
    let mut events = LiveEvents::new(input);
    Deserializer::default().deserialize_all(&mut events, ty)
}

/// Deserialize from UTF-8 bytes.
#[cfg(feature = "deserialize")]
pub fn from_slice(bytes: &[u8], ty: &Type) -> Result<Value, Error> {
    let input = std::str::from_utf8(bytes).map_err(|e| Error::msg(format!("invalid UTF-8: {e}")))?;
    from_str(input, ty)
}

/// Deserialize from a reader. A byte order mark selects UTF-16 decoding,
/// anything else is read as UTF-8.
#[cfg(feature = "deserialize")]
pub fn from_reader<R: io::Read>(reader: R, ty: &Type) -> Result<Value, Error> {
    use io::Read as _;

    let mut decoded = encoding_rs_io::DecodeReaderBytesBuilder::new()
        .encoding(None)
        .build(reader);
    let mut input = String::new();
    decoded.read_to_string(&mut input)?;
    from_str(&input, ty)
}

/// Deserialize a recorded event list.
#[cfg(feature = "deserialize")]
pub fn from_events(events: Vec<Ev>, ty: &Type) -> Result<Value, Error> {
    Deserializer::default().deserialize(&mut EventReplay::new(events), ty)
}
