//! The node deserializer chain.
//!
//! Each deserializer looks at the next event and either claims the node,
//! consuming all of its events, or declines without consuming anything.

use ahash::AHashSet;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::trace;

use crate::converter::ValueReader;
use crate::de::deserializer::DeserializerSettings;
use crate::de::value_deserializer::{NestedDeserializer, describe};
use crate::error::Error;
use crate::events::{Ev, EvKind, Events, ScalarStyle};
use crate::options::DuplicateKeyPolicy;
use crate::parse_scalars::{
    infer_plain_scalar, is_null_literal, parse_char, parse_decimal, parse_int, parse_timestamp,
    parse_yaml11_bool, parse_yaml12_bool, parse_yaml12_f32, parse_yaml12_f64,
};
use crate::tags::is_null_tag;
use crate::types::Type;
use crate::value::{EnumValue, Value};

/// One stage of the node deserializer chain.
pub trait NodeDeserializer: Send + Sync {
    /// Deserialize the next node as `expected`, or return `None` without
    /// consuming anything if this deserializer does not handle it.
    fn deserialize(
        &self,
        events: &mut dyn Events,
        expected: &Type,
        settings: &DeserializerSettings,
        nested: &mut dyn NestedDeserializer,
    ) -> Result<Option<Value>, Error>;
}

/// [`ValueReader`] handed to converters and self-describing classes.
struct NestedReader<'a> {
    events: &'a mut dyn Events,
    nested: &'a mut dyn NestedDeserializer,
}

impl ValueReader for NestedReader<'_> {
    fn events(&mut self) -> &mut dyn Events {
        &mut *self.events
    }

    fn deserialize(&mut self, ty: &Type) -> Result<Value, Error> {
        self.nested.deserialize(&mut *self.events, ty)
    }
}

/// Delegates to a registered [`TypeConverter`](crate::TypeConverter) or to the
/// [`YamlConvertible`](crate::YamlConvertible) hook of the expected class.
#[derive(Debug, Default)]
pub struct TypeConverterNodeDeserializer;

impl NodeDeserializer for TypeConverterNodeDeserializer {
    fn deserialize(
        &self,
        events: &mut dyn Events,
        expected: &Type,
        settings: &DeserializerSettings,
        nested: &mut dyn NestedDeserializer,
    ) -> Result<Option<Value>, Error> {
        if let Some(converter) = settings.converters().iter().find(|c| c.accepts(expected)) {
            let mut reader = NestedReader { events, nested };
            return converter.read_yaml(expected, &mut reader).map(Some);
        }

        let Some(hook) = expected.as_class().and_then(|c| c.convertible()).cloned() else {
            return Ok(None);
        };
        let value = settings.object_factory().create(expected)?;
        let Value::Object(obj) = &value else {
            return Err(Error::conversion(describe(&value), expected));
        };
        nested.register(&value);
        let mut reader = NestedReader { events, nested };
        hook.read(obj, &mut reader)?;
        Ok(Some(value))
    }
}

/// Claims scalars tagged `!!null`, and plain null spellings (`~`, `null`,
/// empty) where the expected type can hold null.
#[derive(Debug, Default)]
pub struct NullNodeDeserializer;

impl NodeDeserializer for NullNodeDeserializer {
    fn deserialize(
        &self,
        events: &mut dyn Events,
        expected: &Type,
        _settings: &DeserializerSettings,
        _nested: &mut dyn NestedDeserializer,
    ) -> Result<Option<Value>, Error> {
        let is_null = match events.peek()? {
            Some(Ev::Scalar {
                value, tag, style, ..
            }) => {
                is_null_tag(tag.as_deref())
                    || (tag.is_none()
                        && style == ScalarStyle::Plain
                        && expected.accepts_null()
                        && is_null_literal(&value))
            }
            _ => false,
        };
        if !is_null {
            return Ok(None);
        }
        events.next()?;
        Ok(Some(Value::Null))
    }
}

/// Converts scalar text to the expected primitive, string, enum or date type.
#[derive(Debug, Default)]
pub struct ScalarNodeDeserializer;

impl ScalarNodeDeserializer {
    fn handles(ty: &Type) -> bool {
        matches!(ty.unwrap_nullable(), Type::Any) || ty.is_scalar()
    }

    fn convert(
        text: &str,
        style: ScalarStyle,
        ty: &Type,
        settings: &DeserializerSettings,
    ) -> Result<Value, Error> {
        let options = settings.options();
        let octal = options.legacy_octal_numbers;
        Ok(match ty.unwrap_nullable() {
            Type::Bool => {
                let parsed = if options.strict_booleans {
                    parse_yaml12_bool(text)
                } else {
                    parse_yaml11_bool(text)
                };
                Value::Bool(parsed.ok_or_else(|| Error::conversion(text, "bool"))?)
            }
            Type::I8 => Value::I8(parse_int(text, "i8", octal)?),
            Type::I16 => Value::I16(parse_int(text, "i16", octal)?),
            Type::I32 => Value::I32(parse_int(text, "i32", octal)?),
            Type::I64 => Value::I64(parse_int(text, "i64", octal)?),
            Type::U8 => Value::U8(parse_int(text, "u8", octal)?),
            Type::U16 => Value::U16(parse_int(text, "u16", octal)?),
            Type::U32 => Value::U32(parse_int(text, "u32", octal)?),
            Type::U64 => Value::U64(parse_int(text, "u64", octal)?),
            Type::F32 => Value::F32(parse_yaml12_f32(text)?),
            Type::F64 => Value::F64(parse_yaml12_f64(text)?),
            Type::Decimal => Value::Decimal(parse_decimal(text)?),
            Type::Char => Value::Char(parse_char(text)?),
            Type::String => Value::String(text.to_owned()),
            Type::Bytes => {
                let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
                let bytes = STANDARD
                    .decode(compact.as_bytes())
                    .map_err(|_| Error::conversion(text, "bytes"))?;
                Value::Bytes(bytes)
            }
            Type::Timestamp => Value::Timestamp(parse_timestamp(text)?),
            Type::Enum(e) => Value::Enum(
                EnumValue::named(e, text.trim()).ok_or_else(|| Error::conversion(text, e.name()))?,
            ),
            Type::Any if style == ScalarStyle::Plain && options.attempt_unquoted_inference => {
                infer_plain_scalar(text, octal)
            }
            Type::Any => Value::String(text.to_owned()),
            other => return Err(Error::conversion(text, other)),
        })
    }
}

impl NodeDeserializer for ScalarNodeDeserializer {
    fn deserialize(
        &self,
        events: &mut dyn Events,
        expected: &Type,
        settings: &DeserializerSettings,
        _nested: &mut dyn NestedDeserializer,
    ) -> Result<Option<Value>, Error> {
        if !Self::handles(expected) || !events.accept(EvKind::Scalar)? {
            return Ok(None);
        }
        let Some(Ev::Scalar {
            value,
            style,
            location,
            ..
        }) = events.next()?
        else {
            return Err(Error::unexpected("scalar").with_location(events.last_location()));
        };
        Self::convert(&value, style, expected, settings)
            .map(Some)
            .map_err(|e| e.with_location(location))
    }
}

/// Arrays and lists.
#[derive(Debug, Default)]
pub struct SequenceNodeDeserializer;

impl NodeDeserializer for SequenceNodeDeserializer {
    fn deserialize(
        &self,
        events: &mut dyn Events,
        expected: &Type,
        settings: &DeserializerSettings,
        nested: &mut dyn NestedDeserializer,
    ) -> Result<Option<Value>, Error> {
        let Some(item_type) = expected.item_type() else {
            return Ok(None);
        };
        if !events.accept(EvKind::SeqStart)? {
            return Ok(None);
        }
        events.expect(EvKind::SeqStart)?;

        let value = settings.object_factory().create(expected)?;
        let Value::Sequence(seq) = &value else {
            return Err(Error::conversion(describe(&value), expected));
        };
        nested.register(&value);

        while !events.accept(EvKind::SeqEnd)? {
            let item = nested.deserialize(events, item_type)?;
            seq.push(item);
        }
        events.expect(EvKind::SeqEnd)?;
        trace!("read {} items into {expected}", seq.len());
        Ok(Some(value))
    }
}

/// Maps, with the configured duplicate key policy.
#[derive(Debug, Default)]
pub struct DictionaryNodeDeserializer;

impl NodeDeserializer for DictionaryNodeDeserializer {
    fn deserialize(
        &self,
        events: &mut dyn Events,
        expected: &Type,
        settings: &DeserializerSettings,
        nested: &mut dyn NestedDeserializer,
    ) -> Result<Option<Value>, Error> {
        let Type::Map(key_type, value_type) = expected.unwrap_nullable() else {
            return Ok(None);
        };
        if !events.accept(EvKind::MapStart)? {
            return Ok(None);
        }
        events.expect(EvKind::MapStart)?;

        let value = settings.object_factory().create(expected)?;
        let Value::Mapping(map) = &value else {
            return Err(Error::conversion(describe(&value), expected));
        };
        nested.register(&value);

        let policy = settings.options().duplicate_keys;
        while !events.accept(EvKind::MapEnd)? {
            let key_location = events.peek()?.map(|ev| ev.location()).unwrap_or_default();
            let key = nested.deserialize(events, key_type)?;
            let entry = nested.deserialize(events, value_type)?;
            let duplicate = map.borrow().contains_key(&key);
            match (duplicate, policy) {
                (true, DuplicateKeyPolicy::Error) => {
                    return Err(Error::duplicate_key(&describe(&key)).with_location(key_location));
                }
                (true, DuplicateKeyPolicy::FirstWins) => {}
                _ => {
                    map.borrow_mut().insert(key, entry);
                }
            }
        }
        events.expect(EvKind::MapEnd)?;
        Ok(Some(value))
    }
}

/// Classes: mapping keys are matched to members through the type inspector.
#[derive(Debug, Default)]
pub struct ObjectNodeDeserializer;

impl NodeDeserializer for ObjectNodeDeserializer {
    fn deserialize(
        &self,
        events: &mut dyn Events,
        expected: &Type,
        settings: &DeserializerSettings,
        nested: &mut dyn NestedDeserializer,
    ) -> Result<Option<Value>, Error> {
        if expected.as_class().is_none() || !events.accept(EvKind::MapStart)? {
            return Ok(None);
        }
        let start = events.expect(EvKind::MapStart)?;

        let value = settings
            .object_factory()
            .create(expected)
            .map_err(|e| e.with_location(start.location()))?;
        let Value::Object(obj) = &value else {
            return Err(Error::conversion(describe(&value), expected));
        };
        nested.register(&value);
        settings.object_factory().on_deserializing(obj);

        let options = settings.options();
        let class = obj.class();
        let class_type = Type::Class(class.clone());
        let mut seen: AHashSet<String> = AHashSet::new();

        while !events.accept(EvKind::MapEnd)? {
            let Ev::Scalar {
                value: key,
                location,
                ..
            } = events.expect(EvKind::Scalar)?
            else {
                return Err(Error::unexpected("member name").with_event_location(events));
            };

            let member = settings.type_inspector().member(
                &class_type,
                Some(obj),
                &key,
                options.case_insensitive,
            );
            let Some(member) = member else {
                if options.ignore_unmatched {
                    trace!("skipping unmatched `{key}` on {}", class.name());
                    events.skip_node()?;
                    continue;
                }
                return Err(Error::unmatched_property(&key, class.name()).with_location(location));
            };

            let first = seen.insert(member.member_name().to_owned());
            if !first && options.duplicate_keys == DuplicateKeyPolicy::Error {
                return Err(Error::duplicate_key(&key).with_location(location));
            }

            let member_value = nested.deserialize(events, member.ty())?;
            let keep = first || options.duplicate_keys == DuplicateKeyPolicy::LastWins;
            if keep && member.can_write() {
                member.write(obj, member_value);
            }
        }
        events.expect(EvKind::MapEnd)?;
        settings.object_factory().on_deserialized(obj);
        Ok(Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::de::deserializer::Deserializer;
    use crate::events::EventReplay;
    use crate::error::Location;

    fn scalar(text: &str) -> Ev {
        Ev::Scalar {
            value: text.to_owned(),
            tag: None,
            style: ScalarStyle::Plain,
            anchor: 0,
            location: Location::UNKNOWN,
        }
    }

    #[test]
    fn scalar_declines_collections_without_consuming() {
        let deserializer = Deserializer::default();
        let mut events = EventReplay::new(vec![scalar("5")]);
        let mut nested = deserializer.value_deserializer();
        let claimed = ScalarNodeDeserializer
            .deserialize(
                &mut events,
                &Type::list(Type::I32),
                deserializer.settings(),
                &mut nested,
            )
            .unwrap();
        assert!(claimed.is_none());
        assert!(events.accept(EvKind::Scalar).unwrap());
    }

    #[test]
    fn null_literal_needs_nullable_target() {
        let deserializer = Deserializer::default();
        let mut nested = deserializer.value_deserializer();
        let mut events = EventReplay::new(vec![scalar("~")]);
        let for_int = NullNodeDeserializer
            .deserialize(&mut events, &Type::I32, deserializer.settings(), &mut nested)
            .unwrap();
        assert!(for_int.is_none());
        let for_string = NullNodeDeserializer
            .deserialize(&mut events, &Type::String, deserializer.settings(), &mut nested)
            .unwrap();
        assert_eq!(for_string, Some(Value::Null));
    }

    #[test]
    fn unquoted_inference_for_open_types() {
        let deserializer = Deserializer::default();
        let settings = deserializer.settings();
        let infer = |text: &str, style| {
            ScalarNodeDeserializer::convert(text, style, &Type::Any, settings).unwrap()
        };
        assert_eq!(infer("true", ScalarStyle::Plain), Value::Bool(true));
        assert_eq!(infer("42", ScalarStyle::Plain), Value::I64(42));
        assert_eq!(infer("4.5", ScalarStyle::Plain), Value::F64(4.5));
        assert_eq!(infer("42", ScalarStyle::DoubleQuoted), Value::from("42"));
        assert_eq!(infer("hello", ScalarStyle::Plain), Value::from("hello"));
    }
}
