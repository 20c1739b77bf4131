//! Alias resolution and per-node dispatch.

use std::sync::Arc;

use ahash::AHashMap;
use log::trace;
use rust_decimal::Decimal;
use smallvec::SmallVec;

use crate::de::deserializer::DeserializerSettings;
use crate::error::Error;
use crate::events::{Ev, Events};
use crate::types::Type;
use crate::value::{EnumValue, Value};

/// Entry point node deserializers use to read child nodes.
pub trait NestedDeserializer {
    /// Deserialize the next node (or alias) as `ty`.
    fn deserialize(&mut self, events: &mut dyn Events, ty: &Type) -> Result<Value, Error>;

    /// Make `value` the target of the anchor of the node being deserialized.
    ///
    /// Containers call this right after allocating themselves, before reading
    /// any child, so aliases inside the container resolve to it. Calling it
    /// again for the same node has no effect.
    fn register(&mut self, value: &Value);
}

/// Anchor of a node whose deserialization is in progress.
#[derive(Clone, Copy, Debug)]
struct AnchorFrame {
    anchor: usize,
    registered: bool,
}

/// Per-call deserialization state: the anchor table and the nesting depth.
pub(crate) struct ValueDeserializer {
    settings: Arc<DeserializerSettings>,
    anchors: AHashMap<usize, Value>,
    frames: SmallVec<[AnchorFrame; 16]>,
    depth: usize,
}

impl ValueDeserializer {
    pub(crate) fn new(settings: Arc<DeserializerSettings>) -> Self {
        Self {
            settings,
            anchors: AHashMap::new(),
            frames: SmallVec::new(),
            depth: 0,
        }
    }

    /// Anchors are scoped to one document.
    pub(crate) fn reset(&mut self) {
        self.anchors.clear();
        self.frames.clear();
        self.depth = 0;
    }

    fn resolve_alias(&self, id: usize, ty: &Type) -> Result<Value, Error> {
        let value = self
            .anchors
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::unknown_anchor(id))?;
        coerce(value, ty)
    }

    fn deserialize_node(
        &mut self,
        events: &mut dyn Events,
        ty: &Type,
        node: &Ev,
    ) -> Result<Value, Error> {
        let settings = self.settings.clone();

        let mut node_type = ty.clone();
        for resolver in settings.type_resolvers() {
            if resolver.resolve(node, &mut node_type, &settings)? {
                break;
            }
        }
        trace!("{} as {node_type}", node.kind().describe());

        for deserializer in settings.node_deserializers() {
            if let Some(value) = deserializer.deserialize(events, &node_type, &settings, self)? {
                return coerce(value, ty);
            }
        }
        Err(Error::no_deserializer(&node_type.name()))
    }
}

impl NestedDeserializer for ValueDeserializer {
    fn deserialize(&mut self, events: &mut dyn Events, ty: &Type) -> Result<Value, Error> {
        let node = events
            .peek()?
            .ok_or_else(|| Error::eof().with_location(events.last_location()))?;
        let location = node.location();

        if let Ev::Alias { id, .. } = node {
            events.next()?;
            return self
                .resolve_alias(id, ty)
                .map_err(|e| e.with_location(location));
        }

        let limit = self.settings.options().max_depth;
        if self.depth >= limit {
            return Err(Error::recursion_limit(limit).with_location(location));
        }

        self.depth += 1;
        self.frames.push(AnchorFrame {
            anchor: node.anchor(),
            registered: false,
        });
        let result = self.deserialize_node(events, ty, &node);
        let frame = self.frames.pop();
        self.depth -= 1;

        let value = result.map_err(|e| e.with_location(location))?;
        if let Some(frame) = frame {
            if frame.anchor != 0 && !frame.registered {
                self.anchors.insert(frame.anchor, value.clone());
            }
        }
        Ok(value)
    }

    fn register(&mut self, value: &Value) {
        if let Some(frame) = self.frames.last_mut() {
            if frame.anchor != 0 && !frame.registered {
                frame.registered = true;
                self.anchors.insert(frame.anchor, value.clone());
            }
        }
    }
}

/// Fit `value` into `expected`.
///
/// Values already assignable pass unchanged, keeping their identity. Numbers
/// are converted between widths with range checks, strings to enums and
/// chars, and scalars to their text. Anything else is a conversion error.
pub fn coerce(value: Value, expected: &Type) -> Result<Value, Error> {
    if expected.accepts_value(&value) {
        return Ok(value);
    }
    let target = expected.unwrap_nullable();
    let converted = match (&value, target) {
        (Value::Null, _) => None,
        (v, t) if t.is_integer() => v.as_i128().and_then(|i| narrow(i, t)),
        (Value::Decimal(d), Type::F64) => d.to_string().parse().ok().map(Value::F64),
        (Value::Decimal(d), Type::F32) => d.to_string().parse().ok().map(Value::F32),
        (v, Type::F64) => v.as_f64().map(Value::F64),
        (v, Type::F32) => v.as_f64().map(|f| Value::F32(f as f32)),
        (v, Type::Decimal) => to_decimal(v).map(Value::Decimal),
        (Value::String(s), Type::Enum(e)) => EnumValue::named(e, s).map(Value::Enum),
        (Value::String(s), Type::Char) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(Value::Char(c)),
                _ => None,
            }
        }
        (v, Type::String) => scalar_string(v).map(Value::String),
        _ => None,
    };
    converted.ok_or_else(|| Error::conversion(describe(&value), target))
}

fn narrow(i: i128, ty: &Type) -> Option<Value> {
    Some(match ty {
        Type::I8 => Value::I8(i.try_into().ok()?),
        Type::I16 => Value::I16(i.try_into().ok()?),
        Type::I32 => Value::I32(i.try_into().ok()?),
        Type::I64 => Value::I64(i.try_into().ok()?),
        Type::U8 => Value::U8(i.try_into().ok()?),
        Type::U16 => Value::U16(i.try_into().ok()?),
        Type::U32 => Value::U32(i.try_into().ok()?),
        Type::U64 => Value::U64(i.try_into().ok()?),
        _ => return None,
    })
}

fn to_decimal(value: &Value) -> Option<Decimal> {
    match value.as_i128() {
        Some(i) => Decimal::try_from_i128_with_scale(i, 0).ok(),
        None => value.as_f64().and_then(|f| Decimal::try_from(f).ok()),
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::Bool(b) => Some(b.to_string()),
        Value::F32(f) => Some(f.to_string()),
        Value::F64(f) => Some(f.to_string()),
        Value::Decimal(d) => Some(d.to_string()),
        Value::Char(c) => Some(c.to_string()),
        Value::Enum(e) => Some(e.name().to_owned()),
        Value::Timestamp(t) => Some(t.to_rfc3339()),
        other => other.as_i128().map(|i| i.to_string()),
    }
}

/// Short text for error messages.
pub(crate) fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => scalar_string(other).unwrap_or_else(|| format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EnumType;
    use crate::value::SeqRef;

    #[test]
    fn widths_are_range_checked() {
        assert_eq!(coerce(Value::I64(7), &Type::U8).unwrap(), Value::U8(7));
        assert!(coerce(Value::I64(300), &Type::U8).is_err());
        assert_eq!(
            coerce(Value::I64(7), &Type::nullable(Type::I32)).unwrap(),
            Value::I32(7)
        );
    }

    #[test]
    fn assignable_values_keep_identity() {
        let seq = Value::Sequence(SeqRef::new(Type::list(Type::I32)));
        let same = coerce(seq.clone(), &Type::Any).unwrap();
        assert!(same.same_instance(&seq));
    }

    #[test]
    fn strings_become_enums_and_chars() {
        let color = EnumType::new("paint.Color", &["Red", "Green"]);
        let v = coerce(Value::from("green"), &Type::Enum(color)).unwrap();
        assert!(matches!(v, Value::Enum(e) if e.name() == "Green"));
        assert_eq!(coerce(Value::from("x"), &Type::Char).unwrap(), Value::Char('x'));
        assert!(coerce(Value::from("xy"), &Type::Char).is_err());
    }

    #[test]
    fn null_into_value_type_fails() {
        let err = coerce(Value::Null, &Type::I32).unwrap_err();
        assert!(matches!(err, Error::Conversion { .. }));
    }
}
