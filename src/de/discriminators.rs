//! Choosing the concrete type of a mapping from its own keys and values.
//!
//! The mapping is buffered first, so a discriminator may look at any entry,
//! then replayed into the regular node deserializers with the chosen type.

use std::sync::Arc;

use ahash::AHashMap;
use log::trace;

use crate::de::deserializer::DeserializerSettings;
use crate::de::node_deserializers::NodeDeserializer;
use crate::de::value_deserializer::NestedDeserializer;
use crate::error::Error;
use crate::events::{Ev, EvKind, EventReplay, Events};
use crate::types::Type;
use crate::value::Value;

/// Picks a concrete type for mappings read as (a subtype of) [`base_type`](Self::base_type).
pub trait TypeDiscriminator: Send + Sync {
    fn base_type(&self) -> &Type;

    /// `mapping` holds every event of the node, from `MapStart` to `MapEnd`.
    fn discriminate(&self, mapping: &[Ev]) -> Option<Type>;
}

fn check_targets<'a>(
    base: &Type,
    targets: impl IntoIterator<Item = &'a Type>,
) -> Result<(), Error> {
    for target in targets {
        if !base.is_assignable_from(target) {
            return Err(Error::msg(format!(
                "discriminated type `{target}` is not assignable to `{base}`"
            )));
        }
    }
    Ok(())
}

/// Index one past the node starting at `start`.
fn node_end(events: &[Ev], start: usize) -> usize {
    let mut depth = 0usize;
    let mut i = start;
    while i < events.len() {
        match events[i].kind() {
            EvKind::MapStart | EvKind::SeqStart => depth += 1,
            EvKind::MapEnd | EvKind::SeqEnd => depth = depth.saturating_sub(1),
            _ => {}
        }
        i += 1;
        if depth == 0 {
            break;
        }
    }
    i
}

/// Top-level `(key, value)` events of a buffered mapping.
fn entries(mapping: &[Ev]) -> impl Iterator<Item = (&Ev, &Ev)> {
    let mut i = 1;
    std::iter::from_fn(move || {
        if i >= mapping.len() || mapping[i].kind() == EvKind::MapEnd {
            return None;
        }
        let key = i;
        let value = node_end(mapping, key);
        i = node_end(mapping, value);
        Some((&mapping[key], mapping.get(value)?))
    })
}

fn scalar_text(ev: &Ev) -> Option<&str> {
    match ev {
        Ev::Scalar { value, .. } => Some(value),
        _ => None,
    }
}

/// The value of one well-known key names the type, as in `kind: circle`.
pub struct KeyValueTypeDiscriminator {
    base: Type,
    key: String,
    types: AHashMap<String, Type>,
}

impl KeyValueTypeDiscriminator {
    /// Fails if a mapped type is not assignable to `base`.
    pub fn new<K, V>(
        base: Type,
        key: K,
        types: impl IntoIterator<Item = (V, Type)>,
    ) -> Result<Self, Error>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let types: AHashMap<String, Type> =
            types.into_iter().map(|(v, t)| (v.into(), t)).collect();
        check_targets(&base, types.values())?;
        Ok(Self {
            base,
            key: key.into(),
            types,
        })
    }
}

impl TypeDiscriminator for KeyValueTypeDiscriminator {
    fn base_type(&self) -> &Type {
        &self.base
    }

    fn discriminate(&self, mapping: &[Ev]) -> Option<Type> {
        let (_, value) = entries(mapping).find(|(k, _)| scalar_text(k) == Some(self.key.as_str()))?;
        self.types.get(scalar_text(value)?).cloned()
    }
}

/// The presence of a key only one subtype has names the type.
pub struct UniqueKeyTypeDiscriminator {
    base: Type,
    types: AHashMap<String, Type>,
}

impl UniqueKeyTypeDiscriminator {
    /// Fails if a mapped type is not assignable to `base`.
    pub fn new<K: Into<String>>(
        base: Type,
        types: impl IntoIterator<Item = (K, Type)>,
    ) -> Result<Self, Error> {
        let types: AHashMap<String, Type> =
            types.into_iter().map(|(k, t)| (k.into(), t)).collect();
        check_targets(&base, types.values())?;
        Ok(Self { base, types })
    }
}

impl TypeDiscriminator for UniqueKeyTypeDiscriminator {
    fn base_type(&self) -> &Type {
        &self.base
    }

    fn discriminate(&self, mapping: &[Ev]) -> Option<Type> {
        entries(mapping)
            .find_map(|(k, _)| scalar_text(k).and_then(|key| self.types.get(key)))
            .cloned()
    }
}

/// Buffers a mapping, lets the discriminators choose its type and hands the
/// replayed events to the other node deserializers.
pub struct TypeDiscriminatingNodeDeserializer {
    discriminators: Vec<Arc<dyn TypeDiscriminator>>,
    max_length: usize,
}

impl TypeDiscriminatingNodeDeserializer {
    pub fn new(discriminators: Vec<Arc<dyn TypeDiscriminator>>, max_length: usize) -> Self {
        Self {
            discriminators,
            max_length,
        }
    }

    fn buffer(&self, events: &mut dyn Events) -> Result<Vec<Ev>, Error> {
        let mut buffer = Vec::new();
        let mut depth = 0usize;
        loop {
            let Some(ev) = events.next()? else {
                return Err(Error::eof().with_location(events.last_location()));
            };
            match ev.kind() {
                EvKind::MapStart | EvKind::SeqStart => depth += 1,
                EvKind::MapEnd | EvKind::SeqEnd => depth -= 1,
                _ => {}
            }
            let location = ev.location();
            buffer.push(ev);
            if buffer.len() > self.max_length {
                return Err(Error::msg(format!(
                    "mapping too long to discriminate its type (over {} events)",
                    self.max_length
                ))
                .with_location(location));
            }
            if depth == 0 {
                return Ok(buffer);
            }
        }
    }
}

impl NodeDeserializer for TypeDiscriminatingNodeDeserializer {
    fn deserialize(
        &self,
        events: &mut dyn Events,
        expected: &Type,
        settings: &DeserializerSettings,
        nested: &mut dyn NestedDeserializer,
    ) -> Result<Option<Value>, Error> {
        let candidates: Vec<_> = self
            .discriminators
            .iter()
            .filter(|d| d.base_type().is_assignable_from(expected.unwrap_nullable()))
            .collect();
        if candidates.is_empty() || !events.accept(EvKind::MapStart)? {
            return Ok(None);
        }

        let buffer = self.buffer(events)?;
        let actual = candidates
            .iter()
            .find_map(|d| d.discriminate(&buffer))
            .unwrap_or_else(|| expected.clone());
        trace!("discriminated {expected} as {actual}");

        let mut replay = EventReplay::new(buffer);
        for stage in settings.node_deserializers() {
            if std::ptr::addr_eq(Arc::as_ptr(stage), self as *const Self) {
                continue;
            }
            if let Some(value) = stage.deserialize(&mut replay, &actual, settings, nested)? {
                return Ok(Some(value));
            }
        }
        Err(Error::no_deserializer(&actual.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Location;
    use crate::events::ScalarStyle;

    fn scalar(text: &str) -> Ev {
        Ev::Scalar {
            value: text.to_owned(),
            tag: None,
            style: ScalarStyle::Plain,
            anchor: 0,
            location: Location::UNKNOWN,
        }
    }

    fn map_start() -> Ev {
        Ev::MapStart {
            anchor: 0,
            tag: None,
            location: Location::UNKNOWN,
        }
    }

    #[test]
    fn entries_skip_nested_values() {
        // {a: {kind: x}, kind: y}
        let mapping = vec![
            map_start(),
            scalar("a"),
            map_start(),
            scalar("kind"),
            scalar("x"),
            Ev::MapEnd {
                location: Location::UNKNOWN,
            },
            scalar("kind"),
            scalar("y"),
            Ev::MapEnd {
                location: Location::UNKNOWN,
            },
        ];
        let keys: Vec<_> = entries(&mapping).filter_map(|(k, _)| scalar_text(k)).collect();
        assert_eq!(keys, ["a", "kind"]);

        let d = KeyValueTypeDiscriminator::new(Type::Any, "kind", [("y", Type::I32)]).unwrap();
        assert_eq!(d.discriminate(&mapping), Some(Type::I32));
    }

    #[test]
    fn targets_must_fit_the_base() {
        assert!(UniqueKeyTypeDiscriminator::new(Type::I32, [("radius", Type::String)]).is_err());
    }
}
