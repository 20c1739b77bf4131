//! The node type resolver chain.
//!
//! Before a node is offered to the node deserializers, each resolver may
//! refine the type it is read as. A resolver returning `true` ends the chain.

use log::trace;

use crate::de::deserializer::DeserializerSettings;
use crate::error::Error;
use crate::events::Ev;
use crate::tags::{core_tag_type, is_core_tag, is_null_tag};
use crate::types::Type;

/// One stage of the node type resolver chain.
pub trait NodeTypeResolver: Send + Sync {
    /// Refine `current` for `node`. Returns `true` when the type is settled.
    fn resolve(
        &self,
        node: &Ev,
        current: &mut Type,
        settings: &DeserializerSettings,
    ) -> Result<bool, Error>;
}

/// Replaces an abstract or interface type by the concrete type registered
/// for it, when the node carries no tag of its own.
#[derive(Debug, Default)]
pub struct TypeMappingNodeTypeResolver;

impl NodeTypeResolver for TypeMappingNodeTypeResolver {
    fn resolve(
        &self,
        node: &Ev,
        current: &mut Type,
        settings: &DeserializerSettings,
    ) -> Result<bool, Error> {
        if node.tag().is_some() {
            return Ok(false);
        }
        match settings.type_mappings().get(current.unwrap_nullable()) {
            Some(concrete) => {
                trace!("{current} mapped to {concrete}");
                *current = concrete.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Keeps the declared type of nodes read by a converter or by the class
/// itself, so tags cannot redirect them.
#[derive(Debug, Default)]
pub struct ConvertibleNodeTypeResolver;

impl NodeTypeResolver for ConvertibleNodeTypeResolver {
    fn resolve(
        &self,
        _node: &Ev,
        current: &mut Type,
        settings: &DeserializerSettings,
    ) -> Result<bool, Error> {
        let hooked = current.as_class().is_some_and(|c| c.convertible().is_some());
        Ok(hooked || settings.converters().iter().any(|c| c.accepts(current)))
    }
}

/// Resolves core schema tags and user tag mappings.
///
/// A tag only narrows the type: a tagged type not assignable to the declared
/// one is an error for user tags, and is ignored for core tags so that
/// `!!int 5` still fills an `i32`.
#[derive(Debug, Default)]
pub struct TagNodeTypeResolver;

impl NodeTypeResolver for TagNodeTypeResolver {
    fn resolve(
        &self,
        node: &Ev,
        current: &mut Type,
        settings: &DeserializerSettings,
    ) -> Result<bool, Error> {
        let Some(tag) = node.tag() else {
            return Ok(false);
        };
        if is_null_tag(Some(tag)) {
            return Ok(true);
        }

        let (tagged, core) = match core_tag_type(tag) {
            Some(ty) => (ty, true),
            None => match settings.tag_mappings().type_for(tag) {
                Some(ty) => (ty.clone(), false),
                None => return Ok(false),
            },
        };

        if current.is_assignable_from(&tagged) {
            *current = tagged;
        } else if !core {
            return Err(Error::conversion(tag, &*current).with_location(node.location()));
        }
        Ok(true)
    }
}

/// With strict tags, a tag no earlier resolver understood is an error.
#[derive(Debug, Default)]
pub struct RejectUnknownTagsNodeTypeResolver;

impl NodeTypeResolver for RejectUnknownTagsNodeTypeResolver {
    fn resolve(
        &self,
        node: &Ev,
        _current: &mut Type,
        settings: &DeserializerSettings,
    ) -> Result<bool, Error> {
        match node.tag() {
            Some(tag)
                if settings.options().strict_tags
                    && !is_core_tag(tag)
                    && settings.tag_mappings().type_for(tag).is_none() =>
            {
                Err(Error::unknown_tag(tag).with_location(node.location()))
            }
            _ => Ok(false),
        }
    }
}

/// Open targets read mappings as `map<any, any>` and sequences as `list<any>`.
#[derive(Debug, Default)]
pub struct DefaultContainersNodeTypeResolver;

impl NodeTypeResolver for DefaultContainersNodeTypeResolver {
    fn resolve(
        &self,
        node: &Ev,
        current: &mut Type,
        _settings: &DeserializerSettings,
    ) -> Result<bool, Error> {
        if *current.unwrap_nullable() != Type::Any {
            return Ok(false);
        }
        match node {
            Ev::MapStart { .. } => *current = Type::map(Type::Any, Type::Any),
            Ev::SeqStart { .. } => *current = Type::list(Type::Any),
            _ => return Ok(false),
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::de::deserializer::Deserializer;
    use crate::error::Location;
    use crate::types::ClassType;

    fn map_start(tag: Option<&str>) -> Ev {
        Ev::MapStart {
            anchor: 0,
            tag: tag.map(str::to_owned),
            location: Location::new(3, 1),
        }
    }

    #[test]
    fn mapping_needs_untagged_node() {
        let shape = ClassType::abstract_type("geo.Shape");
        let circle = ClassType::builder("geo.Circle").implements("geo.Shape").build();
        let deserializer = Deserializer::builder()
            .with_type_mapping(Type::Class(shape.clone()), Type::Class(circle.clone()))
            .build()
            .unwrap();

        let mut ty = Type::Class(shape.clone());
        let settled = TypeMappingNodeTypeResolver
            .resolve(&map_start(None), &mut ty, deserializer.settings())
            .unwrap();
        assert!(settled);
        assert_eq!(ty, Type::Class(circle));

        let mut ty = Type::Class(shape.clone());
        let settled = TypeMappingNodeTypeResolver
            .resolve(&map_start(Some("!geo.Square")), &mut ty, deserializer.settings())
            .unwrap();
        assert!(!settled);
        assert_eq!(ty, Type::Class(shape));
    }

    #[test]
    fn core_tags_narrow_open_types_only() {
        let deserializer = Deserializer::default();
        let scalar = Ev::Scalar {
            value: "5".into(),
            tag: Some(crate::tags::TAG_INT.into()),
            style: crate::events::ScalarStyle::Plain,
            anchor: 0,
            location: Location::UNKNOWN,
        };

        let mut open = Type::Any;
        TagNodeTypeResolver
            .resolve(&scalar, &mut open, deserializer.settings())
            .unwrap();
        assert_eq!(open, Type::I64);

        let mut narrow = Type::I32;
        TagNodeTypeResolver
            .resolve(&scalar, &mut narrow, deserializer.settings())
            .unwrap();
        assert_eq!(narrow, Type::I32);
    }

    #[test]
    fn user_tag_must_fit_declared_type() {
        let dog = ClassType::builder("zoo.Dog").build();
        let deserializer = Deserializer::builder().with_class_tag(&dog).build().unwrap();
        let mut ty = Type::String;
        let err = TagNodeTypeResolver
            .resolve(&map_start(Some("!zoo.Dog")), &mut ty, deserializer.settings())
            .unwrap_err();
        assert_eq!(err.location(), Some(Location::new(3, 1)));
    }

    #[test]
    fn unknown_tags_rejected_only_when_strict() {
        let lenient = Deserializer::default();
        let mut ty = Type::Any;
        assert!(
            !RejectUnknownTagsNodeTypeResolver
                .resolve(&map_start(Some("!mystery")), &mut ty, lenient.settings())
                .unwrap()
        );

        let strict = Deserializer::builder()
            .with_options(crate::options! { strict_tags: true })
            .build()
            .unwrap();
        let err = RejectUnknownTagsNodeTypeResolver
            .resolve(&map_start(Some("!mystery")), &mut ty, strict.settings())
            .unwrap_err();
        assert!(matches!(err, Error::UnknownTag { .. }));
    }

    #[test]
    fn open_types_get_default_containers() {
        let deserializer = Deserializer::default();
        let mut ty = Type::Any;
        DefaultContainersNodeTypeResolver
            .resolve(&map_start(None), &mut ty, deserializer.settings())
            .unwrap();
        assert_eq!(ty, Type::map(Type::Any, Type::Any));
    }
}
