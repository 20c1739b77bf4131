//! YAML tags: the core schema vocabulary and the user tag mapping table.

use std::sync::Arc;

use ahash::AHashMap;

use crate::types::{ClassType, Type};

pub(crate) const YAML_TAG_PREFIX: &str = "tag:yaml.org,2002:";

pub const TAG_INT: &str = "tag:yaml.org,2002:int";
pub const TAG_FLOAT: &str = "tag:yaml.org,2002:float";
pub const TAG_BOOL: &str = "tag:yaml.org,2002:bool";
pub const TAG_NULL: &str = "tag:yaml.org,2002:null";
pub const TAG_STR: &str = "tag:yaml.org,2002:str";
pub const TAG_SEQ: &str = "tag:yaml.org,2002:seq";
pub const TAG_MAP: &str = "tag:yaml.org,2002:map";
pub const TAG_TIMESTAMP: &str = "tag:yaml.org,2002:timestamp";
pub const TAG_BINARY: &str = "tag:yaml.org,2002:binary";

/// Core schema names that are also accepted in `!name` shorthand form.
const CORE_NAMES: &[&str] = &[
    "int",
    "float",
    "bool",
    "null",
    "str",
    "seq",
    "map",
    "timestamp",
    "binary",
];

/// Bring a tag as reported by the parser into canonical form.
///
/// `!!int`, `!int`, `tag:yaml.org,2002:!int` and `!<tag:yaml.org,2002:int>` all
/// become `tag:yaml.org,2002:int`. Other tags are returned unchanged apart from
/// verbatim brackets being removed.
pub fn normalize_tag(raw: &str) -> String {
    let tag = raw
        .strip_prefix("!<")
        .and_then(|t| t.strip_suffix('>'))
        .unwrap_or(raw);

    let core = if let Some(name) = tag.strip_prefix(YAML_TAG_PREFIX) {
        Some(name.strip_prefix('!').unwrap_or(name))
    } else if let Some(name) = tag.strip_prefix("!!") {
        Some(name)
    } else {
        tag.strip_prefix('!').filter(|name| CORE_NAMES.contains(name))
    };

    match core {
        Some(name) => format!("{YAML_TAG_PREFIX}{name}"),
        None => tag.to_owned(),
    }
}

/// Type a core schema tag stands for. `null` has no type of its own.
pub(crate) fn core_tag_type(tag: &str) -> Option<Type> {
    match tag {
        TAG_INT => Some(Type::I64),
        TAG_FLOAT => Some(Type::F64),
        TAG_BOOL => Some(Type::Bool),
        TAG_STR => Some(Type::String),
        TAG_TIMESTAMP => Some(Type::Timestamp),
        TAG_BINARY => Some(Type::Bytes),
        TAG_SEQ => Some(Type::list(Type::Any)),
        TAG_MAP => Some(Type::map(Type::Any, Type::Any)),
        _ => None,
    }
}

pub(crate) fn is_null_tag(tag: Option<&str>) -> bool {
    tag == Some(TAG_NULL)
}

pub(crate) fn is_core_tag(tag: &str) -> bool {
    tag.starts_with(YAML_TAG_PREFIX)
}

/// Tag used for a class that has no explicit mapping.
pub(crate) fn class_tag(class: &ClassType) -> String {
    format!("!{}", class.name())
}

/// Bidirectional table between user tags and types.
#[derive(Clone, Debug, Default)]
pub struct TagMappings {
    by_tag: AHashMap<String, Type>,
    by_type: AHashMap<Type, String>,
}

impl TagMappings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `tag` to `ty` in both directions. A later mapping replaces an earlier one.
    pub fn add<S: Into<String>>(&mut self, tag: S, ty: Type) {
        let tag = normalize_tag(&tag.into());
        if let Some(old) = self.by_tag.insert(tag.clone(), ty.clone()) {
            self.by_type.remove(&old);
        }
        self.by_type.insert(ty, tag);
    }

    /// Register a class under its `!fully.qualified.Name` tag.
    pub fn register_class(&mut self, class: &Arc<ClassType>) {
        self.add(class_tag(class), Type::Class(class.clone()));
    }

    pub fn type_for(&self, tag: &str) -> Option<&Type> {
        self.by_tag.get(tag)
    }

    pub fn tag_for(&self, ty: &Type) -> Option<&str> {
        self.by_type.get(ty).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.by_tag.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorthand_forms_normalize() {
        for raw in ["!!int", "!int", "tag:yaml.org,2002:int", "tag:yaml.org,2002:!int", "!<tag:yaml.org,2002:int>"] {
            assert_eq!(normalize_tag(raw), TAG_INT, "{raw}");
        }
        assert_eq!(normalize_tag("!zoo.Dog"), "!zoo.Dog");
    }

    #[test]
    fn mapping_is_bidirectional() {
        let dog = ClassType::builder("zoo.Dog").build();
        let mut tags = TagMappings::new();
        tags.register_class(&dog);
        tags.add("!point", Type::list(Type::F64));
        assert_eq!(tags.type_for("!zoo.Dog"), Some(&Type::Class(dog.clone())));
        assert_eq!(tags.tag_for(&Type::Class(dog)), Some("!zoo.Dog"));
        assert_eq!(tags.tag_for(&Type::list(Type::F64)), Some("!point"));
    }
}
