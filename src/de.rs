//! Object graph deserializer.
//!
//! Events are pulled from an [`Events`](crate::Events) source. For every node
//! the value deserializer
//! 1. resolves an alias against the anchors seen so far, or
//! 2. runs the node type resolver chain to settle the type of the node,
//! 3. offers the node to each node deserializer in turn until one claims it.
//!
//! Node deserializers recurse through a [`NestedDeserializer`]. Containers
//! register themselves under their anchor before reading their children, so a
//! node can refer to itself:
//!
//! ```rust
//! use saphyr_graph::{ClassType, Type, from_str};
//!
//! let node = ClassType::builder("demo.Node")
//!     .field("name", Type::String)
//!     .field("next", Type::Any)
//!     .build();
//! let value = from_str("&a\nname: a\nnext: *a\n", &Type::Class(node)).unwrap();
//! let obj = value.as_object().unwrap();
//! assert!(obj.get("next").unwrap().same_instance(&value));
//! ```

pub(crate) mod deserializer;
pub(crate) mod discriminators;
pub(crate) mod node_deserializers;
pub(crate) mod type_resolvers;
pub(crate) mod value_deserializer;

pub use crate::error::{Error, Location};
pub use deserializer::{Deserializer, DeserializerBuilder, DeserializerSettings};
pub use discriminators::{
    KeyValueTypeDiscriminator, TypeDiscriminatingNodeDeserializer, TypeDiscriminator,
    UniqueKeyTypeDiscriminator,
};
pub use node_deserializers::{
    DictionaryNodeDeserializer, NodeDeserializer, NullNodeDeserializer, ObjectNodeDeserializer,
    ScalarNodeDeserializer, SequenceNodeDeserializer, TypeConverterNodeDeserializer,
};
pub use type_resolvers::{
    ConvertibleNodeTypeResolver, DefaultContainersNodeTypeResolver, NodeTypeResolver,
    RejectUnknownTagsNodeTypeResolver, TagNodeTypeResolver, TypeMappingNodeTypeResolver,
};
pub use value_deserializer::{NestedDeserializer, coerce};

pub type Result<T> = std::result::Result<T, Error>;

/// Names of the built-in stages, for positioning custom ones.
pub mod stages {
    pub const TYPE_CONVERTER: &str = "type_converter";
    pub const NULL: &str = "null";
    pub const SCALAR: &str = "scalar";
    pub const SEQUENCE: &str = "sequence";
    pub const DICTIONARY: &str = "dictionary";
    pub const OBJECT: &str = "object";
    pub const TYPE_DISCRIMINATING: &str = "type_discriminating";

    pub const TYPE_MAPPING: &str = "type_mapping";
    pub const CONVERTIBLE: &str = "convertible";
    pub const TAG: &str = "tag";
    pub const REJECT_UNKNOWN_TAGS: &str = "reject_unknown_tags";
    pub const DEFAULT_CONTAINERS: &str = "default_containers";
}
