//! Object graph serializer.
//!
//! A run has two passes. The anchor pre-pass walks the graph once to find
//! instances reachable more than once. The emission pass walks it again
//! through the visitor chain
//!
//! ```text
//! custom serialization -> anchor assigning -> default values -> comments -> emitting
//! ```
//!
//! and every event it produces goes through the event emitter chain
//! (type assigning or JSON, then the writer) into an [`Emitter`](crate::Emitter).
//!
//! ```rust
//! use saphyr_graph::{ClassType, ObjectRef, Type, Value, to_string};
//!
//! let node = ClassType::builder("demo.Node")
//!     .field("name", Type::String)
//!     .field("next", Type::Any)
//!     .build();
//! let a = ObjectRef::new(&node);
//! a.set("name", "a");
//! a.set("next", a.clone());
//! let yaml = to_string(&Value::Object(a), &Type::Class(node)).unwrap();
//! assert_eq!(yaml, "&o0\nname: a\nnext: *o0\n");
//! ```

pub(crate) mod anchors;
pub(crate) mod event_emitters;
pub(crate) mod event_info;
pub(crate) mod render;
pub(crate) mod serializer;
pub(crate) mod traversal;
pub(crate) mod visitor;
pub(crate) mod visitors;
pub(crate) mod yaml_writer;

pub use crate::ser_error::Error;
pub use anchors::{AliasState, AnchorAssigner};
pub use event_emitters::{
    EventEmitter, JsonEventEmitter, TypeAssigningEventEmitter, WriterEventEmitter,
};
pub use event_info::{AliasEventInfo, CollectionEventInfo, EventInfo, ScalarEventInfo};
pub use serializer::{
    EmissionScope, EventEmitterFactory, Serializer, SerializerBuilder, SerializerSettings,
    VisitorFactory,
};
pub use traversal::ObjectGraphTraversal;
pub use visitor::ObjectGraphVisitor;
pub use visitors::{
    AnchorAssigningVisitor, CommentsVisitor, CustomSerializationVisitor, DefaultValuesVisitor,
    EmissionVisitor, EmittingVisitor,
};
pub use yaml_writer::YamlWriter;

pub type Result<T> = std::result::Result<T, Error>;

/// Names of the built-in stages, for positioning custom ones.
pub mod stages {
    pub const CUSTOM_SERIALIZATION: &str = "custom_serialization";
    pub const ANCHOR_ASSIGNING: &str = "anchor_assigning";
    pub const DEFAULT_VALUES: &str = "default_values";
    pub const COMMENTS: &str = "comments";
    /// Event emitter stage; becomes the JSON emitter in JSON mode.
    pub const TYPE_ASSIGNING: &str = "type_assigning";
}
