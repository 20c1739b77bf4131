//! Object factory: allocates empty instances during deserialization.

use crate::error::Error;
use crate::types::Type;
use crate::value::{MapRef, ObjectRef, SeqRef, Value};

/// Creates new, empty instances of a requested type.
///
/// The `on_*` hooks bracket the reading and writing of each class instance.
/// They run once per instance, never for aliases, and do nothing by default.
pub trait ObjectFactory: Send + Sync {
    fn create(&self, ty: &Type) -> Result<Value, Error>;

    /// The instance is created and registered but no member is set yet.
    fn on_deserializing(&self, _object: &ObjectRef) {}

    /// Every member present in the document has been set.
    fn on_deserialized(&self, _object: &ObjectRef) {}

    /// About to write the instance's members.
    fn on_serializing(&self, _object: &ObjectRef) {}

    /// The instance's mapping is closed.
    fn on_serialized(&self, _object: &ObjectRef) {}
}

/// Default allocation: classes through their default constructor, collections empty.
///
/// Scalars, `Any` and abstract classes cannot be created.
#[derive(Debug, Default)]
pub struct DefaultObjectFactory;

impl ObjectFactory for DefaultObjectFactory {
    fn create(&self, ty: &Type) -> Result<Value, Error> {
        match ty.unwrap_nullable() {
            Type::Class(class) => {
                if class.has_default_constructor() {
                    Ok(Value::Object(ObjectRef::new(class)))
                } else {
                    Err(Error::missing_default_constructor(class.name()))
                }
            }
            t @ (Type::List(_) | Type::Array(_)) => Ok(Value::Sequence(SeqRef::new(t.clone()))),
            t @ Type::Map(_, _) => Ok(Value::Mapping(MapRef::new(t.clone()))),
            other => Err(Error::msg(format!("cannot create an instance of `{other}`"))),
        }
    }
}
