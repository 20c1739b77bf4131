//! Type resolvers decide which type a value is traversed as.

use crate::types::Type;
use crate::value::Value;

/// Picks the effective type of a value given its declared type.
pub trait TypeResolver: Send + Sync {
    fn resolve(&self, static_type: &Type, value: &Value) -> Type;
}

/// Prefer the runtime type of the value; null keeps the declared type.
#[derive(Debug, Default)]
pub struct DynamicTypeResolver;

impl TypeResolver for DynamicTypeResolver {
    fn resolve(&self, static_type: &Type, value: &Value) -> Type {
        if value.is_null() {
            static_type.clone()
        } else {
            value.runtime_type()
        }
    }
}

/// Prefer the declared type. Open declarations (`Any`, abstract classes) and
/// declarations the value does not fit fall back to the runtime type.
#[derive(Debug, Default)]
pub struct StaticTypeResolver;

impl TypeResolver for StaticTypeResolver {
    fn resolve(&self, static_type: &Type, value: &Value) -> Type {
        if value.is_null() {
            return static_type.clone();
        }
        let declared = static_type.unwrap_nullable();
        if declared.is_open() || !declared.is_assignable_from(&value.runtime_type()) {
            value.runtime_type()
        } else {
            declared.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClassType;
    use crate::value::ObjectRef;

    #[test]
    fn dynamic_prefers_runtime_type() {
        let dog = ClassType::builder("zoo.Dog").implements("zoo.Animal").build();
        let animal = Type::Class(ClassType::abstract_type("zoo.Animal"));
        let value = Value::Object(ObjectRef::new(&dog));
        assert_eq!(DynamicTypeResolver.resolve(&animal, &value), Type::Class(dog));
        assert_eq!(DynamicTypeResolver.resolve(&Type::I32, &Value::Null), Type::I32);
    }

    #[test]
    fn static_keeps_declared_type_when_it_fits() {
        let base = ClassType::builder("zoo.Pet").build();
        let cat = ClassType::builder("zoo.Cat").implements("zoo.Pet").build();
        let value = Value::Object(ObjectRef::new(&cat));
        assert_eq!(
            StaticTypeResolver.resolve(&Type::Class(base.clone()), &value),
            Type::Class(base)
        );
        assert_eq!(StaticTypeResolver.resolve(&Type::Any, &Value::I32(1)), Type::I32);
        assert_eq!(
            StaticTypeResolver.resolve(&Type::nullable(Type::I32), &Value::I32(1)),
            Type::I32
        );
    }
}
