//! Type inspectors: enumerate the serializable members of a class.

use std::sync::{Arc, PoisonError, RwLock};

use ahash::AHashMap;

use crate::events::ScalarStyle;
use crate::serializer_options::DefaultValuesHandling;
use crate::types::{ClassType, MemberDef, Type};
use crate::value::{ObjectRef, Value};

/// Read-only view over one member of a class.
#[derive(Clone, Debug)]
pub struct MemberDescriptor {
    class: Arc<ClassType>,
    index: usize,
}

impl MemberDescriptor {
    pub(crate) fn new(class: Arc<ClassType>, index: usize) -> Self {
        Self { class, index }
    }

    fn def(&self) -> &MemberDef {
        &self.class.members[self.index]
    }

    /// Name as written in YAML (the alias if one is declared).
    pub fn name(&self) -> &str {
        let def = self.def();
        def.alias.as_deref().unwrap_or(&def.name)
    }

    /// Name of the member in its class.
    pub fn member_name(&self) -> &str {
        &self.def().name
    }

    pub fn ty(&self) -> &Type {
        &self.def().ty
    }

    pub fn can_write(&self) -> bool {
        self.def().can_write
    }

    pub fn order(&self) -> i32 {
        self.def().order
    }

    pub fn scalar_style(&self) -> ScalarStyle {
        self.def().scalar_style
    }

    pub fn default_values(&self) -> Option<DefaultValuesHandling> {
        self.def().default_values
    }

    pub fn description(&self) -> Option<&str> {
        self.def().description.as_deref()
    }

    pub fn has_declared_default(&self) -> bool {
        self.def().default.is_some()
    }

    pub fn default_value(&self) -> Value {
        self.def().default_value()
    }

    /// Read the member from `obj`.
    ///
    /// When `obj` is an instance of a derived class, the member is found by name.
    pub fn read(&self, obj: &ObjectRef) -> Value {
        let class = obj.class();
        if Arc::ptr_eq(&class, &self.class) {
            obj.field(self.index)
        } else {
            obj.get(self.member_name()).unwrap_or(Value::Null)
        }
    }

    /// Write the member on `obj`.
    pub fn write(&self, obj: &ObjectRef, value: Value) {
        let class = obj.class();
        if Arc::ptr_eq(&class, &self.class) {
            obj.set_field(self.index, value);
        } else {
            obj.set(self.member_name(), value);
        }
    }
}

/// Enumerates the members of a type.
pub trait TypeInspector: Send + Sync {
    /// Members of `ty`, in serialization order. Non-class types have none.
    fn members(&self, ty: &Type, container: Option<&ObjectRef>) -> Arc<[MemberDescriptor]>;

    /// Member matching `name` exactly, or ignoring ASCII case if requested.
    fn member(
        &self,
        ty: &Type,
        container: Option<&ObjectRef>,
        name: &str,
        ignore_case: bool,
    ) -> Option<MemberDescriptor> {
        let members = self.members(ty, container);
        members
            .iter()
            .find(|m| m.name() == name)
            .or_else(|| {
                ignore_case
                    .then(|| members.iter().find(|m| m.name().eq_ignore_ascii_case(name)))
                    .flatten()
            })
            .cloned()
    }
}

/// Every declared member, ordered by `order` then declaration.
#[derive(Debug, Default)]
pub struct ReadableMembersInspector;

impl TypeInspector for ReadableMembersInspector {
    fn members(&self, ty: &Type, _container: Option<&ObjectRef>) -> Arc<[MemberDescriptor]> {
        let Some(class) = ty.as_class() else {
            return Arc::from(Vec::new());
        };
        let mut members: Vec<MemberDescriptor> = (0..class.members.len())
            .map(|i| MemberDescriptor::new(class.clone(), i))
            .collect();
        members.sort_by_key(|m| m.order());
        Arc::from(members)
    }
}

/// Only members that can be written back; used in roundtrip mode.
pub struct WritableMembersInspector {
    inner: Arc<dyn TypeInspector>,
}

impl WritableMembersInspector {
    pub fn new(inner: Arc<dyn TypeInspector>) -> Self {
        Self { inner }
    }
}

impl TypeInspector for WritableMembersInspector {
    fn members(&self, ty: &Type, container: Option<&ObjectRef>) -> Arc<[MemberDescriptor]> {
        self.inner
            .members(ty, container)
            .iter()
            .filter(|m| m.can_write())
            .cloned()
            .collect()
    }
}

/// Caches member lists per class instance. Safe to share between threads.
///
/// Distinct classes that happen to share a name get their own entries. Each
/// entry keeps its class alive so the address it is keyed by stays unique.
pub struct CachedTypeInspector {
    inner: Arc<dyn TypeInspector>,
    cache: RwLock<AHashMap<usize, (Arc<ClassType>, Arc<[MemberDescriptor]>)>>,
}

impl CachedTypeInspector {
    pub fn new(inner: Arc<dyn TypeInspector>) -> Self {
        Self {
            inner,
            cache: RwLock::new(AHashMap::new()),
        }
    }
}

impl TypeInspector for CachedTypeInspector {
    fn members(&self, ty: &Type, container: Option<&ObjectRef>) -> Arc<[MemberDescriptor]> {
        let Some(class) = ty.as_class() else {
            return self.inner.members(ty, container);
        };
        let key = Arc::as_ptr(class) as usize;
        if let Some((_, hit)) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return hit.clone();
        }
        let members = self.inner.members(ty, container);
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_insert_with(|| (class.clone(), members))
            .1
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> Arc<ClassType> {
        ClassType::builder("demo.Person")
            .member(MemberDef::new("name", Type::String).order(2))
            .member(MemberDef::new("id", Type::I64).order(1).read_only())
            .member(MemberDef::new("email", Type::String).alias("e-mail").order(3))
            .build()
    }

    #[test]
    fn members_follow_order() {
        let names: Vec<_> = ReadableMembersInspector
            .members(&Type::Class(person()), None)
            .iter()
            .map(|m| m.name().to_owned())
            .collect();
        assert_eq!(names, ["id", "name", "e-mail"]);
    }

    #[test]
    fn writable_filter_drops_read_only() {
        let inspector = WritableMembersInspector::new(Arc::new(ReadableMembersInspector));
        let members = inspector.members(&Type::Class(person()), None);
        assert!(members.iter().all(|m| m.member_name() != "id"));
    }

    #[test]
    fn case_insensitive_lookup() {
        let inspector = CachedTypeInspector::new(Arc::new(ReadableMembersInspector));
        let ty = Type::Class(person());
        assert!(inspector.member(&ty, None, "NAME", false).is_none());
        assert_eq!(inspector.member(&ty, None, "NAME", true).unwrap().member_name(), "name");
        assert_eq!(inspector.member(&ty, None, "e-mail", false).unwrap().member_name(), "email");
    }

    #[test]
    fn same_named_classes_are_cached_apart() {
        let inspector = CachedTypeInspector::new(Arc::new(ReadableMembersInspector));
        let v1 = ClassType::builder("demo.Record").field("a", Type::I32).build();
        let v2 = ClassType::builder("demo.Record").field("b", Type::String).build();
        let names = |class: &Arc<ClassType>| -> Vec<String> {
            inspector
                .members(&Type::Class(class.clone()), None)
                .iter()
                .map(|m| m.name().to_owned())
                .collect()
        };
        assert_eq!(names(&v1), ["a"]);
        assert_eq!(names(&v2), ["b"]);
        assert_eq!(names(&v1), ["a"]);
    }

    #[test]
    fn read_and_write_through_descriptor() {
        let class = person();
        let obj = ObjectRef::new(&class);
        let m = ReadableMembersInspector.member(&Type::Class(class), None, "name", false).unwrap();
        m.write(&obj, Value::from("Ada"));
        assert_eq!(m.read(&obj), Value::from("Ada"));
    }
}
