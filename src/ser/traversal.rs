//! Depth-first walk of an object graph, driving a visitor chain.

use std::cell::Cell;
use std::sync::Arc;

use log::trace;

use crate::converter::TypeConverter;
use crate::descriptor::ValueDescriptor;
use crate::events::ScalarStyle;
use crate::inspector::TypeInspector;
use crate::resolver::TypeResolver;
use crate::ser::Error;
use crate::ser::visitor::ObjectGraphVisitor;
use crate::types::Type;
use crate::value::{MapRef, ObjectRef, SeqRef, Value};

/// Walks values, dictionaries, sequences and objects in document order.
///
/// Nesting is bounded by `max_recursion`; the counter lives outside the
/// traversal so nested serializations started by converters share it.
#[derive(Clone)]
pub struct ObjectGraphTraversal {
    inspector: Arc<dyn TypeInspector>,
    resolver: Arc<dyn TypeResolver>,
    max_recursion: usize,
    roundtrip: bool,
    converters: Arc<[Arc<dyn TypeConverter>]>,
}

impl ObjectGraphTraversal {
    pub fn new(
        inspector: Arc<dyn TypeInspector>,
        resolver: Arc<dyn TypeResolver>,
        max_recursion: usize,
        roundtrip: bool,
        converters: Arc<[Arc<dyn TypeConverter>]>,
    ) -> Self {
        Self {
            inspector,
            resolver,
            max_recursion,
            roundtrip,
            converters,
        }
    }

    /// Descriptor for `value` declared as `static_type`.
    pub fn describe(&self, value: Value, static_type: &Type, style: ScalarStyle) -> ValueDescriptor {
        let actual = self.resolver.resolve(static_type, &value);
        ValueDescriptor::new(value, actual, static_type.clone(), style)
    }

    pub fn traverse<C: ?Sized>(
        &self,
        graph: &ValueDescriptor,
        visitor: &mut dyn ObjectGraphVisitor<C>,
        context: &mut C,
        depth: &Cell<usize>,
    ) -> Result<(), Error> {
        let level = depth.get() + 1;
        if level > self.max_recursion {
            return Err(Error::RecursionLimitExceeded {
                limit: self.max_recursion,
            });
        }
        depth.set(level);
        let result = self.traverse_node(graph, visitor, context, depth);
        depth.set(level - 1);
        result
    }

    fn traverse_node<C: ?Sized>(
        &self,
        graph: &ValueDescriptor,
        visitor: &mut dyn ObjectGraphVisitor<C>,
        context: &mut C,
        depth: &Cell<usize>,
    ) -> Result<(), Error> {
        // A present reference value is walked as its inner type, with a
        // single `enter` for the instance.
        let unwrapped;
        let graph = match graph.actual_type() {
            Type::Nullable(inner) if !graph.value().is_null() && !inner.is_scalar() => {
                unwrapped = graph.with_actual_type((**inner).clone());
                &unwrapped
            }
            _ => graph,
        };
        if !visitor.enter(graph, context)? {
            return Ok(());
        }

        match graph.value() {
            Value::Object(obj) => self.traverse_object(graph, obj, visitor, context, depth),
            Value::Sequence(seq) => self.traverse_list(graph, seq, visitor, context, depth),
            Value::Mapping(map) => self.traverse_dictionary(graph, map, visitor, context, depth),
            _ => visitor.visit_scalar(graph, context),
        }
    }

    fn traverse_dictionary<C: ?Sized>(
        &self,
        graph: &ValueDescriptor,
        map: &MapRef,
        visitor: &mut dyn ObjectGraphVisitor<C>,
        context: &mut C,
        depth: &Cell<usize>,
    ) -> Result<(), Error> {
        let (key_type, value_type) = match map.borrow().ty() {
            Type::Map(k, v) => ((**k).clone(), (**v).clone()),
            _ => (Type::Any, Type::Any),
        };
        trace!("mapping of {} entries as {}", map.len(), graph.actual_type());
        visitor.visit_mapping_start(graph, &key_type, &value_type, context)?;
        for (key, value) in map.entries() {
            let key = self.describe(key, &key_type, ScalarStyle::Any);
            let value = self.describe(value, &value_type, ScalarStyle::Any);
            if visitor.enter_mapping(&key, &value, context)? {
                self.traverse(&key, visitor, context, depth)?;
                self.traverse(&value, visitor, context, depth)?;
            }
        }
        visitor.visit_mapping_end(graph, context)
    }

    fn traverse_list<C: ?Sized>(
        &self,
        graph: &ValueDescriptor,
        seq: &SeqRef,
        visitor: &mut dyn ObjectGraphVisitor<C>,
        context: &mut C,
        depth: &Cell<usize>,
    ) -> Result<(), Error> {
        let item_type = seq.borrow().ty().item_type().cloned().unwrap_or(Type::Any);
        visitor.visit_sequence_start(graph, &item_type, context)?;
        for item in seq.items() {
            let item = self.describe(item, &item_type, ScalarStyle::Any);
            self.traverse(&item, visitor, context, depth)?;
        }
        visitor.visit_sequence_end(graph, context)
    }

    fn traverse_object<C: ?Sized>(
        &self,
        graph: &ValueDescriptor,
        obj: &ObjectRef,
        visitor: &mut dyn ObjectGraphVisitor<C>,
        context: &mut C,
        depth: &Cell<usize>,
    ) -> Result<(), Error> {
        let ty = match graph.actual_type().as_class() {
            Some(_) => graph.actual_type().unwrap_nullable().clone(),
            None => Type::Class(obj.class()),
        };
        if self.roundtrip {
            self.check_roundtrip(&ty)?;
        }

        trace!("object {}", ty);
        visitor.visit_mapping_start(graph, &Type::String, &Type::Any, context)?;
        for member in self.inspector.members(&ty, Some(obj)).iter() {
            let value = self.describe(member.read(obj), member.ty(), member.scalar_style());
            if visitor.enter_member(member, &value, context)? {
                let name = ValueDescriptor::new(
                    Value::string(member.name()),
                    Type::String,
                    Type::String,
                    ScalarStyle::Any,
                );
                self.traverse(&name, visitor, context, depth)?;
                self.traverse(&value, visitor, context, depth)?;
            }
        }
        visitor.visit_mapping_end(graph, context)
    }

    fn check_roundtrip(&self, ty: &Type) -> Result<(), Error> {
        let Some(class) = ty.as_class() else {
            return Ok(());
        };
        if class.has_default_constructor() || self.converters.iter().any(|c| c.accepts(ty)) {
            Ok(())
        } else {
            Err(Error::MissingDefaultConstructor {
                type_name: class.name().to_owned(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inspector::{MemberDescriptor, ReadableMembersInspector};
    use crate::resolver::DynamicTypeResolver;
    use crate::types::ClassType;

    /// Records the shape of the walk.
    #[derive(Default)]
    struct Trace(Vec<String>);

    impl ObjectGraphVisitor<()> for Trace {
        fn enter_member(
            &mut self,
            member: &MemberDescriptor,
            _value: &ValueDescriptor,
            _context: &mut (),
        ) -> Result<bool, Error> {
            self.0.push(format!("member {}", member.name()));
            Ok(true)
        }

        fn visit_scalar(&mut self, scalar: &ValueDescriptor, _context: &mut ()) -> Result<(), Error> {
            self.0.push(format!("scalar {:?}", scalar.value()));
            Ok(())
        }

        fn visit_mapping_start(
            &mut self,
            _mapping: &ValueDescriptor,
            _key_type: &Type,
            _value_type: &Type,
            _context: &mut (),
        ) -> Result<(), Error> {
            self.0.push("{".into());
            Ok(())
        }

        fn visit_mapping_end(&mut self, _mapping: &ValueDescriptor, _context: &mut ()) -> Result<(), Error> {
            self.0.push("}".into());
            Ok(())
        }
    }

    fn traversal(max_recursion: usize, roundtrip: bool) -> ObjectGraphTraversal {
        ObjectGraphTraversal::new(
            Arc::new(ReadableMembersInspector),
            Arc::new(DynamicTypeResolver),
            max_recursion,
            roundtrip,
            Arc::from(Vec::new()),
        )
    }

    #[test]
    fn members_are_walked_as_name_then_value() {
        let class = ClassType::builder("demo.Point")
            .field("x", Type::I32)
            .field("y", Type::I32)
            .build();
        let obj = ObjectRef::new(&class);
        obj.set("x", 3);
        let t = traversal(50, false);
        let root = t.describe(Value::Object(obj), &Type::Class(class), ScalarStyle::Any);
        let mut trace = Trace::default();
        t.traverse::<()>(&root, &mut trace, &mut (), &Cell::new(0)).unwrap();
        assert_eq!(
            trace.0,
            [
                "{",
                "member x",
                "scalar String(\"x\")",
                "scalar I32(3)",
                "member y",
                "scalar String(\"y\")",
                "scalar I32(0)",
                "}"
            ]
        );
    }

    /// Reports the declared type as is.
    struct AsDeclared;

    impl TypeResolver for AsDeclared {
        fn resolve(&self, static_type: &Type, _value: &Value) -> Type {
            static_type.clone()
        }
    }

    #[derive(Default)]
    struct Entered(Vec<String>);

    impl ObjectGraphVisitor<()> for Entered {
        fn enter(&mut self, value: &ValueDescriptor, _context: &mut ()) -> Result<bool, Error> {
            self.0.push(value.actual_type().name());
            Ok(true)
        }
    }

    #[test]
    fn nullable_reference_is_entered_once_as_its_class() {
        let class = ClassType::builder("demo.Leaf").field("n", Type::I32).build();
        let ty = Type::nullable(Type::Class(class.clone()));
        let t = ObjectGraphTraversal::new(
            Arc::new(ReadableMembersInspector),
            Arc::new(AsDeclared),
            50,
            false,
            Arc::from(Vec::new()),
        );
        let root = t.describe(Value::Object(ObjectRef::new(&class)), &ty, ScalarStyle::Any);
        let mut entered = Entered::default();
        t.traverse::<()>(&root, &mut entered, &mut (), &Cell::new(0)).unwrap();
        assert_eq!(entered.0, ["demo.Leaf", "string", "i32"]);
    }

    #[test]
    fn depth_is_limited() {
        let ty = Type::list(Type::Any);
        let root = SeqRef::new(ty.clone());
        let mut tail = root.clone();
        for _ in 0..10 {
            let next = SeqRef::new(ty.clone());
            tail.push(next.clone());
            tail = next;
        }
        let t = traversal(5, false);
        let root = t.describe(Value::Sequence(root), &ty, ScalarStyle::Any);
        let err = t.traverse::<()>(&root, &mut Trace::default(), &mut (), &Cell::new(0)).unwrap_err();
        assert!(matches!(err, Error::RecursionLimitExceeded { limit: 5 }));
    }

    #[test]
    fn roundtrip_requires_default_constructor() {
        let class = ClassType::builder("demo.Sealed").no_default_constructor().build();
        let t = traversal(50, true);
        let root = t.describe(Value::Object(ObjectRef::new(&class)), &Type::Any, ScalarStyle::Any);
        let err = t.traverse::<()>(&root, &mut Trace::default(), &mut (), &Cell::new(0)).unwrap_err();
        assert!(matches!(err, Error::MissingDefaultConstructor { type_name } if type_name == "demo.Sealed"));
    }
}
