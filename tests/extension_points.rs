use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use indoc::indoc;
use saphyr_graph::de::{KeyValueTypeDiscriminator, UniqueKeyTypeDiscriminator};
use saphyr_graph::ser::{EmissionVisitor, ObjectGraphVisitor, stages};
use saphyr_graph::{
    ClassType, DefaultObjectFactory, Deserializer, Emitter, Error, ObjectFactory, ObjectRef,
    Position, SeqRef, Serializer, Type, TypeResolver, Value, ValueDescriptor, from_str,
};

/// Keeps the declared type whenever one is given, nullable wrapper included.
struct Declared;

impl TypeResolver for Declared {
    fn resolve(&self, static_type: &Type, value: &Value) -> Type {
        match static_type {
            Type::Any => value.runtime_type(),
            declared => declared.clone(),
        }
    }
}

fn holder() -> (Arc<ClassType>, Arc<ClassType>) {
    let inner = ClassType::builder("demo.Inner").field("x", Type::I32).build();
    let outer = ClassType::builder("demo.Outer")
        .field("first", Type::nullable(Type::Class(inner.clone())))
        .field("second", Type::nullable(Type::Class(inner.clone())))
        .build();
    (inner, outer)
}

#[test]
fn nullable_reference_members_are_written_as_their_class() -> anyhow::Result<()> {
    let (inner, outer) = holder();
    let shared = ObjectRef::new(&inner);
    shared.set("x", 7);
    let root = ObjectRef::new(&outer);
    root.set("first", shared.clone());
    root.set("second", shared);

    let ty = Type::Class(outer.clone());
    let serializer = Serializer::builder()
        .with_type_resolver(Arc::new(Declared))
        .build()?;
    let yaml = serializer.serialize_to_string(&Value::Object(root.clone()), &ty)?;
    assert_eq!(
        yaml,
        indoc! {"
            first: &o0
              x: 7
            second: *o0
        "}
    );

    let back = from_str(&yaml, &ty)?;
    let back = back.as_object().expect("object");
    let first = back.get("first").expect("member");
    assert!(first.same_instance(&back.get("second").expect("member")));
    assert_eq!(first.as_object().and_then(|o| o.get("x")), Some(Value::I32(7)));
    Ok(())
}

#[test]
fn absent_nullable_reference_reads_as_null() -> anyhow::Result<()> {
    let (_, outer) = holder();
    let value = from_str("first: ~\nsecond:\n  x: 1\n", &Type::Class(outer))?;
    let obj = value.as_object().expect("object");
    assert_eq!(obj.get("first"), Some(Value::Null));
    assert!(obj.get("second").is_some_and(|v| v.as_object().is_some()));
    Ok(())
}

/// Counts what reaches the stages below it.
struct Counting {
    next: Box<EmissionVisitor>,
    scalars: Arc<AtomicUsize>,
    sequences: Arc<AtomicUsize>,
}

impl ObjectGraphVisitor<dyn Emitter> for Counting {
    fn next_visitor(&mut self) -> Option<&mut dyn ObjectGraphVisitor<dyn Emitter>> {
        Some(self.next.as_mut())
    }

    fn visit_scalar(
        &mut self,
        scalar: &ValueDescriptor,
        context: &mut (dyn Emitter + 'static),
    ) -> Result<(), saphyr_graph::ser::Error> {
        self.scalars.fetch_add(1, Ordering::SeqCst);
        self.next.visit_scalar(scalar, context)
    }

    fn visit_sequence_start(
        &mut self,
        sequence: &ValueDescriptor,
        item_type: &Type,
        context: &mut (dyn Emitter + 'static),
    ) -> Result<(), saphyr_graph::ser::Error> {
        self.sequences.fetch_add(1, Ordering::SeqCst);
        self.next.visit_sequence_start(sequence, item_type, context)
    }
}

#[test]
fn stages_below_anchor_assignment_see_every_node() -> anyhow::Result<()> {
    let scalars = Arc::new(AtomicUsize::new(0));
    let sequences = Arc::new(AtomicUsize::new(0));
    let (s, q) = (scalars.clone(), sequences.clone());
    let serializer = Serializer::builder()
        .with_emission_visitor(
            Position::After(stages::ANCHOR_ASSIGNING),
            "counting",
            move |next, _| -> Box<EmissionVisitor> {
                Box::new(Counting {
                    next,
                    scalars: s.clone(),
                    sequences: q.clone(),
                })
            },
        )
        .build()?;

    let shared = Value::Sequence(SeqRef::with_items(
        Type::list(Type::I32),
        vec![1i32.into(), 2i32.into()],
    ));
    let outer = SeqRef::with_items(Type::list(Type::Any), vec![shared.clone(), shared]);
    let yaml = serializer.serialize_to_string(&Value::Sequence(outer), &Type::list(Type::Any))?;

    assert_eq!(yaml, "- &o0\n  - 1\n  - 2\n- *o0\n");
    assert_eq!(scalars.load(Ordering::SeqCst), 2);
    assert_eq!(sequences.load(Ordering::SeqCst), 2);
    Ok(())
}

struct Shapes {
    shape: Arc<ClassType>,
    circle: Arc<ClassType>,
    square: Arc<ClassType>,
    drawing: Arc<ClassType>,
}

fn shapes() -> Shapes {
    let shape = ClassType::abstract_type("geo.Shape");
    let circle = ClassType::builder("geo.Circle")
        .implements("geo.Shape")
        .field("kind", Type::String)
        .field("radius", Type::F64)
        .build();
    let square = ClassType::builder("geo.Square")
        .implements("geo.Shape")
        .field("kind", Type::String)
        .field("side", Type::F64)
        .build();
    let drawing = ClassType::builder("geo.Drawing")
        .field("shapes", Type::list(Type::Class(shape.clone())))
        .build();
    Shapes {
        shape,
        circle,
        square,
        drawing,
    }
}

fn class_names(drawing: &Value) -> Vec<String> {
    let shapes = drawing
        .as_object()
        .and_then(|o| o.get("shapes"))
        .expect("shapes");
    let seq = shapes.as_sequence().expect("sequence");
    (0..seq.len())
        .filter_map(|i| seq.get(i))
        .filter_map(|v| v.as_object().map(|o| o.class().name().to_owned()))
        .collect()
}

#[test]
fn key_value_discriminator_picks_the_subtype() -> anyhow::Result<()> {
    let s = shapes();
    let deserializer = Deserializer::builder()
        .with_type_discriminator(Arc::new(KeyValueTypeDiscriminator::new(
            Type::Class(s.shape.clone()),
            "kind",
            [
                ("circle", Type::Class(s.circle.clone())),
                ("square", Type::Class(s.square.clone())),
            ],
        )?))
        .build()?;

    let yaml = indoc! {"
        shapes:
          - radius: 2
            kind: circle
          - kind: square
            side: 3
    "};
    let drawing = deserializer.deserialize_str(yaml, &Type::Class(s.drawing.clone()))?;
    assert_eq!(class_names(&drawing), ["geo.Circle", "geo.Square"]);

    let err = deserializer
        .deserialize_str("shapes:\n  - kind: triangle\n", &Type::Class(s.drawing))
        .unwrap_err();
    assert!(matches!(err, Error::MissingDefaultConstructor { .. }), "{err}");
    Ok(())
}

#[test]
fn unique_key_discriminator_keeps_anchors() -> anyhow::Result<()> {
    let s = shapes();
    let deserializer = Deserializer::builder()
        .with_type_discriminator(Arc::new(UniqueKeyTypeDiscriminator::new(
            Type::Class(s.shape.clone()),
            [
                ("radius", Type::Class(s.circle.clone())),
                ("side", Type::Class(s.square.clone())),
            ],
        )?))
        .build()?;

    let yaml = indoc! {"
        shapes:
          - side: 1
          - &c
            radius: 4
          - *c
    "};
    let drawing = deserializer.deserialize_str(yaml, &Type::Class(s.drawing))?;
    assert_eq!(class_names(&drawing), ["geo.Square", "geo.Circle", "geo.Circle"]);
    Ok(())
}

/// Logs every lifecycle hook with the instance's `name`.
#[derive(Default)]
struct Journal {
    log: Mutex<Vec<String>>,
}

impl Journal {
    fn note(&self, hook: &str, object: &ObjectRef) {
        let name = match object.get("name") {
            Some(Value::String(name)) => name,
            _ => "-".to_owned(),
        };
        if let Ok(mut log) = self.log.lock() {
            log.push(format!("{hook} {name}"));
        }
    }

    fn take(&self) -> Vec<String> {
        self.log.lock().map(|mut l| std::mem::take(&mut *l)).unwrap_or_default()
    }
}

impl ObjectFactory for Journal {
    fn create(&self, ty: &Type) -> Result<Value, Error> {
        DefaultObjectFactory.create(ty)
    }

    fn on_deserializing(&self, object: &ObjectRef) {
        self.note("deserializing", object);
    }

    fn on_deserialized(&self, object: &ObjectRef) {
        self.note("deserialized", object);
    }

    fn on_serializing(&self, object: &ObjectRef) {
        self.note("serializing", object);
    }

    fn on_serialized(&self, object: &ObjectRef) {
        self.note("serialized", object);
    }
}

#[test]
fn lifecycle_hooks_run_once_per_instance() -> anyhow::Result<()> {
    let node = ClassType::builder("demo.Node")
        .field("name", Type::String)
        .field("next", Type::Any)
        .build();
    let a = ObjectRef::new(&node);
    let b = ObjectRef::new(&node);
    a.set("name", "a");
    a.set("next", b.clone());
    b.set("name", "b");
    b.set("next", a.clone());
    let ty = Type::Class(node.clone());

    let journal = Arc::new(Journal::default());
    let yaml = Serializer::builder()
        .with_object_factory(journal.clone())
        .build()?
        .serialize_to_string(&Value::Object(a), &ty)?;
    assert_eq!(journal.take(), ["serializing a", "serializing b", "serialized b", "serialized a"]);

    Deserializer::builder()
        .with_class_tag(&node)
        .with_object_factory(journal.clone())
        .build()?
        .deserialize_str(&yaml, &ty)?;
    assert_eq!(
        journal.take(),
        ["deserializing -", "deserializing -", "deserialized b", "deserialized a"]
    );
    Ok(())
}
