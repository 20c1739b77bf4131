use std::sync::Arc;

use indoc::indoc;
use saphyr_graph::{
    ClassType, Deserializer, Emitter, Error, Ev, EventRecorder, Location, ObjectRef, SeqRef,
    SerializerOptions, Type, Value, from_events, from_str, to_events, to_string,
};

fn node_class() -> Arc<ClassType> {
    ClassType::builder("demo.Node")
        .field("name", Type::String)
        .field("next", Type::Any)
        .build()
}

#[test]
fn aliased_values_share_one_instance() -> anyhow::Result<()> {
    let yaml = indoc! {"
        a: &anchor1 [1, 2, 3]
        b: *anchor1
    "};
    let value = from_str(yaml, &Type::map(Type::String, Type::Any))?;
    let map = value.as_mapping().expect("mapping");
    let a = map.get("a").expect("a");
    let b = map.get("b").expect("b");
    assert!(a.same_instance(&b));
    assert_eq!(a.as_sequence().map(SeqRef::len), Some(3));
    Ok(())
}

#[test]
fn shared_list_is_expanded_once() -> anyhow::Result<()> {
    let shared = Value::Sequence(SeqRef::with_items(
        Type::list(Type::I32),
        vec![1i32.into(), 2i32.into()],
    ));
    let outer = SeqRef::with_items(
        Type::list(Type::Any),
        vec![shared.clone(), shared.clone(), shared],
    );
    let yaml = to_string(&Value::Sequence(outer), &Type::list(Type::Any))?;
    assert_eq!(
        yaml,
        indoc! {"
            - &o0
              - 1
              - 2
            - *o0
            - *o0
        "}
    );
    assert_eq!(yaml.matches('&').count(), 1);
    assert_eq!(yaml.matches("*o0").count(), 2);
    Ok(())
}

#[test]
fn equal_but_distinct_values_are_not_aliased() -> anyhow::Result<()> {
    let make = || {
        Value::Sequence(SeqRef::with_items(
            Type::list(Type::I32),
            vec![1i32.into()],
        ))
    };
    let outer = SeqRef::with_items(Type::list(Type::Any), vec![make(), make()]);
    let yaml = to_string(&Value::Sequence(outer), &Type::list(Type::Any))?;
    assert!(!yaml.contains('&'), "unexpected anchor in:\n{yaml}");
    Ok(())
}

#[test]
fn cycle_survives_a_roundtrip() -> anyhow::Result<()> {
    let node = node_class();
    let a = ObjectRef::new(&node);
    let b = ObjectRef::new(&node);
    a.set("name", "a");
    a.set("next", b.clone());
    b.set("name", "b");
    b.set("next", a.clone());

    let ty = Type::Class(node.clone());
    let yaml = to_string(&Value::Object(a), &ty)?;
    assert_eq!(
        yaml,
        indoc! {"
            &o0
            name: a
            next: !demo.Node
              name: b
              next: *o0
        "}
    );

    let deserializer = Deserializer::builder().with_class_tag(&node).build()?;
    let back = deserializer.deserialize_str(&yaml, &ty)?;
    let first = back.as_object().expect("object");
    let second = first.get("next").expect("next");
    let third = second.as_object().expect("object").get("next").expect("next");
    assert!(third.same_instance(&back));
    assert_eq!(
        second.as_object().and_then(|o| o.get("name")),
        Some(Value::from("b"))
    );
    Ok(())
}

#[test]
fn recorded_events_replay_into_the_same_shape() -> anyhow::Result<()> {
    let node = node_class();
    let a = ObjectRef::new(&node);
    let b = ObjectRef::new(&node);
    a.set("name", "a");
    a.set("next", b.clone());
    b.set("name", "b");
    b.set("next", a.clone());
    let pair = SeqRef::with_items(
        Type::list(Type::Any),
        vec![Value::Object(a), Value::Object(b)],
    );
    let ty = Type::list(Type::Any);

    let mut recorder = EventRecorder::new();
    for event in to_events(&Value::Sequence(pair), &ty, SerializerOptions::default())? {
        recorder.emit(event)?;
    }
    let back = Deserializer::builder()
        .with_class_tag(&node)
        .build()?
        .deserialize(&mut recorder.into_replay(), &ty)?;

    let items = back.as_sequence().expect("sequence");
    let (first, second) = (items.get(0).expect("a"), items.get(1).expect("b"));
    let next_of = |v: &Value| v.as_object().and_then(|o| o.get("next")).expect("next");
    assert!(next_of(&first).same_instance(&second));
    assert!(next_of(&second).same_instance(&first));
    assert_eq!(
        second.as_object().and_then(|o| o.get("name")),
        Some(Value::from("b"))
    );
    Ok(())
}

#[test]
fn alias_before_its_anchor_is_fatal() {
    let yaml = indoc! {"
        a: *later
        b: &later 1
    "};
    let err = from_str(yaml, &Type::map(Type::String, Type::Any)).unwrap_err();
    match &err {
        Error::UnknownAnchor { name, .. } => assert_eq!(name.as_deref(), Some("later")),
        other => panic!("expected an unknown anchor, got {other:?}"),
    }
    assert_eq!(err.location().map(|l| l.column()), Some(4));
    assert!(err.to_string().contains("`later`"), "{err}");
}

#[test]
fn undefined_alias_in_flow_sequence() {
    let err = from_str("[1, *nowhere]\n", &Type::list(Type::Any)).unwrap_err();
    assert!(
        matches!(&err, Error::UnknownAnchor { anchor: 0, name: Some(n), .. } if n == "nowhere"),
        "{err}"
    );
}

#[test]
fn unresolved_alias_in_recorded_events() {
    let at = Location::new(4, 3);
    let events = vec![
        Ev::SeqStart {
            anchor: 0,
            tag: None,
            location: Location::new(1, 1),
        },
        Ev::Alias { id: 7, location: at },
        Ev::SeqEnd {
            location: Location::new(4, 5),
        },
    ];
    let err = from_events(events, &Type::list(Type::Any)).unwrap_err();
    assert!(matches!(err, Error::UnknownAnchor { anchor: 7, .. }), "{err}");
    assert_eq!(err.location(), Some(at));
}

#[test]
fn alias_must_fit_the_expected_type() {
    let yaml = indoc! {"
        text: &t hello
        number: *t
    "};
    let class = ClassType::builder("demo.Pair")
        .field("text", Type::String)
        .field("number", Type::I32)
        .build();
    let err = from_str(yaml, &Type::Class(class)).unwrap_err();
    assert!(matches!(err, Error::Conversion { .. }), "{err}");
}

#[test]
fn anchors_do_not_leak_between_documents() {
    assert!(saphyr_graph::from_multiple("--- &a 1\n--- *a\n", &Type::I32).is_err());
}

#[test]
fn deep_nesting_hits_the_depth_limit() {
    let deep = format!("{}1{}", "[".repeat(100), "]".repeat(100));
    let err = from_str(&deep, &Type::Any).unwrap_err();
    assert!(matches!(err, Error::RecursionLimitExceeded { limit: 50, .. }), "{err}");

    let shallow = format!("{}1{}", "[".repeat(10), "]".repeat(10));
    assert!(from_str(&shallow, &Type::Any).is_ok());
}

#[test]
fn deep_graphs_fail_to_serialize_with_or_without_aliases() {
    let mut value = Value::I32(1);
    for _ in 0..100 {
        value = Value::Sequence(SeqRef::with_items(Type::list(Type::Any), vec![value]));
    }
    let err = to_string(&value, &Type::Any).unwrap_err();
    assert!(matches!(err, saphyr_graph::ser::Error::RecursionLimitExceeded { limit: 50 }));

    let options = saphyr_graph::serializer_options! { aliases: false };
    let err = saphyr_graph::to_string_with_options(&value, &Type::Any, options).unwrap_err();
    assert!(matches!(err, saphyr_graph::ser::Error::RecursionLimitExceeded { .. }));
}

#[test]
fn cycles_without_aliases_are_bounded() {
    let node = node_class();
    let a = ObjectRef::new(&node);
    a.set("next", a.clone());
    let options = saphyr_graph::serializer_options! { aliases: false };
    let err = saphyr_graph::to_string_with_options(&Value::Object(a), &Type::Class(node), options)
        .unwrap_err();
    assert!(matches!(err, saphyr_graph::ser::Error::RecursionLimitExceeded { .. }));
}
