use std::sync::Arc;

use chrono::{FixedOffset, TimeZone};
use indoc::indoc;
use saphyr_graph::{
    ClassType, DateTimeConverter, Deserializer, Error, Ev, Event, ObjectRef, ScalarStyle,
    Serializer, Type, TypeConverter, Value, ValueReader, ValueWriter, YamlConvertible, from_str,
    to_string,
};

struct Zoo {
    animal: Arc<ClassType>,
    dog: Arc<ClassType>,
    zoo: Arc<ClassType>,
}

fn zoo() -> Zoo {
    let animal = ClassType::abstract_type("zoo.Animal");
    let dog = ClassType::builder("zoo.Dog")
        .implements("zoo.Animal")
        .field("name", Type::String)
        .build();
    let zoo = ClassType::builder("zoo.Zoo")
        .field("pet", Type::Class(animal.clone()))
        .build();
    Zoo { animal, dog, zoo }
}

#[test]
fn polymorphic_member_is_tagged_and_read_back() -> anyhow::Result<()> {
    let z = zoo();
    let rex = ObjectRef::new(&z.dog);
    rex.set("name", "rex");
    let root = ObjectRef::new(&z.zoo);
    root.set("pet", rex);

    let ty = Type::Class(z.zoo.clone());
    let yaml = to_string(&Value::Object(root.clone()), &ty)?;
    assert_eq!(
        yaml,
        indoc! {"
            pet: !zoo.Dog
              name: rex
        "}
    );

    let deserializer = Deserializer::builder().with_class_tag(&z.dog).build()?;
    let back = deserializer.deserialize_str(&yaml, &ty)?;
    assert_eq!(back, Value::Object(root));
    Ok(())
}

#[test]
fn abstract_member_needs_a_tag_or_a_mapping() -> anyhow::Result<()> {
    let z = zoo();
    let ty = Type::Class(z.zoo.clone());
    let yaml = "pet:\n  name: rex\n";

    let err = from_str(yaml, &ty).unwrap_err();
    assert!(matches!(err, Error::MissingDefaultConstructor { .. }), "{err}");

    let deserializer = Deserializer::builder()
        .with_type_mapping(Type::Class(z.animal.clone()), Type::Class(z.dog.clone()))
        .build()?;
    let value = deserializer.deserialize_str(yaml, &ty)?;
    let pet = value.as_object().and_then(|o| o.get("pet")).expect("pet");
    assert_eq!(pet.as_object().map(|o| o.class()), Some(z.dog));
    Ok(())
}

#[test]
fn tag_must_fit_the_declared_type() -> anyhow::Result<()> {
    let z = zoo();
    let plant = ClassType::builder("garden.Plant").build();
    let kennel = ClassType::builder("zoo.Kennel")
        .field("dog", Type::Class(z.dog.clone()))
        .build();
    let deserializer = Deserializer::builder()
        .with_class_tag(&plant)
        .with_class_tag(&z.dog)
        .build()?;

    let err = deserializer
        .deserialize_str("pet: !garden.Plant {}\n", &Type::Class(z.zoo))
        .unwrap_err();
    assert!(matches!(err, Error::Conversion { .. }), "{err}");

    let err = deserializer
        .deserialize_str("dog: !garden.Plant {}\n", &Type::Class(kennel.clone()))
        .unwrap_err();
    assert!(matches!(err, Error::Conversion { .. }), "{err}");
    assert_eq!(err.location().map(|l| l.line()), Some(1));

    let tagged = deserializer.deserialize_str("dog: !zoo.Dog {name: rex}\n", &Type::Class(kennel))?;
    assert!(tagged.as_object().and_then(|o| o.get("dog")).is_some_and(|d| !d.is_null()));
    Ok(())
}

#[test]
fn unknown_tags_only_fail_when_strict() -> anyhow::Result<()> {
    let yaml = "!mystery {a: 1}\n";
    let lenient = from_str(yaml, &Type::Any)?;
    assert!(lenient.as_mapping().is_some());

    let strict = saphyr_graph::options! { strict_tags: true };
    let err = saphyr_graph::from_str_with_options(yaml, &Type::Any, strict).unwrap_err();
    assert!(matches!(err, Error::UnknownTag { ref tag, .. } if tag == "!mystery"), "{err}");
    Ok(())
}

#[test]
fn core_tags_pick_the_type_of_open_values() -> anyhow::Result<()> {
    let value = from_str("[!!str 12, !!int '7', !!float 1]", &Type::list(Type::Any))?;
    assert_eq!(
        value.as_sequence().expect("sequence").items(),
        [Value::from("12"), Value::I64(7), Value::F64(1.0)]
    );
    Ok(())
}

/// `geo.Point` written as a single `x,y` scalar.
struct PointConverter;

impl TypeConverter for PointConverter {
    fn accepts(&self, ty: &Type) -> bool {
        ty.as_class().is_some_and(|c| c.name() == "geo.Point")
    }

    fn read_yaml(&self, ty: &Type, reader: &mut dyn ValueReader) -> Result<Value, Error> {
        let Some(Ev::Scalar { value, .. }) = reader.events().next()? else {
            return Err(Error::Message {
                msg: "expected a point".into(),
                location: saphyr_graph::Location::UNKNOWN,
            });
        };
        let class = ty.as_class().expect("accepted type is a class");
        let point = ObjectRef::new(class);
        for (name, part) in ["x", "y"].into_iter().zip(value.split(',')) {
            let coordinate: i32 = part.trim().parse().map_err(|_| Error::Message {
                msg: format!("bad coordinate `{part}`"),
                location: saphyr_graph::Location::UNKNOWN,
            })?;
            point.set(name, coordinate);
        }
        Ok(Value::Object(point))
    }

    fn write_yaml(
        &self,
        value: &Value,
        _ty: &Type,
        writer: &mut dyn ValueWriter,
    ) -> Result<(), saphyr_graph::ser::Error> {
        let point = value.as_object().ok_or("not a point")?;
        let text = format!(
            "{},{}",
            point.get("x").unwrap_or(Value::Null).as_i128().unwrap_or_default(),
            point.get("y").unwrap_or(Value::Null).as_i128().unwrap_or_default()
        );
        writer.emit(Event::Scalar {
            anchor: None,
            tag: None,
            value: text,
            style: ScalarStyle::Plain,
            plain_implicit: true,
            quoted_implicit: true,
        })
    }
}

#[test]
fn type_converter_owns_both_directions() -> anyhow::Result<()> {
    let point = ClassType::builder("geo.Point")
        .field("x", Type::I32)
        .field("y", Type::I32)
        .build();
    let line = ClassType::builder("geo.Line")
        .field("from", Type::Class(point.clone()))
        .field("to", Type::Class(point.clone()))
        .build();

    let from = ObjectRef::new(&point);
    from.set("x", 1);
    from.set("y", 2);
    let to = ObjectRef::new(&point);
    to.set("x", 3);
    to.set("y", 4);
    let value = ObjectRef::new(&line);
    value.set("from", from);
    value.set("to", to);

    let ty = Type::Class(line);
    let serializer = Serializer::builder()
        .with_type_converter(Arc::new(PointConverter))
        .build()?;
    let yaml = serializer.serialize_to_string(&Value::Object(value.clone()), &ty)?;
    assert_eq!(yaml, "from: 1,2\nto: 3,4\n");

    let deserializer = Deserializer::builder()
        .with_type_converter(Arc::new(PointConverter))
        .build()?;
    let back = deserializer.deserialize_str(&yaml, &ty)?;
    assert_eq!(back, Value::Object(value));
    Ok(())
}

/// Temperatures written as `21.5C`.
struct Celsius;

impl YamlConvertible for Celsius {
    fn read(&self, target: &ObjectRef, reader: &mut dyn ValueReader) -> Result<(), Error> {
        let text = match reader.deserialize(&Type::String)? {
            Value::String(text) => text,
            other => format!("{other:?}"),
        };
        let degrees: f64 = text.trim_end_matches('C').parse().map_err(|_| Error::Message {
            msg: format!("bad temperature `{text}`"),
            location: saphyr_graph::Location::UNKNOWN,
        })?;
        target.set("degrees", degrees);
        Ok(())
    }

    fn write(
        &self,
        source: &ObjectRef,
        writer: &mut dyn ValueWriter,
    ) -> Result<(), saphyr_graph::ser::Error> {
        let degrees = source.get("degrees").and_then(|v| v.as_f64()).unwrap_or_default();
        writer.serialize(&Value::String(format!("{degrees}C")), &Type::String)
    }
}

#[test]
fn self_describing_class_reads_into_a_fresh_instance() -> anyhow::Result<()> {
    let temperature = ClassType::builder("weather.Temperature")
        .field("degrees", Type::F64)
        .convertible(Arc::new(Celsius))
        .build();
    let ty = Type::list(Type::Class(temperature.clone()));

    let value = from_str("[21.5C, -3C]", &ty)?;
    let items = value.as_sequence().expect("sequence").items();
    assert_eq!(items[0].as_object().and_then(|o| o.get("degrees")), Some(Value::F64(21.5)));
    assert_eq!(items[1].as_object().and_then(|o| o.get("degrees")), Some(Value::F64(-3.0)));

    let yaml = to_string(&value, &ty)?;
    assert_eq!(yaml, "- 21.5C\n- -3C\n");
    Ok(())
}

#[test]
fn datetime_converter_uses_custom_formats() -> anyhow::Result<()> {
    let converter = Arc::new(DateTimeConverter::new(["%d/%m/%Y %H:%M %z"]));
    let when = FixedOffset::east_opt(3600)
        .and_then(|tz| tz.with_ymd_and_hms(2001, 12, 14, 21, 59, 0).single())
        .expect("valid date");
    let ty = Type::map(Type::String, Type::Timestamp);
    let map = saphyr_graph::MapRef::new(ty.clone());
    map.insert("when", when);

    let serializer = Serializer::builder().with_type_converter(converter.clone()).build()?;
    let yaml = serializer.serialize_to_string(&Value::Mapping(map.clone()), &ty)?;
    assert!(yaml.contains("14/12/2001 21:59 +0100"), "{yaml}");

    let deserializer = Deserializer::builder().with_type_converter(converter).build()?;
    let back = deserializer.deserialize_str(&yaml, &ty)?;
    assert_eq!(back, Value::Mapping(map));
    Ok(())
}
