//! Type descriptors for the object graph.
//!
//! Rust has no runtime reflection, so every graph handed to the serializer is
//! described by an explicit [`Type`]. Classes and enums are shared through `Arc`
//! so a type inspector may cache them across threads.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::converter::YamlConvertible;
use crate::events::ScalarStyle;
use crate::serializer_options::DefaultValuesHandling;
use crate::value::Value;

/// Declared or runtime type of a value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    /// Fully open type ("object"): anything may be stored here.
    Any,
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Decimal,
    Char,
    String,
    /// Raw bytes, emitted as `!!binary`.
    Bytes,
    Timestamp,
    Enum(Arc<EnumType>),
    /// Value type that may additionally hold null.
    Nullable(Box<Type>),
    /// Fixed-shape array.
    Array(Box<Type>),
    /// Growable, appendable collection.
    List(Box<Type>),
    /// Keyed collection.
    Map(Box<Type>, Box<Type>),
    Class(Arc<ClassType>),
}

impl Type {
    pub fn nullable(inner: Type) -> Type {
        Type::Nullable(Box::new(inner))
    }

    pub fn list(item: Type) -> Type {
        Type::List(Box::new(item))
    }

    pub fn array(item: Type) -> Type {
        Type::Array(Box::new(item))
    }

    pub fn map(key: Type, value: Type) -> Type {
        Type::Map(Box::new(key), Box::new(value))
    }

    /// Fully-qualified, human readable type name.
    pub fn name(&self) -> String {
        match self {
            Type::Any => "any".into(),
            Type::Bool => "bool".into(),
            Type::I8 => "i8".into(),
            Type::I16 => "i16".into(),
            Type::I32 => "i32".into(),
            Type::I64 => "i64".into(),
            Type::U8 => "u8".into(),
            Type::U16 => "u16".into(),
            Type::U32 => "u32".into(),
            Type::U64 => "u64".into(),
            Type::F32 => "f32".into(),
            Type::F64 => "f64".into(),
            Type::Decimal => "decimal".into(),
            Type::Char => "char".into(),
            Type::String => "string".into(),
            Type::Bytes => "bytes".into(),
            Type::Timestamp => "timestamp".into(),
            Type::Enum(e) => e.name.clone(),
            Type::Nullable(inner) => format!("nullable<{}>", inner.name()),
            Type::Array(item) => format!("array<{}>", item.name()),
            Type::List(item) => format!("list<{}>", item.name()),
            Type::Map(k, v) => format!("map<{}, {}>", k.name(), v.name()),
            Type::Class(c) => c.name.clone(),
        }
    }

    /// Scalar-like types: primitives, strings, dates and enums.
    pub fn is_scalar(&self) -> bool {
        match self {
            Type::Any
            | Type::Array(_)
            | Type::List(_)
            | Type::Map(_, _)
            | Type::Class(_) => false,
            Type::Nullable(inner) => inner.is_scalar(),
            _ => true,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Type::I8
                | Type::I16
                | Type::I32
                | Type::I64
                | Type::U8
                | Type::U16
                | Type::U32
                | Type::U64
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Type::F32 | Type::F64 | Type::Decimal)
    }

    /// True if null is a legal value of this type.
    pub fn accepts_null(&self) -> bool {
        matches!(
            self,
            Type::Any
                | Type::Nullable(_)
                | Type::String
                | Type::Bytes
                | Type::Array(_)
                | Type::List(_)
                | Type::Map(_, _)
                | Type::Class(_)
        )
    }

    /// Strip one `Nullable` wrapper if present.
    pub fn unwrap_nullable(&self) -> &Type {
        match self {
            Type::Nullable(inner) => inner,
            other => other,
        }
    }

    /// Element type of array and list types.
    pub fn item_type(&self) -> Option<&Type> {
        match self.unwrap_nullable() {
            Type::Array(item) | Type::List(item) => Some(item),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&Arc<ClassType>> {
        match self.unwrap_nullable() {
            Type::Class(c) => Some(c),
            _ => None,
        }
    }

    /// Abstract classes and `Any` cannot be instantiated without more information.
    pub fn is_open(&self) -> bool {
        match self.unwrap_nullable() {
            Type::Any => true,
            Type::Class(c) => c.is_abstract,
            _ => false,
        }
    }

    /// Default value of the type: zero for value types, null for reference types.
    pub fn default_value(&self) -> Value {
        match self {
            Type::Bool => Value::Bool(false),
            Type::I8 => Value::I8(0),
            Type::I16 => Value::I16(0),
            Type::I32 => Value::I32(0),
            Type::I64 => Value::I64(0),
            Type::U8 => Value::U8(0),
            Type::U16 => Value::U16(0),
            Type::U32 => Value::U32(0),
            Type::U64 => Value::U64(0),
            Type::F32 => Value::F32(0.0),
            Type::F64 => Value::F64(0.0),
            Type::Decimal => Value::Decimal(rust_decimal::Decimal::ZERO),
            Type::Char => Value::Char('\0'),
            Type::Timestamp => Value::Timestamp(chrono::DateTime::<chrono::Utc>::default().into()),
            Type::Enum(e) => Value::Enum(crate::value::EnumValue::new(e.clone(), 0)),
            Type::Any
            | Type::String
            | Type::Bytes
            | Type::Nullable(_)
            | Type::Array(_)
            | Type::List(_)
            | Type::Map(_, _)
            | Type::Class(_) => Value::Null,
        }
    }

    /// Can a value of type `other` be stored where `self` is declared?
    pub fn is_assignable_from(&self, other: &Type) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (Type::Any, _) => true,
            (Type::Nullable(inner), Type::Nullable(other)) => inner.is_assignable_from(other),
            (Type::Nullable(inner), other) => inner.is_assignable_from(other),
            (Type::Array(a) | Type::List(a), Type::Array(b) | Type::List(b)) => {
                a.is_assignable_from(b)
            }
            (Type::Map(k1, v1), Type::Map(k2, v2)) => {
                k1.is_assignable_from(k2) && v1.is_assignable_from(v2)
            }
            (Type::Class(base), Type::Class(derived)) => derived.implements(&base.name),
            _ => false,
        }
    }

    /// Can `value` be stored where `self` is declared?
    pub fn accepts_value(&self, value: &Value) -> bool {
        if value.is_null() {
            return self.accepts_null();
        }
        self.is_assignable_from(&value.runtime_type())
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Closed set of named values, serialized by name.
#[derive(Debug)]
pub struct EnumType {
    pub(crate) name: String,
    pub(crate) variants: Vec<String>,
}

impl EnumType {
    pub fn new<S: Into<String>>(name: S, variants: &[&str]) -> Arc<EnumType> {
        Arc::new(EnumType {
            name: name.into(),
            variants: variants.iter().map(|v| v.to_string()).collect(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    /// Index of the variant named `name`. Enum parsing ignores ASCII case.
    pub fn variant_index(&self, name: &str) -> Option<usize> {
        self.variants
            .iter()
            .position(|v| v == name)
            .or_else(|| self.variants.iter().position(|v| v.eq_ignore_ascii_case(name)))
    }
}

impl PartialEq for EnumType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for EnumType {}

impl Hash for EnumType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// Factory producing the declared default value of a member.
pub type DefaultFactory = Arc<dyn Fn() -> Value + Send + Sync>;

/// Declaration of one serializable member of a class.
#[derive(Clone)]
pub struct MemberDef {
    pub(crate) name: String,
    pub(crate) alias: Option<String>,
    pub(crate) ty: Type,
    pub(crate) can_write: bool,
    pub(crate) order: i32,
    pub(crate) default: Option<DefaultFactory>,
    pub(crate) scalar_style: ScalarStyle,
    pub(crate) default_values: Option<DefaultValuesHandling>,
    pub(crate) description: Option<String>,
}

impl MemberDef {
    pub fn new<S: Into<String>>(name: S, ty: Type) -> Self {
        Self {
            name: name.into(),
            alias: None,
            ty,
            can_write: true,
            order: 0,
            default: None,
            scalar_style: ScalarStyle::Any,
            default_values: None,
            description: None,
        }
    }

    /// Name used in YAML instead of the member name.
    pub fn alias<S: Into<String>>(mut self, alias: S) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn read_only(mut self) -> Self {
        self.can_write = false;
        self
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Declared default, also used to initialize freshly created instances.
    pub fn default_with<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(Arc::new(factory));
        self
    }

    pub fn scalar_style(mut self, style: ScalarStyle) -> Self {
        self.scalar_style = style;
        self
    }

    /// Per-member override of the serializer-wide default values handling.
    pub fn default_values(mut self, handling: DefaultValuesHandling) -> Self {
        self.default_values = Some(handling);
        self
    }

    pub fn description<S: Into<String>>(mut self, text: S) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// Declared default, or the zero/null default of the member type.
    pub fn default_value(&self) -> Value {
        match &self.default {
            Some(factory) => factory(),
            None => self.ty.default_value(),
        }
    }
}

impl fmt::Debug for MemberDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberDef")
            .field("name", &self.name)
            .field("alias", &self.alias)
            .field("ty", &self.ty.name())
            .field("can_write", &self.can_write)
            .field("order", &self.order)
            .finish()
    }
}

/// User-defined class: a named record of members.
pub struct ClassType {
    pub(crate) name: String,
    pub(crate) members: Vec<MemberDef>,
    pub(crate) has_default_constructor: bool,
    pub(crate) is_abstract: bool,
    pub(crate) implements: Vec<String>,
    pub(crate) convertible: Option<Arc<dyn YamlConvertible>>,
}

impl ClassType {
    pub fn builder<S: Into<String>>(name: S) -> ClassTypeBuilder {
        ClassTypeBuilder {
            class: ClassType {
                name: name.into(),
                members: Vec::new(),
                has_default_constructor: true,
                is_abstract: false,
                implements: Vec::new(),
                convertible: None,
            },
        }
    }

    /// Abstract type (interface or base class) with no members of its own.
    pub fn abstract_type<S: Into<String>>(name: S) -> Arc<ClassType> {
        Arc::new(ClassType {
            name: name.into(),
            members: Vec::new(),
            has_default_constructor: false,
            is_abstract: true,
            implements: Vec::new(),
            convertible: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[MemberDef] {
        &self.members
    }

    pub fn member_index(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|m| m.name == name)
    }

    pub fn has_default_constructor(&self) -> bool {
        self.has_default_constructor && !self.is_abstract
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn convertible(&self) -> Option<&Arc<dyn YamlConvertible>> {
        self.convertible.as_ref()
    }

    /// True if this class is `name` or declares that it implements `name`.
    pub fn implements(&self, name: &str) -> bool {
        self.name == name || self.implements.iter().any(|i| i == name)
    }
}

impl PartialEq for ClassType {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for ClassType {}

impl Hash for ClassType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Debug for ClassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassType")
            .field("name", &self.name)
            .field("members", &self.members)
            .field("has_default_constructor", &self.has_default_constructor)
            .field("is_abstract", &self.is_abstract)
            .finish()
    }
}

/// Builder for [`ClassType`].
pub struct ClassTypeBuilder {
    class: ClassType,
}

impl ClassTypeBuilder {
    pub fn member(mut self, member: MemberDef) -> Self {
        self.class.members.push(member);
        self
    }

    /// Shorthand for a plain member of the given type.
    pub fn field<S: Into<String>>(self, name: S, ty: Type) -> Self {
        self.member(MemberDef::new(name, ty))
    }

    /// The class can only be created through a converter or a self-describing hook.
    pub fn no_default_constructor(mut self) -> Self {
        self.class.has_default_constructor = false;
        self
    }

    pub fn implements<S: Into<String>>(mut self, name: S) -> Self {
        self.class.implements.push(name.into());
        self
    }

    pub fn convertible(mut self, hook: Arc<dyn YamlConvertible>) -> Self {
        self.class.convertible = Some(hook);
        self
    }

    pub fn build(self) -> Arc<ClassType> {
        Arc::new(self.class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_structural() {
        let t = Type::map(Type::String, Type::list(Type::nullable(Type::I32)));
        assert_eq!(t.name(), "map<string, list<nullable<i32>>>");
    }

    #[test]
    fn class_assignability_follows_implements() {
        let animal = ClassType::abstract_type("zoo.Animal");
        let dog = ClassType::builder("zoo.Dog").implements("zoo.Animal").build();
        let cat = ClassType::builder("zoo.Cat").build();
        assert!(Type::Class(animal.clone()).is_assignable_from(&Type::Class(dog)));
        assert!(!Type::Class(animal).is_assignable_from(&Type::Class(cat)));
    }

    #[test]
    fn value_types_default_to_zero_reference_types_to_null() {
        assert_eq!(Type::I32.default_value(), Value::I32(0));
        assert!(Type::String.default_value().is_null());
        assert!(Type::nullable(Type::I32).default_value().is_null());
    }

    #[test]
    fn enum_lookup_ignores_case() {
        let color = EnumType::new("paint.Color", &["Red", "Green"]);
        assert_eq!(color.variant_index("green"), Some(1));
        assert_eq!(color.variant_index("Blue"), None);
    }
}
