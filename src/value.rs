//! In-memory object graph.
//!
//! Scalars are stored inline. Objects, sequences and mappings are shared
//! handles so the same instance can be reachable from several places (and from
//! itself). Reference identity is what anchors and aliases preserve.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use ahash::AHashMap;
use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;

use crate::types::{ClassType, EnumType, Type};

/// A value of the object graph.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    Char(char),
    String(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<FixedOffset>),
    Enum(EnumValue),
    Object(ObjectRef),
    Sequence(SeqRef),
    Mapping(MapRef),
}

impl Value {
    pub fn string<S: Into<String>>(s: S) -> Value {
        Value::String(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Runtime type of the value. Null has no type of its own and reports `Any`.
    pub fn runtime_type(&self) -> Type {
        match self {
            Value::Null => Type::Any,
            Value::Bool(_) => Type::Bool,
            Value::I8(_) => Type::I8,
            Value::I16(_) => Type::I16,
            Value::I32(_) => Type::I32,
            Value::I64(_) => Type::I64,
            Value::U8(_) => Type::U8,
            Value::U16(_) => Type::U16,
            Value::U32(_) => Type::U32,
            Value::U64(_) => Type::U64,
            Value::F32(_) => Type::F32,
            Value::F64(_) => Type::F64,
            Value::Decimal(_) => Type::Decimal,
            Value::Char(_) => Type::Char,
            Value::String(_) => Type::String,
            Value::Bytes(_) => Type::Bytes,
            Value::Timestamp(_) => Type::Timestamp,
            Value::Enum(e) => Type::Enum(e.ty.clone()),
            Value::Object(o) => Type::Class(o.class()),
            Value::Sequence(s) => s.borrow().ty.clone(),
            Value::Mapping(m) => m.borrow().ty.clone(),
        }
    }

    /// Identity of reference values; scalars have none.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::Object(o) => Some(Rc::as_ptr(&o.0) as *const () as usize),
            Value::Sequence(s) => Some(Rc::as_ptr(&s.0) as *const () as usize),
            Value::Mapping(m) => Some(Rc::as_ptr(&m.0) as *const () as usize),
            _ => None,
        }
    }

    /// True if both values are the very same reference instance.
    pub fn same_instance(&self, other: &Value) -> bool {
        match (self.identity(), other.identity()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Any integer variant widened to i128.
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            Value::I8(v) => Some(v as i128),
            Value::I16(v) => Some(v as i128),
            Value::I32(v) => Some(v as i128),
            Value::I64(v) => Some(v as i128),
            Value::U8(v) => Some(v as i128),
            Value::U16(v) => Some(v as i128),
            Value::U32(v) => Some(v as i128),
            Value::U64(v) => Some(v as i128),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::F32(v) => Some(v as f64),
            Value::F64(v) => Some(v),
            _ => self.as_i128().map(|v| v as f64),
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&SeqRef> {
        match self {
            Value::Sequence(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&MapRef> {
        match self {
            Value::Mapping(m) => Some(m),
            _ => None,
        }
    }

    /// Hashable identity of a mapping key.
    pub(crate) fn fingerprint(&self) -> KeyFingerprint {
        match self {
            Value::Null => KeyFingerprint::Null,
            Value::Bool(b) => KeyFingerprint::Bool(*b),
            Value::F32(f) => KeyFingerprint::Float((*f as f64).to_bits()),
            Value::F64(f) => KeyFingerprint::Float(f.to_bits()),
            Value::Decimal(d) => KeyFingerprint::Decimal(d.normalize()),
            Value::Char(c) => KeyFingerprint::Str(c.to_string()),
            Value::String(s) => KeyFingerprint::Str(s.clone()),
            Value::Bytes(b) => KeyFingerprint::Bytes(b.clone()),
            Value::Timestamp(t) => KeyFingerprint::Timestamp(*t),
            Value::Enum(e) => KeyFingerprint::Str(e.name().to_owned()),
            Value::Object(_) | Value::Sequence(_) | Value::Mapping(_) => {
                KeyFingerprint::Ref(self.identity().unwrap_or_default())
            }
            other => KeyFingerprint::Int(other.as_i128().unwrap_or_default()),
        }
    }

    /// Values equal to the default of their declared type.
    pub fn is_default_of(&self, ty: &Type) -> bool {
        self == &ty.default_value()
    }

    /// Empty sequence or mapping.
    pub fn is_empty_collection(&self) -> bool {
        match self {
            Value::Sequence(s) => s.borrow().items.is_empty(),
            Value::Mapping(m) => m.borrow().is_empty(),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    /// Structural equality. Two references to one instance are equal without
    /// looking inside, which keeps comparisons of cyclic graphs finite as long
    /// as both sides share the cycle.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I8(a), Value::I8(b)) => a == b,
            (Value::I16(a), Value::I16(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::U8(a), Value::U8(b)) => a == b,
            (Value::U16(a), Value::U16(b)) => a == b,
            (Value::U32(a), Value::U32(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::F64(a), Value::F64(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => {
                a.ptr_eq(b) || {
                    let (a, b) = (a.borrow(), b.borrow());
                    a.class == b.class && a.fields == b.fields
                }
            }
            (Value::Sequence(a), Value::Sequence(b)) => {
                a.ptr_eq(b) || a.borrow().items == b.borrow().items
            }
            (Value::Mapping(a), Value::Mapping(b)) => a.ptr_eq(b) || *a.borrow() == *b.borrow(),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(v) => write!(f, "Bool({v})"),
            Value::I8(v) => write!(f, "I8({v})"),
            Value::I16(v) => write!(f, "I16({v})"),
            Value::I32(v) => write!(f, "I32({v})"),
            Value::I64(v) => write!(f, "I64({v})"),
            Value::U8(v) => write!(f, "U8({v})"),
            Value::U16(v) => write!(f, "U16({v})"),
            Value::U32(v) => write!(f, "U32({v})"),
            Value::U64(v) => write!(f, "U64({v})"),
            Value::F32(v) => write!(f, "F32({v})"),
            Value::F64(v) => write!(f, "F64({v})"),
            Value::Decimal(v) => write!(f, "Decimal({v})"),
            Value::Char(v) => write!(f, "Char({v:?})"),
            Value::String(v) => write!(f, "String({v:?})"),
            Value::Bytes(v) => write!(f, "Bytes({v:?})"),
            Value::Timestamp(v) => write!(f, "Timestamp({})", v.to_rfc3339()),
            Value::Enum(v) => write!(f, "Enum({}::{})", v.ty.name(), v.name()),
            // Reference values print their shape only: graphs may be cyclic.
            Value::Object(o) => write!(f, "Object({} @{:x})", o.class().name(), self.identity().unwrap_or_default()),
            Value::Sequence(s) => write!(f, "Sequence(len {} @{:x})", s.len(), self.identity().unwrap_or_default()),
            Value::Mapping(m) => write!(f, "Mapping(len {} @{:x})", m.len(), self.identity().unwrap_or_default()),
        }
    }
}

macro_rules! value_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Decimal => Decimal,
    char => Char,
    String => String,
    Vec<u8> => Bytes,
    DateTime<FixedOffset> => Timestamp,
    ObjectRef => Object,
    SeqRef => Sequence,
    MapRef => Mapping,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

/// Hashable projection of a key value, used by [`Mapping`] to find keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum KeyFingerprint {
    Null,
    Bool(bool),
    Int(i128),
    Float(u64),
    Decimal(Decimal),
    Str(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<FixedOffset>),
    Ref(usize),
}

/// Enum value: its type and the index of the variant.
#[derive(Clone, Debug)]
pub struct EnumValue {
    pub(crate) ty: Arc<EnumType>,
    pub(crate) index: usize,
}

impl EnumValue {
    pub fn new(ty: Arc<EnumType>, index: usize) -> Self {
        Self { ty, index }
    }

    /// Variant by name (ASCII case-insensitive).
    pub fn named(ty: &Arc<EnumType>, name: &str) -> Option<Self> {
        ty.variant_index(name).map(|index| Self::new(ty.clone(), index))
    }

    pub fn name(&self) -> &str {
        self.ty.variants.get(self.index).map(String::as_str).unwrap_or("")
    }
}

impl PartialEq for EnumValue {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty && self.index == other.index
    }
}

/// Instance of a [`ClassType`]; one field per declared member.
pub struct Object {
    pub(crate) class: Arc<ClassType>,
    pub(crate) fields: Vec<Value>,
}

impl Object {
    pub fn class(&self) -> &Arc<ClassType> {
        &self.class
    }

    pub fn fields(&self) -> &[Value] {
        &self.fields
    }
}

/// Shared handle to an [`Object`].
#[derive(Clone)]
pub struct ObjectRef(Rc<RefCell<Object>>);

impl ObjectRef {
    /// New instance with every member set to its declared default.
    pub fn new(class: &Arc<ClassType>) -> Self {
        let fields = class.members.iter().map(|m| m.default_value()).collect();
        ObjectRef(Rc::new(RefCell::new(Object {
            class: class.clone(),
            fields,
        })))
    }

    pub fn class(&self) -> Arc<ClassType> {
        self.0.borrow().class.clone()
    }

    pub fn borrow(&self) -> Ref<'_, Object> {
        self.0.borrow()
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Value of the member at `index`.
    pub fn field(&self, index: usize) -> Value {
        self.0.borrow().fields.get(index).cloned().unwrap_or(Value::Null)
    }

    pub fn set_field(&self, index: usize, value: Value) {
        if let Some(slot) = self.0.borrow_mut().fields.get_mut(index) {
            *slot = value;
        }
    }

    /// Value of the member named `name`, `None` if the class has no such member.
    pub fn get(&self, name: &str) -> Option<Value> {
        let index = self.0.borrow().class.member_index(name)?;
        Some(self.field(index))
    }

    /// Assign the member named `name`; returns false if there is no such member.
    pub fn set<V: Into<Value>>(&self, name: &str, value: V) -> bool {
        let index = self.0.borrow().class.member_index(name);
        match index {
            Some(index) => {
                self.set_field(index, value.into());
                true
            }
            None => false,
        }
    }
}

/// Ordered collection with a declared item type.
pub struct Sequence {
    pub(crate) ty: Type,
    pub(crate) items: Vec<Value>,
}

impl Sequence {
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }
}

/// Shared handle to a [`Sequence`].
#[derive(Clone)]
pub struct SeqRef(Rc<RefCell<Sequence>>);

impl SeqRef {
    /// Empty collection of type `ty` (an array or list type).
    pub fn new(ty: Type) -> Self {
        Self::with_items(ty, Vec::new())
    }

    pub fn with_items(ty: Type, items: Vec<Value>) -> Self {
        SeqRef(Rc::new(RefCell::new(Sequence { ty, items })))
    }

    pub fn borrow(&self) -> Ref<'_, Sequence> {
        self.0.borrow()
    }

    pub fn ptr_eq(&self, other: &SeqRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn push<V: Into<Value>>(&self, value: V) {
        self.0.borrow_mut().items.push(value.into());
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().items.get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the items, so callers do not hold a borrow while recursing.
    pub fn items(&self) -> Vec<Value> {
        self.0.borrow().items.clone()
    }
}

/// Insertion-ordered map with O(1) key lookup.
pub struct Mapping {
    pub(crate) ty: Type,
    entries: Vec<(Value, Value)>,
    index: AHashMap<KeyFingerprint, usize>,
}

impl Mapping {
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn entries(&self) -> &[(Value, Value)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &Value) -> bool {
        self.index.contains_key(&key.fingerprint())
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.index
            .get(&key.fingerprint())
            .map(|&i| &self.entries[i].1)
    }

    /// Insert or replace. A replaced entry keeps its original position.
    pub fn insert(&mut self, key: Value, value: Value) -> Option<Value> {
        let fingerprint = key.fingerprint();
        if let Some(&i) = self.index.get(&fingerprint) {
            return Some(std::mem::replace(&mut self.entries[i].1, value));
        }
        self.index.insert(fingerprint, self.entries.len());
        self.entries.push((key, value));
        None
    }
}

impl PartialEq for Mapping {
    /// Entry order does not matter.
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .all(|(k, v)| other.get(k).is_some_and(|o| o == v))
    }
}

/// Shared handle to a [`Mapping`].
#[derive(Clone)]
pub struct MapRef(Rc<RefCell<Mapping>>);

impl MapRef {
    /// Empty mapping of type `ty` (a map type).
    pub fn new(ty: Type) -> Self {
        MapRef(Rc::new(RefCell::new(Mapping {
            ty,
            entries: Vec::new(),
            index: AHashMap::new(),
        })))
    }

    pub fn borrow(&self) -> Ref<'_, Mapping> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Mapping> {
        self.0.borrow_mut()
    }

    pub fn ptr_eq(&self, other: &MapRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn insert<K: Into<Value>, V: Into<Value>>(&self, key: K, value: V) -> Option<Value> {
        self.0.borrow_mut().insert(key.into(), value.into())
    }

    pub fn get<K: Into<Value>>(&self, key: K) -> Option<Value> {
        self.0.borrow().get(&key.into()).cloned()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the entries in insertion order.
    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.0.borrow().entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MemberDef;

    #[test]
    fn mapping_replaces_in_place() {
        let map = MapRef::new(Type::map(Type::String, Type::I32));
        map.insert("a", 1);
        map.insert("b", 2);
        assert_eq!(map.insert("a", 3), Some(Value::I32(1)));
        let keys: Vec<_> = map.entries().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![Value::from("a"), Value::from("b")]);
        assert_eq!(map.get("a"), Some(Value::I32(3)));
    }

    #[test]
    fn integer_keys_match_across_widths() {
        let map = MapRef::new(Type::map(Type::Any, Type::Any));
        map.insert(1i32, "one");
        assert_eq!(map.get(1i64), Some(Value::from("one")));
    }

    #[test]
    fn object_starts_with_declared_defaults() {
        let class = ClassType::builder("demo.Counter")
            .member(MemberDef::new("step", Type::I32).default_with(|| Value::I32(5)))
            .field("label", Type::String)
            .build();
        let obj = ObjectRef::new(&class);
        assert_eq!(obj.get("step"), Some(Value::I32(5)));
        assert_eq!(obj.get("label"), Some(Value::Null));
        assert_eq!(obj.get("missing"), None);
    }

    #[test]
    fn identity_differs_from_equality() {
        let a = SeqRef::with_items(Type::list(Type::I32), vec![1.into(), 2.into()]);
        let b = SeqRef::with_items(Type::list(Type::I32), vec![1.into(), 2.into()]);
        let (va, vb) = (Value::Sequence(a.clone()), Value::Sequence(b));
        assert_eq!(va, vb);
        assert!(!va.same_instance(&vb));
        assert!(va.same_instance(&Value::Sequence(a)));
    }
}
