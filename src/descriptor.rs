use crate::events::ScalarStyle;
use crate::types::Type;
use crate::value::Value;

/// A value together with the types it is being serialized as.
///
/// `actual_type` is never left open for non-null values: the traversal
/// fills it from the type resolver, falling back to the static type.
#[derive(Clone, Debug)]
pub struct ValueDescriptor {
    value: Value,
    actual_type: Type,
    static_type: Type,
    scalar_style: ScalarStyle,
}

impl ValueDescriptor {
    pub fn new(value: Value, actual_type: Type, static_type: Type, scalar_style: ScalarStyle) -> Self {
        Self {
            value,
            actual_type,
            static_type,
            scalar_style,
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn actual_type(&self) -> &Type {
        &self.actual_type
    }

    pub fn static_type(&self) -> &Type {
        &self.static_type
    }

    pub fn scalar_style(&self) -> ScalarStyle {
        self.scalar_style
    }

    pub(crate) fn with_actual_type(&self, actual_type: Type) -> Self {
        Self {
            actual_type,
            ..self.clone()
        }
    }
}
