//! Built-in stages of the emission visitor chain, outermost first:
//! custom serialization, anchor assignment, default value filtering,
//! comments, and the emitting visitor at the bottom.

use std::rc::Rc;

use crate::converter::ValueWriter;
use crate::descriptor::ValueDescriptor;
use crate::events::{Emitter, Event};
use crate::inspector::MemberDescriptor;
use crate::ser::Error;
use crate::ser::event_info::{AliasEventInfo, CollectionEventInfo, EventInfo, ScalarEventInfo};
use crate::ser::serializer::EmissionScope;
use crate::ser::visitor::ObjectGraphVisitor;
use crate::serializer_options::DefaultValuesHandling;
use crate::types::Type;
use crate::value::Value;

/// A stage of the emission chain.
pub type EmissionVisitor = dyn ObjectGraphVisitor<dyn Emitter>;

/// Innermost stage: turns every visit into an event.
///
/// Start and scalar events pick up the anchor an outer stage left in the
/// scope for the node being visited. Class instances are reported to the
/// object factory's serialization hooks around their mapping.
pub struct EmittingVisitor {
    scope: Rc<EmissionScope>,
}

impl EmittingVisitor {
    pub fn new(scope: Rc<EmissionScope>) -> Self {
        Self { scope }
    }

    fn emit(&self, event: EventInfo, context: &mut (dyn Emitter + 'static)) -> Result<(), Error> {
        self.scope.event_emitter().emit(event, context)
    }
}

impl ObjectGraphVisitor<dyn Emitter> for EmittingVisitor {
    fn visit_scalar(
        &mut self,
        scalar: &ValueDescriptor,
        context: &mut (dyn Emitter + 'static),
    ) -> Result<(), Error> {
        let mut info = ScalarEventInfo::new(scalar.clone());
        info.anchor = self.scope.take_pending_anchor();
        self.emit(EventInfo::Scalar(info), context)
    }

    fn visit_mapping_start(
        &mut self,
        mapping: &ValueDescriptor,
        _key_type: &Type,
        _value_type: &Type,
        context: &mut (dyn Emitter + 'static),
    ) -> Result<(), Error> {
        if let Value::Object(obj) = mapping.value() {
            self.scope.settings().object_factory().on_serializing(obj);
        }
        let mut info = CollectionEventInfo::new(mapping.clone());
        info.anchor = self.scope.take_pending_anchor();
        self.emit(EventInfo::MappingStart(info), context)
    }

    fn visit_mapping_end(
        &mut self,
        mapping: &ValueDescriptor,
        context: &mut (dyn Emitter + 'static),
    ) -> Result<(), Error> {
        self.emit(EventInfo::MappingEnd(mapping.clone()), context)?;
        if let Value::Object(obj) = mapping.value() {
            self.scope.settings().object_factory().on_serialized(obj);
        }
        Ok(())
    }

    fn visit_sequence_start(
        &mut self,
        sequence: &ValueDescriptor,
        _item_type: &Type,
        context: &mut (dyn Emitter + 'static),
    ) -> Result<(), Error> {
        let mut info = CollectionEventInfo::new(sequence.clone());
        info.anchor = self.scope.take_pending_anchor();
        self.emit(EventInfo::SequenceStart(info), context)
    }

    fn visit_sequence_end(
        &mut self,
        sequence: &ValueDescriptor,
        context: &mut (dyn Emitter + 'static),
    ) -> Result<(), Error> {
        self.emit(EventInfo::SequenceEnd(sequence.clone()), context)
    }
}

/// Writes anchors on first occurrences and aliases on repeats.
///
/// The anchor of a first occurrence is left in the scope for the emitting
/// stage, and every visit is still forwarded to the inner stages.
pub struct AnchorAssigningVisitor {
    next: Box<EmissionVisitor>,
    scope: Rc<EmissionScope>,
}

impl AnchorAssigningVisitor {
    pub fn new(next: Box<EmissionVisitor>, scope: Rc<EmissionScope>) -> Self {
        Self { next, scope }
    }

    fn anchor_of(&self, value: &Value) -> Option<String> {
        self.scope
            .aliases()
            .and_then(|aliases| aliases.alias_for(value))
            .map(str::to_owned)
    }

    /// Runs `visit` with the anchor of `value` pending, and clears it after so
    /// a stage that swallowed the visit cannot leak it to the next node.
    fn with_anchor<F>(&mut self, value: &Value, visit: F) -> Result<(), Error>
    where
        F: FnOnce(&mut EmissionVisitor) -> Result<(), Error>,
    {
        self.scope.set_pending_anchor(self.anchor_of(value));
        let result = visit(self.next.as_mut());
        self.scope.take_pending_anchor();
        result
    }
}

impl ObjectGraphVisitor<dyn Emitter> for AnchorAssigningVisitor {
    fn next_visitor(&mut self) -> Option<&mut dyn ObjectGraphVisitor<dyn Emitter>> {
        Some(self.next.as_mut())
    }

    fn enter(
        &mut self,
        value: &ValueDescriptor,
        context: &mut (dyn Emitter + 'static),
    ) -> Result<bool, Error> {
        if let Some(alias) = self.anchor_of(value.value()) {
            let first = self
                .scope
                .aliases()
                .is_some_and(|aliases| aliases.mark_emitted(&alias));
            if !first {
                self.scope.event_emitter().emit(
                    EventInfo::Alias(AliasEventInfo {
                        source: value.clone(),
                        alias,
                    }),
                    context,
                )?;
                return Ok(false);
            }
        }
        self.next.enter(value, context)
    }

    fn visit_scalar(
        &mut self,
        scalar: &ValueDescriptor,
        context: &mut (dyn Emitter + 'static),
    ) -> Result<(), Error> {
        self.with_anchor(scalar.value(), |next| next.visit_scalar(scalar, context))
    }

    fn visit_mapping_start(
        &mut self,
        mapping: &ValueDescriptor,
        key_type: &Type,
        value_type: &Type,
        context: &mut (dyn Emitter + 'static),
    ) -> Result<(), Error> {
        self.with_anchor(mapping.value(), |next| {
            next.visit_mapping_start(mapping, key_type, value_type, context)
        })
    }

    fn visit_sequence_start(
        &mut self,
        sequence: &ValueDescriptor,
        item_type: &Type,
        context: &mut (dyn Emitter + 'static),
    ) -> Result<(), Error> {
        self.with_anchor(sequence.value(), |next| {
            next.visit_sequence_start(sequence, item_type, context)
        })
    }
}

/// Leaves out members (and dictionary entries) according to
/// [`DefaultValuesHandling`]. A member's own setting wins over the global one.
pub struct DefaultValuesVisitor {
    next: Box<EmissionVisitor>,
    handling: DefaultValuesHandling,
}

impl DefaultValuesVisitor {
    pub fn new(next: Box<EmissionVisitor>, handling: DefaultValuesHandling) -> Self {
        Self { next, handling }
    }

    fn omit(handling: DefaultValuesHandling, value: &Value, is_default: bool) -> bool {
        if handling.contains(DefaultValuesHandling::OMIT_NULL) && value.is_null() {
            return true;
        }
        if handling.contains(DefaultValuesHandling::OMIT_DEFAULTS) && is_default {
            return true;
        }
        handling.contains(DefaultValuesHandling::OMIT_EMPTY_COLLECTIONS)
            && value.is_empty_collection()
    }
}

impl ObjectGraphVisitor<dyn Emitter> for DefaultValuesVisitor {
    fn next_visitor(&mut self) -> Option<&mut dyn ObjectGraphVisitor<dyn Emitter>> {
        Some(self.next.as_mut())
    }

    fn enter_member(
        &mut self,
        member: &MemberDescriptor,
        value: &ValueDescriptor,
        context: &mut (dyn Emitter + 'static),
    ) -> Result<bool, Error> {
        let handling = member.default_values().unwrap_or(self.handling);
        let is_default = value.value() == &member.default_value();
        if Self::omit(handling, value.value(), is_default) {
            return Ok(false);
        }
        self.next.enter_member(member, value, context)
    }

    fn enter_mapping(
        &mut self,
        key: &ValueDescriptor,
        value: &ValueDescriptor,
        context: &mut (dyn Emitter + 'static),
    ) -> Result<bool, Error> {
        // Dictionary values fall back to the default of their type.
        let is_default = value.value().is_default_of(value.static_type());
        if Self::omit(self.handling, value.value(), is_default) {
            return Ok(false);
        }
        self.next.enter_mapping(key, value, context)
    }
}

/// Writes member descriptions as comments above the member.
pub struct CommentsVisitor {
    next: Box<EmissionVisitor>,
}

impl CommentsVisitor {
    pub fn new(next: Box<EmissionVisitor>) -> Self {
        Self { next }
    }
}

impl ObjectGraphVisitor<dyn Emitter> for CommentsVisitor {
    fn next_visitor(&mut self) -> Option<&mut dyn ObjectGraphVisitor<dyn Emitter>> {
        Some(self.next.as_mut())
    }

    fn enter_member(
        &mut self,
        member: &MemberDescriptor,
        value: &ValueDescriptor,
        context: &mut (dyn Emitter + 'static),
    ) -> Result<bool, Error> {
        if let Some(text) = member.description() {
            context.emit(Event::Comment {
                text: text.to_owned(),
            })?;
        }
        self.next.enter_member(member, value, context)
    }
}

/// Hands values over to a type converter or a self-describing class hook.
pub struct CustomSerializationVisitor {
    next: Box<EmissionVisitor>,
    scope: Rc<EmissionScope>,
}

impl CustomSerializationVisitor {
    pub fn new(next: Box<EmissionVisitor>, scope: Rc<EmissionScope>) -> Self {
        Self { next, scope }
    }
}

impl ObjectGraphVisitor<dyn Emitter> for CustomSerializationVisitor {
    fn next_visitor(&mut self) -> Option<&mut dyn ObjectGraphVisitor<dyn Emitter>> {
        Some(self.next.as_mut())
    }

    fn enter(
        &mut self,
        value: &ValueDescriptor,
        context: &mut (dyn Emitter + 'static),
    ) -> Result<bool, Error> {
        if !value.value().is_null() {
            let ty = value.actual_type();
            let converter = self
                .scope
                .settings()
                .converters()
                .iter()
                .find(|c| c.accepts(ty))
                .cloned();
            if let Some(converter) = converter {
                let mut writer = NestedWriter {
                    scope: &self.scope,
                    emitter: context,
                };
                converter.write_yaml(value.value(), ty, &mut writer)?;
                return Ok(false);
            }
            if let Value::Object(obj) = value.value() {
                if let Some(hook) = obj.class().convertible().cloned() {
                    let mut writer = NestedWriter {
                        scope: &self.scope,
                        emitter: context,
                    };
                    hook.write(obj, &mut writer)?;
                    return Ok(false);
                }
            }
        }
        self.next.enter(value, context)
    }
}

/// [`ValueWriter`] given to converters: raw events go straight to the
/// emitter, nested values run through a fresh chain of the same scope.
struct NestedWriter<'a> {
    scope: &'a Rc<EmissionScope>,
    emitter: &'a mut (dyn Emitter + 'static),
}

impl ValueWriter for NestedWriter<'_> {
    fn emit(&mut self, event: Event) -> Result<(), Error> {
        self.emitter.emit(event)
    }

    fn serialize(&mut self, value: &Value, ty: &Type) -> Result<(), Error> {
        self.scope.serialize_value(value, ty, self.emitter)
    }
}
