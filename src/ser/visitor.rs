use crate::descriptor::ValueDescriptor;
use crate::inspector::MemberDescriptor;
use crate::ser::Error;
use crate::types::Type;

/// Receives the nodes of an object graph as the traversal walks it.
///
/// Visitors are chained: each one holds the next and decides whether to
/// forward a call, answer it itself, or stop the traversal of a node. The
/// provided methods forward to [`next_visitor`](Self::next_visitor), so a
/// stage only overrides what it cares about. The last stage has no next
/// visitor; for it the `enter` family answers `true` and the rest do nothing.
///
/// `C` is the context threaded through every call: the emitter during
/// emission, `()` for pre-passes.
pub trait ObjectGraphVisitor<C: ?Sized> {
    fn next_visitor(&mut self) -> Option<&mut dyn ObjectGraphVisitor<C>> {
        None
    }

    /// Return false to skip `value` entirely.
    fn enter(&mut self, value: &ValueDescriptor, context: &mut C) -> Result<bool, Error> {
        match self.next_visitor() {
            Some(next) => next.enter(value, context),
            None => Ok(true),
        }
    }

    /// Dictionary entry about to be traversed; return false to skip it.
    fn enter_mapping(
        &mut self,
        key: &ValueDescriptor,
        value: &ValueDescriptor,
        context: &mut C,
    ) -> Result<bool, Error> {
        match self.next_visitor() {
            Some(next) => next.enter_mapping(key, value, context),
            None => Ok(true),
        }
    }

    /// Object member about to be traversed; return false to skip it.
    fn enter_member(
        &mut self,
        member: &MemberDescriptor,
        value: &ValueDescriptor,
        context: &mut C,
    ) -> Result<bool, Error> {
        match self.next_visitor() {
            Some(next) => next.enter_member(member, value, context),
            None => Ok(true),
        }
    }

    fn visit_scalar(&mut self, scalar: &ValueDescriptor, context: &mut C) -> Result<(), Error> {
        match self.next_visitor() {
            Some(next) => next.visit_scalar(scalar, context),
            None => Ok(()),
        }
    }

    fn visit_mapping_start(
        &mut self,
        mapping: &ValueDescriptor,
        key_type: &Type,
        value_type: &Type,
        context: &mut C,
    ) -> Result<(), Error> {
        match self.next_visitor() {
            Some(next) => next.visit_mapping_start(mapping, key_type, value_type, context),
            None => Ok(()),
        }
    }

    fn visit_mapping_end(&mut self, mapping: &ValueDescriptor, context: &mut C) -> Result<(), Error> {
        match self.next_visitor() {
            Some(next) => next.visit_mapping_end(mapping, context),
            None => Ok(()),
        }
    }

    fn visit_sequence_start(
        &mut self,
        sequence: &ValueDescriptor,
        item_type: &Type,
        context: &mut C,
    ) -> Result<(), Error> {
        match self.next_visitor() {
            Some(next) => next.visit_sequence_start(sequence, item_type, context),
            None => Ok(()),
        }
    }

    fn visit_sequence_end(
        &mut self,
        sequence: &ValueDescriptor,
        context: &mut C,
    ) -> Result<(), Error> {
        match self.next_visitor() {
            Some(next) => next.visit_sequence_end(sequence, context),
            None => Ok(()),
        }
    }
}
