//! Anchor assignment for instances reachable more than once.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use nohash_hasher::BuildNoHashHasher;

use crate::descriptor::ValueDescriptor;
use crate::ser::Error;
use crate::ser::visitor::ObjectGraphVisitor;
use crate::value::Value;

/// Pre-pass visitor that names every instance seen twice.
///
/// Instances are keyed by identity in an arena: the map holds the slot index,
/// the slot holds the anchor once a second sighting asks for one. Anchors are
/// `o0`, `o1`, ... in the order the repeats are found, so only instances that
/// are actually shared get one.
#[derive(Debug, Default)]
pub struct AnchorAssigner {
    slots_by_identity: HashMap<usize, usize, BuildNoHashHasher<usize>>,
    slots: Vec<Option<String>>,
    next_id: usize,
}

impl AnchorAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Anchor assigned to `value`, if it was seen more than once.
    pub fn alias_for(&self, value: &Value) -> Option<&str> {
        let identity = value.identity()?;
        let slot = *self.slots_by_identity.get(&identity)?;
        self.slots[slot].as_deref()
    }

    /// Number of anchors handed out.
    pub fn anchor_count(&self) -> usize {
        self.next_id
    }
}

impl ObjectGraphVisitor<()> for AnchorAssigner {
    fn enter(&mut self, value: &ValueDescriptor, _context: &mut ()) -> Result<bool, Error> {
        let Some(identity) = value.value().identity() else {
            return Ok(true);
        };
        match self.slots_by_identity.get(&identity) {
            Some(&slot) => {
                if self.slots[slot].is_none() {
                    self.slots[slot] = Some(format!("o{}", self.next_id));
                    self.next_id += 1;
                }
                // Already walked from its first sighting.
                Ok(false)
            }
            None => {
                self.slots_by_identity.insert(identity, self.slots.len());
                self.slots.push(None);
                Ok(true)
            }
        }
    }
}

/// Anchors of one serialization run, shared by the emitting chain and by
/// nested serializations started from converters.
#[derive(Debug, Default)]
pub struct AliasState {
    assigner: AnchorAssigner,
    emitted: RefCell<HashSet<String>>,
}

impl AliasState {
    pub fn new(assigner: AnchorAssigner) -> Self {
        Self {
            assigner,
            emitted: RefCell::new(HashSet::new()),
        }
    }

    pub fn alias_for(&self, value: &Value) -> Option<&str> {
        self.assigner.alias_for(value)
    }

    /// Record that `alias` is being emitted; false if it already was.
    pub fn mark_emitted(&self, alias: &str) -> bool {
        self.emitted.borrow_mut().insert(alias.to_owned())
    }
}
