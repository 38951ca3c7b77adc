use crate::change::{ChangeTree, SlotId};
use crate::graph::instance_id::InstanceId;
use crate::schema::ElementKind;
use crate::value::Value;

/// A tracked unique-value collection. Insertion order is the logical order;
/// uniqueness is by value equality (reference entries compare by identity).
pub struct SetInstance {
    element: ElementKind,
    entries: Vec<(SlotId, Value)>,
    next_slot: SlotId,
    tree: ChangeTree,
}

impl SetInstance {
    pub fn new(element: ElementKind) -> Self {
        Self {
            element,
            entries: Vec::new(),
            next_slot: 0,
            tree: ChangeTree::new(),
        }
    }

    pub fn element(&self) -> ElementKind {
        self.element
    }

    pub fn tree(&self) -> &ChangeTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut ChangeTree {
        &mut self.tree
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.entries.iter().any(|(_, v)| v == value)
    }

    pub fn slot_of_value(&self, value: &Value) -> Option<SlotId> {
        self.entries
            .iter()
            .find(|(_, v)| v == value)
            .map(|(slot, _)| *slot)
    }

    pub fn value_at_slot(&self, slot: SlotId) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, value)| value)
    }

    pub fn entries(&self) -> &[(SlotId, Value)] {
        &self.entries
    }

    pub fn insert_entry(&mut self, value: Value) -> SlotId {
        let slot = self.next_slot;
        self.next_slot += 1;
        self.entries.push((slot, value));
        slot
    }

    pub fn remove_slot(&mut self, slot: SlotId) -> Option<Value> {
        let position = self.entries.iter().position(|(s, _)| *s == slot)?;
        Some(self.entries.remove(position).1)
    }

    pub fn clear_entries(&mut self) -> Vec<(SlotId, Value)> {
        std::mem::take(&mut self.entries)
    }

    /// Decode-side insertion with a slot minted by the remote encoder.
    pub fn apply_add(&mut self, slot: SlotId, value: Value) {
        self.entries.push((slot, value));
        self.next_slot = self.next_slot.max(slot + 1);
    }

    pub fn ref_entries(&self) -> Vec<(SlotId, InstanceId)> {
        self.entries
            .iter()
            .filter_map(|(slot, value)| value.as_instance().map(|child| (*slot, child)))
            .collect()
    }
}
