use crate::change::{ChangeTree, SlotId};
use crate::graph::instance_id::InstanceId;
use crate::schema::ElementKind;
use crate::value::Value;

/// A tracked string-keyed map. Insertion order is the logical order. The
/// key travels on the wire only once, with the entry's Add; every later
/// operation addresses the entry's stable slot.
pub struct MapInstance {
    element: ElementKind,
    entries: Vec<(SlotId, String, Value)>,
    next_slot: SlotId,
    tree: ChangeTree,
}

impl MapInstance {
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

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(_, k, _)| k == key)
            .map(|(_, _, value)| value)
    }

    pub fn slot_of_key(&self, key: &str) -> Option<SlotId> {
        self.entries
            .iter()
            .find(|(_, k, _)| k == key)
            .map(|(slot, _, _)| *slot)
    }

    pub fn key_of_slot(&self, slot: SlotId) -> Option<&str> {
        self.entries
            .iter()
            .find(|(s, _, _)| *s == slot)
            .map(|(_, key, _)| key.as_str())
    }

    pub fn value_at_slot(&self, slot: SlotId) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(s, _, _)| *s == slot)
            .map(|(_, _, value)| value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, key, _)| key.as_str())
    }

    pub fn entries(&self) -> &[(SlotId, String, Value)] {
        &self.entries
    }

    pub fn insert_entry(&mut self, key: String, value: Value) -> SlotId {
        let slot = self.next_slot;
        self.next_slot += 1;
        self.entries.push((slot, key, value));
        slot
    }

    pub fn replace_slot(&mut self, slot: SlotId, value: Value) -> Option<Value> {
        let entry = self.entries.iter_mut().find(|(s, _, _)| *s == slot)?;
        Some(std::mem::replace(&mut entry.2, value))
    }

    pub fn remove_slot(&mut self, slot: SlotId) -> Option<(String, Value)> {
        let position = self.entries.iter().position(|(s, _, _)| *s == slot)?;
        let (_, key, value) = self.entries.remove(position);
        Some((key, value))
    }

    pub fn clear_entries(&mut self) -> Vec<(SlotId, String, Value)> {
        std::mem::take(&mut self.entries)
    }

    /// Decode-side insertion with a slot minted by the remote encoder.
    pub fn apply_add(&mut self, slot: SlotId, key: String, value: Value) {
        self.entries.push((slot, key, value));
        self.next_slot = self.next_slot.max(slot + 1);
    }

    pub fn ref_entries(&self) -> Vec<(SlotId, InstanceId)> {
        self.entries
            .iter()
            .filter_map(|(slot, _, value)| value.as_instance().map(|child| (*slot, child)))
            .collect()
    }
}
