use crate::change::{ChangeTree, SlotId};
use crate::graph::instance_id::InstanceId;
use crate::schema::ElementKind;
use crate::value::Value;

/// A tracked ordered list. Entries carry a stable operation slot assigned
/// at insertion; wire operations address slots, so removals shift logical
/// positions without touching the unaffected entries.
pub struct ArrayInstance {
    element: ElementKind,
    entries: Vec<(SlotId, Value)>,
    next_slot: SlotId,
    /// Logical order as of the last flush; what the mirror currently holds.
    /// The encoder diffs this against the live order to synthesize Moves.
    synced_order: Vec<SlotId>,
    tree: ChangeTree,
}

impl ArrayInstance {
    pub fn new(element: ElementKind) -> Self {
        Self {
            element,
            entries: Vec::new(),
            next_slot: 0,
            synced_order: Vec::new(),
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

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.entries.get(index).map(|(_, value)| value)
    }

    pub fn slot_at(&self, index: usize) -> Option<SlotId> {
        self.entries.get(index).map(|(slot, _)| *slot)
    }

    pub fn position_of_slot(&self, slot: SlotId) -> Option<usize> {
        self.entries.iter().position(|(s, _)| *s == slot)
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

    fn mint_slot(&mut self) -> SlotId {
        let slot = self.next_slot;
        self.next_slot += 1;
        slot
    }

    pub fn push_entry(&mut self, value: Value) -> SlotId {
        let slot = self.mint_slot();
        self.entries.push((slot, value));
        slot
    }

    pub fn insert_entry(&mut self, index: usize, value: Value) -> SlotId {
        let slot = self.mint_slot();
        self.entries.insert(index, (slot, value));
        slot
    }

    pub fn set_entry(&mut self, index: usize, value: Value) -> (SlotId, Value) {
        let slot = self.entries[index].0;
        let old = std::mem::replace(&mut self.entries[index].1, value);
        (slot, old)
    }

    pub fn sort_entries<F>(&mut self, compare: &mut F)
    where
        F: FnMut(&Value, &Value) -> std::cmp::Ordering,
    {
        self.entries.sort_by(|a, b| compare(&a.1, &b.1));
    }

    pub fn remove_entry(&mut self, index: usize) -> (SlotId, Value) {
        self.entries.remove(index)
    }

    pub fn clear_entries(&mut self) -> Vec<(SlotId, Value)> {
        std::mem::take(&mut self.entries)
    }

    /// Reposition the entry holding `slot` to logical index `to`.
    pub fn move_slot(&mut self, slot: SlotId, to: usize) {
        if let Some(position) = self.position_of_slot(slot) {
            let entry = self.entries.remove(position);
            let to = to.min(self.entries.len());
            self.entries.insert(to, entry);
        }
    }

    /// Decode-side insertion with a slot minted by the remote encoder.
    pub fn apply_add(&mut self, slot: SlotId, value: Value) {
        self.entries.push((slot, value));
        self.next_slot = self.next_slot.max(slot + 1);
    }

    pub fn replace_slot(&mut self, slot: SlotId, value: Value) -> Option<Value> {
        let position = self.position_of_slot(slot)?;
        Some(std::mem::replace(&mut self.entries[position].1, value))
    }

    pub fn remove_slot(&mut self, slot: SlotId) -> Option<Value> {
        let position = self.position_of_slot(slot)?;
        Some(self.entries.remove(position).1)
    }

    pub fn current_order(&self) -> Vec<SlotId> {
        self.entries.iter().map(|(slot, _)| *slot).collect()
    }

    pub fn synced_order(&self) -> &[SlotId] {
        &self.synced_order
    }

    /// Snapshot the live order as the mirror's order. Called after a flush,
    /// or when pending changes are discarded out-of-band.
    pub fn mark_order_synced(&mut self) {
        self.synced_order = self.current_order();
    }

    pub fn ref_entries(&self) -> Vec<(SlotId, InstanceId)> {
        self.entries
            .iter()
            .filter_map(|(slot, value)| value.as_instance().map(|child| (*slot, child)))
            .collect()
    }
}
