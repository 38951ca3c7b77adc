use crate::change::{ChangeTree, SlotId};
use crate::graph::array::ArrayInstance;
use crate::graph::instance_id::InstanceId;
use crate::graph::map::MapInstance;
use crate::graph::set::SetInstance;
use crate::schema::SchemaKind;
use crate::value::Value;

/// A tracked structured object: one value slot per schema field, addressed
/// by absolute field index.
pub struct ObjectInstance {
    kind: SchemaKind,
    fields: Vec<Option<Value>>,
    tree: ChangeTree,
}

impl ObjectInstance {
    pub fn new(kind: SchemaKind, field_count: usize) -> Self {
        Self {
            kind,
            fields: vec![None; field_count],
            tree: ChangeTree::new(),
        }
    }

    pub fn kind(&self) -> SchemaKind {
        self.kind
    }

    pub fn field(&self, index: u8) -> Option<&Value> {
        self.fields.get(index as usize).and_then(|slot| slot.as_ref())
    }

    pub fn set_field(&mut self, index: u8, value: Option<Value>) {
        if let Some(slot) = self.fields.get_mut(index as usize) {
            *slot = value;
        }
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

/// Any value that participates in synchronization. Exactly one change tree
/// is attached for the instance's entire lifetime.
pub enum Instance {
    Object(ObjectInstance),
    Array(ArrayInstance),
    Map(MapInstance),
    Set(SetInstance),
}

impl Instance {
    pub fn tree(&self) -> &ChangeTree {
        match self {
            Instance::Object(inner) => &inner.tree,
            Instance::Array(inner) => inner.tree(),
            Instance::Map(inner) => inner.tree(),
            Instance::Set(inner) => inner.tree(),
        }
    }

    pub fn tree_mut(&mut self) -> &mut ChangeTree {
        match self {
            Instance::Object(inner) => &mut inner.tree,
            Instance::Array(inner) => inner.tree_mut(),
            Instance::Map(inner) => inner.tree_mut(),
            Instance::Set(inner) => inner.tree_mut(),
        }
    }

    /// The schema kind for objects; containers have element kinds instead.
    pub fn schema_kind(&self) -> Option<SchemaKind> {
        match self {
            Instance::Object(inner) => Some(inner.kind()),
            _ => None,
        }
    }

    /// Every (slot, child) reference edge leaving this instance, in slot /
    /// logical order. Drives the GC cascade and the encoder's walk.
    pub fn outgoing_refs(&self) -> Vec<(SlotId, InstanceId)> {
        match self {
            Instance::Object(inner) => inner
                .fields
                .iter()
                .enumerate()
                .filter_map(|(index, slot)| {
                    slot.as_ref()
                        .and_then(|value| value.as_instance())
                        .map(|child| (index as SlotId, child))
                })
                .collect(),
            Instance::Array(inner) => inner.ref_entries(),
            Instance::Map(inner) => inner.ref_entries(),
            Instance::Set(inner) => inner.ref_entries(),
        }
    }

    /// The value currently at an operation slot, if any.
    pub fn value_at_slot(&self, slot: SlotId) -> Option<&Value> {
        match self {
            Instance::Object(inner) => inner.field(slot as u8),
            Instance::Array(inner) => inner.value_at_slot(slot),
            Instance::Map(inner) => inner.value_at_slot(slot),
            Instance::Set(inner) => inner.value_at_slot(slot),
        }
    }

    pub fn is_container(&self) -> bool {
        !matches!(self, Instance::Object(_))
    }

    pub fn kind_label(&self) -> &'static str {
        match self {
            Instance::Object(_) => "object",
            Instance::Array(_) => "array",
            Instance::Map(_) => "map",
            Instance::Set(_) => "set",
        }
    }
}
