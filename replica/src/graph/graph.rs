use std::cmp::Ordering;
use std::collections::HashSet;

use crate::bigmap::BigMap;
use crate::change::{Incoming, OpKind, SlotId};
use crate::graph::array::ArrayInstance;
use crate::graph::error::MutateError;
use crate::graph::instance::{Instance, ObjectInstance};
use crate::graph::instance_id::InstanceId;
use crate::graph::map::MapInstance;
use crate::graph::set::SetInstance;
use crate::schema::{ElementKind, FieldDescriptor, FieldKind, SchemaKind, SchemaKinds};
use crate::tracker::RefTracker;
use crate::value::Value;

/// One synchronized object graph: the instance store, the reference
/// tracker, and the mutation API. Everything here is single-threaded,
/// run-to-completion; a host driving several graphs (one per room) must not
/// share any of this state between them.
///
/// Every mutation funnels through the owning instance's change tree, so
/// the encoder can later serialize exactly what changed.
pub struct Graph {
    schemas: SchemaKinds,
    instances: BigMap<InstanceId, Instance>,
    root: InstanceId,
    tracker: RefTracker,
}

impl Graph {
    /// Construct a graph around a root object of the given kind. The root
    /// is pinned: it holds one implicit edge and `RefId` 0 on both sides.
    pub fn new(schemas: SchemaKinds, root_kind: SchemaKind) -> Result<Self, MutateError> {
        if schemas.descriptor(root_kind).is_none() {
            return Err(MutateError::UnknownSchemaKind);
        }
        let field_count = schemas.field_count(root_kind);
        let mut instances = BigMap::new();
        let root = instances.insert(Instance::Object(ObjectInstance::new(root_kind, field_count)));
        let mut tracker = RefTracker::new();
        tracker.register_root(root);
        Ok(Self {
            schemas,
            instances,
            root,
            tracker,
        })
    }

    pub fn root(&self) -> InstanceId {
        self.root
    }

    pub fn schemas(&self) -> &SchemaKinds {
        &self.schemas
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.instances.contains_key(&id)
    }

    pub fn instance_kind(&self, id: InstanceId) -> Option<SchemaKind> {
        self.instances.get(&id).and_then(|instance| instance.schema_kind())
    }

    // ---- construction ----

    /// Create a detached object instance. Its change tree exists from this
    /// moment; it only becomes reachable (and encodable) once attached.
    pub fn create_object(&mut self, kind: SchemaKind) -> Result<InstanceId, MutateError> {
        if self.schemas.descriptor(kind).is_none() {
            return Err(MutateError::UnknownSchemaKind);
        }
        let field_count = self.schemas.field_count(kind);
        Ok(self
            .instances
            .insert(Instance::Object(ObjectInstance::new(kind, field_count))))
    }

    pub fn create_array(&mut self, element: ElementKind) -> Result<InstanceId, MutateError> {
        self.check_element_declared(element)?;
        Ok(self.instances.insert(Instance::Array(ArrayInstance::new(element))))
    }

    pub fn create_map(&mut self, element: ElementKind) -> Result<InstanceId, MutateError> {
        self.check_element_declared(element)?;
        Ok(self.instances.insert(Instance::Map(MapInstance::new(element))))
    }

    pub fn create_set(&mut self, element: ElementKind) -> Result<InstanceId, MutateError> {
        self.check_element_declared(element)?;
        Ok(self.instances.insert(Instance::Set(SetInstance::new(element))))
    }

    // ---- object fields ----

    pub fn set_field(
        &mut self,
        id: InstanceId,
        index: u8,
        value: Value,
    ) -> Result<(), MutateError> {
        let (kind, old) = {
            let instance = self.instances.get(&id).ok_or(MutateError::UnknownInstance)?;
            match instance {
                Instance::Object(object) => (object.kind(), object.field(index).cloned()),
                other => {
                    return Err(MutateError::WrongShape {
                        expected: "object",
                        found: other.kind_label(),
                    })
                }
            }
        };
        let field = self
            .schemas
            .field(kind, index)
            .cloned()
            .ok_or(MutateError::UnknownField { index })?;
        self.check_field_value(&field, &value)?;

        // equal primitive writes are skipped; re-assigning the identical
        // instance is a no-op; a *different* instance always encodes, even
        // when deep-equal, because identity is what replicates
        match (&old, &value) {
            (Some(existing), incoming) if !incoming.is_ref() && existing == incoming => {
                return Ok(())
            }
            (Some(existing), Value::Ref(incoming)) if existing.as_instance() == Some(*incoming) => {
                return Ok(())
            }
            _ => {}
        }

        let slot = index as SlotId;
        let incoming = match &old {
            None => Incoming {
                slot,
                kind: OpKind::Add,
                target: value.as_instance(),
                prior: None,
            },
            Some(old_value) => {
                if old_value.is_ref() || value.is_ref() {
                    Incoming {
                        slot,
                        kind: OpKind::DeleteAndAdd,
                        target: value.as_instance(),
                        prior: old_value.as_instance(),
                    }
                } else {
                    Incoming::value_op(slot, OpKind::Replace)
                }
            }
        };

        if let Some(old_child) = old.as_ref().and_then(Value::as_instance) {
            self.detach(old_child, id, slot);
        }
        let new_child = value.as_instance();
        if let Some(Instance::Object(object)) = self.instances.get_mut(&id) {
            object.set_field(index, Some(value));
        }
        if let Some(child) = new_child {
            self.attach(child, id, slot);
        }
        self.record(id, incoming);
        Ok(())
    }

    pub fn unset_field(&mut self, id: InstanceId, index: u8) -> Result<(), MutateError> {
        let (kind, old) = {
            let instance = self.instances.get(&id).ok_or(MutateError::UnknownInstance)?;
            match instance {
                Instance::Object(object) => (object.kind(), object.field(index).cloned()),
                other => {
                    return Err(MutateError::WrongShape {
                        expected: "object",
                        found: other.kind_label(),
                    })
                }
            }
        };
        if self.schemas.field(kind, index).is_none() {
            return Err(MutateError::UnknownField { index });
        }
        let Some(old_value) = old else {
            return Ok(()); // already unset
        };

        let slot = index as SlotId;
        if let Some(old_child) = old_value.as_instance() {
            self.detach(old_child, id, slot);
        }
        if let Some(Instance::Object(object)) = self.instances.get_mut(&id) {
            object.set_field(index, None);
        }
        self.record(
            id,
            Incoming {
                slot,
                kind: OpKind::Delete,
                target: None,
                prior: old_value.as_instance(),
            },
        );
        Ok(())
    }

    pub fn field(&self, id: InstanceId, index: u8) -> Result<Option<&Value>, MutateError> {
        match self.instances.get(&id).ok_or(MutateError::UnknownInstance)? {
            Instance::Object(object) => Ok(object.field(index)),
            other => Err(MutateError::WrongShape {
                expected: "object",
                found: other.kind_label(),
            }),
        }
    }

    // ---- arrays ----

    pub fn array_push(&mut self, id: InstanceId, value: Value) -> Result<usize, MutateError> {
        let element = self.array(id)?.element();
        self.check_element_value(element, &value, "array element")?;

        let child = value.as_instance();
        let (slot, index) = {
            let array = self.array_mut(id)?;
            let slot = array.push_entry(value);
            (slot, array.len() - 1)
        };
        if let Some(child) = child {
            self.attach(child, id, slot);
        }
        self.record(
            id,
            Incoming {
                slot,
                kind: OpKind::Add,
                target: child,
                prior: None,
            },
        );
        Ok(index)
    }

    pub fn array_insert(
        &mut self,
        id: InstanceId,
        index: usize,
        value: Value,
    ) -> Result<(), MutateError> {
        let (element, len) = {
            let array = self.array(id)?;
            (array.element(), array.len())
        };
        if index > len {
            return Err(MutateError::IndexOutOfBounds { index, len });
        }
        self.check_element_value(element, &value, "array element")?;

        let child = value.as_instance();
        let slot = self.array_mut(id)?.insert_entry(index, value);
        if let Some(child) = child {
            self.attach(child, id, slot);
        }
        self.record(
            id,
            Incoming {
                slot,
                kind: OpKind::Add,
                target: child,
                prior: None,
            },
        );
        self.mark_order_dirty(id);
        Ok(())
    }

    pub fn array_set(
        &mut self,
        id: InstanceId,
        index: usize,
        value: Value,
    ) -> Result<(), MutateError> {
        let (element, len) = {
            let array = self.array(id)?;
            (array.element(), array.len())
        };
        if index >= len {
            return Err(MutateError::IndexOutOfBounds { index, len });
        }
        self.check_element_value(element, &value, "array element")?;

        let old = self.array(id)?.get(index).cloned();
        let Some(old_value) = old else {
            return Err(MutateError::IndexOutOfBounds { index, len });
        };
        match (&old_value, &value) {
            (existing, incoming) if !incoming.is_ref() && existing == incoming => return Ok(()),
            (existing, Value::Ref(incoming)) if existing.as_instance() == Some(*incoming) => {
                return Ok(())
            }
            _ => {}
        }

        let child = value.as_instance();
        let (slot, _) = self.array_mut(id)?.set_entry(index, value);
        if let Some(old_child) = old_value.as_instance() {
            self.detach(old_child, id, slot);
        }
        if let Some(child) = child {
            self.attach(child, id, slot);
        }
        let incoming = if old_value.is_ref() || child.is_some() {
            Incoming {
                slot,
                kind: OpKind::DeleteAndAdd,
                target: child,
                prior: old_value.as_instance(),
            }
        } else {
            Incoming::value_op(slot, OpKind::Replace)
        };
        self.record(id, incoming);
        Ok(())
    }

    pub fn array_remove(&mut self, id: InstanceId, index: usize) -> Result<Value, MutateError> {
        let len = self.array(id)?.len();
        if index >= len {
            return Err(MutateError::IndexOutOfBounds { index, len });
        }
        let (slot, value) = self.array_mut(id)?.remove_entry(index);
        if let Some(child) = value.as_instance() {
            self.detach(child, id, slot);
        }
        self.record(
            id,
            Incoming {
                slot,
                kind: OpKind::Delete,
                target: None,
                prior: value.as_instance(),
            },
        );
        Ok(value)
    }

    pub fn array_pop(&mut self, id: InstanceId) -> Result<Option<Value>, MutateError> {
        let len = self.array(id)?.len();
        if len == 0 {
            return Ok(None);
        }
        self.array_remove(id, len - 1).map(Some)
    }

    pub fn array_clear(&mut self, id: InstanceId) -> Result<(), MutateError> {
        let entries = self.array_mut(id)?.clear_entries();
        for (slot, value) in &entries {
            if let Some(child) = value.as_instance() {
                self.detach(child, id, *slot);
            }
        }
        self.record(id, Incoming::clear());
        Ok(())
    }

    /// Reposition one element. Encoded as an index remap, not a rewrite.
    pub fn array_move(
        &mut self,
        id: InstanceId,
        from: usize,
        to: usize,
    ) -> Result<(), MutateError> {
        let len = self.array(id)?.len();
        if from >= len {
            return Err(MutateError::IndexOutOfBounds { index: from, len });
        }
        if to >= len {
            return Err(MutateError::IndexOutOfBounds { index: to, len });
        }
        if from == to {
            return Ok(());
        }
        let array = self.array_mut(id)?;
        let slot = array.slot_at(from).expect("bounds checked above");
        array.move_slot(slot, to);
        self.mark_order_dirty(id);
        Ok(())
    }

    pub fn array_swap(&mut self, id: InstanceId, a: usize, b: usize) -> Result<(), MutateError> {
        let len = self.array(id)?.len();
        for index in [a, b] {
            if index >= len {
                return Err(MutateError::IndexOutOfBounds { index, len });
            }
        }
        if a == b {
            return Ok(());
        }
        let (low, high) = if a < b { (a, b) } else { (b, a) };
        // two remaps: high entry up to low, displaced low entry back to high
        let array = self.array_mut(id)?;
        let high_slot = array.slot_at(high).expect("bounds checked above");
        let low_slot = array.slot_at(low).expect("bounds checked above");
        array.move_slot(high_slot, low);
        array.move_slot(low_slot, high);
        self.mark_order_dirty(id);
        Ok(())
    }

    pub fn array_sort_by<F>(&mut self, id: InstanceId, mut compare: F) -> Result<(), MutateError>
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        self.array_mut(id)?.sort_entries(&mut compare);
        self.mark_order_dirty(id);
        Ok(())
    }

    pub fn array_len(&self, id: InstanceId) -> Result<usize, MutateError> {
        Ok(self.array(id)?.len())
    }

    pub fn array_get(&self, id: InstanceId, index: usize) -> Result<Option<&Value>, MutateError> {
        Ok(self.array(id)?.get(index))
    }

    // ---- maps ----

    pub fn map_insert(
        &mut self,
        id: InstanceId,
        key: &str,
        value: Value,
    ) -> Result<(), MutateError> {
        let element = self.map(id)?.element();
        self.check_element_value(element, &value, "map element")?;

        let existing_slot = self.map(id)?.slot_of_key(key);
        let child = value.as_instance();
        match existing_slot {
            Some(slot) => {
                let old_value = self
                    .map(id)?
                    .value_at_slot(slot)
                    .cloned()
                    .expect("slot resolved from key");
                match (&old_value, &value) {
                    (existing, incoming) if !incoming.is_ref() && existing == incoming => {
                        return Ok(())
                    }
                    (existing, Value::Ref(incoming))
                        if existing.as_instance() == Some(*incoming) =>
                    {
                        return Ok(())
                    }
                    _ => {}
                }
                let _ = self.map_mut(id)?.replace_slot(slot, value);
                if let Some(old_child) = old_value.as_instance() {
                    self.detach(old_child, id, slot);
                }
                if let Some(child) = child {
                    self.attach(child, id, slot);
                }
                let incoming = if old_value.is_ref() || child.is_some() {
                    Incoming {
                        slot,
                        kind: OpKind::DeleteAndAdd,
                        target: child,
                        prior: old_value.as_instance(),
                    }
                } else {
                    Incoming::value_op(slot, OpKind::Replace)
                };
                self.record(id, incoming);
            }
            None => {
                let slot = self.map_mut(id)?.insert_entry(key.to_string(), value);
                if let Some(child) = child {
                    self.attach(child, id, slot);
                }
                self.record(
                    id,
                    Incoming {
                        slot,
                        kind: OpKind::Add,
                        target: child,
                        prior: None,
                    },
                );
            }
        }
        Ok(())
    }

    pub fn map_remove(&mut self, id: InstanceId, key: &str) -> Result<Value, MutateError> {
        let slot = self
            .map(id)?
            .slot_of_key(key)
            .ok_or_else(|| MutateError::KeyNotFound {
                key: key.to_string(),
            })?;
        let (_, value) = self
            .map_mut(id)?
            .remove_slot(slot)
            .expect("slot resolved from key");
        if let Some(child) = value.as_instance() {
            self.detach(child, id, slot);
        }
        self.record(
            id,
            Incoming {
                slot,
                kind: OpKind::Delete,
                target: None,
                prior: value.as_instance(),
            },
        );
        Ok(value)
    }

    pub fn map_clear(&mut self, id: InstanceId) -> Result<(), MutateError> {
        let entries = self.map_mut(id)?.clear_entries();
        for (slot, _, value) in &entries {
            if let Some(child) = value.as_instance() {
                self.detach(child, id, *slot);
            }
        }
        self.record(id, Incoming::clear());
        Ok(())
    }

    pub fn map_get(&self, id: InstanceId, key: &str) -> Result<Option<&Value>, MutateError> {
        Ok(self.map(id)?.get(key))
    }

    pub fn map_len(&self, id: InstanceId) -> Result<usize, MutateError> {
        Ok(self.map(id)?.len())
    }

    pub fn map_keys(&self, id: InstanceId) -> Result<Vec<String>, MutateError> {
        Ok(self.map(id)?.keys().map(str::to_string).collect())
    }

    // ---- sets ----

    /// Idempotent: inserting a value the set already holds is a no-op and
    /// returns `false`.
    pub fn set_insert(&mut self, id: InstanceId, value: Value) -> Result<bool, MutateError> {
        let element = self.set(id)?.element();
        self.check_element_value(element, &value, "set element")?;

        if self.set(id)?.contains(&value) {
            return Ok(false);
        }
        let child = value.as_instance();
        let slot = self.set_mut(id)?.insert_entry(value);
        if let Some(child) = child {
            self.attach(child, id, slot);
        }
        self.record(
            id,
            Incoming {
                slot,
                kind: OpKind::Add,
                target: child,
                prior: None,
            },
        );
        Ok(true)
    }

    pub fn set_remove(&mut self, id: InstanceId, value: &Value) -> Result<bool, MutateError> {
        let Some(slot) = self.set(id)?.slot_of_value(value) else {
            return Ok(false);
        };
        let removed = self
            .set_mut(id)?
            .remove_slot(slot)
            .expect("slot resolved from value");
        if let Some(child) = removed.as_instance() {
            self.detach(child, id, slot);
        }
        self.record(
            id,
            Incoming {
                slot,
                kind: OpKind::Delete,
                target: None,
                prior: removed.as_instance(),
            },
        );
        Ok(true)
    }

    pub fn set_clear(&mut self, id: InstanceId) -> Result<(), MutateError> {
        let entries = self.set_mut(id)?.clear_entries();
        for (slot, value) in &entries {
            if let Some(child) = value.as_instance() {
                self.detach(child, id, *slot);
            }
        }
        self.record(id, Incoming::clear());
        Ok(())
    }

    pub fn set_contains(&self, id: InstanceId, value: &Value) -> Result<bool, MutateError> {
        Ok(self.set(id)?.contains(value))
    }

    pub fn set_len(&self, id: InstanceId) -> Result<usize, MutateError> {
        Ok(self.set(id)?.len())
    }

    // ---- bookkeeping shared with the decoder ----

    pub(crate) fn instance(&self, id: InstanceId) -> Option<&Instance> {
        self.instances.get(&id)
    }

    pub(crate) fn instance_mut(&mut self, id: InstanceId) -> Option<&mut Instance> {
        self.instances.get_mut(&id)
    }

    pub(crate) fn tracker(&self) -> &RefTracker {
        &self.tracker
    }

    pub(crate) fn tracker_mut(&mut self) -> &mut RefTracker {
        &mut self.tracker
    }

    pub(crate) fn attach(&mut self, child: InstanceId, parent: InstanceId, slot: SlotId) {
        if let Some(instance) = self.instances.get_mut(&child) {
            instance.tree_mut().add_parent(parent, slot);
        }
        self.tracker.retain(child);
    }

    pub(crate) fn detach(&mut self, child: InstanceId, parent: InstanceId, slot: SlotId) {
        if let Some(instance) = self.instances.get_mut(&child) {
            instance.tree_mut().remove_parent(parent, slot);
        }
        self.tracker.release(child);
    }

    /// Run the deferred GC pass: reclaim every instance whose reference
    /// count has stayed zero since it was released. Called at patch
    /// boundaries only, never mid-patch.
    pub(crate) fn collect_garbage(
        &mut self,
    ) -> Vec<(Option<crate::tracker::RefId>, InstanceId)> {
        let Self {
            tracker, instances, ..
        } = self;
        tracker.collect(instances)
    }

    /// Drop every pending and cumulative change without encoding anything.
    /// Used when a snapshot was delivered to observers out-of-band.
    pub fn discard_all_changes(&mut self) {
        let ids: Vec<InstanceId> = self.instances.iter().map(|(id, _)| *id).collect();
        for id in ids {
            if let Some(instance) = self.instances.get_mut(&id) {
                instance.tree_mut().discard_all();
                if let Instance::Array(array) = instance {
                    array.mark_order_synced();
                }
            }
        }
    }

    fn record(&mut self, id: InstanceId, incoming: Incoming) {
        if let Some(instance) = self.instances.get_mut(&id) {
            instance.tree_mut().record(incoming);
        }
        self.propagate_child_dirty(id);
    }

    fn mark_order_dirty(&mut self, id: InstanceId) {
        if let Some(instance) = self.instances.get_mut(&id) {
            instance.tree_mut().mark_order_dirty();
        }
        self.propagate_child_dirty(id);
    }

    /// Let every ancestor know a descendant changed, without rescanning.
    /// Stops early at ancestors already flagged; cycle-safe.
    fn propagate_child_dirty(&mut self, id: InstanceId) {
        let mut stack: Vec<InstanceId> = match self.instances.get(&id) {
            Some(instance) => instance.tree().parents().iter().map(|(p, _)| *p).collect(),
            None => return,
        };
        let mut visited: HashSet<InstanceId> = HashSet::new();
        visited.insert(id);

        while let Some(parent) = stack.pop() {
            if !visited.insert(parent) {
                continue;
            }
            let Some(instance) = self.instances.get_mut(&parent) else {
                continue;
            };
            if instance.tree().is_child_dirty() {
                continue;
            }
            instance.tree_mut().mark_child_dirty();
            let grandparents: Vec<InstanceId> =
                instance.tree().parents().iter().map(|(p, _)| *p).collect();
            stack.extend(grandparents);
        }
    }

    // ---- validation ----

    fn check_element_declared(&self, element: ElementKind) -> Result<(), MutateError> {
        if let ElementKind::Ref(kind) = element {
            if self.schemas.descriptor(kind).is_none() {
                return Err(MutateError::UnknownSchemaKind);
            }
        }
        Ok(())
    }

    fn check_field_value(
        &self,
        field: &FieldDescriptor,
        value: &Value,
    ) -> Result<(), MutateError> {
        let ok = match field.kind {
            FieldKind::Primitive(primitive) => value.primitive_kind() == Some(primitive),
            FieldKind::Ref(declared) => self.ref_satisfies(value, declared),
            FieldKind::Array(element) => self.container_satisfies(value, element, "array"),
            FieldKind::Map(element) => self.container_satisfies(value, element, "map"),
            FieldKind::Set(element) => self.container_satisfies(value, element, "set"),
        };
        if ok {
            Ok(())
        } else {
            Err(MutateError::TypeMismatch {
                context: field.name.clone(),
            })
        }
    }

    fn check_element_value(
        &self,
        element: ElementKind,
        value: &Value,
        context: &str,
    ) -> Result<(), MutateError> {
        let ok = match element {
            ElementKind::Primitive(primitive) => value.primitive_kind() == Some(primitive),
            ElementKind::Ref(declared) => self.ref_satisfies(value, declared),
        };
        if ok {
            Ok(())
        } else {
            Err(MutateError::TypeMismatch {
                context: context.to_string(),
            })
        }
    }

    /// Runtime type of the referenced instance must be the declared kind or
    /// one of its descendants.
    fn ref_satisfies(&self, value: &Value, declared: SchemaKind) -> bool {
        let Some(child) = value.as_instance() else {
            return false;
        };
        match self.instances.get(&child) {
            Some(Instance::Object(object)) => self.schemas.is_subtype(object.kind(), declared),
            _ => false,
        }
    }

    fn container_satisfies(&self, value: &Value, element: ElementKind, shape: &str) -> bool {
        let Some(child) = value.as_instance() else {
            return false;
        };
        match (self.instances.get(&child), shape) {
            (Some(Instance::Array(array)), "array") => array.element() == element,
            (Some(Instance::Map(map)), "map") => map.element() == element,
            (Some(Instance::Set(set)), "set") => set.element() == element,
            _ => false,
        }
    }

    fn array(&self, id: InstanceId) -> Result<&ArrayInstance, MutateError> {
        match self.instances.get(&id).ok_or(MutateError::UnknownInstance)? {
            Instance::Array(array) => Ok(array),
            other => Err(MutateError::WrongShape {
                expected: "array",
                found: other.kind_label(),
            }),
        }
    }

    fn array_mut(&mut self, id: InstanceId) -> Result<&mut ArrayInstance, MutateError> {
        match self
            .instances
            .get_mut(&id)
            .ok_or(MutateError::UnknownInstance)?
        {
            Instance::Array(array) => Ok(array),
            other => Err(MutateError::WrongShape {
                expected: "array",
                found: other.kind_label(),
            }),
        }
    }

    fn map(&self, id: InstanceId) -> Result<&MapInstance, MutateError> {
        match self.instances.get(&id).ok_or(MutateError::UnknownInstance)? {
            Instance::Map(map) => Ok(map),
            other => Err(MutateError::WrongShape {
                expected: "map",
                found: other.kind_label(),
            }),
        }
    }

    fn map_mut(&mut self, id: InstanceId) -> Result<&mut MapInstance, MutateError> {
        match self
            .instances
            .get_mut(&id)
            .ok_or(MutateError::UnknownInstance)?
        {
            Instance::Map(map) => Ok(map),
            other => Err(MutateError::WrongShape {
                expected: "map",
                found: other.kind_label(),
            }),
        }
    }

    fn set(&self, id: InstanceId) -> Result<&SetInstance, MutateError> {
        match self.instances.get(&id).ok_or(MutateError::UnknownInstance)? {
            Instance::Set(set) => Ok(set),
            other => Err(MutateError::WrongShape {
                expected: "set",
                found: other.kind_label(),
            }),
        }
    }

    fn set_mut(&mut self, id: InstanceId) -> Result<&mut SetInstance, MutateError> {
        match self
            .instances
            .get_mut(&id)
            .ok_or(MutateError::UnknownInstance)?
        {
            Instance::Set(set) => Ok(set),
            other => Err(MutateError::WrongShape {
                expected: "set",
                found: other.kind_label(),
            }),
        }
    }
}
