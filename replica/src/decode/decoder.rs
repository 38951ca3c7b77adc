use log::warn;

use replica_serde::{BitReader, Serde, UnsignedVariableInteger};

use crate::change::SlotId;
use crate::decode::error::DecodeError;
use crate::decode::event::SyncEvent;
use crate::decode::listener::Listeners;
use crate::graph::instance::Instance;
use crate::graph::{Graph, InstanceId, MutateError};
use crate::schema::{ElementKind, FieldKind, SchemaKind, SchemaKinds};
use crate::tracker::RefId;
use crate::value::Value;
use crate::wire::{self, RawValue};

/// What a reference slot statically declares, used to instantiate unknown
/// instances as they are introduced.
#[derive(Debug, Clone, Copy)]
enum DeclaredShape {
    Object(SchemaKind),
    Array(ElementKind),
    Map(ElementKind),
    Set(ElementKind),
}

/// A reference operation whose target id is being introduced by the very
/// next structural marker. The encoder guarantees that adjacency.
struct PendingRef {
    ref_id: RefId,
    owner: InstanceId,
    slot: SlotId,
    shape: DeclaredShape,
    is_add: bool,
    key: Option<String>,
    prior: Option<InstanceId>,
}

/// Replays patch bytes against a mirrored graph, firing listeners in wire
/// order and running the deferred GC pass at each patch boundary.
pub struct Decoder {
    graph: Graph,
    listeners: Listeners,
}

impl Decoder {
    /// Construct an empty mirror of the given root type. Must match the
    /// encode side's registration (compile-time shared schemas, or a table
    /// received through the reflection channel).
    pub fn new(schemas: SchemaKinds, root_kind: SchemaKind) -> Result<Self, MutateError> {
        Ok(Self {
            graph: Graph::new(schemas, root_kind)?,
            listeners: Listeners::new(),
        })
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn root(&self) -> InstanceId {
        self.graph.root()
    }

    pub fn listeners_mut(&mut self) -> &mut Listeners {
        &mut self.listeners
    }

    /// Apply one patch. Always runs to completion against the bytes given;
    /// tolerated anomalies are logged and skipped, malformed streams error.
    /// Returns every fired event, in wire order.
    pub fn decode(&mut self, bytes: &[u8]) -> Result<Vec<SyncEvent>, DecodeError> {
        if bytes.is_empty() {
            return Ok(Vec::new());
        }

        let mut reader = BitReader::new(bytes);
        let op_count = wire::read_count(&mut reader)?;

        let mut context: Vec<InstanceId> = Vec::new();
        let mut pending: Option<PendingRef> = None;
        let mut skip_depth: usize = 0;
        let mut events: Vec<SyncEvent> = Vec::new();

        for _ in 0..op_count {
            let opcode = wire::read_opcode(&mut reader)?;

            if pending.is_some() && opcode != wire::OP_PUSH {
                warn!("pending reference was not introduced by a structural marker; dropping it");
                pending = None;
            }

            match opcode {
                wire::OP_PUSH => {
                    let ref_id = RefId::de(&mut reader)?;
                    let tag = if bool::de(&mut reader)? {
                        Some(SchemaKind::de(&mut reader)?)
                    } else {
                        None
                    };
                    if skip_depth > 0 {
                        skip_depth += 1;
                        continue;
                    }
                    self.enter_context(
                        ref_id,
                        tag,
                        &mut context,
                        &mut pending,
                        &mut skip_depth,
                        &mut events,
                    )?;
                }
                wire::OP_POP => {
                    if skip_depth > 0 {
                        skip_depth -= 1;
                        continue;
                    }
                    if context.pop().is_none() {
                        return Err(DecodeError::UnbalancedPop);
                    }
                }
                wire::OP_ADD | wire::OP_REPLACE | wire::OP_DELETE_AND_ADD => {
                    let slot = wire::read_slot(&mut reader)?;
                    let key = if opcode == wire::OP_ADD && bool::de(&mut reader)? {
                        Some(String::de(&mut reader)?)
                    } else {
                        None
                    };
                    let (tag, raw) = wire::read_value(&mut reader)?;
                    if skip_depth > 0 {
                        continue; // payload consumed, block is being discarded
                    }
                    let raw = raw.ok_or(DecodeError::UnknownValueTag { tag })?;
                    let current = *context.last().ok_or(DecodeError::NoContext)?;
                    let is_add = opcode == wire::OP_ADD;
                    self.apply_value_op(
                        current,
                        slot,
                        is_add,
                        key,
                        raw,
                        &mut pending,
                        &mut events,
                    )?;
                }
                wire::OP_DELETE => {
                    let slot = wire::read_slot(&mut reader)?;
                    if skip_depth > 0 {
                        continue;
                    }
                    let current = *context.last().ok_or(DecodeError::NoContext)?;
                    self.apply_delete(current, slot, &mut events);
                }
                wire::OP_CLEAR => {
                    if skip_depth > 0 {
                        continue;
                    }
                    let current = *context.last().ok_or(DecodeError::NoContext)?;
                    self.apply_clear(current, &mut events);
                }
                wire::OP_MOVE => {
                    let slot = wire::read_slot(&mut reader)?;
                    let to = UnsignedVariableInteger::<5>::de(&mut reader)?.to_usize();
                    if skip_depth > 0 {
                        continue;
                    }
                    let current = *context.last().ok_or(DecodeError::NoContext)?;
                    self.apply_move(current, slot, to, &mut events);
                }
                _ => unreachable!("3-bit opcode space is fully assigned"),
            }
        }

        if skip_depth == 0 && !context.is_empty() {
            warn!("patch ended with unbalanced structural markers");
        }

        // the patch boundary: deferred GC runs exactly once, after every
        // operation has been applied
        let removed = self.graph.collect_garbage();
        for (_, instance) in removed {
            self.emit(&mut events, SyncEvent::InstanceRemoved { instance });
        }

        Ok(events)
    }

    fn emit(&mut self, events: &mut Vec<SyncEvent>, event: SyncEvent) {
        self.listeners.fire(&self.graph, &event);
        events.push(event);
    }

    fn enter_context(
        &mut self,
        ref_id: RefId,
        tag: Option<SchemaKind>,
        context: &mut Vec<InstanceId>,
        pending: &mut Option<PendingRef>,
        skip_depth: &mut usize,
        events: &mut Vec<SyncEvent>,
    ) -> Result<(), DecodeError> {
        if let Some(existing) = self.graph.tracker().instance(ref_id) {
            // attach-existing or navigate-into-known: same path
            context.push(existing);
            return Ok(());
        }

        let introduces_pending = pending
            .as_ref()
            .map(|p| p.ref_id == ref_id)
            .unwrap_or(false);
        if introduces_pending {
            let p = pending.take().expect("checked above");
            match self.instantiate(p.shape, tag) {
                Some(instance) => {
                    self.graph.tracker_mut().register(ref_id, instance);
                    self.emit(events, SyncEvent::InstanceCreated { instance });
                    self.complete_pending(p, instance, events)?;
                    context.push(instance);
                }
                None => {
                    warn!("cannot instantiate introduced instance (unknown schema kind); skipping block");
                    *skip_depth = 1;
                }
            }
            return Ok(());
        }

        // tolerated: encoder/decoder may be skewed during compatibility
        // windows; consume the block and continue with the rest
        warn!("structural marker references an identifier that does not exist and is not being introduced; skipping block");
        *skip_depth = 1;
        Ok(())
    }

    fn instantiate(&mut self, shape: DeclaredShape, tag: Option<SchemaKind>) -> Option<InstanceId> {
        match shape {
            DeclaredShape::Object(declared) => {
                let kind = match tag {
                    Some(tagged) => {
                        if self.graph.schemas().descriptor(tagged).is_none() {
                            return None;
                        }
                        tagged
                    }
                    None => declared,
                };
                self.graph.create_object(kind).ok()
            }
            DeclaredShape::Array(element) => self.graph.create_array(element).ok(),
            DeclaredShape::Map(element) => self.graph.create_map(element).ok(),
            DeclaredShape::Set(element) => self.graph.create_set(element).ok(),
        }
    }

    /// Finish the deferred slot assignment once the pending instance has
    /// been materialized. Observers see one event: a DeleteAndAdd never
    /// surfaces a transient unset.
    fn complete_pending(
        &mut self,
        p: PendingRef,
        instance: InstanceId,
        events: &mut Vec<SyncEvent>,
    ) -> Result<(), DecodeError> {
        if let Some(prior) = p.prior {
            self.graph.detach(prior, p.owner, p.slot);
        }
        let event = match self.graph.instance_mut(p.owner) {
            Some(Instance::Object(object)) => {
                object.set_field(p.slot as u8, Some(Value::Ref(instance)));
                SyncEvent::FieldChanged {
                    instance: p.owner,
                    index: p.slot as u8,
                }
            }
            Some(Instance::Array(array)) => {
                if p.is_add {
                    array.apply_add(p.slot, Value::Ref(instance));
                    SyncEvent::EntryAdded {
                        container: p.owner,
                        index: array.len() - 1,
                        key: None,
                    }
                } else {
                    let _ = array.replace_slot(p.slot, Value::Ref(instance));
                    SyncEvent::EntryChanged {
                        container: p.owner,
                        index: array.position_of_slot(p.slot).unwrap_or(0),
                        key: None,
                    }
                }
            }
            Some(Instance::Map(map)) => {
                if p.is_add {
                    let key = p.key.clone().ok_or(DecodeError::MissingKey)?;
                    map.apply_add(p.slot, key.clone(), Value::Ref(instance));
                    SyncEvent::EntryAdded {
                        container: p.owner,
                        index: map.len() - 1,
                        key: Some(key),
                    }
                } else {
                    let _ = map.replace_slot(p.slot, Value::Ref(instance));
                    let key = map.key_of_slot(p.slot).map(str::to_string);
                    SyncEvent::EntryChanged {
                        container: p.owner,
                        index: 0,
                        key,
                    }
                }
            }
            Some(Instance::Set(set)) => {
                set.apply_add(p.slot, Value::Ref(instance));
                SyncEvent::EntryAdded {
                    container: p.owner,
                    index: set.len() - 1,
                    key: None,
                }
            }
            None => return Ok(()),
        };
        self.graph.attach(instance, p.owner, p.slot);
        self.emit(events, event);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_value_op(
        &mut self,
        current: InstanceId,
        slot: SlotId,
        is_add: bool,
        key: Option<String>,
        raw: RawValue,
        pending: &mut Option<PendingRef>,
        events: &mut Vec<SyncEvent>,
    ) -> Result<(), DecodeError> {
        enum Shape {
            Object(SchemaKind),
            Container(ElementKind),
        }
        let shape = match self.graph.instance(current) {
            Some(Instance::Object(object)) => Shape::Object(object.kind()),
            Some(Instance::Array(array)) => Shape::Container(array.element()),
            Some(Instance::Map(map)) => Shape::Container(map.element()),
            Some(Instance::Set(set)) => Shape::Container(set.element()),
            None => return Ok(()),
        };
        match shape {
            Shape::Object(kind) => {
                if slot as usize >= crate::schema::MAX_FIELDS {
                    return Ok(()); // outside the index space, discard
                }
                let Some(field) = self.graph.schemas().field(kind, slot as u8).cloned() else {
                    // schema evolution: an index this descriptor does not
                    // declare is consumed and discarded
                    return Ok(());
                };
                self.apply_object_value(current, slot, field.kind, &field.name, raw, pending, events)
            }
            Shape::Container(element) => {
                self.apply_container_value(current, slot, is_add, key, element, raw, pending, events)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_object_value(
        &mut self,
        current: InstanceId,
        slot: SlotId,
        declared: FieldKind,
        field_name: &str,
        raw: RawValue,
        pending: &mut Option<PendingRef>,
        events: &mut Vec<SyncEvent>,
    ) -> Result<(), DecodeError> {
        let prior = self
            .graph
            .field(current, slot as u8)
            .ok()
            .flatten()
            .and_then(Value::as_instance);

        match raw {
            RawValue::Ref(ref_id) => {
                let shape = match declared {
                    FieldKind::Ref(kind) => DeclaredShape::Object(kind),
                    FieldKind::Array(element) => DeclaredShape::Array(element),
                    FieldKind::Map(element) => DeclaredShape::Map(element),
                    FieldKind::Set(element) => DeclaredShape::Set(element),
                    FieldKind::Primitive(_) => {
                        return Err(DecodeError::ValueMismatch {
                            context: field_name.to_string(),
                        })
                    }
                };
                match self.graph.tracker().instance(ref_id) {
                    Some(existing) => {
                        if prior != Some(existing) {
                            if let Some(old) = prior {
                                self.graph.detach(old, current, slot);
                            }
                            if let Some(Instance::Object(object)) = self.graph.instance_mut(current)
                            {
                                object.set_field(slot as u8, Some(Value::Ref(existing)));
                            }
                            self.graph.attach(existing, current, slot);
                        }
                        self.emit(
                            events,
                            SyncEvent::FieldChanged {
                                instance: current,
                                index: slot as u8,
                            },
                        );
                    }
                    None => {
                        *pending = Some(PendingRef {
                            ref_id,
                            owner: current,
                            slot,
                            shape,
                            is_add: true,
                            key: None,
                            prior,
                        });
                    }
                }
                Ok(())
            }
            scalar => {
                let value = scalar.into_scalar().expect("ref handled above");
                let matches = match declared {
                    FieldKind::Primitive(primitive) => {
                        value.primitive_kind() == Some(primitive)
                    }
                    _ => false,
                };
                if !matches {
                    return Err(DecodeError::ValueMismatch {
                        context: field_name.to_string(),
                    });
                }
                if let Some(Instance::Object(object)) = self.graph.instance_mut(current) {
                    object.set_field(slot as u8, Some(value));
                }
                self.emit(
                    events,
                    SyncEvent::FieldChanged {
                        instance: current,
                        index: slot as u8,
                    },
                );
                Ok(())
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_container_value(
        &mut self,
        current: InstanceId,
        slot: SlotId,
        is_add: bool,
        key: Option<String>,
        element: ElementKind,
        raw: RawValue,
        pending: &mut Option<PendingRef>,
        events: &mut Vec<SyncEvent>,
    ) -> Result<(), DecodeError> {
        match raw {
            RawValue::Ref(ref_id) => {
                let declared = match element {
                    ElementKind::Ref(kind) => kind,
                    ElementKind::Primitive(_) => {
                        return Err(DecodeError::ValueMismatch {
                            context: "container element".to_string(),
                        })
                    }
                };
                let prior = if is_add {
                    None
                } else {
                    self.graph
                        .instance(current)
                        .and_then(|instance| instance.value_at_slot(slot))
                        .and_then(Value::as_instance)
                };
                match self.graph.tracker().instance(ref_id) {
                    Some(existing) => {
                        self.apply_known_container_ref(
                            current, slot, is_add, key, existing, prior, events,
                        )?;
                    }
                    None => {
                        *pending = Some(PendingRef {
                            ref_id,
                            owner: current,
                            slot,
                            shape: DeclaredShape::Object(declared),
                            is_add,
                            key,
                            prior,
                        });
                    }
                }
                Ok(())
            }
            scalar => {
                let value = scalar.into_scalar().expect("ref handled above");
                let matches = match element {
                    ElementKind::Primitive(primitive) => {
                        value.primitive_kind() == Some(primitive)
                    }
                    ElementKind::Ref(_) => false,
                };
                if !matches {
                    return Err(DecodeError::ValueMismatch {
                        context: "container element".to_string(),
                    });
                }
                let event = match self.graph.instance_mut(current) {
                    Some(Instance::Array(array)) => {
                        if is_add {
                            array.apply_add(slot, value);
                            Some(SyncEvent::EntryAdded {
                                container: current,
                                index: array.len() - 1,
                                key: None,
                            })
                        } else if array.replace_slot(slot, value).is_some() {
                            Some(SyncEvent::EntryChanged {
                                container: current,
                                index: array.position_of_slot(slot).unwrap_or(0),
                                key: None,
                            })
                        } else {
                            warn!("container operation addresses an entry that is not present");
                            None
                        }
                    }
                    Some(Instance::Map(map)) => {
                        if is_add {
                            let key = key.ok_or(DecodeError::MissingKey)?;
                            map.apply_add(slot, key.clone(), value);
                            Some(SyncEvent::EntryAdded {
                                container: current,
                                index: map.len() - 1,
                                key: Some(key),
                            })
                        } else if map.replace_slot(slot, value).is_some() {
                            let key = map.key_of_slot(slot).map(str::to_string);
                            Some(SyncEvent::EntryChanged {
                                container: current,
                                index: 0,
                                key,
                            })
                        } else {
                            warn!("container operation addresses an entry that is not present");
                            None
                        }
                    }
                    Some(Instance::Set(set)) => {
                        if is_add {
                            set.apply_add(slot, value);
                            Some(SyncEvent::EntryAdded {
                                container: current,
                                index: set.len() - 1,
                                key: None,
                            })
                        } else {
                            warn!("set entries are add/remove only");
                            None
                        }
                    }
                    _ => None,
                };
                if let Some(event) = event {
                    self.emit(events, event);
                }
                Ok(())
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_known_container_ref(
        &mut self,
        current: InstanceId,
        slot: SlotId,
        is_add: bool,
        key: Option<String>,
        existing: InstanceId,
        prior: Option<InstanceId>,
        events: &mut Vec<SyncEvent>,
    ) -> Result<(), DecodeError> {
        let changed_identity = prior != Some(existing);
        let event = match self.graph.instance_mut(current) {
            Some(Instance::Array(array)) => {
                if is_add {
                    array.apply_add(slot, Value::Ref(existing));
                    Some(SyncEvent::EntryAdded {
                        container: current,
                        index: array.len() - 1,
                        key: None,
                    })
                } else if array.replace_slot(slot, Value::Ref(existing)).is_some() {
                    Some(SyncEvent::EntryChanged {
                        container: current,
                        index: array.position_of_slot(slot).unwrap_or(0),
                        key: None,
                    })
                } else {
                    warn!("container operation addresses an entry that is not present");
                    None
                }
            }
            Some(Instance::Map(map)) => {
                if is_add {
                    let key = key.ok_or(DecodeError::MissingKey)?;
                    map.apply_add(slot, key.clone(), Value::Ref(existing));
                    Some(SyncEvent::EntryAdded {
                        container: current,
                        index: map.len() - 1,
                        key: Some(key),
                    })
                } else if map.replace_slot(slot, Value::Ref(existing)).is_some() {
                    let key = map.key_of_slot(slot).map(str::to_string);
                    Some(SyncEvent::EntryChanged {
                        container: current,
                        index: 0,
                        key,
                    })
                } else {
                    warn!("container operation addresses an entry that is not present");
                    None
                }
            }
            Some(Instance::Set(set)) => {
                if is_add {
                    set.apply_add(slot, Value::Ref(existing));
                    Some(SyncEvent::EntryAdded {
                        container: current,
                        index: set.len() - 1,
                        key: None,
                    })
                } else {
                    None
                }
            }
            _ => None,
        };
        if event.is_some() && changed_identity {
            if let Some(prior) = prior {
                self.graph.detach(prior, current, slot);
            }
            self.graph.attach(existing, current, slot);
        }
        if let Some(event) = event {
            self.emit(events, event);
        }
        Ok(())
    }

    fn apply_delete(
        &mut self,
        current: InstanceId,
        slot: SlotId,
        events: &mut Vec<SyncEvent>,
    ) {
        let object_state = match self.graph.instance(current) {
            Some(Instance::Object(object)) => {
                Some((object.kind(), object.field(slot as u8).cloned()))
            }
            Some(_) => None,
            None => return,
        };

        let event = if let Some((kind, old)) = object_state {
            if slot as usize >= crate::schema::MAX_FIELDS
                || self.graph.schemas().field(kind, slot as u8).is_none()
            {
                return; // schema evolution: discard silently
            }
            let Some(old_value) = old else {
                return; // already unset
            };
            if let Some(child) = old_value.as_instance() {
                self.graph.detach(child, current, slot);
            }
            if let Some(Instance::Object(object)) = self.graph.instance_mut(current) {
                object.set_field(slot as u8, None);
            }
            Some(SyncEvent::FieldRemoved {
                instance: current,
                index: slot as u8,
            })
        } else {
            let removed = match self.graph.instance_mut(current) {
                Some(Instance::Array(array)) => array.remove_slot(slot).map(|v| (None, v)),
                Some(Instance::Map(map)) => map.remove_slot(slot).map(|(k, v)| (Some(k), v)),
                Some(Instance::Set(set)) => set.remove_slot(slot).map(|v| (None, v)),
                _ => None,
            };
            match removed {
                Some((key, value)) => {
                    if let Some(child) = value.as_instance() {
                        self.graph.detach(child, current, slot);
                    }
                    Some(SyncEvent::EntryRemoved {
                        container: current,
                        key,
                    })
                }
                None => {
                    warn!("delete addresses an entry that is not present");
                    None
                }
            }
        };
        if let Some(event) = event {
            self.emit(events, event);
        }
    }

    fn apply_clear(&mut self, current: InstanceId, events: &mut Vec<SyncEvent>) {
        let cleared: Option<Vec<(SlotId, Option<InstanceId>)>> =
            match self.graph.instance_mut(current) {
                Some(Instance::Array(array)) => Some(
                    array
                        .clear_entries()
                        .into_iter()
                        .map(|(slot, value)| (slot, value.as_instance()))
                        .collect(),
                ),
                Some(Instance::Map(map)) => Some(
                    map.clear_entries()
                        .into_iter()
                        .map(|(slot, _, value)| (slot, value.as_instance()))
                        .collect(),
                ),
                Some(Instance::Set(set)) => Some(
                    set.clear_entries()
                        .into_iter()
                        .map(|(slot, value)| (slot, value.as_instance()))
                        .collect(),
                ),
                _ => {
                    warn!("clear operation on a non-container context");
                    None
                }
            };
        if let Some(cleared) = cleared {
            for (slot, child) in &cleared {
                if let Some(child) = child {
                    self.graph.detach(*child, current, *slot);
                }
            }
            self.emit(events, SyncEvent::Cleared { container: current });
        }
    }

    fn apply_move(
        &mut self,
        current: InstanceId,
        slot: SlotId,
        to: usize,
        events: &mut Vec<SyncEvent>,
    ) {
        let moved = match self.graph.instance_mut(current) {
            Some(Instance::Array(array)) => {
                let from = array.position_of_slot(slot);
                match from {
                    Some(from) => {
                        array.move_slot(slot, to);
                        Some((from, to))
                    }
                    None => {
                        warn!("move addresses an entry that is not present");
                        None
                    }
                }
            }
            _ => {
                warn!("move operation on a non-array context");
                None
            }
        };
        if let Some((from, to)) = moved {
            self.emit(
                events,
                SyncEvent::EntryMoved {
                    container: current,
                    from,
                    to,
                },
            );
        }
    }
}
