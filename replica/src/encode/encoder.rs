use std::collections::HashSet;

use replica_serde::{BitWriter, Serde, UnsignedVariableInteger};

use crate::change::{ChangeOp, OpKind, SlotId};
use crate::encode::error::EncodeError;
use crate::encode::op_log::LoggedOp;
use crate::encode::view::View;
use crate::graph::array::ArrayInstance;
use crate::graph::instance::Instance;
use crate::graph::{Graph, InstanceId};
use crate::schema::{ElementKind, FieldKind, SchemaKind};
use crate::value::Value;
use crate::wire;

/// Serializes dirty change trees into patches and snapshots.
///
/// An encode pass is two-phase: first a depth-first walk over the dirty
/// subgraph builds a flat operation log (minting wire ids for instances
/// that become reachable), then the log is serialized reading values live
/// from the graph. The log of the last incremental pass is retained so
/// per-observer view buffers can be derived from the same dirty set,
/// without re-deriving anything from live objects.
pub struct Encoder {
    log: Vec<LoggedOp>,
    /// Instances whose full introduction has been emitted into the
    /// incremental stream. Children outside this set are introduced inline,
    /// even when a snapshot pass already minted their id.
    introduced: HashSet<InstanceId>,
}

impl Encoder {
    pub fn new() -> Self {
        Self {
            log: Vec::new(),
            introduced: HashSet::new(),
        }
    }

    /// Incremental patch: everything recorded since the previous call.
    /// Flushes the pending sets of every encoded tree and runs the deferred
    /// GC pass; this is the patch boundary.
    pub fn encode(&mut self, graph: &mut Graph) -> Result<Vec<u8>, EncodeError> {
        let mut log = Vec::new();
        let mut visited = HashSet::new();
        let mut flushed = Vec::new();
        let mut seen = HashSet::new();

        let root = graph.root();
        self.introduced.insert(root);
        walk_dirty(
            graph,
            root,
            &self.introduced,
            &mut log,
            &mut visited,
            &mut flushed,
            &mut seen,
        );

        let bytes = serialize(graph, &log)?;

        for id in &flushed {
            if let Some(instance) = graph.instance_mut(*id) {
                instance.tree_mut().flush_pending();
                if let Instance::Array(array) = instance {
                    array.mark_order_synced();
                }
            }
        }
        for id in &seen {
            if let Some(instance) = graph.instance_mut(*id) {
                instance.tree_mut().clear_child_dirty();
            }
        }

        self.introduced.extend(visited);
        for (_, instance) in graph.collect_garbage() {
            self.introduced.remove(&instance);
        }

        self.log = log;
        Ok(bytes)
    }

    /// Full snapshot for a newly-joining observer, from the cumulative
    /// sets. Pending sets are left untouched and no GC runs, so the
    /// incremental stream of existing observers is unaffected.
    pub fn encode_all(&mut self, graph: &mut Graph) -> Result<Vec<u8>, EncodeError> {
        let log = snapshot_log(graph);
        serialize(graph, &log)
    }

    /// Observer-specific subset of the last incremental patch. A pure
    /// post-pass over the retained operation log: encoding for one observer
    /// never affects what another observer receives. Must be called before
    /// the graph is mutated again.
    pub fn encode_for_view(&self, graph: &Graph, view: &View) -> Result<Vec<u8>, EncodeError> {
        let filtered = filter_log(graph, &self.log, view);
        serialize(graph, &filtered)
    }

    /// Observer-specific full snapshot.
    pub fn encode_all_for_view(
        &mut self,
        graph: &mut Graph,
        view: &View,
    ) -> Result<Vec<u8>, EncodeError> {
        let log = snapshot_log(graph);
        let filtered = filter_log(graph, &log, view);
        serialize(graph, &filtered)
    }
}

/// Build the full-snapshot log: every reachable instance's cumulative set,
/// depth-first from the root, children introduced inline at their first
/// reference.
fn snapshot_log(graph: &mut Graph) -> Vec<LoggedOp> {
    let mut log = Vec::new();
    let mut visited = HashSet::new();
    let mut flushed = Vec::new();
    let root = graph.root();
    emit_full_block(
        graph,
        root,
        None,
        true,
        &HashSet::new(),
        &mut log,
        &mut visited,
        &mut flushed,
    );
    log
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Depth-first walk over dirty / descendant-dirty trees.
#[allow(clippy::too_many_arguments)]
fn walk_dirty(
    graph: &mut Graph,
    id: InstanceId,
    introduced: &HashSet<InstanceId>,
    log: &mut Vec<LoggedOp>,
    visited: &mut HashSet<InstanceId>,
    flushed: &mut Vec<InstanceId>,
    seen: &mut HashSet<InstanceId>,
) {
    if !seen.insert(id) {
        return;
    }
    let (dirty, child_dirty) = match graph.instance(id) {
        Some(instance) => (
            instance.tree().is_dirty(),
            instance.tree().is_child_dirty(),
        ),
        None => return,
    };
    if !dirty && !child_dirty {
        return;
    }

    if dirty && !visited.contains(&id) {
        emit_dirty_block(graph, id, introduced, log, visited, flushed);
    }

    let children: Vec<InstanceId> = graph
        .instance(id)
        .map(|instance| {
            instance
                .outgoing_refs()
                .into_iter()
                .map(|(_, child)| child)
                .collect()
        })
        .unwrap_or_default();
    for child in children {
        walk_dirty(graph, child, introduced, log, visited, flushed, seen);
    }
}

/// Emit one dirty tree's pending operations, wire order = recorded order.
/// Reference values without an introduced target get that target's full
/// block inline, immediately after the introducing operation.
fn emit_dirty_block(
    graph: &mut Graph,
    id: InstanceId,
    introduced: &HashSet<InstanceId>,
    log: &mut Vec<LoggedOp>,
    visited: &mut HashSet<InstanceId>,
    flushed: &mut Vec<InstanceId>,
) {
    visited.insert(id);
    flushed.push(id);
    let ref_id = graph.tracker_mut().assign_id(id);
    log.push(LoggedOp::Push {
        instance: id,
        ref_id,
        tag: None,
    });

    let ops: Vec<ChangeOp> = graph
        .instance(id)
        .map(|instance| instance.tree().pending().to_vec())
        .unwrap_or_default();
    for op in &ops {
        log.push(LoggedOp::Op { owner: id, op: *op });
        if matches!(
            op.kind,
            OpKind::Add | OpKind::Replace | OpKind::DeleteAndAdd
        ) {
            let child = graph
                .instance(id)
                .and_then(|instance| instance.value_at_slot(op.slot))
                .and_then(Value::as_instance);
            if let Some(child) = child {
                if !introduced.contains(&child) && !visited.contains(&child) {
                    let declared = declared_ref_kind(graph, id, op.slot);
                    emit_full_block(
                        graph, child, declared, false, introduced, log, visited, flushed,
                    );
                }
            }
        }
    }

    if let Some(Instance::Array(array)) = graph.instance(id) {
        for (slot, to) in synthesize_moves(array, &ops) {
            log.push(LoggedOp::Move {
                owner: id,
                slot,
                to,
            });
        }
    }

    log.push(LoggedOp::Pop);
}

/// Emit an instance's full operation set (cumulative membership, live
/// values), recursing into every not-yet-emitted reference. `introduce_all`
/// distinguishes snapshots (everything is new to the observer) from inline
/// introduction during an incremental pass.
#[allow(clippy::too_many_arguments)]
fn emit_full_block(
    graph: &mut Graph,
    id: InstanceId,
    declared: Option<SchemaKind>,
    introduce_all: bool,
    introduced: &HashSet<InstanceId>,
    log: &mut Vec<LoggedOp>,
    visited: &mut HashSet<InstanceId>,
    flushed: &mut Vec<InstanceId>,
) {
    if !visited.insert(id) {
        return;
    }
    flushed.push(id);
    let ref_id = graph.tracker_mut().assign_id(id);
    let tag = match graph.instance(id) {
        Some(Instance::Object(object)) => match declared {
            Some(declared_kind) if declared_kind != object.kind() => Some(object.kind()),
            _ => None,
        },
        _ => None,
    };
    log.push(LoggedOp::Push {
        instance: id,
        ref_id,
        tag,
    });

    let ops = snapshot_ops(graph, id);
    for op in &ops {
        log.push(LoggedOp::Op { owner: id, op: *op });
        let child = graph
            .instance(id)
            .and_then(|instance| instance.value_at_slot(op.slot))
            .and_then(Value::as_instance);
        if let Some(child) = child {
            let needs_intro = if introduce_all {
                true
            } else {
                !introduced.contains(&child)
            };
            if needs_intro && !visited.contains(&child) {
                let declared = declared_ref_kind(graph, id, op.slot);
                emit_full_block(
                    graph,
                    child,
                    declared,
                    introduce_all,
                    introduced,
                    log,
                    visited,
                    flushed,
                );
            }
        }
    }

    log.push(LoggedOp::Pop);
}

/// The full operation set of one instance: cumulative membership, emitted
/// as Adds. Objects keep first-write order; containers use live logical
/// order, so no remaps are needed on a fresh decode.
fn snapshot_ops(graph: &Graph, id: InstanceId) -> Vec<ChangeOp> {
    let Some(instance) = graph.instance(id) else {
        return Vec::new();
    };
    match instance {
        Instance::Object(_) => instance
            .tree()
            .cumulative()
            .iter()
            .map(|op| ChangeOp::new(op.slot, OpKind::Add))
            .collect(),
        Instance::Array(array) => container_snapshot(
            instance,
            array.entries().iter().map(|(slot, _)| *slot),
        ),
        Instance::Map(map) => container_snapshot(
            instance,
            map.entries().iter().map(|(slot, _, _)| *slot),
        ),
        Instance::Set(set) => container_snapshot(
            instance,
            set.entries().iter().map(|(slot, _)| *slot),
        ),
    }
}

fn container_snapshot(
    instance: &Instance,
    live_slots: impl Iterator<Item = SlotId>,
) -> Vec<ChangeOp> {
    let membership: HashSet<SlotId> = instance
        .tree()
        .cumulative()
        .iter()
        .map(|op| op.slot)
        .collect();
    live_slots
        .filter(|slot| membership.contains(slot))
        .map(|slot| ChangeOp::new(slot, OpKind::Add))
        .collect()
}

/// The statically declared object kind of a reference slot, used to decide
/// whether a polymorphic type tag must travel with the structural marker.
fn declared_ref_kind(graph: &Graph, owner: InstanceId, slot: SlotId) -> Option<SchemaKind> {
    match graph.instance(owner)? {
        Instance::Object(object) => match graph.schemas().field(object.kind(), slot as u8)?.kind {
            FieldKind::Ref(kind) => Some(kind),
            _ => None,
        },
        Instance::Array(array) => element_ref_kind(array.element()),
        Instance::Map(map) => element_ref_kind(map.element()),
        Instance::Set(set) => element_ref_kind(set.element()),
    }
}

fn element_ref_kind(element: ElementKind) -> Option<SchemaKind> {
    match element {
        ElementKind::Ref(kind) => Some(kind),
        ElementKind::Primitive(_) => None,
    }
}

/// Diff the mirror's predicted order (synced order minus this patch's
/// deletes, plus its appends) against the live order, and produce the
/// minimal sequence of index remaps that reconciles them.
fn synthesize_moves(array: &ArrayInstance, pending: &[ChangeOp]) -> Vec<(SlotId, u32)> {
    let has_clear = pending.iter().any(|op| op.kind == OpKind::Clear);
    let deleted: HashSet<SlotId> = pending
        .iter()
        .filter(|op| op.kind == OpKind::Delete)
        .map(|op| op.slot)
        .collect();
    let adds: Vec<SlotId> = pending
        .iter()
        .filter(|op| op.kind == OpKind::Add)
        .map(|op| op.slot)
        .collect();

    let mut predicted: Vec<SlotId> = if has_clear {
        Vec::new()
    } else {
        array
            .synced_order()
            .iter()
            .filter(|slot| !deleted.contains(*slot))
            .copied()
            .collect()
    };
    predicted.extend(adds);

    let actual = array.current_order();
    let mut moves = Vec::new();
    for (position, slot) in actual.iter().enumerate() {
        if predicted.get(position) == Some(slot) {
            continue;
        }
        if let Some(from) = predicted.iter().position(|s| s == slot) {
            predicted.remove(from);
        }
        let insert_at = position.min(predicted.len());
        predicted.insert(insert_at, *slot);
        moves.push((*slot, position as u32));
    }
    moves
}

/// Everything one observer may see: reachable from the root without
/// crossing a view-restricted edge the view does not admit. Derived fresh
/// per pass, so filtering stays side-effect-free and visibility persists
/// across patches.
fn visible_set(graph: &Graph, view: &View) -> HashSet<InstanceId> {
    let mut visible: HashSet<InstanceId> = HashSet::new();
    let mut queue = vec![graph.root()];
    visible.insert(graph.root());

    while let Some(id) = queue.pop() {
        let Some(instance) = graph.instance(id) else {
            continue;
        };
        for (slot, child) in instance.outgoing_refs() {
            let restricted = instance
                .schema_kind()
                .and_then(|kind| graph.schemas().field(kind, slot as u8))
                .map(|field| field.view_restricted)
                .unwrap_or(false);
            if restricted && !view.admits(graph, child) {
                continue;
            }
            if visible.insert(child) {
                queue.push(child);
            }
        }
    }

    visible
}

/// Copy the subset of an operation log one observer is allowed to see:
/// operations on invisible owners, and restricted writes the view does not
/// admit, are dropped along with the blocks they would have introduced.
fn filter_log(graph: &Graph, log: &[LoggedOp], view: &View) -> Vec<LoggedOp> {
    let visible = visible_set(graph, view);

    let mut filtered = Vec::new();
    let mut skip_depth: usize = 0;

    for entry in log {
        match entry {
            LoggedOp::Push { instance, .. } => {
                if skip_depth > 0 {
                    skip_depth += 1;
                    continue;
                }
                if visible.contains(instance) {
                    filtered.push(*entry);
                } else {
                    skip_depth = 1;
                }
            }
            LoggedOp::Pop => {
                if skip_depth > 0 {
                    skip_depth -= 1;
                    continue;
                }
                filtered.push(*entry);
            }
            LoggedOp::Move { .. } => {
                if skip_depth == 0 {
                    filtered.push(*entry);
                }
            }
            LoggedOp::Op { owner, op } => {
                if skip_depth > 0 {
                    continue;
                }
                let carries_value = matches!(
                    op.kind,
                    OpKind::Add | OpKind::Replace | OpKind::DeleteAndAdd
                );
                let restricted = graph
                    .instance(*owner)
                    .and_then(Instance::schema_kind)
                    .and_then(|kind| graph.schemas().field(kind, op.slot as u8))
                    .map(|field| field.view_restricted)
                    .unwrap_or(false);

                let admitted = if restricted && carries_value {
                    let subject = graph
                        .instance(*owner)
                        .and_then(|instance| instance.value_at_slot(op.slot))
                        .and_then(Value::as_instance)
                        .unwrap_or(*owner);
                    view.admits(graph, subject)
                } else {
                    true
                };

                if admitted {
                    filtered.push(*entry);
                }
            }
        }
    }

    filtered
}

/// Phase two: serialize a flat log, reading values live from the graph.
fn serialize(graph: &Graph, log: &[LoggedOp]) -> Result<Vec<u8>, EncodeError> {
    if log.is_empty() {
        return Ok(Vec::new());
    }

    let mut writer = BitWriter::new();
    wire::write_count(&mut writer, log.len());

    for entry in log {
        match entry {
            LoggedOp::Push { ref_id, tag, .. } => {
                wire::write_opcode(&mut writer, wire::OP_PUSH);
                ref_id.ser(&mut writer);
                match tag {
                    Some(kind) => {
                        true.ser(&mut writer);
                        kind.ser(&mut writer);
                    }
                    None => false.ser(&mut writer),
                }
            }
            LoggedOp::Pop => {
                wire::write_opcode(&mut writer, wire::OP_POP);
            }
            LoggedOp::Move { slot, to, .. } => {
                wire::write_opcode(&mut writer, wire::OP_MOVE);
                wire::write_slot(&mut writer, *slot);
                UnsignedVariableInteger::<5>::new(*to).ser(&mut writer);
            }
            LoggedOp::Op { owner, op } => match op.kind {
                OpKind::Clear => {
                    wire::write_opcode(&mut writer, wire::OP_CLEAR);
                }
                OpKind::Delete => {
                    wire::write_opcode(&mut writer, wire::OP_DELETE);
                    wire::write_slot(&mut writer, op.slot);
                }
                OpKind::Add => {
                    wire::write_opcode(&mut writer, wire::OP_ADD);
                    wire::write_slot(&mut writer, op.slot);
                    match graph.instance(*owner) {
                        Some(Instance::Map(map)) => {
                            let key = map
                                .key_of_slot(op.slot)
                                .ok_or(EncodeError::MissingValue { slot: op.slot })?;
                            true.ser(&mut writer);
                            key.to_string().ser(&mut writer);
                        }
                        _ => false.ser(&mut writer),
                    }
                    write_live_value(graph, &mut writer, *owner, op.slot)?;
                }
                OpKind::Replace => {
                    wire::write_opcode(&mut writer, wire::OP_REPLACE);
                    wire::write_slot(&mut writer, op.slot);
                    write_live_value(graph, &mut writer, *owner, op.slot)?;
                }
                OpKind::DeleteAndAdd => {
                    wire::write_opcode(&mut writer, wire::OP_DELETE_AND_ADD);
                    wire::write_slot(&mut writer, op.slot);
                    write_live_value(graph, &mut writer, *owner, op.slot)?;
                }
                OpKind::Move => {
                    // moves travel as LoggedOp::Move, never as a ChangeOp
                }
            },
        }
    }

    Ok(writer.to_bytes())
}

fn write_live_value(
    graph: &Graph,
    writer: &mut BitWriter,
    owner: InstanceId,
    slot: SlotId,
) -> Result<(), EncodeError> {
    let value = graph
        .instance(owner)
        .and_then(|instance| instance.value_at_slot(slot))
        .ok_or(EncodeError::MissingValue { slot })?;
    let ref_id = match value {
        Value::Ref(child) => Some(
            graph
                .tracker()
                .ref_id(*child)
                .ok_or(EncodeError::MissingRefId)?,
        ),
        _ => None,
    };
    wire::write_value(writer, value, ref_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_synthesis_is_empty_for_pure_removal() {
        let mut array = ArrayInstance::new(ElementKind::Primitive(
            crate::schema::PrimitiveKind::U8,
        ));
        for byte in [1u8, 2, 3] {
            array.push_entry(Value::U8(byte));
        }
        array.mark_order_synced();

        // remove the head: positions shift, order is still predicted
        let (slot, _) = array.remove_entry(0);
        let pending = vec![ChangeOp::new(slot, OpKind::Delete)];

        assert!(synthesize_moves(&array, &pending).is_empty());
    }

    #[test]
    fn move_synthesis_reconciles_a_sort() {
        let mut array = ArrayInstance::new(ElementKind::Primitive(
            crate::schema::PrimitiveKind::U8,
        ));
        for byte in [3u8, 1, 2] {
            array.push_entry(Value::U8(byte));
        }
        array.mark_order_synced();

        array.sort_entries(&mut |a: &Value, b: &Value| match (a, b) {
            (Value::U8(x), Value::U8(y)) => x.cmp(y),
            _ => std::cmp::Ordering::Equal,
        });

        let moves = synthesize_moves(&array, &[]);
        assert!(!moves.is_empty());

        // applying the moves to the synced order must yield the live order
        let mut simulated: Vec<SlotId> = array.synced_order().to_vec();
        for (slot, to) in moves {
            let from = simulated.iter().position(|s| *s == slot).unwrap();
            simulated.remove(from);
            let to = (to as usize).min(simulated.len());
            simulated.insert(to, slot);
        }
        assert_eq!(simulated, array.current_order());
    }
}
