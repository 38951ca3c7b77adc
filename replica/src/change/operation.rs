use crate::graph::instance_id::InstanceId;

/// Addresses one operation target inside an instance: the field index for
/// objects, a stable per-entry slot id for containers.
pub type SlotId = u32;

/// The closed set of replicated operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Add,
    Replace,
    Delete,
    /// Atomic replace of a reference slot with a different instance;
    /// observers see a single transition, never a transient unset.
    DeleteAndAdd,
    /// Drop every entry of a container.
    Clear,
    /// Reposition a container entry without re-encoding its value. Never
    /// recorded directly: the encoder synthesizes Moves by diffing the
    /// mirrored order against the live order at flush time.
    Move,
}

/// One pending operation in a change tree. Values are never stored here;
/// the encoder reads them live at flush time. `prior` remembers which
/// instance a Delete/DeleteAndAdd displaced, so a later re-add of the same
/// instance collapses to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeOp {
    pub slot: SlotId,
    pub kind: OpKind,
    pub prior: Option<InstanceId>,
}

impl ChangeOp {
    pub fn new(slot: SlotId, kind: OpKind) -> Self {
        Self {
            slot,
            kind,
            prior: None,
        }
    }
}

/// A freshly recorded mutation, before collapse against the pending set.
#[derive(Debug, Clone, Copy)]
pub struct Incoming {
    pub slot: SlotId,
    pub kind: OpKind,
    /// For reference-slot writes: the instance being written.
    pub target: Option<InstanceId>,
    /// For Delete/DeleteAndAdd of reference slots: the displaced instance.
    pub prior: Option<InstanceId>,
}

impl Incoming {
    pub fn value_op(slot: SlotId, kind: OpKind) -> Self {
        Self {
            slot,
            kind,
            target: None,
            prior: None,
        }
    }

    pub fn clear() -> Self {
        Self {
            slot: 0,
            kind: OpKind::Clear,
            target: None,
            prior: None,
        }
    }
}
