use crate::change::{ChangeOp, SlotId};
use crate::graph::instance_id::InstanceId;
use crate::schema::SchemaKind;
use crate::tracker::RefId;

/// One entry of the flat operation log an encode pass produces. The log is
/// what actually gets serialized, and it is retained so per-observer view
/// passes can re-derive subset buffers from the same dirty set without
/// touching the live change trees.
#[derive(Debug, Clone, Copy)]
pub(crate) enum LoggedOp {
    /// Structural marker: switch decode context into `instance`. `tag` is
    /// present only when the concrete type diverges from the statically
    /// declared one.
    Push {
        instance: InstanceId,
        ref_id: RefId,
        tag: Option<SchemaKind>,
    },
    /// Structural end marker.
    Pop,
    /// A field/slot operation on `owner`; the value (if the op carries one)
    /// is read live from the graph at serialization time.
    Op { owner: InstanceId, op: ChangeOp },
    /// Container index remap.
    Move {
        owner: InstanceId,
        slot: SlotId,
        to: u32,
    },
}
