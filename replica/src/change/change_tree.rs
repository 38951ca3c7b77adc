use crate::change::operation::{ChangeOp, Incoming, OpKind, SlotId};
use crate::graph::instance_id::InstanceId;

/// Per-instance change log. Records pending operations for the next patch,
/// folds every mutation into a cumulative membership set for snapshots, and
/// owns the back-references to every (parent, slot) edge currently pointing
/// at the instance.
///
/// A tree is created together with its instance, before the instance is
/// attached anywhere, and lives exactly as long as the instance does.
pub struct ChangeTree {
    parents: Vec<(InstanceId, SlotId)>,
    dirty: bool,
    child_dirty: bool,
    order_dirty: bool,
    pending: Vec<ChangeOp>,
    cumulative: Vec<ChangeOp>,
}

impl ChangeTree {
    pub fn new() -> Self {
        Self {
            parents: Vec::new(),
            dirty: false,
            child_dirty: false,
            order_dirty: false,
            pending: Vec::new(),
            cumulative: Vec::new(),
        }
    }

    // Parent edges

    pub fn add_parent(&mut self, parent: InstanceId, slot: SlotId) {
        self.parents.push((parent, slot));
    }

    pub fn remove_parent(&mut self, parent: InstanceId, slot: SlotId) {
        if let Some(position) = self
            .parents
            .iter()
            .position(|edge| *edge == (parent, slot))
        {
            self.parents.swap_remove(position);
        }
    }

    pub fn parents(&self) -> &[(InstanceId, SlotId)] {
        &self.parents
    }

    // Dirtiness

    pub fn is_dirty(&self) -> bool {
        self.dirty || self.order_dirty
    }

    pub fn is_child_dirty(&self) -> bool {
        self.child_dirty
    }

    pub fn mark_child_dirty(&mut self) {
        self.child_dirty = true;
    }

    /// Flag that the container's logical order changed (insert at position,
    /// sort, explicit move). The encoder diffs orders at flush time and
    /// emits the minimal Move remaps.
    pub fn mark_order_dirty(&mut self) {
        self.order_dirty = true;
    }

    pub fn is_order_dirty(&self) -> bool {
        self.order_dirty
    }

    // Recording

    /// Append/fold one operation into the pending set, collapsing against
    /// any earlier operation on the same slot this patch, and fold it into
    /// the cumulative set.
    pub fn record(&mut self, incoming: Incoming) {
        self.fold_pending(incoming);
        self.fold_cumulative(incoming);
        self.dirty = !self.pending.is_empty();
    }

    pub fn pending(&self) -> &[ChangeOp] {
        &self.pending
    }

    pub fn cumulative(&self) -> &[ChangeOp] {
        &self.cumulative
    }

    /// Drain the pending set at a patch boundary. The cumulative set is
    /// retained.
    pub fn flush_pending(&mut self) -> Vec<ChangeOp> {
        self.dirty = false;
        self.child_dirty = false;
        self.order_dirty = false;
        std::mem::take(&mut self.pending)
    }

    pub fn clear_child_dirty(&mut self) {
        self.child_dirty = false;
    }

    /// Drop both pending and cumulative sets without encoding anything.
    /// Used when a snapshot was delivered out-of-band.
    pub fn discard_all(&mut self) {
        self.pending.clear();
        self.cumulative.clear();
        self.dirty = false;
        self.child_dirty = false;
        self.order_dirty = false;
    }

    fn pending_position(&self, slot: SlotId) -> Option<usize> {
        self.pending
            .iter()
            .position(|op| op.kind != OpKind::Clear && op.slot == slot)
    }

    fn fold_pending(&mut self, incoming: Incoming) {
        if incoming.kind == OpKind::Clear {
            self.pending.clear();
            self.pending.push(ChangeOp::new(0, OpKind::Clear));
            return;
        }

        let Some(position) = self.pending_position(incoming.slot) else {
            let mut op = ChangeOp::new(incoming.slot, incoming.kind);
            op.prior = incoming.prior;
            self.pending.push(op);
            return;
        };

        let existing = self.pending[position];
        let folded: Option<ChangeOp> = match (existing.kind, incoming.kind) {
            // Added and removed within one patch: the observer never saw it.
            (OpKind::Add, OpKind::Delete) => None,
            // Still brand new from the observer's point of view.
            (OpKind::Add, OpKind::Replace | OpKind::DeleteAndAdd | OpKind::Add) => Some(existing),
            (OpKind::Replace, OpKind::Delete) => Some(ChangeOp {
                kind: OpKind::Delete,
                prior: incoming.prior,
                ..existing
            }),
            (OpKind::Replace, OpKind::Replace | OpKind::Add) => Some(existing),
            (OpKind::Replace, OpKind::DeleteAndAdd) => Some(ChangeOp {
                kind: OpKind::DeleteAndAdd,
                prior: incoming.prior,
                ..existing
            }),
            (OpKind::Delete, OpKind::Add | OpKind::Replace | OpKind::DeleteAndAdd) => {
                if incoming.target.is_some() && incoming.target == existing.prior {
                    // the displaced instance came back: net no-op
                    None
                } else if incoming.target.is_some() || existing.prior.is_some() {
                    Some(ChangeOp {
                        kind: OpKind::DeleteAndAdd,
                        ..existing
                    })
                } else {
                    Some(ChangeOp {
                        kind: OpKind::Replace,
                        prior: None,
                        ..existing
                    })
                }
            }
            (OpKind::Delete, OpKind::Delete) => Some(existing),
            (OpKind::DeleteAndAdd, OpKind::Delete) => Some(ChangeOp {
                kind: OpKind::Delete,
                ..existing
            }),
            (OpKind::DeleteAndAdd, OpKind::Add | OpKind::Replace | OpKind::DeleteAndAdd) => {
                if incoming.target.is_some() && incoming.target == existing.prior {
                    // back to the pre-patch occupant: net no-op
                    None
                } else {
                    Some(existing)
                }
            }
            (OpKind::Clear | OpKind::Move, _) | (_, OpKind::Clear | OpKind::Move) => {
                Some(existing) // unreachable: Clear handled above, Move never recorded
            }
        };

        match folded {
            Some(op) => self.pending[position] = op,
            None => {
                self.pending.remove(position);
            }
        }
    }

    fn fold_cumulative(&mut self, incoming: Incoming) {
        match incoming.kind {
            OpKind::Clear => {
                self.cumulative.clear();
            }
            OpKind::Add => {
                self.cumulative
                    .push(ChangeOp::new(incoming.slot, OpKind::Add));
            }
            OpKind::Replace | OpKind::DeleteAndAdd => {
                let known = self.cumulative.iter().any(|op| op.slot == incoming.slot);
                if !known {
                    self.cumulative
                        .push(ChangeOp::new(incoming.slot, OpKind::Add));
                }
            }
            OpKind::Delete => {
                self.cumulative.retain(|op| op.slot != incoming.slot);
            }
            OpKind::Move => {}
        }
    }
}

impl Default for ChangeTree {
    fn default() -> Self {
        Self::new()
    }
}
