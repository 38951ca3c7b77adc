use std::collections::{HashMap, HashSet};

use log::warn;

use crate::bigmap::BigMap;
use crate::graph::instance::Instance;
use crate::graph::instance_id::InstanceId;
use crate::tracker::ref_id::{RefId, ROOT_REF_ID};

/// Maps wire identifiers to instances, maintains per-instance reference
/// counts, and performs the deferred garbage collection pass at patch
/// boundaries.
///
/// The count equals the number of live (parent, slot) edges pointing at the
/// instance. A count reaching zero only *enqueues* the instance; reclamation
/// happens in [`collect`](RefTracker::collect), exactly once per patch, so
/// an instance detached and re-attached within a single patch is never
/// reclaimed.
pub struct RefTracker {
    id_to_instance: HashMap<RefId, InstanceId>,
    instance_to_id: HashMap<InstanceId, RefId>,
    counts: HashMap<InstanceId, u32>,
    pending_deletion: HashSet<InstanceId>,
    next_id: u64,
}

impl RefTracker {
    pub fn new() -> Self {
        Self {
            id_to_instance: HashMap::new(),
            instance_to_id: HashMap::new(),
            counts: HashMap::new(),
            pending_deletion: HashSet::new(),
            next_id: 1,
        }
    }

    /// Bind the root instance to [`ROOT_REF_ID`]. The root carries one
    /// implicit edge so it can never become collectable.
    pub fn register_root(&mut self, root: InstanceId) {
        self.id_to_instance.insert(ROOT_REF_ID, root);
        self.instance_to_id.insert(root, ROOT_REF_ID);
        self.counts.insert(root, 1);
    }

    /// The id already assigned to an instance, if any.
    pub fn ref_id(&self, instance: InstanceId) -> Option<RefId> {
        self.instance_to_id.get(&instance).copied()
    }

    pub fn instance(&self, ref_id: RefId) -> Option<InstanceId> {
        self.id_to_instance.get(&ref_id).copied()
    }

    /// Mint an id for a newly-reachable instance, or return the one it
    /// already holds. Re-attachment of a moved shared instance never mints
    /// a second id.
    pub fn assign_id(&mut self, instance: InstanceId) -> RefId {
        if let Some(existing) = self.instance_to_id.get(&instance) {
            return *existing;
        }
        let ref_id = RefId::from_u64(self.next_id);
        self.next_id += 1;
        self.id_to_instance.insert(ref_id, instance);
        self.instance_to_id.insert(instance, ref_id);
        ref_id
    }

    /// Bind an id received off the wire (decode side).
    pub fn register(&mut self, ref_id: RefId, instance: InstanceId) {
        self.id_to_instance.insert(ref_id, instance);
        self.instance_to_id.insert(instance, ref_id);
        self.next_id = self.next_id.max(ref_id.to_u64() + 1);
    }

    pub fn count(&self, instance: InstanceId) -> u32 {
        self.counts.get(&instance).copied().unwrap_or(0)
    }

    pub fn is_tracked(&self, instance: InstanceId) -> bool {
        self.instance_to_id.contains_key(&instance)
    }

    pub fn retain(&mut self, instance: InstanceId) {
        *self.counts.entry(instance).or_insert(0) += 1;
        self.pending_deletion.remove(&instance);
    }

    pub fn release(&mut self, instance: InstanceId) {
        match self.counts.get_mut(&instance) {
            Some(count) if *count > 0 => {
                *count -= 1;
                if *count == 0 {
                    self.pending_deletion.insert(instance);
                }
            }
            _ => {
                // tolerated: encoder/decoder versions may be skewed
                warn!("released an instance whose reference count is already zero");
            }
        }
    }

    /// Deferred GC pass. Must run exactly once per patch, after every
    /// operation of the patch has been applied; running it mid-patch would
    /// misfire removal on instances that are re-attached later in the same
    /// patch.
    ///
    /// Reclaims every pending instance whose count is still zero, cascading
    /// through its outgoing references, and returns what was removed, in
    /// reclamation order.
    pub fn collect(
        &mut self,
        instances: &mut BigMap<InstanceId, Instance>,
    ) -> Vec<(Option<RefId>, InstanceId)> {
        let mut removed = Vec::new();
        let mut worklist: Vec<InstanceId> = self.pending_deletion.drain().collect();

        while let Some(instance_id) = worklist.pop() {
            if self.count(instance_id) != 0 {
                // re-attached before the patch boundary
                continue;
            }
            let Some(instance) = instances.remove(&instance_id) else {
                continue;
            };

            for (slot, child) in instance.outgoing_refs() {
                if let Some(child_instance) = instances.get_mut(&child) {
                    child_instance.tree_mut().remove_parent(instance_id, slot);
                }
                match self.counts.get_mut(&child) {
                    Some(count) if *count > 0 => {
                        *count -= 1;
                        if *count == 0 {
                            worklist.push(child);
                        }
                    }
                    _ => {
                        warn!("cascading release hit an instance with a zero reference count");
                    }
                }
            }

            let ref_id = self.instance_to_id.remove(&instance_id);
            if let Some(ref_id) = ref_id {
                self.id_to_instance.remove(&ref_id);
            }
            self.counts.remove(&instance_id);
            removed.push((ref_id, instance_id));
        }

        removed
    }
}

impl Default for RefTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::instance::{Instance, ObjectInstance};
    use crate::schema::SchemaKind;

    fn object(kinds_id: u16, field_count: usize) -> Instance {
        Instance::Object(ObjectInstance::new(
            SchemaKind::from_u16(kinds_id),
            field_count,
        ))
    }

    #[test]
    fn assign_is_idempotent() {
        let mut instances: BigMap<InstanceId, Instance> = BigMap::new();
        let mut tracker = RefTracker::new();

        let a = instances.insert(object(0, 1));
        let first = tracker.assign_id(a);
        let second = tracker.assign_id(a);

        assert_eq!(first, second);
    }

    #[test]
    fn release_to_zero_defers_until_collect() {
        let mut instances: BigMap<InstanceId, Instance> = BigMap::new();
        let mut tracker = RefTracker::new();

        let a = instances.insert(object(0, 1));
        tracker.assign_id(a);
        tracker.retain(a);
        tracker.release(a);

        // still present: reclamation is deferred to the patch boundary
        assert!(tracker.is_tracked(a));

        let removed = tracker.collect(&mut instances);
        assert_eq!(removed.len(), 1);
        assert!(!tracker.is_tracked(a));
        assert!(instances.get(&a).is_none());
    }

    #[test]
    fn reattachment_before_collect_survives() {
        let mut instances: BigMap<InstanceId, Instance> = BigMap::new();
        let mut tracker = RefTracker::new();

        let a = instances.insert(object(0, 1));
        tracker.assign_id(a);
        tracker.retain(a);
        tracker.release(a);
        tracker.retain(a);

        let removed = tracker.collect(&mut instances);
        assert!(removed.is_empty());
        assert!(tracker.is_tracked(a));
    }

    #[test]
    fn release_below_zero_is_tolerated() {
        let mut instances: BigMap<InstanceId, Instance> = BigMap::new();
        let mut tracker = RefTracker::new();

        let a = instances.insert(object(0, 1));
        tracker.release(a);

        assert_eq!(tracker.count(a), 0);
        assert!(tracker.collect(&mut instances).is_empty());
    }
}
