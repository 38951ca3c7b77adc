use crate::bigmap::BigMapKey;

/// Process-local handle for a tracked instance. Never serialized; the wire
/// names instances by [`RefId`](crate::tracker::RefId) instead.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl BigMapKey for InstanceId {
    fn to_u64(&self) -> u64 {
        self.0
    }

    fn from_u64(value: u64) -> Self {
        InstanceId(value)
    }
}
