use thiserror::Error;

/// Errors raised while serializing a patch. These indicate an internal
/// inconsistency between the change log and the live graph, not bad input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// A logged Add/Replace op points at a slot with no live value
    #[error("logged operation addresses slot {slot} which holds no value")]
    MissingValue { slot: u32 },

    /// A reference value reached serialization without an assigned wire id
    #[error("reference value reached serialization without an assigned id")]
    MissingRefId,
}
