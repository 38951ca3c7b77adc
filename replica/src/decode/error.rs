use replica_serde::SerdeErr;
use thiserror::Error;

/// Fatal decode failures. The tolerated anomalies of version skew (unknown
/// identifiers, unknown field indices, redundant releases) are *not* here;
/// those are logged and skipped so processing can continue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The byte stream ended mid-operation or carried a malformed payload
    #[error("malformed patch stream: {0}")]
    Stream(#[from] SerdeErr),

    /// A structural end marker arrived with no context to pop
    #[error("structural end marker with an empty context stack")]
    UnbalancedPop,

    /// A field/slot operation arrived before any structural marker
    #[error("operation arrived with no current context")]
    NoContext,

    /// A value's wire tag contradicts the declared kind of a known field
    #[error("wire value does not satisfy the declared kind of `{context}`")]
    ValueMismatch { context: String },

    /// A map entry Add arrived without its key
    #[error("map entry addition without a key")]
    MissingKey,

    /// Unknown value tag (not a schema-evolution case: the tag space itself
    /// is fixed)
    #[error("unknown value tag {tag}")]
    UnknownValueTag { tag: u8 },
}
