use thiserror::Error;

/// Errors raised by the mutation API. All of these reject the mutation with
/// no state change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutateError {
    /// The handle does not name a live instance (it may have been reclaimed
    /// by a garbage-collection pass)
    #[error("instance handle does not name a live instance")]
    UnknownInstance,

    /// An object operation hit a container, or vice versa
    #[error("operation expects a {expected} instance, found a {found}")]
    WrongShape {
        expected: &'static str,
        found: &'static str,
    },

    /// Field index not present in the type's descriptor chain
    #[error("field index {index} is not declared by this schema type")]
    UnknownField { index: u8 },

    /// Assigned value's runtime type is not a subtype of the declared type
    #[error("value does not satisfy the declared kind of field/slot `{context}`")]
    TypeMismatch { context: String },

    /// Container index past the end
    #[error("index {index} out of bounds (len {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    /// Map key absent
    #[error("key `{key}` not present in map")]
    KeyNotFound { key: String },

    /// Schema kind not present in the registry handed to this graph
    #[error("schema kind is not registered with this graph")]
    UnknownSchemaKind,
}
