use replica_serde::SerdeErr;
use thiserror::Error;

/// Errors raised while registering or reflecting schema types. All of these
/// are construction-time and fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Field name already taken by this type or one of its ancestors
    #[error("duplicate field name `{field}` in schema `{schema}` (names must be unique across the inheritance chain)")]
    DuplicateFieldName { schema: String, field: String },

    /// A concrete type ran past the maximum field index space
    #[error("schema `{schema}` declares {count} fields, more than the maximum of {max}")]
    FieldOverflow {
        schema: String,
        count: usize,
        max: usize,
    },

    /// `extends` named a schema kind that has not been registered
    #[error("schema `{schema}` extends an unregistered parent kind")]
    UnknownParent { schema: String },

    /// A reflected stream referenced a schema kind id that was never defined
    #[error("reflected schema stream references unknown kind id {kind}")]
    UnknownKind { kind: u16 },

    /// A reflected stream carried an unrecognized field-kind tag
    #[error("reflected schema stream carries unknown field-kind tag {tag}")]
    UnknownFieldKindTag { tag: u8 },

    /// The reflected byte stream itself was malformed
    #[error("malformed schema reflection stream: {0}")]
    Stream(#[from] SerdeErr),
}
