//! # Replica
//! Schema-driven, incremental binary state synchronization: a
//! server-authoritative object graph is mutated freely, and on demand the
//! engine emits a compact patch describing only what changed — or a full
//! snapshot for a newly-joining observer. A peer replays those bytes
//! against a mirrored graph, preserving object identity across patches and
//! honoring per-observer visibility.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

pub use replica_serde::{
    BitCounter, BitReader, BitWrite, BitWriter, ConstBitLength, Serde, SerdeErr, SignedInteger,
    SignedVariableInteger, UnsignedInteger, UnsignedVariableInteger,
};

mod bigmap;
mod change;
mod decode;
mod encode;
mod graph;
mod json;
mod schema;
mod tracker;
mod value;
mod wire;

pub use bigmap::{BigMap, BigMapKey};
pub use change::{ChangeTree, OpKind};
pub use decode::{DecodeError, Decoder, Listeners, SyncEvent};
pub use encode::{EncodeError, Encoder, View};
pub use graph::{Graph, InstanceId, MutateError};
pub use schema::{
    reflection, ElementKind, FieldDescriptor, FieldKind, PrimitiveKind, SchemaBuilder,
    SchemaDescriptor, SchemaError, SchemaKind, SchemaKinds, MAX_FIELDS,
};
pub use tracker::{RefId, RefTracker, ROOT_REF_ID};
pub use value::Value;
