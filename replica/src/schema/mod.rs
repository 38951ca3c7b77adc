pub mod descriptor;
pub mod error;
pub mod field;
pub mod kinds;
pub mod reflection;

pub use descriptor::{SchemaBuilder, SchemaDescriptor};
pub use error::SchemaError;
pub use field::{ElementKind, FieldDescriptor, FieldKind, PrimitiveKind, MAX_FIELDS};
pub use kinds::{SchemaKind, SchemaKinds};
