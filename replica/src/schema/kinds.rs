use replica_serde::{BitReader, BitWrite, Serde, SerdeErr};

use crate::schema::{
    descriptor::{SchemaBuilder, SchemaDescriptor},
    error::SchemaError,
    field::{FieldDescriptor, MAX_FIELDS},
};

/// Identifies a registered schema type. Doubles as the wire type tag for
/// polymorphic fields.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord)]
pub struct SchemaKind(u16);

impl SchemaKind {
    pub(crate) fn from_u16(value: u16) -> Self {
        SchemaKind(value)
    }

    pub fn to_u16(&self) -> u16 {
        self.0
    }
}

impl Serde for SchemaKind {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.0.ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(SchemaKind(u16::de(reader)?))
    }

    fn bit_length(&self) -> u32 {
        16
    }
}

/// The registry of every schema type one graph can hold. Built once at
/// startup, then read-only; both sides of a connection must hold compatible
/// tables (compile-time shared, or transferred via the reflection channel).
#[derive(Clone, Default)]
pub struct SchemaKinds {
    descriptors: Vec<SchemaDescriptor>,
}

impl SchemaKinds {
    pub fn new() -> Self {
        Self {
            descriptors: Vec::new(),
        }
    }

    pub fn register(&mut self, builder: SchemaBuilder) -> Result<SchemaKind, SchemaError> {
        let SchemaBuilder {
            name,
            parent,
            fields,
        } = builder;

        let first_index = match parent {
            Some(parent_kind) => match self.descriptor(parent_kind) {
                Some(parent_descriptor) => parent_descriptor.field_count() as u8,
                None => return Err(SchemaError::UnknownParent { schema: name }),
            },
            None => 0,
        };

        let total = first_index as usize + fields.len();
        if total > MAX_FIELDS {
            return Err(SchemaError::FieldOverflow {
                schema: name,
                count: total,
                max: MAX_FIELDS,
            });
        }

        for (position, (field_name, _, _)) in fields.iter().enumerate() {
            let clashes_own = fields[..position]
                .iter()
                .any(|(earlier, _, _)| earlier == field_name);
            if clashes_own || self.chain_has_field_name(parent, field_name) {
                return Err(SchemaError::DuplicateFieldName {
                    schema: name,
                    field: field_name.clone(),
                });
            }
        }

        let kind = SchemaKind(self.descriptors.len() as u16);
        let fields = fields
            .into_iter()
            .enumerate()
            .map(|(position, (field_name, field_kind, restricted))| FieldDescriptor {
                index: first_index + position as u8,
                name: field_name,
                kind: field_kind,
                view_restricted: restricted,
            })
            .collect();

        self.descriptors.push(SchemaDescriptor::new(
            kind,
            name,
            parent,
            first_index,
            fields,
        ));
        Ok(kind)
    }

    pub fn descriptor(&self, kind: SchemaKind) -> Option<&SchemaDescriptor> {
        self.descriptors.get(kind.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SchemaDescriptor> {
        self.descriptors.iter()
    }

    /// Resolve a field by absolute index, walking up the inheritance chain.
    pub fn field(&self, kind: SchemaKind, index: u8) -> Option<&FieldDescriptor> {
        let mut current = Some(kind);
        while let Some(kind) = current {
            let descriptor = self.descriptor(kind)?;
            if let Some(field) = descriptor.own_field(index) {
                return Some(field);
            }
            current = descriptor.parent();
        }
        None
    }

    /// Total field count of a type, inherited fields included.
    pub fn field_count(&self, kind: SchemaKind) -> usize {
        self.descriptor(kind)
            .map(|descriptor| descriptor.field_count())
            .unwrap_or(0)
    }

    /// True when `runtime` is `declared` or one of its descendants.
    pub fn is_subtype(&self, runtime: SchemaKind, declared: SchemaKind) -> bool {
        let mut current = Some(runtime);
        while let Some(kind) = current {
            if kind == declared {
                return true;
            }
            current = self.descriptor(kind).and_then(|d| d.parent());
        }
        false
    }

    /// True when the type (or an ancestor) declares any view-restricted
    /// field.
    pub fn has_view_restricted(&self, kind: SchemaKind) -> bool {
        let mut current = Some(kind);
        while let Some(kind) = current {
            let Some(descriptor) = self.descriptor(kind) else {
                return false;
            };
            if descriptor.has_own_view_restricted() {
                return true;
            }
            current = descriptor.parent();
        }
        false
    }

    fn chain_has_field_name(&self, start: Option<SchemaKind>, name: &str) -> bool {
        let mut current = start;
        while let Some(kind) = current {
            let Some(descriptor) = self.descriptor(kind) else {
                return false;
            };
            if descriptor.own_fields().iter().any(|field| field.name == name) {
                return true;
            }
            current = descriptor.parent();
        }
        false
    }
}
