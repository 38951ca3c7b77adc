use crate::schema::{
    field::{FieldDescriptor, FieldKind},
    kinds::SchemaKind,
};

/// The immutable per-type field table. Own fields only; inherited fields
/// live on the parent descriptor, with this type's indices continuing where
/// the parent's stop.
#[derive(Debug, Clone)]
pub struct SchemaDescriptor {
    kind: SchemaKind,
    name: String,
    parent: Option<SchemaKind>,
    first_index: u8,
    fields: Vec<FieldDescriptor>,
}

impl SchemaDescriptor {
    pub(crate) fn new(
        kind: SchemaKind,
        name: String,
        parent: Option<SchemaKind>,
        first_index: u8,
        fields: Vec<FieldDescriptor>,
    ) -> Self {
        Self {
            kind,
            name,
            parent,
            first_index,
            fields,
        }
    }

    pub fn kind(&self) -> SchemaKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<SchemaKind> {
        self.parent
    }

    /// Index of this type's first own field (== the parent chain's total
    /// field count).
    pub fn first_index(&self) -> u8 {
        self.first_index
    }

    /// This type's own fields, in index order.
    pub fn own_fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Total field count, inherited fields included.
    pub fn field_count(&self) -> usize {
        self.first_index as usize + self.fields.len()
    }

    /// Look up one of this type's own fields by absolute index. Inherited
    /// indices miss here; the registry walks the parent chain.
    pub fn own_field(&self, index: u8) -> Option<&FieldDescriptor> {
        if index < self.first_index {
            return None;
        }
        self.fields.get((index - self.first_index) as usize)
    }

    pub(crate) fn has_own_view_restricted(&self) -> bool {
        self.fields.iter().any(|field| field.view_restricted)
    }
}

/// Declarative surface for registering a type. The engine itself only ever
/// consumes the resulting descriptor table.
pub struct SchemaBuilder {
    pub(crate) name: String,
    pub(crate) parent: Option<SchemaKind>,
    pub(crate) fields: Vec<(String, FieldKind, bool)>,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            fields: Vec::new(),
        }
    }

    pub fn extends(mut self, parent: SchemaKind) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push((name.into(), kind, false));
        self
    }

    /// Declare a field that is only encoded for observers whose view admits
    /// the value.
    pub fn view_field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push((name.into(), kind, true));
        self
    }
}
