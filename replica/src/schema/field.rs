use crate::schema::kinds::SchemaKind;

/// Hard cap on the field index space of one concrete type, inherited fields
/// included.
pub const MAX_FIELDS: usize = 64;

/// The scalar payload kinds a field or container element can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Str,
}

impl PrimitiveKind {
    pub(crate) fn to_tag(self) -> u8 {
        match self {
            PrimitiveKind::Bool => 0,
            PrimitiveKind::U8 => 1,
            PrimitiveKind::U16 => 2,
            PrimitiveKind::U32 => 3,
            PrimitiveKind::U64 => 4,
            PrimitiveKind::I8 => 5,
            PrimitiveKind::I16 => 6,
            PrimitiveKind::I32 => 7,
            PrimitiveKind::I64 => 8,
            PrimitiveKind::F32 => 9,
            PrimitiveKind::F64 => 10,
            PrimitiveKind::Str => 11,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0 => PrimitiveKind::Bool,
            1 => PrimitiveKind::U8,
            2 => PrimitiveKind::U16,
            3 => PrimitiveKind::U32,
            4 => PrimitiveKind::U64,
            5 => PrimitiveKind::I8,
            6 => PrimitiveKind::I16,
            7 => PrimitiveKind::I32,
            8 => PrimitiveKind::I64,
            9 => PrimitiveKind::F32,
            10 => PrimitiveKind::F64,
            11 => PrimitiveKind::Str,
            _ => return None,
        })
    }
}

/// What a container holds: scalars of one kind, or references to instances
/// of one schema type (subtypes included).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Primitive(PrimitiveKind),
    Ref(SchemaKind),
}

/// The declared kind of a single schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Primitive(PrimitiveKind),
    Ref(SchemaKind),
    Array(ElementKind),
    Map(ElementKind),
    Set(ElementKind),
}

/// One entry of a type's ordered field table. Immutable once registered.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub index: u8,
    pub name: String,
    pub kind: FieldKind,
    pub view_restricted: bool,
}
