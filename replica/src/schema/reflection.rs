//! Self-describing encoding of a [`SchemaKinds`] table, so a peer can build
//! a compatible mirrored registry with no compile-time knowledge of the
//! schema. Required for forward/backward compatible deployments.

use replica_serde::{
    BitReader, BitWriter, Serde, UnsignedInteger, UnsignedVariableInteger,
};

use crate::schema::{
    descriptor::SchemaBuilder,
    error::SchemaError,
    field::{ElementKind, FieldKind, PrimitiveKind},
    kinds::{SchemaKind, SchemaKinds},
};

const KIND_TAG_PRIMITIVE: u8 = 0;
const KIND_TAG_REF: u8 = 1;
const KIND_TAG_ARRAY: u8 = 2;
const KIND_TAG_MAP: u8 = 3;
const KIND_TAG_SET: u8 = 4;

pub fn encode(kinds: &SchemaKinds) -> Vec<u8> {
    let mut writer = BitWriter::new();

    UnsignedVariableInteger::<7>::new(kinds.len() as u64).ser(&mut writer);

    for descriptor in kinds.iter() {
        descriptor.name().to_string().ser(&mut writer);

        match descriptor.parent() {
            Some(parent) => {
                true.ser(&mut writer);
                parent.ser(&mut writer);
            }
            None => false.ser(&mut writer),
        }

        UnsignedVariableInteger::<7>::new(descriptor.own_fields().len() as u64).ser(&mut writer);
        for field in descriptor.own_fields() {
            field.name.clone().ser(&mut writer);
            field.view_restricted.ser(&mut writer);
            write_field_kind(&mut writer, &field.kind);
        }
    }

    writer.to_bytes()
}

pub fn decode(bytes: &[u8]) -> Result<SchemaKinds, SchemaError> {
    let mut reader = BitReader::new(bytes);
    let mut kinds = SchemaKinds::new();

    let count = UnsignedVariableInteger::<7>::de(&mut reader)?.to_usize();
    for expected_id in 0..count {
        let name = String::de(&mut reader)?;

        let mut builder = SchemaBuilder::new(name);
        if bool::de(&mut reader)? {
            let parent = SchemaKind::de(&mut reader)?;
            if parent.to_u16() as usize >= expected_id {
                return Err(SchemaError::UnknownKind {
                    kind: parent.to_u16(),
                });
            }
            builder = builder.extends(parent);
        }

        let field_count = UnsignedVariableInteger::<7>::de(&mut reader)?.to_usize();
        for _ in 0..field_count {
            let field_name = String::de(&mut reader)?;
            let restricted = bool::de(&mut reader)?;
            let kind = read_field_kind(&mut reader, expected_id)?;
            builder = if restricted {
                builder.view_field(field_name, kind)
            } else {
                builder.field(field_name, kind)
            };
        }

        kinds.register(builder)?;
    }

    Ok(kinds)
}

fn write_field_kind(writer: &mut BitWriter, kind: &FieldKind) {
    match kind {
        FieldKind::Primitive(primitive) => {
            UnsignedInteger::<3>::new(KIND_TAG_PRIMITIVE).ser(writer);
            UnsignedInteger::<4>::new(primitive.to_tag()).ser(writer);
        }
        FieldKind::Ref(schema) => {
            UnsignedInteger::<3>::new(KIND_TAG_REF).ser(writer);
            schema.ser(writer);
        }
        FieldKind::Array(element) => {
            UnsignedInteger::<3>::new(KIND_TAG_ARRAY).ser(writer);
            write_element_kind(writer, element);
        }
        FieldKind::Map(element) => {
            UnsignedInteger::<3>::new(KIND_TAG_MAP).ser(writer);
            write_element_kind(writer, element);
        }
        FieldKind::Set(element) => {
            UnsignedInteger::<3>::new(KIND_TAG_SET).ser(writer);
            write_element_kind(writer, element);
        }
    }
}

fn write_element_kind(writer: &mut BitWriter, element: &ElementKind) {
    match element {
        ElementKind::Primitive(primitive) => {
            false.ser(writer);
            UnsignedInteger::<4>::new(primitive.to_tag()).ser(writer);
        }
        ElementKind::Ref(schema) => {
            true.ser(writer);
            schema.ser(writer);
        }
    }
}

fn read_field_kind(reader: &mut BitReader, defined_so_far: usize) -> Result<FieldKind, SchemaError> {
    let tag = UnsignedInteger::<3>::de(reader)?.to_u64() as u8;
    match tag {
        KIND_TAG_PRIMITIVE => Ok(FieldKind::Primitive(read_primitive(reader)?)),
        KIND_TAG_REF => Ok(FieldKind::Ref(read_schema_ref(reader, defined_so_far)?)),
        KIND_TAG_ARRAY => Ok(FieldKind::Array(read_element_kind(reader, defined_so_far)?)),
        KIND_TAG_MAP => Ok(FieldKind::Map(read_element_kind(reader, defined_so_far)?)),
        KIND_TAG_SET => Ok(FieldKind::Set(read_element_kind(reader, defined_so_far)?)),
        _ => Err(SchemaError::UnknownFieldKindTag { tag }),
    }
}

fn read_element_kind(
    reader: &mut BitReader,
    defined_so_far: usize,
) -> Result<ElementKind, SchemaError> {
    if bool::de(reader)? {
        Ok(ElementKind::Ref(read_schema_ref(reader, defined_so_far)?))
    } else {
        Ok(ElementKind::Primitive(read_primitive(reader)?))
    }
}

fn read_schema_ref(reader: &mut BitReader, _defined_so_far: usize) -> Result<SchemaKind, SchemaError> {
    // Forward references between types are legal (a field may point at a
    // type registered later), so the id is taken as-is here; lookups fail
    // gracefully if the stream was inconsistent.
    Ok(SchemaKind::de(reader)?)
}

fn read_primitive(reader: &mut BitReader) -> Result<PrimitiveKind, SchemaError> {
    let tag = UnsignedInteger::<4>::de(reader)?.to_u64() as u8;
    PrimitiveKind::from_tag(tag).ok_or(SchemaError::UnknownFieldKindTag { tag })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::descriptor::SchemaBuilder;
    use crate::schema::field::{ElementKind, FieldKind, PrimitiveKind};

    #[test]
    fn registry_round_trips() {
        let mut kinds = SchemaKinds::new();
        let player = kinds
            .register(
                SchemaBuilder::new("Player")
                    .field("name", FieldKind::Primitive(PrimitiveKind::Str))
                    .view_field("secret", FieldKind::Primitive(PrimitiveKind::U32)),
            )
            .unwrap();
        kinds
            .register(
                SchemaBuilder::new("Npc")
                    .extends(player)
                    .field("dialogue", FieldKind::Primitive(PrimitiveKind::Str)),
            )
            .unwrap();
        kinds
            .register(
                SchemaBuilder::new("State")
                    .field("players", FieldKind::Array(ElementKind::Ref(player)))
                    .field("scores", FieldKind::Map(ElementKind::Primitive(PrimitiveKind::U16))),
            )
            .unwrap();

        let bytes = encode(&kinds);
        let decoded = decode(&bytes).unwrap();

        assert_eq!(decoded.len(), kinds.len());
        for (original, mirrored) in kinds.iter().zip(decoded.iter()) {
            assert_eq!(original.name(), mirrored.name());
            assert_eq!(original.parent(), mirrored.parent());
            assert_eq!(original.field_count(), mirrored.field_count());
            for (a, b) in original.own_fields().iter().zip(mirrored.own_fields()) {
                assert_eq!(a.name, b.name);
                assert_eq!(a.kind, b.kind);
                assert_eq!(a.view_restricted, b.view_restricted);
                assert_eq!(a.index, b.index);
            }
        }
    }
}
