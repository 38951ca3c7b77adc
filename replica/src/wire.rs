//! The patch grammar. Every operation body is parseable without schema
//! knowledge (uniform slot widths, tagged values, explicit key flag), which
//! is what allows a decoder with an older descriptor table to consume and
//! discard operations it does not understand.

use replica_serde::{BitReader, BitWriter, Serde, SerdeErr, UnsignedInteger, UnsignedVariableInteger};

use crate::change::SlotId;
use crate::tracker::RefId;
use crate::value::Value;

pub(crate) const OP_PUSH: u8 = 0;
pub(crate) const OP_POP: u8 = 1;
pub(crate) const OP_ADD: u8 = 2;
pub(crate) const OP_REPLACE: u8 = 3;
pub(crate) const OP_DELETE: u8 = 4;
pub(crate) const OP_DELETE_AND_ADD: u8 = 5;
pub(crate) const OP_CLEAR: u8 = 6;
pub(crate) const OP_MOVE: u8 = 7;

/// Wire tag for reference values; scalar tags are `PrimitiveKind::to_tag`.
pub(crate) const VALUE_TAG_REF: u8 = 12;

/// A decoded value before reference resolution: scalars carry themselves,
/// references carry the wire id.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RawValue {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
    Ref(RefId),
}

impl RawValue {
    pub(crate) fn into_scalar(self) -> Option<Value> {
        Some(match self {
            RawValue::Bool(v) => Value::Bool(v),
            RawValue::U8(v) => Value::U8(v),
            RawValue::U16(v) => Value::U16(v),
            RawValue::U32(v) => Value::U32(v),
            RawValue::U64(v) => Value::U64(v),
            RawValue::I8(v) => Value::I8(v),
            RawValue::I16(v) => Value::I16(v),
            RawValue::I32(v) => Value::I32(v),
            RawValue::I64(v) => Value::I64(v),
            RawValue::F32(v) => Value::F32(v),
            RawValue::F64(v) => Value::F64(v),
            RawValue::Str(v) => Value::Str(v),
            RawValue::Ref(_) => return None,
        })
    }
}

pub(crate) fn write_opcode(writer: &mut BitWriter, opcode: u8) {
    UnsignedInteger::<3>::new(opcode).ser(writer);
}

pub(crate) fn read_opcode(reader: &mut BitReader) -> Result<u8, SerdeErr> {
    Ok(UnsignedInteger::<3>::de(reader)?.to_u64() as u8)
}

pub(crate) fn write_slot(writer: &mut BitWriter, slot: SlotId) {
    UnsignedVariableInteger::<5>::new(slot).ser(writer);
}

pub(crate) fn read_slot(reader: &mut BitReader) -> Result<SlotId, SerdeErr> {
    Ok(UnsignedVariableInteger::<5>::de(reader)?.to_u32())
}

pub(crate) fn write_count(writer: &mut BitWriter, count: usize) {
    UnsignedVariableInteger::<7>::new(count as u64).ser(writer);
}

pub(crate) fn read_count(reader: &mut BitReader) -> Result<usize, SerdeErr> {
    Ok(UnsignedVariableInteger::<7>::de(reader)?.to_usize())
}

/// Serialize one value: a 4-bit kind tag, then the payload. Reference
/// values are written as the target's wire id, which the caller resolves.
pub(crate) fn write_value(writer: &mut BitWriter, value: &Value, ref_id: Option<RefId>) {
    match value {
        Value::Bool(v) => {
            write_value_tag(writer, 0);
            v.ser(writer);
        }
        Value::U8(v) => {
            write_value_tag(writer, 1);
            v.ser(writer);
        }
        Value::U16(v) => {
            write_value_tag(writer, 2);
            v.ser(writer);
        }
        Value::U32(v) => {
            write_value_tag(writer, 3);
            v.ser(writer);
        }
        Value::U64(v) => {
            write_value_tag(writer, 4);
            v.ser(writer);
        }
        Value::I8(v) => {
            write_value_tag(writer, 5);
            v.ser(writer);
        }
        Value::I16(v) => {
            write_value_tag(writer, 6);
            v.ser(writer);
        }
        Value::I32(v) => {
            write_value_tag(writer, 7);
            v.ser(writer);
        }
        Value::I64(v) => {
            write_value_tag(writer, 8);
            v.ser(writer);
        }
        Value::F32(v) => {
            write_value_tag(writer, 9);
            v.ser(writer);
        }
        Value::F64(v) => {
            write_value_tag(writer, 10);
            v.ser(writer);
        }
        Value::Str(v) => {
            write_value_tag(writer, 11);
            v.clone().ser(writer);
        }
        Value::Ref(_) => {
            write_value_tag(writer, VALUE_TAG_REF);
            ref_id
                .expect("reference value serialized without an assigned id")
                .ser(writer);
        }
    }
}

fn write_value_tag(writer: &mut BitWriter, tag: u8) {
    UnsignedInteger::<4>::new(tag).ser(writer);
}

/// Parse one value off the wire: the tag, plus the payload when the tag is
/// assigned. Self-contained: no schema knowledge needed, so unknown-field
/// payloads can be consumed and discarded.
pub(crate) fn read_value(reader: &mut BitReader) -> Result<(u8, Option<RawValue>), SerdeErr> {
    let tag = UnsignedInteger::<4>::de(reader)?.to_u64() as u8;
    let value = match tag {
        0 => RawValue::Bool(bool::de(reader)?),
        1 => RawValue::U8(u8::de(reader)?),
        2 => RawValue::U16(u16::de(reader)?),
        3 => RawValue::U32(u32::de(reader)?),
        4 => RawValue::U64(u64::de(reader)?),
        5 => RawValue::I8(i8::de(reader)?),
        6 => RawValue::I16(i16::de(reader)?),
        7 => RawValue::I32(i32::de(reader)?),
        8 => RawValue::I64(i64::de(reader)?),
        9 => RawValue::F32(f32::de(reader)?),
        10 => RawValue::F64(f64::de(reader)?),
        11 => RawValue::Str(String::de(reader)?),
        VALUE_TAG_REF => RawValue::Ref(RefId::de(reader)?),
        _ => return Ok((tag, None)),
    };
    Ok((tag, Some(value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_values_round_trip() {
        let values = [
            Value::Bool(true),
            Value::U32(99),
            Value::I64(-5),
            Value::F64(2.25),
            Value::Str("slot".to_string()),
        ];

        let mut writer = BitWriter::new();
        for value in &values {
            write_value(&mut writer, value, None);
        }
        let bytes = writer.to_bytes();

        let mut reader = BitReader::new(&bytes);
        for value in &values {
            let (_, raw) = read_value(&mut reader).unwrap();
            assert_eq!(raw.unwrap().into_scalar().as_ref(), Some(value));
        }
    }
}
