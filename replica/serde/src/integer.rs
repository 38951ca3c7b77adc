use crate::{bit_reader::BitReader, bit_writer::BitWrite, error::SerdeErr, serde::Serde};

pub type UnsignedInteger<const BITS: u8> = BitInteger<false, false, BITS>;
pub type SignedInteger<const BITS: u8> = BitInteger<true, false, BITS>;
pub type UnsignedVariableInteger<const BITS: u8> = BitInteger<false, true, BITS>;
pub type SignedVariableInteger<const BITS: u8> = BitInteger<true, true, BITS>;

/// An integer with an explicit wire width. Fixed variants occupy exactly
/// `BITS` bits (plus a sign bit when signed); variable variants occupy
/// `BITS`-sized groups, each prefixed by a continuation bit, so small values
/// stay small on the wire.
///
/// The const parameters only select the wire layout; the value itself is held
/// in a plain i128 so monomorphized copies stay trivial.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct BitInteger<const SIGNED: bool, const VARIABLE: bool, const BITS: u8> {
    value: i128,
}

impl<const SIGNED: bool, const VARIABLE: bool, const BITS: u8>
    BitInteger<SIGNED, VARIABLE, BITS>
{
    pub fn new<T: Into<i128>>(value: T) -> Self {
        let value = value.into();
        assert!(BITS > 0, "can't create an integer with 0 bits");
        assert!(BITS <= 127, "can't create an integer with more than 127 bits");
        if !SIGNED {
            assert!(value >= 0, "can't encode a negative number unsigned");
        }
        if !VARIABLE {
            let max_value: i128 = 2_i128.pow(BITS as u32);
            assert!(
                value < max_value,
                "with {} bits, can't encode {}",
                BITS,
                value
            );
            if SIGNED {
                assert!(
                    value > -max_value,
                    "with {} bits, can't encode {}",
                    BITS,
                    value
                );
            }
        }
        Self { value }
    }

    pub fn get(&self) -> i128 {
        self.value
    }

    pub fn to_u64(&self) -> u64 {
        u64::try_from(self.value).expect("BitInteger value does not fit in u64")
    }

    pub fn to_u32(&self) -> u32 {
        u32::try_from(self.value).expect("BitInteger value does not fit in u32")
    }

    pub fn to_usize(&self) -> usize {
        usize::try_from(self.value).expect("BitInteger value does not fit in usize")
    }
}

fn ser_inner(writer: &mut dyn BitWrite, signed: bool, variable: bool, bits: u8, value: i128) {
    let mut remaining: u128;
    let negative = value < 0;

    if signed {
        writer.write_bit(negative);
        remaining = value.unsigned_abs();
    } else {
        remaining = value as u128;
    }

    if variable {
        loop {
            let proceed = remaining >= 2_u128.pow(bits as u32);
            writer.write_bit(proceed);
            for _ in 0..bits {
                writer.write_bit(remaining & 1 != 0);
                remaining >>= 1;
            }
            if !proceed {
                return;
            }
        }
    } else {
        for _ in 0..bits {
            writer.write_bit(remaining & 1 != 0);
            remaining >>= 1;
        }
    }
}

fn de_inner(
    reader: &mut BitReader,
    signed: bool,
    variable: bool,
    bits: u8,
) -> Result<i128, SerdeErr> {
    let mut negative = false;
    if signed {
        negative = reader.read_bit()?;
    }

    let mut output: u128 = 0;
    let mut shift: u32 = 0;

    if variable {
        loop {
            let proceed = reader.read_bit()?;
            if shift + bits as u32 > 127 {
                // a well-formed stream never carries this many groups
                return Err(SerdeErr::UnexpectedEnd);
            }
            for _ in 0..bits {
                if reader.read_bit()? {
                    output |= 1 << shift;
                }
                shift += 1;
            }
            if !proceed {
                break;
            }
        }
    } else {
        for _ in 0..bits {
            if reader.read_bit()? {
                output |= 1 << shift;
            }
            shift += 1;
        }
    }

    let value = output as i128;
    if negative {
        Ok(-value)
    } else {
        Ok(value)
    }
}

fn bit_length_inner(signed: bool, variable: bool, bits: u8, value: i128) -> u32 {
    let mut output: u32 = 0;

    if signed {
        output += 1;
    }

    if variable {
        let mut remaining = value.unsigned_abs();
        loop {
            let proceed = remaining >= 2_u128.pow(bits as u32);
            output += 1 + bits as u32;
            remaining >>= bits;
            if !proceed {
                break;
            }
        }
    } else {
        output += bits as u32;
    }
    output
}

impl<const SIGNED: bool, const VARIABLE: bool, const BITS: u8> Serde
    for BitInteger<SIGNED, VARIABLE, BITS>
{
    fn ser(&self, writer: &mut dyn BitWrite) {
        ser_inner(writer, SIGNED, VARIABLE, BITS, self.value);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let value = de_inner(reader, SIGNED, VARIABLE, BITS)?;
        Ok(Self { value })
    }

    fn bit_length(&self) -> u32 {
        bit_length_inner(SIGNED, VARIABLE, BITS, self.value)
    }
}

impl<const SIGNED: bool, const VARIABLE: bool, const BITS: u8, T: Into<i128>> From<T>
    for BitInteger<SIGNED, VARIABLE, BITS>
{
    fn from(value: T) -> Self {
        Self::new(value)
    }
}
