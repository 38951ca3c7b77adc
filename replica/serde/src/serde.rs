use crate::{
    bit_reader::BitReader, bit_writer::BitWrite, error::SerdeErr,
    integer::UnsignedVariableInteger,
};

/// A type that can be serialized into / deserialized from a bit stream.
pub trait Serde: Sized {
    fn ser(&self, writer: &mut dyn BitWrite);
    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr>;
    fn bit_length(&self) -> u32;
}

/// A type whose wire size does not depend on its value.
pub trait ConstBitLength {
    fn const_bit_length() -> u32;
}

impl Serde for bool {
    fn ser(&self, writer: &mut dyn BitWrite) {
        writer.write_bit(*self);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        reader.read_bit()
    }

    fn bit_length(&self) -> u32 {
        1
    }
}

impl ConstBitLength for bool {
    fn const_bit_length() -> u32 {
        1
    }
}

macro_rules! impl_serde_uint {
    ($t:ty, $bytes:expr) => {
        impl Serde for $t {
            fn ser(&self, writer: &mut dyn BitWrite) {
                let le = self.to_le_bytes();
                for byte in le {
                    writer.write_byte(byte);
                }
            }

            fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
                let mut le = [0u8; $bytes];
                for byte in le.iter_mut() {
                    *byte = reader.read_byte()?;
                }
                Ok(<$t>::from_le_bytes(le))
            }

            fn bit_length(&self) -> u32 {
                $bytes * 8
            }
        }

        impl ConstBitLength for $t {
            fn const_bit_length() -> u32 {
                $bytes * 8
            }
        }
    };
}

impl_serde_uint!(u8, 1);
impl_serde_uint!(u16, 2);
impl_serde_uint!(u32, 4);
impl_serde_uint!(u64, 8);
impl_serde_uint!(i8, 1);
impl_serde_uint!(i16, 2);
impl_serde_uint!(i32, 4);
impl_serde_uint!(i64, 8);

impl Serde for f32 {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.to_bits().ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(f32::from_bits(u32::de(reader)?))
    }

    fn bit_length(&self) -> u32 {
        32
    }
}

impl Serde for f64 {
    fn ser(&self, writer: &mut dyn BitWrite) {
        self.to_bits().ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(f64::from_bits(u64::de(reader)?))
    }

    fn bit_length(&self) -> u32 {
        64
    }
}

impl Serde for String {
    fn ser(&self, writer: &mut dyn BitWrite) {
        let bytes = self.as_bytes();
        UnsignedVariableInteger::<7>::new(bytes.len() as u64).ser(writer);
        for byte in bytes {
            writer.write_byte(*byte);
        }
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let length = UnsignedVariableInteger::<7>::de(reader)?.to_usize();
        let mut bytes = Vec::with_capacity(length);
        for _ in 0..length {
            bytes.push(reader.read_byte()?);
        }
        String::from_utf8(bytes).map_err(|_| SerdeErr::InvalidUtf8)
    }

    fn bit_length(&self) -> u32 {
        let length = UnsignedVariableInteger::<7>::new(self.len() as u64);
        length.bit_length() + self.len() as u32 * 8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bit_reader::BitReader, bit_writer::BitWriter};

    #[test]
    fn primitives_round_trip() {
        let mut writer = BitWriter::new();

        true.ser(&mut writer);
        42u8.ser(&mut writer);
        0xBEEFu16.ser(&mut writer);
        (-123_456i32).ser(&mut writer);
        3.5f32.ser(&mut writer);
        f64::MIN_POSITIVE.ser(&mut writer);

        let bytes = writer.to_bytes();
        let mut reader = BitReader::new(&bytes);

        assert!(bool::de(&mut reader).unwrap());
        assert_eq!(u8::de(&mut reader).unwrap(), 42);
        assert_eq!(u16::de(&mut reader).unwrap(), 0xBEEF);
        assert_eq!(i32::de(&mut reader).unwrap(), -123_456);
        assert_eq!(f32::de(&mut reader).unwrap(), 3.5);
        assert_eq!(f64::de(&mut reader).unwrap(), f64::MIN_POSITIVE);
    }

    #[test]
    fn strings_round_trip() {
        let mut writer = BitWriter::new();

        "hello".to_string().ser(&mut writer);
        String::new().ser(&mut writer);
        "ünïcödé".to_string().ser(&mut writer);

        let bytes = writer.to_bytes();
        let mut reader = BitReader::new(&bytes);

        assert_eq!(String::de(&mut reader).unwrap(), "hello");
        assert_eq!(String::de(&mut reader).unwrap(), "");
        assert_eq!(String::de(&mut reader).unwrap(), "ünïcödé");
    }
}
