use replica_serde::{BitReader, BitWrite, Serde, SerdeErr, UnsignedVariableInteger};

/// Stable wire identifier of a tracked instance. Minted on the encode side
/// the first time an instance becomes reachable; registered verbatim on the
/// decode side. An instance keeps one id for its whole reachable lifetime,
/// however often it moves between parents.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord)]
pub struct RefId(u64);

/// The root instance's id on both sides, fixed at graph construction.
pub const ROOT_REF_ID: RefId = RefId(0);

impl RefId {
    pub(crate) fn from_u64(value: u64) -> Self {
        RefId(value)
    }

    pub fn to_u64(&self) -> u64 {
        self.0
    }
}

impl Serde for RefId {
    fn ser(&self, writer: &mut dyn BitWrite) {
        UnsignedVariableInteger::<7>::new(self.0).ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        Ok(RefId(UnsignedVariableInteger::<7>::de(reader)?.to_u64()))
    }

    fn bit_length(&self) -> u32 {
        UnsignedVariableInteger::<7>::new(self.0).bit_length()
    }
}
