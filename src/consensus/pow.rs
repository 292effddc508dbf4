// Compact difficulty targets
//
// nBits packs a target as <exponent u8><mantissa u24>: the target value is
// mantissa * 2^(8 * (exponent - 3)). A header satisfies the target when its
// proof-of-work hash, read as a 256-bit big-endian integer, is <= the target.

use crate::core::Hash256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    bits: u32,
}

impl Target {
    pub fn from_bits(bits: u32) -> Self {
        Self { bits }
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Expand to the full 256-bit big-endian threshold. The three mantissa
    /// bytes land so that the value ends `exponent` bytes from the top;
    /// exponents below 3 shift mantissa bytes off the low end.
    pub fn to_hash256(&self) -> Hash256 {
        let exponent = (self.bits >> 24) as i32;
        let mantissa = [
            (self.bits >> 16) as u8,
            (self.bits >> 8) as u8,
            self.bits as u8,
        ];
        let mut bytes = [0u8; 32];
        for (i, byte) in mantissa.into_iter().enumerate() {
            let pos = 32 - exponent + i as i32;
            if (0..32).contains(&pos) {
                bytes[pos as usize] = byte;
            }
        }
        Hash256::new(bytes)
    }

    /// Whether `hash` satisfies this difficulty.
    pub fn is_met_by(&self, hash: Hash256) -> bool {
        hash <= self.to_hash256()
    }
}
