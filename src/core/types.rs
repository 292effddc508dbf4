// Basic types shared by the whole ledger

use std::fmt;

use crate::error::ChainError;

/// 256-bit hash (32 bytes, digest order).
///
/// Used for block hashes, transaction ids and merkle roots. `Ord` compares
/// byte-wise from the front, which equals big-endian numeric order; this is
/// what the proof-of-work target comparison relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self, ChainError> {
        if slice.len() != 32 {
            return Err(ChainError::Encoding(format!(
                "invalid hash length: expected 32, got {}",
                slice.len()
            )));
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(slice);
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// The zero hash, used as the genesis block's predecessor.
    pub fn zero() -> Self {
        Self([0u8; 32])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Digest with the byte order flipped. Block headers built for hashing
    /// store `previous` and `merkleRoot` in this reversed order.
    pub fn reversed(&self) -> Self {
        let mut bytes = self.0;
        bytes.reverse();
        Self(bytes)
    }

    /// Hex string in reversed byte order (Bitcoin display convention).
    pub fn to_hex(&self) -> String {
        hex::encode(self.reversed().0)
    }

    /// Parse a display-order hex string back into digest order.
    pub fn from_hex(hex_str: &str) -> Result<Self, ChainError> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| ChainError::Encoding(format!("invalid hex string: {}", e)))?;
        Ok(Self::from_slice(&bytes)?.reversed())
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_hash() {
        let zero = Hash256::zero();
        assert!(zero.is_zero());
        assert_eq!(zero.as_bytes(), &[0u8; 32]);
    }

    #[test]
    fn hex_round_trip() {
        let mut bytes = [0u8; 32];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        let hash = Hash256::new(bytes);
        let decoded = Hash256::from_hex(&hash.to_hex()).unwrap();
        assert_eq!(hash, decoded);
    }

    #[test]
    fn ordering_is_big_endian_numeric() {
        let mut small = [0u8; 32];
        small[31] = 0xff;
        let mut large = [0u8; 32];
        large[0] = 0x01;
        assert!(Hash256::new(small) < Hash256::new(large));
    }

    #[test]
    fn from_slice_rejects_bad_length() {
        assert!(Hash256::from_slice(&[0u8; 31]).is_err());
    }
}
