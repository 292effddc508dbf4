// Hashing primitives

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::core::Hash256;

/// Single SHA-256.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let digest = Sha256::digest(data);
    let mut result = [0u8; 32];
    result.copy_from_slice(&digest);
    result
}

/// SHA-256 applied twice. All content hashing (transaction ids, block ids,
/// signature digests, address checksums) goes through this.
pub fn double_sha256(data: &[u8]) -> Hash256 {
    Hash256::new(sha256(&sha256(data)))
}

/// RIPEMD-160(SHA-256(data)), the short public-key fingerprint bound into
/// locking scripts and addresses.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    let ripemd = Ripemd160::digest(sha);
    let mut result = [0u8; 20];
    result.copy_from_slice(&ripemd);
    result
}
