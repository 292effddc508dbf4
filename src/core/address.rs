// Base58Check coin addresses
//
// An address is the Base58 encoding of: 1-byte version (0x00, main network)
// || 20-byte hash160 || first 4 bytes of double_sha256(version || hash).

use crate::core::hash::double_sha256;
use crate::error::{ChainError, Result};

const VERSION_MAIN: u8 = 0x00;
const PAYLOAD_LEN: usize = 25;

/// Encode a public-key hash as a human-readable coin address.
pub fn encode_address(pub_key_hash: &[u8; 20]) -> String {
    let mut payload = Vec::with_capacity(PAYLOAD_LEN);
    payload.push(VERSION_MAIN);
    payload.extend_from_slice(pub_key_hash);

    let checksum = double_sha256(&payload);
    payload.extend_from_slice(&checksum.as_bytes()[..4]);

    bs58::encode(payload).into_string()
}

/// Whether the string decodes to a well-formed main-network address:
/// 25 bytes, version 0x00 and a matching checksum.
pub fn is_coin_address(address: &str) -> bool {
    let Ok(payload) = bs58::decode(address).into_vec() else {
        return false;
    };
    if payload.len() != PAYLOAD_LEN || payload[0] != VERSION_MAIN {
        return false;
    }
    let checksum = double_sha256(&payload[..21]);
    payload[21..] == checksum.as_bytes()[..4]
}

/// Extract the 20-byte hash160 from an address, rejecting anything that
/// fails [`is_coin_address`].
pub fn decode_address(address: &str) -> Result<[u8; 20]> {
    if !is_coin_address(address) {
        return Err(ChainError::InvalidAddress(address.to_string()));
    }
    let payload = bs58::decode(address)
        .into_vec()
        .map_err(|e| ChainError::InvalidAddress(format!("{}: {}", address, e)))?;
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&payload[1..21]);
    Ok(hash)
}
