// Block structure, Merkle commitment, and the two header serializations
//
// Storage layout:
//   <size u32><version u32><previous char[32]><merkleRoot char[32]>
//   <timestamp u32><nBits u32><nonce u32><txCount varint>[<tx>]
// The identity hash covers the 80-byte header in storage byte order. The
// proof-of-work header is the same 80 bytes with `previous` and `merkleRoot`
// byte-reversed (display order).

use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::core::codec::{Reader, Writer};
use crate::core::hash::double_sha256;
use crate::core::transaction::Transaction;
use crate::core::Hash256;
use crate::error::Result;

/// Smallest indivisible units per coin.
pub const COIN: u64 = 1_000_000;

/// Compact difficulty used until a retargeting rule exists.
pub const DEFAULT_NBITS: u32 = 0x1f00_ffff;

pub const HEADER_LEN: usize = 80;

/// Byte offset of the nonce within either 80-byte header form.
pub const NONCE_OFFSET: usize = 76;

#[derive(Debug)]
pub struct Block {
    version: u32,
    previous: Hash256,
    /// Merkle root carried by the wire encoding; only present on decoded
    /// blocks, and checked against the recomputed root at validation time.
    claimed_merkle_root: Option<Hash256>,
    timestamp: u32,
    nbits: u32,
    nonce: u32,
    transactions: Vec<Transaction>,
    hash: OnceLock<Hash256>,
}

impl Block {
    /// A fresh block on top of `previous`, stamped with the current time.
    pub fn new(previous: Hash256) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs() as u32);
        Self::with_header(previous, timestamp, DEFAULT_NBITS, 0)
    }

    pub fn with_header(previous: Hash256, timestamp: u32, nbits: u32, nonce: u32) -> Self {
        Self {
            version: 1,
            previous,
            claimed_merkle_root: None,
            timestamp,
            nbits,
            nonce,
            transactions: Vec::new(),
            hash: OnceLock::new(),
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn previous(&self) -> Hash256 {
        self.previous
    }

    pub fn timestamp(&self) -> u32 {
        self.timestamp
    }

    pub fn nbits(&self) -> u32 {
        self.nbits
    }

    pub fn nonce(&self) -> u32 {
        self.nonce
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub(crate) fn claimed_merkle_root(&self) -> Option<Hash256> {
        self.claimed_merkle_root
    }

    fn invalidate(&mut self) {
        self.hash = OnceLock::new();
    }

    pub fn set_nonce(&mut self, nonce: u32) {
        self.nonce = nonce;
        self.invalidate();
    }

    pub fn set_timestamp(&mut self, timestamp: u32) {
        self.timestamp = timestamp;
        self.invalidate();
    }

    pub fn set_nbits(&mut self, nbits: u32) {
        self.nbits = nbits;
        self.invalidate();
    }

    pub fn add_transaction(&mut self, transaction: Transaction) {
        self.transactions.push(transaction);
        self.invalidate();
    }

    /// Prepend the reward-creating transaction: one output of `amount` locked
    /// with `script_pubkey`, no inputs. Returns the inserted coinbase so the
    /// caller can stamp it further before the block is sealed.
    pub fn add_coinbase_transaction(
        &mut self,
        amount: u64,
        script_pubkey: Vec<u8>,
    ) -> Result<&mut Transaction> {
        let mut coinbase = Transaction::new();
        coinbase.add_output_locked(amount, script_pubkey)?;
        self.transactions.insert(0, coinbase);
        self.invalidate();
        Ok(&mut self.transactions[0])
    }

    /// Merkle root over the current transaction list.
    pub fn merkle_root(&self) -> Hash256 {
        calculate_merkle_root(&self.transactions)
    }

    fn write_header(&self, writer: &mut Writer, display_order: bool) {
        let previous = self.previous;
        let merkle = self.merkle_root();
        writer.write_u32(self.version);
        if display_order {
            writer.write_bytes(previous.reversed().as_bytes());
            writer.write_bytes(merkle.reversed().as_bytes());
        } else {
            writer.write_bytes(previous.as_bytes());
            writer.write_bytes(merkle.as_bytes());
        }
        writer.write_u32(self.timestamp);
        writer.write_u32(self.nbits);
        writer.write_u32(self.nonce);
    }

    /// The 80-byte header in proof-of-work (display) byte order.
    pub fn pow_header(&self) -> Vec<u8> {
        let mut writer = Writer::with_capacity(HEADER_LEN);
        self.write_header(&mut writer, true);
        writer.into_bytes()
    }

    /// Block identity: double SHA-256 over the storage-order header, cached.
    pub fn hash(&self) -> Hash256 {
        *self.hash.get_or_init(|| {
            let mut writer = Writer::with_capacity(HEADER_LEN);
            self.write_header(&mut writer, false);
            double_sha256(&writer.into_bytes())
        })
    }

    /// Hash of the display-order header; this is what the difficulty target
    /// constrains.
    pub fn pow_hash(&self) -> Hash256 {
        double_sha256(&self.pow_header())
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut body = Writer::new();
        self.write_header(&mut body, false);
        body.write_varint(self.transactions.len() as u64);
        for transaction in &self.transactions {
            body.write_bytes(transaction.buffer());
        }
        let body = body.into_bytes();

        let mut writer = Writer::with_capacity(4 + body.len());
        writer.write_u32((4 + body.len()) as u32);
        writer.write_bytes(&body);
        writer.into_bytes()
    }

    pub fn decode(reader: &mut Reader) -> Result<Self> {
        let _size = reader.read_u32()?;
        let version = reader.read_u32()?;
        let previous = Hash256::from_slice(reader.read_bytes(32)?)?;
        let merkle_root = Hash256::from_slice(reader.read_bytes(32)?)?;
        let timestamp = reader.read_u32()?;
        let nbits = reader.read_u32()?;
        let nonce = reader.read_u32()?;

        let tx_count = reader.read_varint()?;
        let mut transactions = Vec::with_capacity(tx_count as usize);
        for _ in 0..tx_count {
            transactions.push(Transaction::decode(reader)?);
        }

        let mut block = Self::with_header(previous, timestamp, nbits, nonce);
        block.version = version;
        block.claimed_merkle_root = Some(merkle_root);
        block.transactions = transactions;
        Ok(block)
    }

    pub fn decode_bytes(bytes: &[u8]) -> Result<Self> {
        Self::decode(&mut Reader::new(bytes))
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
            && self.previous == other.previous
            && self.timestamp == other.timestamp
            && self.nbits == other.nbits
            && self.nonce == other.nonce
            && self.transactions == other.transactions
    }
}

impl Eq for Block {}

/// Pair-wise double SHA-256 collapse over the transaction hash list. An odd
/// level duplicates its last entry. No transactions gives the zero root.
pub fn calculate_merkle_root(transactions: &[Transaction]) -> Hash256 {
    if transactions.is_empty() {
        return Hash256::zero();
    }
    let mut level: Vec<Hash256> = transactions.iter().map(|tx| tx.hash()).collect();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let left = pair[0];
                let right = *pair.get(1).unwrap_or(&pair[0]);
                let mut concat = [0u8; 64];
                concat[..32].copy_from_slice(left.as_bytes());
                concat[32..].copy_from_slice(right.as_bytes());
                double_sha256(&concat)
            })
            .collect();
    }
    level[0]
}
