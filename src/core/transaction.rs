// Transaction data structures and wire format
//
// Binary layout:
//   <version u32><inputCount varint>[<input>]<outputCount varint>[<output>]<locktime u32>
// where <input> is:
//   <prevTxHash char[32]><outputIndex u32><scriptLen varint><scriptSig><sequence u32>
// and <output> is:
//   <amount u64><scriptLen varint><scriptPubKey>

use std::sync::OnceLock;

use crate::core::codec::{Reader, Writer};
use crate::core::hash::double_sha256;
use crate::core::Hash256;
use crate::error::{ChainError, Result};

/// The 1-byte placeholder script, used wherever a script slot must not be
/// empty but carries no program yet.
pub const EMPTY_SCRIPT: [u8; 1] = [0x00];

pub const SEQUENCE_FINAL: u32 = 0xffff_ffff;

/// Transaction input, referencing a previous transaction's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Input {
    /// Hash of the transaction whose output is being spent (digest order).
    pub prev_tx_hash: Hash256,
    /// Index into the referenced transaction's output list.
    pub output_index: u32,
    /// The unlocking script, usually `[signature||hashtype, pubkey]` pushes.
    pub script_sig: Vec<u8>,
    /// Consumed by the signature-hash transforms.
    pub sequence: u32,
}

/// Transaction output: an amount locked behind a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    /// Amount in the smallest indivisible unit.
    pub amount: u64,
    /// The locking script that must evaluate to the true marker to spend.
    pub script_pubkey: Vec<u8>,
}

/// A value-transfer transaction.
///
/// The identity hash and the wire buffer are computed lazily and cached.
/// Producing the buffer finalizes the transaction: every mutator fails with
/// [`ChainError::TransactionBuilt`] afterwards, and before that point each
/// mutation clears the cached hash.
#[derive(Debug, Default)]
pub struct Transaction {
    pub(crate) version: u32,
    pub(crate) inputs: Vec<Input>,
    pub(crate) outputs: Vec<Output>,
    pub(crate) locktime: u32,
    buffer: OnceLock<Vec<u8>>,
    hash: OnceLock<Hash256>,
}

impl Transaction {
    pub fn new() -> Self {
        Self {
            version: 1,
            ..Self::default()
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn locktime(&self) -> u32 {
        self.locktime
    }

    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    /// A coinbase transaction creates value out of nothing: it has no inputs.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.is_empty()
    }

    /// Whether the wire buffer has been produced. A built transaction is
    /// immutable.
    pub fn is_built(&self) -> bool {
        self.buffer.get().is_some()
    }

    fn assert_mutable(&self) -> Result<()> {
        if self.is_built() {
            return Err(ChainError::TransactionBuilt);
        }
        Ok(())
    }

    pub(crate) fn invalidate_hash(&mut self) {
        self.hash = OnceLock::new();
    }

    /// Append an input spending `prev_tx_hash[output_index]`, with the
    /// placeholder unlocking script and a final sequence number.
    pub fn add_input(&mut self, prev_tx_hash: Hash256, output_index: u32) -> Result<()> {
        self.assert_mutable()?;
        self.invalidate_hash();
        self.inputs.push(Input {
            prev_tx_hash,
            output_index,
            script_sig: EMPTY_SCRIPT.to_vec(),
            sequence: SEQUENCE_FINAL,
        });
        Ok(())
    }

    /// Append an output with the placeholder locking script.
    pub fn add_output(&mut self, amount: u64) -> Result<()> {
        self.add_output_locked(amount, EMPTY_SCRIPT.to_vec())
    }

    pub fn add_output_locked(&mut self, amount: u64, script_pubkey: Vec<u8>) -> Result<()> {
        self.assert_mutable()?;
        self.invalidate_hash();
        self.outputs.push(Output {
            amount,
            script_pubkey,
        });
        Ok(())
    }

    pub fn set_input_script_sig(&mut self, index: usize, script_sig: Vec<u8>) -> Result<()> {
        self.assert_mutable()?;
        let input = self
            .inputs
            .get_mut(index)
            .ok_or_else(|| ChainError::NotFound(format!("transaction input {}", index)))?;
        input.script_sig = script_sig;
        self.hash = OnceLock::new();
        Ok(())
    }

    pub fn set_output_script_pubkey(&mut self, index: usize, script_pubkey: Vec<u8>) -> Result<()> {
        self.assert_mutable()?;
        let output = self
            .outputs
            .get_mut(index)
            .ok_or_else(|| ChainError::NotFound(format!("transaction output {}", index)))?;
        output.script_pubkey = script_pubkey;
        self.hash = OnceLock::new();
        Ok(())
    }

    pub fn set_locktime(&mut self, locktime: u32) -> Result<()> {
        self.assert_mutable()?;
        self.invalidate_hash();
        self.locktime = locktime;
        Ok(())
    }

    /// The canonical wire encoding. The first call finalizes the transaction.
    pub fn buffer(&self) -> &[u8] {
        self.buffer.get_or_init(|| self.encode_raw())
    }

    fn encode_raw(&self) -> Vec<u8> {
        let mut writer = Writer::new();
        writer.write_u32(self.version);

        writer.write_varint(self.inputs.len() as u64);
        for input in &self.inputs {
            writer.write_bytes(input.prev_tx_hash.as_bytes());
            writer.write_u32(input.output_index);
            writer.write_varint(input.script_sig.len() as u64);
            writer.write_bytes(&input.script_sig);
            writer.write_u32(input.sequence);
        }

        writer.write_varint(self.outputs.len() as u64);
        for output in &self.outputs {
            writer.write_u64(output.amount);
            writer.write_varint(output.script_pubkey.len() as u64);
            writer.write_bytes(&output.script_pubkey);
        }

        writer.write_u32(self.locktime);
        writer.into_bytes()
    }

    /// Transaction identity: double SHA-256 of the wire encoding, cached.
    pub fn hash(&self) -> Hash256 {
        *self.hash.get_or_init(|| double_sha256(self.buffer()))
    }

    pub fn decode(reader: &mut Reader) -> Result<Self> {
        let mut tx = Transaction::new();
        tx.version = reader.read_u32()?;

        let input_count = reader.read_varint()?;
        for _ in 0..input_count {
            let prev_tx_hash = Hash256::from_slice(reader.read_bytes(32)?)?;
            let output_index = reader.read_u32()?;
            let script_len = reader.read_varint()? as usize;
            let script_sig = reader.read_bytes(script_len)?.to_vec();
            let sequence = reader.read_u32()?;
            tx.inputs.push(Input {
                prev_tx_hash,
                output_index,
                script_sig,
                sequence,
            });
        }

        let output_count = reader.read_varint()?;
        for _ in 0..output_count {
            let amount = reader.read_u64()?;
            let script_len = reader.read_varint()? as usize;
            let script_pubkey = reader.read_bytes(script_len)?.to_vec();
            tx.outputs.push(Output {
                amount,
                script_pubkey,
            });
        }

        tx.locktime = reader.read_u32()?;
        Ok(tx)
    }

    pub fn decode_bytes(bytes: &[u8]) -> Result<Self> {
        Self::decode(&mut Reader::new(bytes))
    }
}

// Cloning drops the cached buffer and hash so the copy is mutable again;
// the signature-hash transforms depend on this.
impl Clone for Transaction {
    fn clone(&self) -> Self {
        Self {
            version: self.version,
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            locktime: self.locktime,
            buffer: OnceLock::new(),
            hash: OnceLock::new(),
        }
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
            && self.inputs == other.inputs
            && self.outputs == other.outputs
            && self.locktime == other.locktime
    }
}

impl Eq for Transaction {}
