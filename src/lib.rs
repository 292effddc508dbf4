//! A minimal in-memory cryptocurrency ledger engine: binary block and
//! transaction encoding, Merkle commitments, a stack-based locking-script
//! machine, signature-hash computation, UTXO accounting by chain replay, and
//! a proof-of-work miner.
//!
//! The chain lives entirely in memory and balance lookups replay it from
//! genesis; there is no persistence, indexing, or peer-to-peer layer.

pub mod chain;
pub mod consensus;
pub mod core;
pub mod error;
pub mod miner;
pub mod wallet;

pub use crate::chain::{genesis_block, BlockChain};
pub use crate::consensus::{validate_block, validate_transaction, Target};
pub use crate::core::block::{Block, COIN};
pub use crate::core::transaction::Transaction;
pub use crate::core::Hash256;
pub use crate::error::{ChainError, Result, ScriptError};
pub use crate::miner::{Miner, MinerConfig, TransactionPool, BLOCK_REWARD};
pub use crate::wallet::{transfer_money_from_to, Wallet};
