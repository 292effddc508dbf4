// In-memory block chain
//
// The chain is a plain append-only vector rooted at the hard-coded genesis
// block. All lookups and balance queries replay the vector; there is no
// index and no persistence.

pub mod utxo;

use crate::core::block::{Block, COIN, DEFAULT_NBITS};
use crate::core::transaction::Transaction;
use crate::core::Hash256;
use crate::error::{ChainError, Result};

pub const GENESIS_TIMESTAMP: u32 = 1_231_006_505;
pub const GENESIS_NONCE: u32 = 2_083_236_893;
pub const GENESIS_REWARD: u64 = 50 * COIN;

/// The genesis coinbase locks its reward with this text instead of a real
/// script, so it can never be spent through script evaluation.
pub const GENESIS_TEXT: &[u8] =
    b"The Times 03/Jan/2009 Chancellor on brink of second bailout for banks";

/// The fixed first block. Built fresh on each call; every copy hashes the
/// same.
pub fn genesis_block() -> Block {
    let mut block =
        Block::with_header(Hash256::zero(), GENESIS_TIMESTAMP, DEFAULT_NBITS, GENESIS_NONCE);
    block
        .add_coinbase_transaction(GENESIS_REWARD, GENESIS_TEXT.to_vec())
        .expect("fresh coinbase is mutable");
    block
}

/// A transaction located within the chain.
pub struct TransactionEntry<'a> {
    pub block: &'a Block,
    pub timestamp: u32,
    pub transaction: &'a Transaction,
}

/// A block located within the chain.
pub struct BlockEntry<'a> {
    pub height: usize,
    pub block: &'a Block,
}

#[derive(Debug)]
pub struct BlockChain {
    blocks: Vec<Block>,
}

impl BlockChain {
    /// A new chain containing only the genesis block.
    pub fn new() -> Self {
        Self {
            blocks: vec![genesis_block()],
        }
    }

    pub fn height(&self) -> usize {
        self.blocks.len()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn genesis(&self) -> &Block {
        &self.blocks[0]
    }

    pub fn head(&self) -> &Block {
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn add_block(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// Append an empty block on top of the current head and hand it back for
    /// filling in.
    pub fn create_block(&mut self) -> &mut Block {
        let block = Block::new(self.head().hash());
        self.blocks.push(block);
        let last = self.blocks.len() - 1;
        &mut self.blocks[last]
    }

    /// Locate a transaction by its hash, scanning the whole chain.
    pub fn get_transaction(&self, hash: Hash256) -> Result<TransactionEntry<'_>> {
        for block in &self.blocks {
            for transaction in block.transactions() {
                if transaction.hash() == hash {
                    return Ok(TransactionEntry {
                        block,
                        timestamp: block.timestamp(),
                        transaction,
                    });
                }
            }
        }
        Err(ChainError::NotFound(format!("transaction {}", hash)))
    }

    /// Locate a block by its identity hash.
    pub fn get_block(&self, hash: Hash256) -> Result<BlockEntry<'_>> {
        for (height, block) in self.blocks.iter().enumerate() {
            if block.hash() == hash {
                return Ok(BlockEntry { height, block });
            }
        }
        Err(ChainError::NotFound(format!("block {}", hash)))
    }

    /// The `count` most recent transactions, newest first.
    pub fn last_transactions(&self, count: usize) -> Vec<TransactionEntry<'_>> {
        let mut entries = Vec::with_capacity(count);
        for block in self.blocks.iter().rev() {
            for transaction in block.transactions().iter().rev() {
                if entries.len() == count {
                    return entries;
                }
                entries.push(TransactionEntry {
                    block,
                    timestamp: block.timestamp(),
                    transaction,
                });
            }
        }
        entries
    }
}

impl Default for BlockChain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_is_stable() {
        let a = genesis_block();
        let b = genesis_block();
        assert_eq!(a.hash(), b.hash());
        assert!(a.previous().is_zero());
        assert_eq!(a.transactions().len(), 1);
        assert!(a.transactions()[0].is_coinbase());
        assert_eq!(a.transactions()[0].outputs()[0].amount, GENESIS_REWARD);
    }

    #[test]
    fn new_chain_starts_at_genesis() {
        let chain = BlockChain::new();
        assert_eq!(chain.height(), 1);
        assert_eq!(chain.head().hash(), genesis_block().hash());
    }

    #[test]
    fn create_block_links_to_head() {
        let mut chain = BlockChain::new();
        let genesis_hash = chain.head().hash();
        chain.create_block();
        assert_eq!(chain.height(), 2);
        assert_eq!(chain.head().previous(), genesis_hash);
    }

    #[test]
    fn get_transaction_finds_genesis_coinbase() {
        let chain = BlockChain::new();
        let coinbase_hash = chain.genesis().transactions()[0].hash();
        let entry = chain.get_transaction(coinbase_hash).unwrap();
        assert_eq!(entry.timestamp, GENESIS_TIMESTAMP);
        assert_eq!(entry.transaction.hash(), coinbase_hash);
    }

    #[test]
    fn lookups_fail_with_not_found() {
        let chain = BlockChain::new();
        let missing = Hash256::new([0xab; 32]);
        assert!(matches!(
            chain.get_transaction(missing),
            Err(ChainError::NotFound(_))
        ));
        assert!(matches!(
            chain.get_block(missing),
            Err(ChainError::NotFound(_))
        ));
    }

    #[test]
    fn last_transactions_are_newest_first() {
        let mut chain = BlockChain::new();
        let block = chain.create_block();
        let mut tx = Transaction::new();
        tx.add_output(1).unwrap();
        let newest = tx.hash();
        block.add_transaction(tx);

        let entries = chain.last_transactions(2);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].transaction.hash(), newest);
        assert!(entries[1].transaction.is_coinbase());

        assert_eq!(chain.last_transactions(10).len(), 2);
    }
}
