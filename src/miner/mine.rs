// Proof-of-work mining
//
// The miner owns the pending-transaction pool and shares the chain behind a
// mutex. Block assembly and the append both run under the chain lock; the
// nonce search itself runs lock-free on a private header copy, so a search
// can race a concurrent append. Staleness is handled optimistically: after
// the search, the found block is discarded if the head moved.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::chain::BlockChain;
use crate::consensus::validation::validate_transaction;
use crate::consensus::Target;
use crate::core::block::{Block, COIN, NONCE_OFFSET};
use crate::core::hash::double_sha256;
use crate::core::script::p2pkh_script;
use crate::core::transaction::Transaction;
use crate::core::Hash256;
use crate::error::Result;
use crate::miner::pool::TransactionPool;
use crate::wallet::Wallet;

/// Coinbase amount per mined block. Fees are not collected.
pub const BLOCK_REWARD: u64 = 5 * COIN;

/// Pool transactions taken per draining pass.
const POOL_DRAIN_BATCH: usize = 256;

#[derive(Debug, Clone)]
pub struct MinerConfig {
    /// Pool size that triggers mining on submission.
    pub min_transactions: usize,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            min_transactions: 1,
        }
    }
}

/// Outcome of one mining pass.
#[derive(Debug)]
pub struct MineStats {
    pub hashes: u64,
    pub took: Duration,
    /// False when the chain head moved during the search and the block was
    /// discarded.
    pub appended: bool,
    pub block_hash: Hash256,
}

pub struct Miner {
    chain: Arc<Mutex<BlockChain>>,
    pool: Mutex<TransactionPool>,
    wallet: Wallet,
    config: MinerConfig,
    /// At most one mining pass runs at a time.
    mining: AtomicBool,
}

impl Miner {
    pub fn new(chain: Arc<Mutex<BlockChain>>, wallet: Wallet, config: MinerConfig) -> Self {
        Self {
            chain,
            pool: Mutex::new(TransactionPool::new()),
            wallet,
            config,
            mining: AtomicBool::new(false),
        }
    }

    pub fn chain(&self) -> &Arc<Mutex<BlockChain>> {
        &self.chain
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    pub fn pool_size(&self) -> usize {
        self.pool.lock().expect("pool lock poisoned").size()
    }

    /// Queue a transaction and start a mining pass if the pool has reached
    /// the configured batch size and no pass is already running.
    pub fn submit_transaction(&self, transaction: Transaction) -> Result<Option<MineStats>> {
        self.pool
            .lock()
            .expect("pool lock poisoned")
            .push(transaction);
        self.mine_if_ready()
    }

    /// Level-triggered check: mine when enough transactions are pending.
    pub fn mine_if_ready(&self) -> Result<Option<MineStats>> {
        if self.pool_size() < self.config.min_transactions {
            return Ok(None);
        }
        if self.mining.swap(true, Ordering::Acquire) {
            debug!("mining pass already in flight, skipping");
            return Ok(None);
        }
        let result = self.mine_next_block();
        self.mining.store(false, Ordering::Release);
        result.map(Some)
    }

    /// Assemble a block from the pool, search for a nonce, and append the
    /// result unless the head moved meanwhile.
    pub fn mine_next_block(&self) -> Result<MineStats> {
        let started = Instant::now();

        let mut block = self.assemble_block()?;
        let target = Target::from_bits(block.nbits());
        let hashes = search_nonce(&mut block, target);
        let block_hash = block.hash();
        let appended = self.try_append(block);

        let stats = MineStats {
            hashes,
            took: started.elapsed(),
            appended,
            block_hash,
        };
        if appended {
            info!(
                "mined block {} after {} hashes in {:?}",
                stats.block_hash, stats.hashes, stats.took
            );
        }
        Ok(stats)
    }

    /// Draft the next block under both locks: pooled transactions first,
    /// then the coinbase. The coinbase carries the would-be chain height in
    /// its locktime so rewards paid to the same key never collide on one
    /// transaction id.
    fn assemble_block(&self) -> Result<Block> {
        let chain = self.chain.lock().expect("chain lock poisoned");
        let mut pool = self.pool.lock().expect("pool lock poisoned");

        let mut block = Block::new(chain.head().hash());
        block.set_nbits(chain.head().nbits());

        // keep drawing until the batch size is met or the pool runs dry;
        // pooled transactions may have gone stale since submission
        while block.transactions().len() < self.config.min_transactions {
            let batch = pool.pop_up_to(POOL_DRAIN_BATCH);
            if batch.is_empty() {
                break;
            }
            for transaction in batch {
                if validate_transaction(&chain, &transaction) {
                    block.add_transaction(transaction);
                } else {
                    debug!("dropping stale pooled transaction {}", transaction.hash());
                }
            }
        }

        let coinbase = block
            .add_coinbase_transaction(BLOCK_REWARD, p2pkh_script(&self.wallet.pub_key_hash()))?;
        coinbase.set_locktime(chain.height() as u32)?;
        Ok(block)
    }

    /// Append a solved block, unless another block claimed its parent slot
    /// while the nonce search was running.
    fn try_append(&self, block: Block) -> bool {
        let mut chain = self.chain.lock().expect("chain lock poisoned");
        if chain.head().hash() == block.previous() {
            chain.add_block(block);
            true
        } else {
            info!(
                "discarding stale block {}: head moved during search",
                block.hash()
            );
            false
        }
    }
}

/// Scan nonces until the proof-of-work hash meets `target`, patching the
/// nonce field of a prebuilt header instead of re-encoding the block each
/// attempt. Stamps the winning nonce into the block.
fn search_nonce(block: &mut Block, target: Target) -> u64 {
    let mut header = block.pow_header();
    let mut nonce: u32 = 0;
    let mut hashes: u64 = 0;
    loop {
        header[NONCE_OFFSET..].copy_from_slice(&nonce.to_le_bytes());
        hashes += 1;
        if target.is_met_by(double_sha256(&header)) {
            block.set_nonce(nonce);
            return hashes;
        }
        nonce = nonce.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::utxo::compute_utxo;
    use crate::core::block::DEFAULT_NBITS;

    fn miner_with_fresh_chain(min_transactions: usize) -> Miner {
        Miner::new(
            Arc::new(Mutex::new(BlockChain::new())),
            Wallet::generate(),
            MinerConfig { min_transactions },
        )
    }

    #[test]
    fn mined_block_meets_target_and_pays_reward() {
        let miner = miner_with_fresh_chain(1);
        let stats = miner.mine_next_block().unwrap();
        assert!(stats.appended);

        let chain = miner.chain().lock().unwrap();
        assert_eq!(chain.height(), 2);
        let head = chain.head();
        assert_eq!(head.hash(), stats.block_hash);
        assert!(Target::from_bits(head.nbits()).is_met_by(head.pow_hash()));

        let balance = compute_utxo(&chain, &miner.wallet().pub_key_hash());
        assert_eq!(balance.total, BLOCK_REWARD);
    }

    #[test]
    fn submission_below_batch_size_does_not_mine() {
        let miner = miner_with_fresh_chain(3);
        let mut tx = Transaction::new();
        tx.add_output(1).unwrap();
        let stats = miner.submit_transaction(tx).unwrap();
        assert!(stats.is_none());
        assert_eq!(miner.pool_size(), 1);
        assert_eq!(miner.chain().lock().unwrap().height(), 1);
    }

    #[test]
    fn reaching_batch_size_triggers_mining() {
        let miner = miner_with_fresh_chain(2);
        for amount in [1, 2] {
            let mut tx = Transaction::new();
            tx.add_output(amount).unwrap();
            if amount == 1 {
                assert!(miner.submit_transaction(tx).unwrap().is_none());
            } else {
                let stats = miner.submit_transaction(tx).unwrap().unwrap();
                assert!(stats.appended);
            }
        }
        let chain = miner.chain().lock().unwrap();
        assert_eq!(chain.height(), 2);
        // coinbase first, then the two pooled transactions
        assert_eq!(chain.head().transactions().len(), 3);
        assert!(chain.head().transactions()[0].is_coinbase());
    }

    #[test]
    fn stale_pool_transactions_are_dropped() {
        let miner = miner_with_fresh_chain(1);
        let mut bogus = Transaction::new();
        bogus.add_input(Hash256::new([9u8; 32]), 0).unwrap();
        bogus.add_output(1).unwrap();

        let stats = miner.submit_transaction(bogus).unwrap().unwrap();
        assert!(stats.appended);
        let chain = miner.chain().lock().unwrap();
        // only the coinbase survived assembly
        assert_eq!(chain.head().transactions().len(), 1);
    }

    #[test]
    fn consecutive_coinbases_have_distinct_ids() {
        let miner = miner_with_fresh_chain(1);
        miner.mine_next_block().unwrap();
        miner.mine_next_block().unwrap();

        let chain = miner.chain().lock().unwrap();
        assert_eq!(chain.height(), 3);
        let first = &chain.blocks()[1].transactions()[0];
        let second = &chain.blocks()[2].transactions()[0];
        assert_ne!(first.hash(), second.hash());

        // both rewards survive replay instead of cancelling each other
        let balance = compute_utxo(&chain, &miner.wallet().pub_key_hash());
        assert_eq!(balance.total, 2 * BLOCK_REWARD);
    }

    #[test]
    fn pass_in_flight_skips_overlapping_trigger() {
        let miner = miner_with_fresh_chain(1);
        let mut tx = Transaction::new();
        tx.add_output(1).unwrap();

        miner.mining.store(true, Ordering::SeqCst);
        assert!(miner.submit_transaction(tx).unwrap().is_none());
        // the skipped transaction stays pooled for the running pass
        assert_eq!(miner.pool_size(), 1);
        assert_eq!(miner.chain().lock().unwrap().height(), 1);

        miner.mining.store(false, Ordering::SeqCst);
        let stats = miner.mine_if_ready().unwrap().unwrap();
        assert!(stats.appended);
        assert_eq!(miner.pool_size(), 0);
    }

    #[test]
    fn solved_block_is_discarded_when_head_moves() {
        let miner = miner_with_fresh_chain(1);
        let mut block = miner.assemble_block().unwrap();
        let target = Target::from_bits(block.nbits());
        search_nonce(&mut block, target);
        let solved_hash = block.hash();

        // a competing block lands while the nonce search is running
        let competing_hash = {
            let mut chain = miner.chain().lock().unwrap();
            chain.create_block().hash()
        };

        assert!(!miner.try_append(block));
        let chain = miner.chain().lock().unwrap();
        assert_eq!(chain.height(), 2);
        assert_eq!(chain.head().hash(), competing_hash);
        assert_ne!(chain.head().hash(), solved_hash);
    }

    #[test]
    fn concurrent_submissions_append_one_block_per_pass() {
        use std::thread;

        let miner = Arc::new(miner_with_fresh_chain(1));
        let handles: Vec<_> = (0..2u64)
            .map(|amount| {
                let miner = Arc::clone(&miner);
                thread::spawn(move || {
                    let mut tx = Transaction::new();
                    tx.add_output(amount + 1).unwrap();
                    miner.submit_transaction(tx).unwrap()
                })
            })
            .collect();
        let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        // only the miner appends here, so no completed pass can go stale
        let mined = outcomes.iter().flatten().filter(|s| s.appended).count();
        assert!(outcomes.iter().flatten().all(|s| s.appended));
        assert!((1..=2).contains(&mined));

        let chain = miner.chain().lock().unwrap();
        assert_eq!(chain.height(), 1 + mined);
        let mut previous = chain.genesis().hash();
        for block in &chain.blocks()[1..] {
            assert_eq!(block.previous(), previous);
            previous = block.hash();
        }
    }

    #[test]
    fn search_nonce_counts_attempts() {
        let mut block = Block::new(Hash256::zero());
        block.set_nbits(DEFAULT_NBITS);
        block.add_coinbase_transaction(1, vec![0x51]).unwrap();
        let target = Target::from_bits(DEFAULT_NBITS);
        let hashes = search_nonce(&mut block, target);
        assert!(hashes >= 1);
        assert!(target.is_met_by(block.pow_hash()));
    }
}
