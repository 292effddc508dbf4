// Pending-transaction queue

use std::collections::VecDeque;

use crate::core::transaction::Transaction;

/// FIFO queue of transactions waiting to be mined into a block.
#[derive(Debug, Default)]
pub struct TransactionPool {
    pending: VecDeque<Transaction>,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, transaction: Transaction) {
        self.pending.push_back(transaction);
    }

    /// Remove and return up to `count` transactions, oldest first.
    pub fn pop_up_to(&mut self, count: usize) -> Vec<Transaction> {
        let take = count.min(self.pending.len());
        self.pending.drain(..take).collect()
    }

    pub fn size(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
