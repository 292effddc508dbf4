// Mining: pending-transaction pool and proof-of-work search.

pub mod mine;
pub mod pool;

pub use mine::{Miner, MinerConfig, MineStats, BLOCK_REWARD};
pub use pool::TransactionPool;
