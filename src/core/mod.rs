// Core ledger primitives: binary codec, hashing, addresses, scripts,
// transactions, and blocks.

pub mod address;
pub mod block;
pub mod codec;
pub mod hash;
pub mod script;
pub mod sighash;
pub mod transaction;
pub mod types;

pub use types::Hash256;
