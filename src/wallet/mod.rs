// Key management and transfer construction.

pub mod keys;
pub mod transfer;

pub use keys::Wallet;
pub use transfer::{extract_pub_key_hash, transfer_money_from_to, transfer_to_address};
