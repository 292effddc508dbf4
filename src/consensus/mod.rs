// Consensus rules: difficulty targets and chain validation.

pub mod pow;
pub mod validation;

pub use pow::Target;
pub use validation::{validate_block, validate_transaction};
