// Error types for the ledger engine

use thiserror::Error;

/// Failures of a single script evaluation. Each variant aborts the current
/// evaluation; the validator converts them into a boolean "invalid" result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    #[error("no opcode for byte 0x{0:02x}")]
    UnknownOpcode(u8),

    #[error("{op}: stack too small")]
    StackUnderflow { op: &'static str },

    #[error("operand must be exactly 4 bytes, got {got}")]
    OperandSize { got: usize },

    #[error("OP_VERIFY failed")]
    VerifyFailed,

    #[error("push runs past end of script")]
    TruncatedPush,

    #[error("signature must be 71/72 bytes, got {0}")]
    BadSignatureLength(usize),

    #[error("OP_CHECKSIG requires a transaction context")]
    MissingContext,

    #[error("input index {0} out of range")]
    InputOutOfRange(usize),

    #[error("referenced previous output {0} does not exist")]
    MissingPreviousOutput(u32),
}

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("script failed: {0}")]
    Script(#[from] ScriptError),

    #[error("script did not leave the true marker on the stack")]
    ScriptVerifyFailed,

    #[error("signature rejected: {0}")]
    SignatureInvalid(String),

    #[error("insufficient funds: have {available}, need {required}")]
    InsufficientFunds { available: u64, required: u64 },

    #[error("output total {output_total} exceeds input total {input_total}")]
    ValueConservation { input_total: u64, output_total: u64 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transaction already built")]
    TransactionBuilt,

    #[error("block has no transactions")]
    EmptyBlock,

    #[error("transaction has no outputs")]
    NoOutputs,

    #[error("merkle root does not match transactions")]
    MerkleMismatch,
}

pub type Result<T> = std::result::Result<T, ChainError>;
