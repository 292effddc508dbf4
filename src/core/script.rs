// Stack-based script interpreter
//
// Scripts are byte programs. Bytes 0x01..=0x4b push that many literal bytes;
// everything else is looked up in the opcode table. Evaluation runs the
// program against a stack of byte vectors and reports the value left on top,
// if any. Spend checks run the unlocking script and the locking script as one
// concatenated program.

use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1};

use crate::core::hash::{hash160, sha256};
use crate::core::sighash;
use crate::core::transaction::Transaction;
use crate::error::ScriptError;

/// Marker byte pushed by comparison opcodes on success.
pub const OP_TRUE: u8 = 0x51;
/// Marker byte pushed by comparison opcodes on failure.
pub const OP_FALSE: u8 = 0x00;

/// Accepted lengths for a DER signature with the trailing hashtype byte.
const SIGNATURE_LENGTHS: [usize; 2] = [71, 72];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// 0x01..=0x4b: push the next `n` script bytes onto the stack.
    Push(u8),
    Verify,
    Dup,
    Equal,
    EqualVerify,
    Add,
    Sha256,
    Hash160,
    CodeSeparator,
    CheckSig,
    CheckSigVerify,
}

impl Opcode {
    pub fn from_byte(byte: u8) -> Result<Self, ScriptError> {
        match byte {
            0x01..=0x4b => Ok(Opcode::Push(byte)),
            0x69 => Ok(Opcode::Verify),
            0x76 => Ok(Opcode::Dup),
            0x87 => Ok(Opcode::Equal),
            0x88 => Ok(Opcode::EqualVerify),
            0x93 => Ok(Opcode::Add),
            0xa8 => Ok(Opcode::Sha256),
            0xa9 => Ok(Opcode::Hash160),
            0xab => Ok(Opcode::CodeSeparator),
            0xac => Ok(Opcode::CheckSig),
            0xad => Ok(Opcode::CheckSigVerify),
            other => Err(ScriptError::UnknownOpcode(other)),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Opcode::Push(n) => n,
            Opcode::Verify => 0x69,
            Opcode::Dup => 0x76,
            Opcode::Equal => 0x87,
            Opcode::EqualVerify => 0x88,
            Opcode::Add => 0x93,
            Opcode::Sha256 => 0xa8,
            Opcode::Hash160 => 0xa9,
            Opcode::CodeSeparator => 0xab,
            Opcode::CheckSig => 0xac,
            Opcode::CheckSigVerify => 0xad,
        }
    }
}

/// Transaction context for OP_CHECKSIG: the spending transaction, the
/// transaction whose output it spends, and which input is being checked.
pub struct ScriptContext<'a> {
    pub previous_transaction: &'a Transaction,
    pub transaction: &'a Transaction,
    pub input_index: usize,
}

/// One script evaluation: a cursor over the program plus the value stack.
pub struct ScriptVm<'a> {
    script: &'a [u8],
    pos: usize,
    stack: Vec<Vec<u8>>,
    context: Option<&'a ScriptContext<'a>>,
}

impl<'a> ScriptVm<'a> {
    pub fn new(script: &'a [u8], context: Option<&'a ScriptContext<'a>>) -> Self {
        Self::with_stack(script, Vec::new(), context)
    }

    /// Start evaluation with `stack` already populated. Spend checks run the
    /// unlocking script first and seed the locking script with its stack.
    pub fn with_stack(
        script: &'a [u8],
        stack: Vec<Vec<u8>>,
        context: Option<&'a ScriptContext<'a>>,
    ) -> Self {
        Self {
            script,
            pos: 0,
            stack,
            context,
        }
    }

    /// Run the program to completion and return the final stack.
    pub fn run(mut self) -> Result<Vec<Vec<u8>>, ScriptError> {
        while self.pos < self.script.len() {
            let byte = self.script[self.pos];
            self.pos += 1;
            let op = Opcode::from_byte(byte)?;
            self.execute(op)?;
        }
        Ok(self.stack)
    }

    /// Run the program and return the value left on top of the stack, or
    /// `None` for an empty stack.
    pub fn eval(self) -> Result<Option<Vec<u8>>, ScriptError> {
        Ok(self.run()?.pop())
    }

    fn pop(&mut self, op: &'static str) -> Result<Vec<u8>, ScriptError> {
        self.stack.pop().ok_or(ScriptError::StackUnderflow { op })
    }

    fn push_marker(&mut self, ok: bool) {
        self.stack.push(vec![if ok { OP_TRUE } else { OP_FALSE }]);
    }

    fn execute(&mut self, op: Opcode) -> Result<(), ScriptError> {
        match op {
            Opcode::Push(n) => {
                let end = self.pos + n as usize;
                if end > self.script.len() {
                    return Err(ScriptError::TruncatedPush);
                }
                self.stack.push(self.script[self.pos..end].to_vec());
                self.pos = end;
            }
            Opcode::Dup => {
                let top = self
                    .stack
                    .last()
                    .cloned()
                    .ok_or(ScriptError::StackUnderflow { op: "OP_DUP" })?;
                self.stack.push(top);
            }
            Opcode::Sha256 => {
                let value = self.pop("OP_SHA256")?;
                self.stack.push(sha256(&value).to_vec());
            }
            Opcode::Hash160 => {
                let value = self.pop("OP_HASH160")?;
                self.stack.push(hash160(&value).to_vec());
            }
            Opcode::Equal => {
                let a = self.pop("OP_EQUAL")?;
                let b = self.pop("OP_EQUAL")?;
                self.push_marker(a == b);
            }
            Opcode::Verify => self.verify()?,
            Opcode::EqualVerify => {
                self.execute(Opcode::Equal)?;
                self.verify()?;
            }
            Opcode::Add => {
                let rhs = self.pop_int32("OP_ADD")?;
                let lhs = self.pop_int32("OP_ADD")?;
                let sum = lhs.wrapping_add(rhs);
                self.stack.push(sum.to_le_bytes().to_vec());
            }
            Opcode::CodeSeparator => {}
            Opcode::CheckSig => self.check_sig()?,
            Opcode::CheckSigVerify => {
                self.check_sig()?;
                self.verify()?;
            }
        }
        Ok(())
    }

    fn verify(&mut self) -> Result<(), ScriptError> {
        let value = self.pop("OP_VERIFY")?;
        if value.first() != Some(&OP_TRUE) {
            return Err(ScriptError::VerifyFailed);
        }
        Ok(())
    }

    fn pop_int32(&mut self, op: &'static str) -> Result<i32, ScriptError> {
        let value = self.pop(op)?;
        let bytes: [u8; 4] = value
            .as_slice()
            .try_into()
            .map_err(|_| ScriptError::OperandSize { got: value.len() })?;
        Ok(i32::from_le_bytes(bytes))
    }

    fn check_sig(&mut self) -> Result<(), ScriptError> {
        let pub_key = self.pop("OP_CHECKSIG")?;
        let signature = self.pop("OP_CHECKSIG")?;

        if !SIGNATURE_LENGTHS.contains(&signature.len()) {
            return Err(ScriptError::BadSignatureLength(signature.len()));
        }
        let context = self.context.ok_or(ScriptError::MissingContext)?;

        let hash_type = signature[signature.len() - 1];
        let der = &signature[..signature.len() - 1];

        let digest = sighash::signature_hash(
            context.previous_transaction,
            context.transaction,
            context.input_index,
            hash_type,
        )?;

        // A malformed signature or public key is a failed check, not an
        // evaluation error.
        let ok = match (Signature::from_der(der), PublicKey::from_slice(&pub_key)) {
            (Ok(sig), Ok(key)) => {
                let secp = Secp256k1::verification_only();
                let message = Message::from_digest(digest.0);
                secp.verify_ecdsa(&message, &sig, &key).is_ok()
            }
            _ => false,
        };
        self.push_marker(ok);
        Ok(())
    }
}

/// Evaluate a standalone script.
pub fn eval(script: &[u8], context: Option<&ScriptContext>) -> Result<Option<Vec<u8>>, ScriptError> {
    ScriptVm::new(script, context).eval()
}

/// The code after the last OP_CODESEPARATOR, or the whole script when none is
/// present. Signature hashing commits to this slice of the locking script.
/// Bytes outside the opcode table are skipped one at a time so that free-form
/// locking data cannot derail the scan.
pub fn last_code_block(script: &[u8]) -> &[u8] {
    let mut start = 0;
    let mut pos = 0;
    while pos < script.len() {
        let byte = script[pos];
        pos += 1;
        match Opcode::from_byte(byte) {
            Ok(Opcode::Push(n)) => pos = (pos + n as usize).min(script.len()),
            Ok(Opcode::CodeSeparator) => start = pos,
            _ => {}
        }
    }
    &script[start..]
}

/// The canonical pay-to-pubkey-hash locking script:
/// `OP_DUP OP_HASH160 <push 20> <hash> OP_EQUALVERIFY OP_CHECKSIG`.
pub fn p2pkh_script(pub_key_hash: &[u8; 20]) -> Vec<u8> {
    ScriptBuilder::new()
        .push_op(Opcode::Dup)
        .push_op(Opcode::Hash160)
        .push_data(pub_key_hash)
        .push_op(Opcode::EqualVerify)
        .push_op(Opcode::CheckSig)
        .build()
}

/// Incremental script assembly.
#[derive(Debug, Default)]
pub struct ScriptBuilder {
    bytes: Vec<u8>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push 1..=75 literal bytes.
    pub fn push_data(mut self, data: &[u8]) -> Self {
        debug_assert!((1..=0x4b).contains(&data.len()));
        self.bytes.push(data.len() as u8);
        self.bytes.extend_from_slice(data);
        self
    }

    pub fn push_op(mut self, op: Opcode) -> Self {
        self.bytes.push(op.to_byte());
        self
    }

    pub fn push_int32(self, value: i32) -> Self {
        self.push_data(&value.to_le_bytes())
    }

    pub fn build(self) -> Vec<u8> {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_equal() {
        let script = ScriptBuilder::new()
            .push_data(b"abc")
            .push_data(b"abc")
            .push_op(Opcode::Equal)
            .build();
        assert_eq!(eval(&script, None).unwrap(), Some(vec![OP_TRUE]));

        let script = ScriptBuilder::new()
            .push_data(b"abc")
            .push_data(b"abd")
            .push_op(Opcode::Equal)
            .build();
        assert_eq!(eval(&script, None).unwrap(), Some(vec![OP_FALSE]));
    }

    #[test]
    fn pushed_value_ends_on_top() {
        let script = ScriptBuilder::new().push_data(&[5]).build();
        assert_eq!(eval(&script, None).unwrap(), Some(vec![5]));
    }

    #[test]
    fn empty_script_leaves_nothing() {
        assert_eq!(eval(&[], None).unwrap(), None);
    }

    #[test]
    fn add_is_little_endian_int32() {
        let script = ScriptBuilder::new()
            .push_int32(5)
            .push_int32(20)
            .push_op(Opcode::Add)
            .build();
        assert_eq!(
            eval(&script, None).unwrap(),
            Some(25i32.to_le_bytes().to_vec())
        );

        let script = ScriptBuilder::new()
            .push_int32(300)
            .push_int32(-42)
            .push_op(Opcode::Add)
            .build();
        assert_eq!(
            eval(&script, None).unwrap(),
            Some(258i32.to_le_bytes().to_vec())
        );
    }

    #[test]
    fn add_rejects_wrong_operand_width() {
        let script = ScriptBuilder::new()
            .push_data(&[1, 0, 0, 0])
            .push_data(&[1, 0])
            .push_op(Opcode::Add)
            .build();
        assert_eq!(
            eval(&script, None),
            Err(ScriptError::OperandSize { got: 2 })
        );
    }

    #[test]
    fn verify_consumes_true_marker() {
        let script = ScriptBuilder::new()
            .push_data(&[OP_TRUE])
            .push_op(Opcode::Verify)
            .build();
        assert_eq!(eval(&script, None).unwrap(), None);

        let script = ScriptBuilder::new()
            .push_data(&[OP_FALSE])
            .push_op(Opcode::Verify)
            .build();
        assert_eq!(eval(&script, None), Err(ScriptError::VerifyFailed));
    }

    #[test]
    fn hash160_of_pushed_value() {
        let script = ScriptBuilder::new()
            .push_data(b"payload")
            .push_op(Opcode::Hash160)
            .build();
        assert_eq!(
            eval(&script, None).unwrap(),
            Some(hash160(b"payload").to_vec())
        );
    }

    #[test]
    fn unknown_opcode_aborts() {
        assert_eq!(eval(&[0xff], None), Err(ScriptError::UnknownOpcode(0xff)));
    }

    #[test]
    fn truncated_push_aborts() {
        assert_eq!(eval(&[0x04, 1, 2], None), Err(ScriptError::TruncatedPush));
    }

    #[test]
    fn stack_underflow_names_opcode() {
        assert_eq!(
            eval(&[Opcode::Dup.to_byte()], None),
            Err(ScriptError::StackUnderflow { op: "OP_DUP" })
        );
    }

    #[test]
    fn checksig_without_context_is_an_error() {
        let script = ScriptBuilder::new()
            .push_data(&[0u8; 71])
            .push_data(&[2u8; 33])
            .push_op(Opcode::CheckSig)
            .build();
        assert_eq!(eval(&script, None), Err(ScriptError::MissingContext));
    }

    #[test]
    fn checksig_rejects_bad_signature_length() {
        let script = ScriptBuilder::new()
            .push_data(&[0u8; 10])
            .push_data(&[2u8; 33])
            .push_op(Opcode::CheckSig)
            .build();
        assert_eq!(eval(&script, None), Err(ScriptError::BadSignatureLength(10)));
    }

    #[test]
    fn p2pkh_script_shape() {
        let script = p2pkh_script(&[0x11; 20]);
        assert_eq!(script.len(), 25);
        assert_eq!(script[0], Opcode::Dup.to_byte());
        assert_eq!(script[1], Opcode::Hash160.to_byte());
        assert_eq!(script[2], 20);
        assert_eq!(script[23], Opcode::EqualVerify.to_byte());
        assert_eq!(script[24], Opcode::CheckSig.to_byte());
    }

    #[test]
    fn last_code_block_splits_on_final_separator() {
        let script = ScriptBuilder::new()
            .push_data(b"ab")
            .push_op(Opcode::CodeSeparator)
            .push_data(b"cd")
            .push_op(Opcode::CodeSeparator)
            .push_op(Opcode::Dup)
            .build();
        assert_eq!(last_code_block(&script), &[Opcode::Dup.to_byte()]);

        let plain = ScriptBuilder::new().push_data(b"xy").build();
        assert_eq!(last_code_block(&plain), plain.as_slice());
    }

    #[test]
    fn last_code_block_skips_separator_inside_push() {
        // 0xab as push payload must not count as a separator
        let script = ScriptBuilder::new()
            .push_data(&[0xab, 0xab])
            .push_op(Opcode::Dup)
            .build();
        assert_eq!(last_code_block(&script), script.as_slice());
    }
}
