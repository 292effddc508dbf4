// Signature-hash digest construction
//
// The digest committed to by a signature is the double SHA-256 of a
// transformed copy of the spending transaction plus the 4-byte hash type.
// Which parts of the transaction survive the transform is selected by the
// hash type byte carried at the end of the signature push.

use crate::core::hash::double_sha256;
use crate::core::script::last_code_block;
use crate::core::transaction::{Transaction, EMPTY_SCRIPT};
use crate::core::Hash256;
use crate::error::ScriptError;

/// Commit to all inputs and all outputs.
pub const SIGHASH_ALL: u8 = 0x01;
/// Commit to no outputs; sequence numbers are zeroed.
pub const SIGHASH_NONE: u8 = 0x02;
/// Commit only to the output paired with the signing input.
pub const SIGHASH_SINGLE: u8 = 0x03;
/// Modifier bit: commit only to the signing input.
pub const SIGHASH_ANYONECANPAY: u8 = 0x80;

const BASE_MASK: u8 = 0x1f;

/// Compute the digest signed for input `input_index` of `transaction`, which
/// spends an output of `previous`.
pub fn signature_hash(
    previous: &Transaction,
    transaction: &Transaction,
    input_index: usize,
    hash_type: u8,
) -> Result<Hash256, ScriptError> {
    if input_index >= transaction.inputs().len() {
        return Err(ScriptError::InputOutOfRange(input_index));
    }
    let output_index = transaction.inputs()[input_index].output_index;
    let previous_output = previous
        .outputs()
        .get(output_index as usize)
        .ok_or(ScriptError::MissingPreviousOutput(output_index))?;

    // a fresh clone carries no cached buffer, so field edits are safe
    let mut clone = transaction.clone();

    for input in &mut clone.inputs {
        input.script_sig = EMPTY_SCRIPT.to_vec();
    }
    clone.inputs[input_index].script_sig =
        last_code_block(&previous_output.script_pubkey).to_vec();

    match hash_type & BASE_MASK {
        SIGHASH_NONE => {
            clone.outputs.clear();
            // the signing input's own sequence is zeroed too; kept as-is
            for input in &mut clone.inputs {
                input.sequence = 0;
            }
        }
        SIGHASH_SINGLE => {
            let input_count = clone.inputs.len();
            clone.outputs.truncate(input_count);
            for (index, output) in clone.outputs.iter_mut().enumerate() {
                if index != input_index {
                    output.amount = 0;
                    output.script_pubkey = EMPTY_SCRIPT.to_vec();
                }
            }
            for (index, input) in clone.inputs.iter_mut().enumerate() {
                if index != input_index {
                    input.sequence = 0;
                }
            }
        }
        _ => {}
    }

    if hash_type & SIGHASH_ANYONECANPAY != 0 {
        let own = clone.inputs.swap_remove(input_index);
        clone.inputs = vec![own];
    }

    let mut preimage = clone.buffer().to_vec();
    preimage.extend_from_slice(&(hash_type as u32).to_le_bytes());
    Ok(double_sha256(&preimage))
}
