// Balance computation by full chain replay
//
// No spent-output index is maintained. Every query walks the chain from
// genesis, collecting outputs locked to the queried key hash and cancelling
// any collected output that a later input references by outpoint.

use crate::chain::BlockChain;
use crate::core::block::Block;
use crate::core::script::p2pkh_script;
use crate::core::transaction::{Output, Transaction};

/// One unspent output, borrowed from the chain.
pub struct Utxo<'a> {
    pub block: &'a Block,
    pub transaction: &'a Transaction,
    pub output_index: u32,
    pub amount: u64,
}

/// The result of a balance query.
pub struct Balance<'a> {
    pub entries: Vec<Utxo<'a>>,
    pub total: u64,
}

/// Whether `output` is locked with the canonical pay-to-pubkey-hash script
/// for `pub_key_hash`. Exact byte equality; non-standard scripts never match.
pub fn is_spendable_by(output: &Output, pub_key_hash: &[u8; 20]) -> bool {
    output.script_pubkey == p2pkh_script(pub_key_hash)
}

/// Collect the unspent outputs payable to `pub_key_hash`.
pub fn compute_utxo<'a>(chain: &'a BlockChain, pub_key_hash: &[u8; 20]) -> Balance<'a> {
    let wanted = p2pkh_script(pub_key_hash);
    let mut entries: Vec<Utxo<'a>> = Vec::new();

    for block in chain.blocks() {
        for transaction in block.transactions() {
            // inputs first, so a transaction can spend and re-lock in one step
            for input in transaction.inputs() {
                entries.retain(|entry| {
                    entry.transaction.hash() != input.prev_tx_hash
                        || entry.output_index != input.output_index
                });
            }
            for (index, output) in transaction.outputs().iter().enumerate() {
                if output.script_pubkey == wanted {
                    entries.push(Utxo {
                        block,
                        transaction,
                        output_index: index as u32,
                        amount: output.amount,
                    });
                }
            }
        }
    }

    let total = entries.iter().map(|entry| entry.amount).sum();
    Balance { entries, total }
}
