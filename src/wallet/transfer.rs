// Building signed pay-to-pubkey-hash transfers

use crate::chain::utxo::compute_utxo;
use crate::chain::BlockChain;
use crate::core::address::decode_address;
use crate::core::script::{p2pkh_script, Opcode};
use crate::core::transaction::Transaction;
use crate::error::{ChainError, Result};
use crate::wallet::keys::Wallet;

/// If `script` is a canonical pay-to-pubkey-hash lock, return the key hash it
/// binds to.
pub fn extract_pub_key_hash(script: &[u8]) -> Option<[u8; 20]> {
    if script.len() != 25
        || script[0] != Opcode::Dup.to_byte()
        || script[1] != Opcode::Hash160.to_byte()
        || script[2] != 20
        || script[23] != Opcode::EqualVerify.to_byte()
        || script[24] != Opcode::CheckSig.to_byte()
    {
        return None;
    }
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&script[3..23]);
    Some(hash)
}

/// Build and sign a transaction moving `amount` from `from`'s unspent
/// outputs to `to_pub_key_hash`. Output 0 pays the recipient; when the
/// selected inputs overshoot, output 1 returns the change to the sender.
pub fn transfer_money_from_to(
    chain: &BlockChain,
    from: &Wallet,
    to_pub_key_hash: &[u8; 20],
    amount: u64,
) -> Result<Transaction> {
    let mut balance = compute_utxo(chain, &from.pub_key_hash());
    if balance.total < amount {
        return Err(ChainError::InsufficientFunds {
            available: balance.total,
            required: amount,
        });
    }

    let mut transaction = Transaction::new();
    let mut selected = Vec::new();
    let mut selected_total: u64 = 0;

    // take outputs from the newest end until the amount is covered
    while selected_total < amount {
        let entry = balance
            .entries
            .pop()
            .ok_or(ChainError::InsufficientFunds {
                available: balance.total,
                required: amount,
            })?;
        selected_total += entry.amount;
        transaction.add_input(entry.transaction.hash(), entry.output_index)?;
        selected.push(entry);
    }

    transaction.add_output_locked(amount, p2pkh_script(to_pub_key_hash))?;
    let change = selected_total - amount;
    if change > 0 {
        transaction.add_output_locked(change, p2pkh_script(&from.pub_key_hash()))?;
    }

    for (input_index, entry) in selected.iter().enumerate() {
        from.sign_input(entry.transaction, &mut transaction, input_index)?;
    }
    Ok(transaction)
}

/// [`transfer_money_from_to`] with a Base58Check recipient address.
pub fn transfer_to_address(
    chain: &BlockChain,
    from: &Wallet,
    to_address: &str,
    amount: u64,
) -> Result<Transaction> {
    let to_pub_key_hash = decode_address(to_address)?;
    transfer_money_from_to(chain, from, &to_pub_key_hash, amount)
}
