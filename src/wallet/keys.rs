// Wallet key material and pay-to-pubkey-hash signing

use rand::rngs::OsRng;
use secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};

use crate::core::address::encode_address;
use crate::core::hash::hash160;
use crate::core::script::ScriptBuilder;
use crate::core::sighash::{self, SIGHASH_ALL};
use crate::core::transaction::Transaction;
use crate::core::Hash256;
use crate::error::{ChainError, Result};

/// A secp256k1 keypair. The secret key never leaves this struct.
pub struct Wallet {
    secp: Secp256k1<All>,
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl Wallet {
    /// Generate a fresh random keypair.
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secp,
            secret_key,
            public_key,
        }
    }

    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secp,
            secret_key,
            public_key,
        }
    }

    /// Load a wallet from a hex-encoded 32-byte secret key, as carried in
    /// miner configuration.
    pub fn from_hex(secret_hex: &str) -> Result<Self> {
        let bytes = hex::decode(secret_hex)
            .map_err(|e| ChainError::SignatureInvalid(format!("bad secret key hex: {}", e)))?;
        let secret_key = SecretKey::from_slice(&bytes)
            .map_err(|e| ChainError::SignatureInvalid(format!("bad secret key: {}", e)))?;
        Ok(Self::from_secret_key(secret_key))
    }

    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    /// hash160 of the compressed public key; the identity locking scripts
    /// bind to.
    pub fn pub_key_hash(&self) -> [u8; 20] {
        hash160(&self.public_key.serialize())
    }

    /// Base58Check form of the public key hash.
    pub fn coin_address(&self) -> String {
        encode_address(&self.pub_key_hash())
    }

    /// DER-encoded ECDSA signature over a 32-byte digest.
    pub fn sign_digest(&self, digest: Hash256) -> Vec<u8> {
        let message = Message::from_digest(digest.0);
        self.secp
            .sign_ecdsa(&message, &self.secret_key)
            .serialize_der()
            .to_vec()
    }

    /// Fill input `input_index` of `transaction` with the unlocking script
    /// for a pay-to-pubkey-hash output of `previous`: two pushes,
    /// `signature||hashtype` and the compressed public key.
    ///
    /// All inputs and outputs must be in place before calling this with
    /// `SIGHASH_ALL`, since the digest commits to them.
    pub fn unlock_pay_to_pub_key_hash(
        &self,
        previous: &Transaction,
        transaction: &mut Transaction,
        input_index: usize,
        hash_type: u8,
    ) -> Result<()> {
        if transaction.is_built() {
            return Err(ChainError::TransactionBuilt);
        }
        let digest = sighash::signature_hash(previous, transaction, input_index, hash_type)?;

        let mut signature = self.sign_digest(digest);
        signature.push(hash_type);

        let script_sig = ScriptBuilder::new()
            .push_data(&signature)
            .push_data(&self.public_key.serialize())
            .build();
        transaction.set_input_script_sig(input_index, script_sig)
    }

    /// Shorthand for the common case.
    pub fn sign_input(
        &self,
        previous: &Transaction,
        transaction: &mut Transaction,
        input_index: usize,
    ) -> Result<()> {
        self.unlock_pay_to_pub_key_hash(previous, transaction, input_index, SIGHASH_ALL)
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.coin_address())
            .finish_non_exhaustive()
    }
}
