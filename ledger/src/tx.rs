//! Transfer transactions: build, sign, encode.
//!
//! The wire form is bincode of [`SignedTx`]. The signature covers bincode of
//! [`SignDoc`], which binds the body to the chain, the account number and the
//! sequence so a signed transfer cannot be replayed.

use airdrop_crypto::{hash_transaction, sign_message, verify_signature, AddressCodec};
use airdrop_types::{AccountAddress, Coin, KeyPair, PublicKey, Signature, TxHash};
use serde::{Deserialize, Serialize};

use crate::{AccountInfo, LedgerError};

/// One bank transfer from the service account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferMsg {
    pub from: AccountAddress,
    pub to: AccountAddress,
    pub amount: Vec<Coin>,
}

/// Fees are always zero; only the gas limit varies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    pub amount: Vec<Coin>,
    pub gas_limit: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedTx {
    pub msg: TransferMsg,
    pub memo: String,
    pub fee: Fee,
}

impl UnsignedTx {
    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.fee.gas_limit = gas_limit;
        self
    }
}

/// The bytes the sender signs.
#[derive(Serialize)]
pub struct SignDoc<'a> {
    pub body: &'a UnsignedTx,
    pub chain_id: &'a str,
    pub account_number: u64,
    pub sequence: u64,
}

impl SignDoc<'_> {
    pub fn to_bytes(&self) -> Result<Vec<u8>, LedgerError> {
        Ok(bincode::serialize(self)?)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTx {
    pub body: UnsignedTx,
    pub account_number: u64,
    pub sequence: u64,
    pub public_key: PublicKey,
    pub signature: Signature,
}

impl SignedTx {
    pub fn encode(&self) -> Result<Vec<u8>, LedgerError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, LedgerError> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// Hash of the encoded transaction, as the ledger reports it.
    pub fn hash(&self) -> Result<TxHash, LedgerError> {
        Ok(hash_transaction(&self.encode()?))
    }

    /// Check the signature against `chain_id`.
    pub fn verify(&self, chain_id: &str) -> Result<bool, LedgerError> {
        let doc = SignDoc {
            body: &self.body,
            chain_id,
            account_number: self.account_number,
            sequence: self.sequence,
        };
        Ok(verify_signature(&doc.to_bytes()?, &self.signature, &self.public_key))
    }
}

/// Builds and signs transfers from the service account. Immutable; share via `Arc`.
pub struct TxBuilder {
    chain_id: String,
    sender: AccountAddress,
    keypair: KeyPair,
    memo: String,
}

impl TxBuilder {
    pub fn new(chain_id: impl Into<String>, keypair: KeyPair, codec: &AddressCodec) -> Self {
        let sender = codec.encode(&keypair.public);
        Self {
            chain_id: chain_id.into(),
            sender,
            keypair,
            memo: String::new(),
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }

    pub fn sender(&self) -> &AccountAddress {
        &self.sender
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    /// A zero-fee transfer of `amount` to `to`.
    pub fn transfer(&self, to: &AccountAddress, amount: &Coin, gas_limit: u64) -> UnsignedTx {
        UnsignedTx {
            msg: TransferMsg {
                from: self.sender.clone(),
                to: to.clone(),
                amount: vec![amount.clone()],
            },
            memo: self.memo.clone(),
            fee: Fee {
                amount: Vec::new(),
                gas_limit,
            },
        }
    }

    pub fn sign(&self, body: UnsignedTx, account: AccountInfo) -> Result<SignedTx, LedgerError> {
        let doc = SignDoc {
            body: &body,
            chain_id: &self.chain_id,
            account_number: account.account_number,
            sequence: account.sequence,
        };
        let signature = sign_message(&doc.to_bytes()?, &self.keypair.private);
        Ok(SignedTx {
            body,
            account_number: account.account_number,
            sequence: account.sequence,
            public_key: self.keypair.public.clone(),
            signature,
        })
    }

    /// A transaction for gas estimation: real sequence, empty signature.
    pub fn for_simulation(&self, body: UnsignedTx, account: AccountInfo) -> SignedTx {
        SignedTx {
            body,
            account_number: account.account_number,
            sequence: account.sequence,
            public_key: self.keypair.public.clone(),
            signature: Signature([0u8; 64]),
        }
    }
}
