//! Proof-to-address binding.
//!
//! The binding input is a field element, so both sides are compared as
//! integers: `"0x0a"` and `"10"` carry the same binding.

use airdrop_crypto::{blake2b_256, AddressCodec};
use ark_bn254::Fr;
use serde::{Deserialize, Serialize};

use crate::field::{parse_field_element, reduce_bytes, to_decimal};
use crate::Rejection;

/// How the circuit commits to the destination address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressBindingMode {
    /// Blake2b-256 over the 32-byte address payload, reduced modulo the
    /// BN254 scalar field order.
    #[default]
    Blake2b,
    /// The address payload read as a big-endian integer, reduced the same way.
    #[serde(alias = "hex")]
    Payload,
}

impl AddressBindingMode {
    fn expected_field(&self, codec: &AddressCodec, address: &str) -> Result<Fr, Rejection> {
        let payload = codec
            .decode(address)
            .map_err(|e| Rejection::InvalidAddress(e.to_string()))?;
        Ok(match self {
            AddressBindingMode::Blake2b => reduce_bytes(&blake2b_256(&payload)),
            AddressBindingMode::Payload => reduce_bytes(&payload),
        })
    }

    /// The value the binding input must carry for `address`, in decimal.
    pub fn expected(&self, codec: &AddressCodec, address: &str) -> Result<String, Rejection> {
        self.expected_field(codec, address).map(to_decimal)
    }

    /// Compare an input against the expected binding. Inputs that are not a
    /// canonical field element never match.
    pub fn matches(&self, codec: &AddressCodec, address: &str, input: &str) -> Result<bool, Rejection> {
        let expected = self.expected_field(codec, address)?;
        Ok(parse_field_element(input) == Some(expected))
    }
}
