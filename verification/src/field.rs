//! BN254 scalar-field elements as they appear in public inputs.
//!
//! Circuits emit field elements as decimal strings; `0x` hex is accepted too.
//! Values at or above the field order are not canonical and are refused.

use ark_bn254::Fr;
use ark_ff::{BigInt, PrimeField};

fn accumulate(digits: &str, radix: u32) -> Option<BigInt<4>> {
    if digits.is_empty() {
        return None;
    }
    let mut limbs = [0u64; 4];
    for c in digits.chars() {
        let mut carry = c.to_digit(radix)? as u128;
        for limb in limbs.iter_mut() {
            let wide = (*limb as u128) * radix as u128 + carry;
            *limb = wide as u64;
            carry = wide >> 64;
        }
        if carry != 0 {
            return None;
        }
    }
    Some(BigInt::new(limbs))
}

/// Parse a decimal or `0x` hex input into a canonical field element.
pub fn parse_field_element(raw: &str) -> Option<Fr> {
    let raw = raw.trim();
    let value = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex_digits) => accumulate(hex_digits, 16)?,
        None => accumulate(raw, 10)?,
    };
    Fr::from_bigint(value)
}

/// Big-endian bytes reduced modulo the field order.
pub fn reduce_bytes(bytes: &[u8]) -> Fr {
    Fr::from_be_bytes_mod_order(bytes)
}

/// Canonical decimal form, as snarkjs prints public signals.
pub fn to_decimal(value: Fr) -> String {
    value.into_bigint().to_string()
}
