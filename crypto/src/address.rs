//! Account address encoding and validation.
//!
//! Address format: `<prefix>` + base32(public_key, 52 chars) + base32(checksum, 8 chars)
//!
//! Checksum: first 5 bytes of Blake2b-256(public_key).
//! Base32 alphabet: `13456789abcdefghijkmnopqrstuwxyz` (avoids ambiguous chars).

use airdrop_types::{AccountAddress, AirdropError, PublicKey};

/// Prefix used when the deployment does not configure one.
pub const DEFAULT_ADDRESS_PREFIX: &str = "drop_";

const BASE32_ALPHABET: &[u8; 32] = b"13456789abcdefghijkmnopqrstuwxyz";

/// ASCII byte → 5-bit value (0xFF = invalid).
const BASE32_DECODE: [u8; 128] = {
    let mut table = [0xFFu8; 128];
    let mut i = 0;
    while i < 32 {
        table[BASE32_ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
};

/// 256 bits → ceil(256/5) = 52 characters.
const PUBKEY_CHARS: usize = 52;
/// 40 bits → 8 characters.
const CHECKSUM_CHARS: usize = 8;
const CHECKSUM_BYTES: usize = 5;

fn encode_base32(bytes: &[u8]) -> String {
    let mut result = String::with_capacity((bytes.len() * 8).div_ceil(5));
    let mut buffer: u64 = 0;
    let mut bits = 0;

    for &byte in bytes {
        buffer = (buffer << 8) | byte as u64;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            result.push(BASE32_ALPHABET[((buffer >> bits) & 0x1F) as usize] as char);
        }
    }
    if bits > 0 {
        result.push(BASE32_ALPHABET[((buffer << (5 - bits)) & 0x1F) as usize] as char);
    }
    result
}

fn decode_base32_fixed<const N: usize>(s: &str) -> Option<[u8; N]> {
    let mut buffer: u64 = 0;
    let mut bits = 0;
    let mut result = [0u8; N];
    let mut pos = 0;

    for c in s.bytes() {
        let val = *BASE32_DECODE.get(c as usize)?;
        if val == 0xFF {
            return None;
        }
        buffer = (buffer << 5) | val as u64;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            if pos < N {
                result[pos] = (buffer >> bits) as u8;
                pos += 1;
            }
        }
    }

    (pos == N).then_some(result)
}

/// Encodes public keys into addresses and decodes addresses back into their
/// 32-byte payload for one address prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddressCodec {
    prefix: String,
}

impl Default for AddressCodec {
    fn default() -> Self {
        Self::new(DEFAULT_ADDRESS_PREFIX)
    }
}

impl AddressCodec {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Total length of a well-formed address.
    pub fn address_len(&self) -> usize {
        self.prefix.len() + PUBKEY_CHARS + CHECKSUM_CHARS
    }

    /// Derive the address of a public key.
    pub fn encode(&self, public_key: &PublicKey) -> AccountAddress {
        let checksum = crate::blake2b_256(public_key.as_bytes());
        AccountAddress::new(format!(
            "{}{}{}",
            self.prefix,
            encode_base32(public_key.as_bytes()),
            encode_base32(&checksum[..CHECKSUM_BYTES])
        ))
    }

    /// Extract the public-key payload, checking prefix, length, alphabet and checksum.
    pub fn decode(&self, address: &str) -> Result<[u8; 32], AirdropError> {
        let encoded = address.strip_prefix(self.prefix.as_str()).ok_or_else(|| {
            AirdropError::InvalidAddress(format!("expected prefix '{}'", self.prefix))
        })?;
        if encoded.len() != PUBKEY_CHARS + CHECKSUM_CHARS {
            return Err(AirdropError::InvalidAddress(format!(
                "expected {} characters after prefix, got {}",
                PUBKEY_CHARS + CHECKSUM_CHARS,
                encoded.len()
            )));
        }
        let (key_part, checksum_part) = encoded.split_at(PUBKEY_CHARS);

        let payload: [u8; 32] = decode_base32_fixed(key_part)
            .ok_or_else(|| AirdropError::InvalidAddress("invalid base32 payload".into()))?;
        let checksum: [u8; CHECKSUM_BYTES] = decode_base32_fixed(checksum_part)
            .ok_or_else(|| AirdropError::InvalidAddress("invalid base32 checksum".into()))?;

        if checksum[..] != crate::blake2b_256(&payload)[..CHECKSUM_BYTES] {
            return Err(AirdropError::InvalidAddress("checksum mismatch".into()));
        }
        Ok(payload)
    }

    pub fn validate(&self, address: &str) -> bool {
        self.decode(address).is_ok()
    }
}
