//! Canonical relayed-transaction digest.
//!
//! Pre-image layout (raw concatenation, no separators):
//! `"rlx:" ‖ from ‖ to ‖ call_data ‖ fee ‖ gas_price ‖ gas_limit ‖ nonce ‖ hub ‖ relay`
//! with addresses as 20 bytes and integers as 32-byte big-endian words.
//! The hub contract rebuilds the same bytes, so the order and widths are fixed.

use alloy_primitives::{keccak256, Address, B256, U256};

use crate::{strip_hex_prefix, CodecError};

/// Domain tag prepended to every relayed transaction pre-image.
pub const RELAY_PREFIX: &[u8] = b"rlx:";

const ADDRESS_LEN: usize = 20;
const WORD_LEN: usize = 32;

/// Fields covered by the relay signature. All are required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDigestInput {
    pub from: Address,
    pub to: Address,
    pub encoded_call_data: Vec<u8>,
    pub fee: U256,
    pub gas_price: U256,
    pub gas_limit: U256,
    pub nonce: U256,
    pub hub_address: Address,
    pub relay_address: Address,
}

/// Parse a decimal or `0x`-hex quantity into a uint256.
///
/// Negative, empty, non-numeric and values of 2^256 or more are rejected.
pub fn parse_uint256(value: &str) -> Result<U256, CodecError> {
    let trimmed = value.trim();
    if trimmed.starts_with('-') {
        return Err(CodecError::Encoding(format!(
            "negative value {trimmed} has no uint256 encoding"
        )));
    }
    let is_hex = trimmed.starts_with("0x") || trimmed.starts_with("0X");
    let digits = strip_hex_prefix(trimmed);
    if digits.is_empty() {
        return Err(CodecError::Encoding(format!("'{value}' is not a number")));
    }
    let parsed = if is_hex {
        U256::from_str_radix(digits, 16)
    } else {
        U256::from_str_radix(digits, 10)
    };
    parsed.map_err(|e| CodecError::Encoding(format!("'{trimmed}' is not a uint256: {e}")))
}

/// Raw pre-image bytes hashed by [`transaction_digest`].
pub fn digest_preimage(input: &TransactionDigestInput) -> Vec<u8> {
    let mut out = Vec::with_capacity(
        RELAY_PREFIX.len() + 4 * ADDRESS_LEN + 4 * WORD_LEN + input.encoded_call_data.len(),
    );
    out.extend_from_slice(RELAY_PREFIX);
    out.extend_from_slice(input.from.as_slice());
    out.extend_from_slice(input.to.as_slice());
    out.extend_from_slice(&input.encoded_call_data);
    out.extend_from_slice(&input.fee.to_be_bytes::<WORD_LEN>());
    out.extend_from_slice(&input.gas_price.to_be_bytes::<WORD_LEN>());
    out.extend_from_slice(&input.gas_limit.to_be_bytes::<WORD_LEN>());
    out.extend_from_slice(&input.nonce.to_be_bytes::<WORD_LEN>());
    out.extend_from_slice(input.hub_address.as_slice());
    out.extend_from_slice(input.relay_address.as_slice());
    out
}

/// Keccak-256 of the canonical pre-image.
pub fn transaction_digest(input: &TransactionDigestInput) -> B256 {
    keccak256(digest_preimage(input))
}
