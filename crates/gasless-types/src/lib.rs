//! Shared types and pure-logic utilities for the gasless relay protocol.
//! No I/O and no async: the byte layouts here must match what the relay hub
//! contract recomputes on-chain.

mod digest;
mod error;
mod signature;

pub use alloy_primitives::{Address, B256, U256};
pub use digest::{
    digest_preimage, parse_uint256, transaction_digest, TransactionDigestInput, RELAY_PREFIX,
};
pub use error::CodecError;
pub use signature::{
    address_of, personal_message_hash, recover_prehash, recover_signer, recover_signer_hex,
    sanitize_rpc_signature, sign_digest, signing_key_from_bytes, DigestConvention, Signature,
    PERSONAL_MESSAGE_PREFIX,
};

/// Strip an optional `0x`/`0X` prefix from a hex string.
pub fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

/// Decode a hex string with or without the `0x` prefix.
pub fn decode_hex(value: &str) -> Result<Vec<u8>, CodecError> {
    hex::decode(strip_hex_prefix(value))
        .map_err(|e| CodecError::InvalidInput(format!("invalid hex '{value}': {e}")))
}
