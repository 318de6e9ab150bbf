//! secp256k1 signatures over relay digests.
//!
//! Signing back-ends disagree on output shape: some JSON-RPC nodes drop the
//! leading zero byte of `r` or `s`, yielding 64 (or 63) bytes instead of 65.
//! [`sanitize_rpc_signature`] re-pads and only returns a candidate after it
//! recovers to the expected signer.

use alloy_primitives::{keccak256, Address, B256};
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;

use crate::{strip_hex_prefix, CodecError};

/// Prefix applied by `personal_sign` / `eth_sign` to a 32-byte message.
pub const PERSONAL_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

const SIGNATURE_LEN: usize = 65;
const WELL_FORMED_HEX_LEN: usize = SIGNATURE_LEN * 2;
/// One of `r`/`s` came back as 31 bytes.
const SINGLE_SHORT_HEX_LEN: usize = WELL_FORMED_HEX_LEN - 2;
/// Both `r` and `s` came back as 31 bytes.
const BOTH_SHORT_HEX_LEN: usize = WELL_FORMED_HEX_LEN - 4;
const SHORT_COMPONENT_HEX_LEN: usize = 62;
const COMPONENT_HEX_LEN: usize = 64;

/// Which hash a raw key signs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestConvention {
    /// Sign the 32-byte digest as-is.
    Raw,
    /// Sign `keccak256(PERSONAL_MESSAGE_PREFIX ‖ digest)`.
    Personal,
}

/// 65-byte `r ‖ s ‖ v` signature.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub v: u8,
}

impl Signature {
    pub fn from_parts(r: [u8; 32], s: [u8; 32], v: u8) -> Self {
        Self { r, s, v }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() != SIGNATURE_LEN {
            return Err(CodecError::InvalidInput(format!(
                "signature must be {SIGNATURE_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Ok(Self { r, s, v: bytes[64] })
    }

    /// Parse a 65-byte hex signature, with or without `0x`.
    pub fn from_hex(value: &str) -> Result<Self, CodecError> {
        let bytes = hex::decode(strip_hex_prefix(value))
            .map_err(|e| CodecError::InvalidInput(format!("invalid signature hex: {e}")))?;
        Self::from_bytes(&bytes)
    }

    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        let mut out = [0u8; SIGNATURE_LEN];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.v;
        out
    }

    /// `0x` followed by `r ‖ s ‖ v` as 130 lowercase hex characters.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }

    /// Rewrite a raw 0/1 parity byte as 27/28, the form `ecrecover` expects.
    pub fn with_ethereum_parity(self) -> Self {
        match self.v {
            0 | 1 => Self {
                v: self.v + 27,
                ..self
            },
            _ => self,
        }
    }

    /// Accepts both the Ethereum (27/28) and the raw (0/1) parity encoding.
    fn recovery_id(&self) -> Result<RecoveryId, CodecError> {
        let parity = match self.v {
            27 | 28 => self.v - 27,
            0 | 1 => self.v,
            other => {
                return Err(CodecError::InvalidInput(format!(
                    "unsupported recovery byte v={other}"
                )))
            }
        };
        RecoveryId::from_byte(parity)
            .ok_or_else(|| CodecError::InvalidInput(format!("invalid recovery id {parity}")))
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({})", self.to_hex())
    }
}

impl std::str::FromStr for Signature {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// `keccak256("\x19Ethereum Signed Message:\n32" ‖ digest)`.
pub fn personal_message_hash(digest: &B256) -> B256 {
    let mut message = Vec::with_capacity(PERSONAL_MESSAGE_PREFIX.len() + 32);
    message.extend_from_slice(PERSONAL_MESSAGE_PREFIX);
    message.extend_from_slice(digest.as_slice());
    keccak256(message)
}

pub fn signing_key_from_bytes(secret: &[u8]) -> Result<SigningKey, CodecError> {
    SigningKey::from_slice(secret)
        .map_err(|e| CodecError::InvalidInput(format!("invalid secp256k1 secret key: {e}")))
}

/// Ethereum address of a public key: last 20 bytes of keccak256(x ‖ y).
pub fn address_of(key: &VerifyingKey) -> Address {
    let point = key.as_affine().to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash.as_slice()[12..])
}

/// Sign with a raw key. The remote-signer path goes through
/// [`sanitize_rpc_signature`] instead.
pub fn sign_digest(
    key: &SigningKey,
    digest: &B256,
    convention: DigestConvention,
) -> Result<Signature, CodecError> {
    let hash = match convention {
        DigestConvention::Raw => *digest,
        DigestConvention::Personal => personal_message_hash(digest),
    };
    let (signature, recovery_id) = key
        .sign_prehash_recoverable(hash.as_slice())
        .map_err(|e| CodecError::InvalidInput(format!("signing failed: {e}")))?;
    let bytes = signature.to_bytes();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&bytes[..32]);
    s.copy_from_slice(&bytes[32..]);
    Ok(Signature {
        r,
        s,
        v: 27 + recovery_id.to_byte(),
    })
}

/// Recover the signer of an already-hashed message (no prefix applied).
pub fn recover_prehash(hash: &B256, signature: &Signature) -> Result<Address, CodecError> {
    let recovery_id = signature.recovery_id()?;
    let mut rs = [0u8; 64];
    rs[..32].copy_from_slice(&signature.r);
    rs[32..].copy_from_slice(&signature.s);
    let ecdsa = EcdsaSignature::from_slice(&rs)
        .map_err(|e| CodecError::InvalidInput(format!("invalid signature scalars: {e}")))?;
    let key = VerifyingKey::recover_from_prehash(hash.as_slice(), &ecdsa, recovery_id)
        .map_err(|e| CodecError::InvalidInput(format!("public key recovery failed: {e}")))?;
    Ok(address_of(&key))
}

/// Recover the signer of a relay digest signed under the personal-message convention.
pub fn recover_signer(digest: &B256, signature: &Signature) -> Result<Address, CodecError> {
    recover_prehash(&personal_message_hash(digest), signature)
}

pub fn recover_signer_hex(digest: &B256, signature: &str) -> Result<Address, CodecError> {
    recover_signer(digest, &Signature::from_hex(signature)?)
}

/// Normalize a JSON-RPC signer's output to 65 bytes and verify it.
///
/// With one short component it is ambiguous whether `r` or `s` lost its
/// leading zero: `r` is tried first, then `s`.
pub fn sanitize_rpc_signature(
    raw: &str,
    digest: &B256,
    expected: &Address,
) -> Result<Signature, CodecError> {
    let body = strip_hex_prefix(raw.trim());
    if !body.is_ascii() {
        return Err(CodecError::UnsanitizableSignature(format!(
            "'{raw}' is not hex"
        )));
    }
    match body.len() {
        WELL_FORMED_HEX_LEN => verify_candidate(body, digest, expected),
        SINGLE_SHORT_HEX_LEN => {
            let r_short = format!(
                "00{}{}",
                &body[..SHORT_COMPONENT_HEX_LEN],
                &body[SHORT_COMPONENT_HEX_LEN..]
            );
            verify_candidate(&r_short, digest, expected).or_else(|_| {
                let s_short = format!(
                    "{}00{}",
                    &body[..COMPONENT_HEX_LEN],
                    &body[COMPONENT_HEX_LEN..]
                );
                verify_candidate(&s_short, digest, expected)
            })
        }
        BOTH_SHORT_HEX_LEN => {
            let padded = format!(
                "00{}00{}",
                &body[..SHORT_COMPONENT_HEX_LEN],
                &body[SHORT_COMPONENT_HEX_LEN..]
            );
            verify_candidate(&padded, digest, expected)
        }
        len if len < BOTH_SHORT_HEX_LEN => Err(CodecError::UnsanitizableSignature(format!(
            "'{raw}' is shorter than the minimum length"
        ))),
        len => Err(CodecError::UnsanitizableSignature(format!(
            "'{raw}' has unexpected length {len}"
        ))),
    }
}

fn verify_candidate(
    candidate: &str,
    digest: &B256,
    expected: &Address,
) -> Result<Signature, CodecError> {
    let signature = Signature::from_hex(candidate)
        .map_err(|e| CodecError::UnsanitizableSignature(e.to_string()))?;
    match recover_signer(digest, &signature) {
        Ok(recovered) if recovered == *expected => Ok(signature.with_ethereum_parity()),
        Ok(recovered) => Err(CodecError::SignatureRecoveryMismatch {
            expected: *expected,
            recovered: Some(recovered),
        }),
        Err(_) => Err(CodecError::SignatureRecoveryMismatch {
            expected: *expected,
            recovered: None,
        }),
    }
}
