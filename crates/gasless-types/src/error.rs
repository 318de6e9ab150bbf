use alloy_primitives::Address;

/// Digest and signature codec error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A digest field does not fit its fixed-width encoding.
    Encoding(String),
    /// Malformed hex, key material or signature bytes.
    InvalidInput(String),
    /// The signing back-end returned a shape that cannot be normalized.
    UnsanitizableSignature(String),
    /// The (possibly re-padded) signature does not recover to the signer.
    SignatureRecoveryMismatch {
        expected: Address,
        recovered: Option<Address>,
    },
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encoding(msg) => write!(f, "encoding error: {msg}"),
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::UnsanitizableSignature(msg) => write!(f, "cannot sanitize signature: {msg}"),
            Self::SignatureRecoveryMismatch {
                expected,
                recovered: Some(recovered),
            } => write!(f, "signature recovers to {recovered}, expected {expected}"),
            Self::SignatureRecoveryMismatch {
                expected,
                recovered: None,
            } => write!(f, "signature does not recover to any key, expected {expected}"),
        }
    }
}

impl std::error::Error for CodecError {}
