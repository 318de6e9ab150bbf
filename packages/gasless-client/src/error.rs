//! Error types for the relay client.

use gasless_types::CodecError;
use std::fmt;

/// Relay client error type.
#[derive(Debug)]
pub enum Error {
    /// Configuration error.
    Config(String),
    /// JSON-RPC communication error.
    Rpc(String),
    /// HTTP error talking to a relay.
    Http(String),
    /// Malformed registry log.
    Registry(String),
    /// Digest or signature codec error.
    Codec(CodecError),
    /// Signing back-end failure.
    Signer(String),
    /// A relay definitively rejected the request.
    Relay(String),
    /// Every candidate relay was unreachable or ineligible.
    NoRelayFound { probed: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "config error: {msg}"),
            Error::Rpc(msg) => write!(f, "rpc error: {msg}"),
            Error::Http(msg) => write!(f, "http error: {msg}"),
            Error::Registry(msg) => write!(f, "registry error: {msg}"),
            Error::Codec(e) => write!(f, "codec error: {e}"),
            Error::Signer(msg) => write!(f, "signer error: {msg}"),
            Error::Relay(msg) => write!(f, "relay rejected request: {msg}"),
            Error::NoRelayFound { probed } => {
                write!(f, "no relay available ({probed} relays probed)")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Codec(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        Error::Codec(e)
    }
}
