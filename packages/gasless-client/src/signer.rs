//! Relay request signing back-ends.
//!
//! Both variants sign under the personal-message convention, which is what
//! the hub recomputes on-chain, and both only return signatures that
//! recover to the signer's own address.

use gasless_types::{
    address_of, recover_signer, sanitize_rpc_signature, sign_digest, signing_key_from_bytes,
    Address, CodecError, DigestConvention, Signature, B256,
};
use k256::ecdsa::SigningKey;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::rpc::EthRpcClient;

pub enum TransactionSigner {
    /// Raw secp256k1 key held in process.
    Local { key: SigningKey, address: Address },

    /// Account unlocked on a JSON-RPC node.
    Rpc {
        rpc: Arc<EthRpcClient>,
        account: Address,
    },
}

impl TransactionSigner {
    pub fn local(secret: &[u8]) -> Result<Self, crate::Error> {
        let key = signing_key_from_bytes(secret)?;
        let address = address_of(key.verifying_key());
        Ok(Self::Local { key, address })
    }

    pub fn local_hex(secret: &str) -> Result<Self, crate::Error> {
        Self::local(&gasless_types::decode_hex(secret)?)
    }

    pub fn rpc(rpc: Arc<EthRpcClient>, account: Address) -> Self {
        Self::Rpc { rpc, account }
    }

    pub fn address(&self) -> Address {
        match self {
            Self::Local { address, .. } => *address,
            Self::Rpc { account, .. } => *account,
        }
    }

    pub async fn sign(&self, digest: &B256) -> Result<Signature, crate::Error> {
        match self {
            Self::Local { key, address } => {
                let signature = sign_digest(key, digest, DigestConvention::Personal)?;
                let recovered = recover_signer(digest, &signature)?;
                if recovered != *address {
                    return Err(CodecError::SignatureRecoveryMismatch {
                        expected: *address,
                        recovered: Some(recovered),
                    }
                    .into());
                }
                Ok(signature)
            }
            Self::Rpc { rpc, account } => {
                let raw = match rpc.personal_sign(digest, *account).await {
                    Ok(raw) => raw,
                    Err(first) => {
                        warn!(account = %account, error = %first, "personal_sign failed, trying eth_sign");
                        rpc.eth_sign(*account, digest).await.map_err(|second| {
                            crate::Error::Signer(format!(
                                "personal_sign: {first}; eth_sign: {second}"
                            ))
                        })?
                    }
                };
                debug!(account = %account, len = raw.len(), "Remote signer returned signature");
                Ok(sanitize_rpc_signature(&raw, digest, account)?)
            }
        }
    }
}

impl std::fmt::Debug for TransactionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local { address, .. } => write!(f, "TransactionSigner::Local({address})"),
            Self::Rpc { rpc, account } => {
                write!(f, "TransactionSigner::Rpc({account} via {})", rpc.primary_url())
            }
        }
    }
}
