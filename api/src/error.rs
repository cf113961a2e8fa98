//! Error taxonomy for everything that talks to the chain.

use alloy_primitives::B256;
use thiserror::Error;

/// EIP-1193 error code a wallet returns when the user dismisses a prompt.
pub const USER_REJECTED_CODE: i64 = 4001;

/// Failures surfaced by the provider, the adapter and the contract proxy.
///
/// Read-side variants (`Rpc`, `Transport`, `Decode`) are transient: callers
/// are expected to keep whatever state they already had and retry later.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// No injected wallet (or node endpoint) could be found.
    #[error("no wallet provider is available")]
    NoWallet,

    /// The user dismissed the wallet prompt.
    #[error("the request was rejected in the wallet")]
    UserRejected,

    /// The wallet is pointed at a network other than the required one.
    #[error("wallet is on network {actual}, expected network {expected}")]
    WrongNetwork { expected: u64, actual: u64 },

    /// A signing handle was requested while no account is connected.
    #[error("no signer available: wallet is not connected")]
    NoSigner,

    /// A write was attempted without a signer.
    #[error("a signer is required for this call")]
    SignerRequired,

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("transaction {0} reverted")]
    TransactionReverted(B256),

    #[error("transaction {0} was not confirmed in time")]
    TransactionTimeout(B256),
}

impl ChainError {
    /// Maps a JSON-RPC error object onto the taxonomy.
    pub fn from_rpc(code: i64, message: impl Into<String>) -> Self {
        if code == USER_REJECTED_CODE {
            Self::UserRejected
        } else {
            Self::Rpc {
                code,
                message: message.into(),
            }
        }
    }

    /// True for failures a later poll tick may not see again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Rpc { .. } | Self::Transport(_) | Self::Decode(_))
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

impl From<alloy_sol_types::Error> for ChainError {
    fn from(e: alloy_sol_types::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

pub type ChainResult<T> = Result<T, ChainError>;
