//! The chain provider seam: an EIP-1193 style `request` plus wallet
//! notifications, and the typed handles built on top of it.

#[cfg(not(target_arch = "wasm32"))]
pub mod http;
#[cfg(target_arch = "wasm32")]
pub mod injected;

use std::sync::Arc;

use alloy_primitives::{Address, B256, Bytes, U256, U64};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::broadcast;

use crate::error::ChainResult;

/// Notifications pushed by the wallet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderEvent {
    ChainChanged(u64),
    AccountsChanged(Vec<Address>),
}

/// A JSON-RPC capable wallet or node.
///
/// Implementations must tolerate any number of concurrent outstanding
/// requests.
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
pub trait ChainProvider: Send + Sync {
    /// Issues a single JSON-RPC request and returns its `result`.
    async fn request(&self, method: &str, params: Value) -> ChainResult<Value>;

    /// Subscribes to `chainChanged` / `accountsChanged` notifications.
    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent>;
}

/// A transaction as handed to `eth_sendTransaction`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub from: Address,
    pub to: Address,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value: Option<U256>,
    pub data: Bytes,
}

#[derive(Deserialize)]
struct ReceiptStatus {
    status: Option<U64>,
}

/// Shared, read-only access to the chain.
#[derive(Clone)]
pub struct ProviderHandle(Arc<dyn ChainProvider>);

impl std::fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ProviderHandle")
    }
}

impl ProviderHandle {
    pub fn new(provider: impl ChainProvider + 'static) -> Self {
        Self(Arc::new(provider))
    }

    pub fn from_arc(provider: Arc<dyn ChainProvider>) -> Self {
        Self(provider)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.0.subscribe()
    }

    pub async fn chain_id(&self) -> ChainResult<u64> {
        let value = self.0.request("eth_chainId", json!([])).await?;
        let id: U64 = serde_json::from_value(value)?;
        Ok(id.to::<u64>())
    }

    /// Asks the wallet for account access. This is what opens the popup.
    pub async fn request_accounts(&self) -> ChainResult<Vec<Address>> {
        let value = self.0.request("eth_requestAccounts", json!([])).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Accounts already authorised, without prompting.
    pub async fn accounts(&self) -> ChainResult<Vec<Address>> {
        let value = self.0.request("eth_accounts", json!([])).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// `eth_call` against the latest block.
    pub async fn call(&self, to: Address, data: Bytes) -> ChainResult<Bytes> {
        let value = self
            .0
            .request("eth_call", json!([{ "to": to, "data": data }, "latest"]))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn send_transaction(&self, tx: &TransactionRequest) -> ChainResult<B256> {
        let value = self.0.request("eth_sendTransaction", json!([tx])).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// `None` while the transaction is not mined, otherwise whether it
    /// succeeded.
    pub async fn transaction_status(&self, hash: B256) -> ChainResult<Option<bool>> {
        let value = self
            .0
            .request("eth_getTransactionReceipt", json!([hash]))
            .await?;
        let receipt: Option<ReceiptStatus> = serde_json::from_value(value)?;
        Ok(receipt.map(|r| r.status.is_some_and(|s| s == U64::from(1))))
    }
}

/// A handle that may submit transactions on behalf of `from`.
///
/// Only the adapter hands these out, and only while connected to the
/// required network.
#[derive(Clone, Debug)]
pub struct SignerHandle {
    provider: ProviderHandle,
    from: Address,
}

impl SignerHandle {
    pub(crate) fn new(provider: ProviderHandle, from: Address) -> Self {
        Self { provider, from }
    }

    pub fn address(&self) -> Address {
        self.from
    }

    pub fn provider(&self) -> &ProviderHandle {
        &self.provider
    }

    pub async fn send(&self, to: Address, value: Option<U256>, data: Bytes) -> ChainResult<B256> {
        let tx = TransactionRequest {
            from: self.from,
            to,
            value,
            data,
        };
        self.provider.send_transaction(&tx).await
    }
}
