use std::time::Duration;

use alloy_primitives::B256;
use dioxus_logger::tracing::debug;

use crate::{
    compat,
    error::{ChainError, ChainResult},
    provider::ProviderHandle,
};

/// A submitted transaction that has not been mined yet.
#[derive(Debug)]
#[must_use = "a pending transaction does nothing unless waited on"]
pub struct PendingTransaction {
    hash: B256,
    provider: ProviderHandle,
    timeout: Duration,
    poll_interval: Duration,
}

impl PendingTransaction {
    pub fn new(
        hash: B256,
        provider: ProviderHandle,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            hash,
            provider,
            timeout,
            poll_interval,
        }
    }

    pub fn hash(&self) -> B256 {
        self.hash
    }

    /// Suspends until the transaction has one confirmation.
    ///
    /// Fails with `TransactionReverted` if it was mined with a failure status
    /// and with `TransactionTimeout` if no receipt shows up in time. Receipt
    /// lookups that fail transiently are retried.
    pub async fn wait(self) -> ChainResult<B256> {
        let hash = self.hash;
        compat::timeout(self.timeout, self.poll_receipt())
            .await
            .unwrap_or(Err(ChainError::TransactionTimeout(hash)))
    }

    async fn poll_receipt(&self) -> ChainResult<B256> {
        loop {
            match self.provider.transaction_status(self.hash).await {
                Ok(Some(true)) => return Ok(self.hash),
                Ok(Some(false)) => return Err(ChainError::TransactionReverted(self.hash)),
                Ok(None) => {}
                Err(e) if e.is_transient() => {
                    debug!("receipt lookup for {} failed: {e}", self.hash)
                }
                Err(e) => return Err(e),
            }
            compat::sleep(self.poll_interval).await;
        }
    }
}
