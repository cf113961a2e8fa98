use std::sync::Arc;

use alloy_primitives::Address;
use api::ContractProxy;
use dioxus_logger::tracing::warn;
use tokio::sync::watch;

/// Whether an address may take part in the presale. `Unknown` is what a
/// failed read yields, and must never be read as "not whitelisted".
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::EnumIs)]
pub enum Eligibility {
    Whitelisted,
    NotWhitelisted,
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EligibilityResult {
    pub address: Address,
    pub eligibility: Eligibility,
}

/// On-demand whitelist lookups. Never polled.
pub struct EligibilityChecker {
    proxy: Arc<ContractProxy>,
    latest: watch::Sender<Option<EligibilityResult>>,
}

impl EligibilityChecker {
    pub fn new(proxy: Arc<ContractProxy>) -> Self {
        let (latest, _) = watch::channel(None);
        Self { proxy, latest }
    }

    pub async fn check_eligibility(&self, address: Address) -> EligibilityResult {
        let eligibility = match self.proxy.is_whitelisted(address).await {
            Ok(true) => Eligibility::Whitelisted,
            Ok(false) => Eligibility::NotWhitelisted,
            Err(e) => {
                warn!("whitelist lookup for {address} failed: {e}");
                Eligibility::Unknown
            }
        };
        let result = EligibilityResult {
            address,
            eligibility,
        };
        self.latest.send_replace(Some(result));
        result
    }

    /// The last result, if it is for `address`.
    pub fn latest(&self, address: Address) -> Option<EligibilityResult> {
        self.latest.borrow().filter(|r| r.address == address)
    }

    pub fn watch(&self) -> watch::Receiver<Option<EligibilityResult>> {
        self.latest.subscribe()
    }

    pub fn clear(&self) {
        self.latest.send_replace(None);
    }
}
