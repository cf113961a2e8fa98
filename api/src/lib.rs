//! The chain-facing half of the mint client: provider seam, wallet
//! connection, contract bindings and the typed contract proxy.

pub mod adapter;
pub mod compat;
pub mod config;
pub mod contracts;
pub mod error;
#[cfg(all(any(test, feature = "mock"), not(target_arch = "wasm32")))]
pub mod mock;
pub mod notice;
pub mod pending;
pub mod provider;
pub mod proxy;

pub use adapter::{ChainProviderAdapter, ConnectionState};
pub use config::SaleConfig;
pub use error::{ChainError, ChainResult};
pub use notice::{Notice, Notifier};
pub use pending::PendingTransaction;
pub use provider::{ChainProvider, ProviderEvent, ProviderHandle, SignerHandle};
pub use proxy::{ActionKind, ContractProxy};

/// The provider for the platform being built: the injected browser wallet on
/// wasm32, a JSON-RPC node everywhere else.
#[cfg(target_arch = "wasm32")]
pub fn platform_provider() -> ProviderHandle {
    ProviderHandle::new(provider::injected::InjectedProvider::new())
}

#[cfg(not(target_arch = "wasm32"))]
pub fn platform_provider() -> ProviderHandle {
    ProviderHandle::new(provider::http::HttpProvider::from_env())
}
