//! Owns the wallet connection: the connect flow, the connected account, and
//! whether the wallet sits on the required network.

use std::sync::atomic::{AtomicBool, Ordering};

use alloy_primitives::Address;
use dioxus_logger::tracing::{debug, info, warn};
use tokio::sync::{broadcast::error::RecvError, watch};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{ChainError, ChainResult},
    notice::{Notice, Notifier},
    provider::{ProviderEvent, ProviderHandle, SignerHandle},
};

#[derive(Clone, Debug, Default, PartialEq, Eq, strum::EnumIs)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected {
        network_id: u64,
        account: Address,
    },
    /// The user declined the connect popup.
    Rejected,
}

impl ConnectionState {
    pub fn network_id(&self) -> Option<u64> {
        match self {
            ConnectionState::Connected { network_id, .. } => Some(*network_id),
            _ => None,
        }
    }

    pub fn account(&self) -> Option<Address> {
        match self {
            ConnectionState::Connected { account, .. } => Some(*account),
            _ => None,
        }
    }
}

pub struct ChainProviderAdapter {
    provider: ProviderHandle,
    required_network: u64,
    state: watch::Sender<ConnectionState>,
    // set when the switch-network notice went out; cleared once the network
    // is valid again.
    warned: AtomicBool,
    notifier: Notifier,
}

impl ChainProviderAdapter {
    pub fn new(provider: ProviderHandle, required_network: u64, notifier: Notifier) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            provider,
            required_network,
            state,
            warned: AtomicBool::new(false),
            notifier,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn required_network(&self) -> u64 {
        self.required_network
    }

    pub fn account(&self) -> Option<Address> {
        self.state.borrow().account()
    }

    pub fn is_connected(&self) -> bool {
        self.state.borrow().is_connected()
    }

    /// Connected, and to the required network.
    pub fn is_network_valid(&self) -> bool {
        self.state.borrow().network_id() == Some(self.required_network)
    }

    /// Runs the connect flow.
    ///
    /// Opens the wallet popup at most once per Disconnected→Connecting
    /// transition: a call made while another is in flight waits for that
    /// attempt's outcome, and a call made while connected returns at once.
    pub async fn connect(&self) -> ConnectionState {
        let claimed = self.state.send_if_modified(|state| match state {
            ConnectionState::Connecting | ConnectionState::Connected { .. } => false,
            _ => {
                *state = ConnectionState::Connecting;
                true
            }
        });
        if !claimed {
            let mut rx = self.state.subscribe();
            return rx
                .wait_for(|s| !s.is_connecting())
                .await
                .map(|s| s.clone())
                .unwrap_or_default();
        }

        let next = match self.provider.request_accounts().await {
            Ok(accounts) => match accounts.first() {
                Some(&account) => match self.provider.chain_id().await {
                    Ok(network_id) => ConnectionState::Connected {
                        network_id,
                        account,
                    },
                    Err(e) => {
                        warn!("connected, but reading the network id failed: {e}");
                        ConnectionState::Disconnected
                    }
                },
                None => {
                    info!("wallet returned no accounts");
                    ConnectionState::Rejected
                }
            },
            Err(ChainError::UserRejected) => {
                info!("wallet connection rejected by user");
                self.notifier.emit(Notice::ConnectionRejected);
                ConnectionState::Rejected
            }
            Err(ChainError::NoWallet) => {
                warn!("no wallet provider found");
                self.notifier.emit(Notice::NoWallet);
                ConnectionState::Disconnected
            }
            Err(e) => {
                warn!("wallet connection failed: {e}");
                ConnectionState::Disconnected
            }
        };

        self.state.send_replace(next.clone());
        if let ConnectionState::Connected {
            network_id,
            account,
        } = next
        {
            info!("wallet connected: {account} on network {network_id}");
            self.validate_network(network_id);
        }
        next
    }

    pub async fn get_network_id(&self) -> ChainResult<u64> {
        self.provider.chain_id().await
    }

    /// Re-reads the network id and validates it. Called on every poll tick.
    ///
    /// Returns `Ok(false)` without touching the chain when disconnected.
    pub async fn check_network(&self) -> ChainResult<bool> {
        if !self.is_connected() {
            return Ok(false);
        }
        let network_id = self.provider.chain_id().await?;
        self.set_network(network_id);
        Ok(self.validate_network(network_id))
    }

    /// Compares `network_id` with the required network, emitting the
    /// switch-network notice at most once per violation episode.
    pub fn validate_network(&self, network_id: u64) -> bool {
        if network_id == self.required_network {
            if self.warned.swap(false, Ordering::AcqRel) {
                info!("wallet is back on network {network_id}");
                self.notifier.emit(Notice::NetworkRestored);
            }
            true
        } else {
            if !self.warned.swap(true, Ordering::AcqRel) {
                warn!(
                    "wallet is on network {network_id}, expected {}",
                    self.required_network
                );
                self.notifier.emit(Notice::SwitchNetwork {
                    expected: self.required_network,
                    actual: network_id,
                });
            }
            false
        }
    }

    /// A handle for submitting transactions.
    ///
    /// Fails with `NoSigner` while disconnected and with `WrongNetwork` while
    /// the wallet is on another network.
    pub fn get_signer(&self) -> ChainResult<SignerHandle> {
        match self.state() {
            ConnectionState::Connected {
                network_id,
                account,
            } => {
                if network_id == self.required_network {
                    Ok(SignerHandle::new(self.provider.clone(), account))
                } else {
                    Err(ChainError::WrongNetwork {
                        expected: self.required_network,
                        actual: network_id,
                    })
                }
            }
            _ => Err(ChainError::NoSigner),
        }
    }

    pub fn read_only_handle(&self) -> ProviderHandle {
        self.provider.clone()
    }

    pub fn handle_event(&self, event: ProviderEvent) {
        match event {
            ProviderEvent::ChainChanged(network_id) => {
                debug!("wallet switched to network {network_id}");
                if self.is_connected() {
                    self.set_network(network_id);
                    self.validate_network(network_id);
                }
            }
            ProviderEvent::AccountsChanged(accounts) => match accounts.first() {
                None => {
                    if self.is_connected() {
                        info!("wallet disconnected all accounts");
                        self.state.send_replace(ConnectionState::Disconnected);
                    }
                }
                Some(&next) => {
                    self.state.send_if_modified(|state| match state {
                        ConnectionState::Connected { account, .. } if *account != next => {
                            info!("wallet account changed to {next}");
                            *account = next;
                            true
                        }
                        _ => false,
                    });
                }
            },
        }
    }

    /// Applies wallet notifications until cancelled.
    pub async fn run_events(&self, cancel: CancellationToken) {
        let mut rx = self.provider.subscribe();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = rx.recv() => match event {
                    Ok(event) => self.handle_event(event),
                    Err(RecvError::Lagged(n)) => warn!("dropped {n} wallet notifications"),
                    Err(RecvError::Closed) => break,
                },
            }
        }
    }

    fn set_network(&self, next: u64) {
        self.state.send_if_modified(|state| match state {
            ConnectionState::Connected { network_id, .. } if *network_id != next => {
                *network_id = next;
                true
            }
            _ => false,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::mock::MockChain;

    const REQUIRED: u64 = 4;

    fn adapter(chain: &Arc<MockChain>) -> (ChainProviderAdapter, Notifier) {
        let notifier = Notifier::new();
        let adapter = ChainProviderAdapter::new(chain.handle(), REQUIRED, notifier.clone());
        (adapter, notifier)
    }

    #[tokio::test]
    async fn connects_on_required_network() {
        let chain = MockChain::new(REQUIRED);
        let (adapter, _) = adapter(&chain);

        let state = adapter.connect().await;

        assert_eq!(
            state,
            ConnectionState::Connected {
                network_id: REQUIRED,
                account: MockChain::USER
            }
        );
        assert!(adapter.is_network_valid());
        assert!(adapter.get_signer().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_connects_open_one_popup() {
        let chain = MockChain::new(REQUIRED);
        chain.with_state(|s| s.connect_delay = Some(Duration::from_millis(500)));
        let (adapter, _) = adapter(&chain);

        let (a, b) = tokio::join!(adapter.connect(), adapter.connect());

        assert_eq!(a, b);
        assert!(a.is_connected());
        assert_eq!(chain.connect_prompts(), 1);

        // already connected: no further popup
        adapter.connect().await;
        assert_eq!(chain.connect_prompts(), 1);
    }

    #[tokio::test]
    async fn rejected_popup_can_be_retried() {
        let chain = MockChain::new(REQUIRED);
        chain.with_state(|s| s.reject_connect = true);
        let (adapter, notifier) = adapter(&chain);
        let mut notices = notifier.subscribe();

        assert_eq!(adapter.connect().await, ConnectionState::Rejected);
        assert_eq!(notices.try_recv().ok(), Some(Notice::ConnectionRejected));
        assert!(matches!(adapter.get_signer(), Err(ChainError::NoSigner)));

        chain.with_state(|s| s.reject_connect = false);
        assert!(adapter.connect().await.is_connected());
        assert_eq!(chain.connect_prompts(), 2);
    }

    #[tokio::test]
    async fn wrong_network_warns_once_per_episode() {
        let chain = MockChain::new(1);
        let (adapter, notifier) = adapter(&chain);
        let mut notices = notifier.subscribe();

        adapter.connect().await;
        assert!(!adapter.is_network_valid());
        for _ in 0..3 {
            assert!(!adapter.check_network().await.unwrap());
        }
        assert_eq!(
            notices.try_recv().ok(),
            Some(Notice::SwitchNetwork {
                expected: REQUIRED,
                actual: 1
            })
        );
        assert!(notices.try_recv().is_err());
        assert!(matches!(
            adapter.get_signer(),
            Err(ChainError::WrongNetwork { .. })
        ));

        // corrected, then wrong again: a new episode warns again
        adapter.handle_event(ProviderEvent::ChainChanged(REQUIRED));
        assert_eq!(notices.try_recv().ok(), Some(Notice::NetworkRestored));
        adapter.handle_event(ProviderEvent::ChainChanged(5));
        assert!(matches!(
            notices.try_recv().ok(),
            Some(Notice::SwitchNetwork { actual: 5, .. })
        ));
    }

    #[tokio::test]
    async fn account_events_rebind_or_disconnect() {
        let chain = MockChain::new(REQUIRED);
        let (adapter, _) = adapter(&chain);
        adapter.connect().await;

        adapter.handle_event(ProviderEvent::AccountsChanged(vec![MockChain::OWNER]));
        assert_eq!(adapter.account(), Some(MockChain::OWNER));

        adapter.handle_event(ProviderEvent::AccountsChanged(vec![]));
        assert_eq!(adapter.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn missing_wallet_is_reported() {
        let chain = MockChain::new(REQUIRED);
        chain.with_state(|s| s.no_wallet = true);
        let (adapter, notifier) = adapter(&chain);
        let mut notices = notifier.subscribe();

        assert_eq!(adapter.connect().await, ConnectionState::Disconnected);
        assert_eq!(notices.try_recv().ok(), Some(Notice::NoWallet));
    }
}
