//! The process-wide mint session: one adapter, one poller, one gateway,
//! and the background tasks that keep them current.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
    OnceLock,
};

use alloy_primitives::{Address, B256};
use api::{
    ActionKind, ChainProviderAdapter, ConnectionState, ContractProxy, Notifier, ProviderHandle,
    SaleConfig,
};
use dioxus_logger::tracing::{debug, info};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::{
    eligibility::EligibilityChecker,
    gateway::{ActionFailure, ActionGateway},
    poller::{Clock, PhasePoller},
    tasks::{TaskLifetime, TaskRegistry},
    view_state::{derive_ui_state, DerivationInputs, UiState},
};

pub const WALLET_EVENTS_TASK: &str = "wallet-events";
pub const CONNECTION_TASK: &str = "connection-watch";
pub const SALE_PHASE_TASK: &str = "sale-phase";
pub const SUPPLY_TASK: &str = "supply";

static SESSION: OnceLock<Arc<MintSession>> = OnceLock::new();

pub struct MintSession {
    config: SaleConfig,
    notifier: Notifier,
    adapter: Arc<ChainProviderAdapter>,
    proxy: Arc<ContractProxy>,
    poller: Arc<PhasePoller>,
    eligibility: Arc<EligibilityChecker>,
    gateway: Arc<ActionGateway>,
    tasks: TaskRegistry,
    started: AtomicBool,
}

impl MintSession {
    pub fn new(provider: ProviderHandle, config: SaleConfig) -> Arc<Self> {
        Self::with_clock(provider, config, Arc::new(api::compat::unix_now))
    }

    pub fn with_clock(provider: ProviderHandle, config: SaleConfig, clock: Clock) -> Arc<Self> {
        let notifier = Notifier::new();
        let adapter = Arc::new(ChainProviderAdapter::new(
            provider,
            config.required_chain_id,
            notifier.clone(),
        ));
        let proxy = Arc::new(ContractProxy::new(adapter.clone(), config));
        let poller = Arc::new(PhasePoller::with_clock(
            adapter.clone(),
            proxy.clone(),
            clock,
        ));
        let eligibility = Arc::new(EligibilityChecker::new(proxy.clone()));
        let gateway = Arc::new(ActionGateway::new(
            adapter.clone(),
            proxy.clone(),
            poller.clone(),
            eligibility.clone(),
            notifier.clone(),
        ));
        Arc::new(Self {
            config,
            notifier,
            adapter,
            proxy,
            poller,
            eligibility,
            gateway,
            tasks: TaskRegistry::new(),
            started: AtomicBool::new(false),
        })
    }

    /// The session for this process, built on first use from the platform
    /// provider and the environment's sale configuration.
    pub fn global() -> Arc<MintSession> {
        SESSION
            .get_or_init(|| {
                let config = SaleConfig::from_env();
                info!(
                    "mint session for network {} (nft {}, whitelist {})",
                    config.required_chain_id, config.nft_contract, config.whitelist_contract
                );
                MintSession::new(api::platform_provider(), config)
            })
            .clone()
    }

    pub fn config(&self) -> &SaleConfig {
        &self.config
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn adapter(&self) -> &Arc<ChainProviderAdapter> {
        &self.adapter
    }

    pub fn proxy(&self) -> &Arc<ContractProxy> {
        &self.proxy
    }

    pub fn poller(&self) -> &Arc<PhasePoller> {
        &self.poller
    }

    pub fn eligibility(&self) -> &Arc<EligibilityChecker> {
        &self.eligibility
    }

    pub fn gateway(&self) -> &Arc<ActionGateway> {
        &self.gateway
    }

    pub fn tasks(&self) -> &TaskRegistry {
        &self.tasks
    }

    /// Starts the background tasks. Later calls do nothing.
    ///
    /// The sale-phase timer stops itself once the presale has ended; the
    /// supply timer and the wallet listeners live as long as the session.
    pub fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }

        let adapter = self.adapter.clone();
        self.tasks
            .spawn(WALLET_EVENTS_TASK, TaskLifetime::Session, |cancel| async move {
                adapter.run_events(cancel).await
            });

        // subscribed here so a connect racing the task's first poll is seen
        let connection = self.adapter.watch();
        let seen = (self.adapter.account(), self.adapter.is_network_valid());
        let session = self.clone();
        self.tasks
            .spawn(CONNECTION_TASK, TaskLifetime::Session, |cancel| async move {
                session.watch_connection(connection, seen, cancel).await
            });

        let poller = self.poller.clone();
        self.tasks.spawn(
            SALE_PHASE_TASK,
            TaskLifetime::UntilCancelled,
            |cancel| async move { poller.run_phase_loop(cancel).await },
        );

        let poller = self.poller.clone();
        self.tasks
            .spawn(SUPPLY_TASK, TaskLifetime::Session, |cancel| async move {
                poller.run_supply_loop(cancel).await
            });
    }

    pub async fn connect(&self) -> ConnectionState {
        self.adapter.connect().await
    }

    pub async fn perform(&self, kind: ActionKind) -> Result<B256, ActionFailure> {
        self.gateway.perform(kind).await
    }

    pub fn inputs(&self) -> DerivationInputs {
        let board = self.gateway.board();
        DerivationInputs {
            connected: self.adapter.is_connected(),
            account: self.adapter.account(),
            network_valid: self.adapter.is_network_valid(),
            snapshot: self.poller.snapshot(),
            action_in_flight: board.any_in_flight(),
            joined_whitelist: board.joined_whitelist,
        }
    }

    pub fn ui_state(&self) -> UiState {
        derive_ui_state(&self.inputs())
    }

    pub fn shutdown(&self) {
        info!("shutting down mint session");
        self.tasks.shutdown();
    }

    /// Reacts to account switches and to the wallet returning to the
    /// required network.
    async fn watch_connection(
        &self,
        mut rx: watch::Receiver<ConnectionState>,
        (mut account, mut network_valid): (Option<Address>, bool),
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = rx.changed() => if changed.is_err() { break },
            }
            let next_account = rx.borrow_and_update().account();
            let next_valid = self.adapter.is_network_valid();

            if next_account != account {
                debug!("account changed from {account:?} to {next_account:?}");
                self.eligibility.clear();
                self.gateway.forget_account();
                self.poller.forget_owner(next_account);
            }
            let refresh = next_account.is_some()
                && next_valid
                && (next_account != account || !network_valid);
            account = next_account;
            network_valid = next_valid;

            if refresh {
                self.poller.refresh().await;
            }
        }
    }
}
