//! Keeps the freshest consistent [`PhaseSnapshot`] by sampling the sale
//! contracts on two independent timers: one for the sale phase, one for
//! supply (tokens minted, whitelist size).

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use alloy_primitives::{Address, U256};
use api::{compat, ChainError, ChainProviderAdapter, ContractProxy};
use dioxus_logger::tracing::{debug, info, warn};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::snapshot::{PhaseSnapshot, SalePhase};

/// Unix seconds. Injected so tests can pin "now".
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::EnumIs)]
pub enum TickOutcome {
    Published,
    /// Not connected to the required network; nothing was read.
    Skipped,
    /// A read failed; the previous snapshot stands.
    Failed,
}

#[derive(Clone, Copy, Debug)]
struct PhaseSample {
    phase: SalePhase,
    is_owner: bool,
    owner_checked_for: Option<Address>,
}

#[derive(Clone, Copy, Debug)]
struct SupplySample {
    tokens_minted: U256,
    whitelisted_count: u64,
}

#[derive(Debug, Default)]
struct Samples {
    phase: Option<PhaseSample>,
    supply: Option<SupplySample>,
}

pub struct PhasePoller {
    adapter: Arc<ChainProviderAdapter>,
    proxy: Arc<ContractProxy>,
    snapshot: watch::Sender<Option<PhaseSnapshot>>,
    samples: Mutex<Samples>,
    clock: Clock,
    interval: Duration,
}

impl PhasePoller {
    pub fn new(adapter: Arc<ChainProviderAdapter>, proxy: Arc<ContractProxy>) -> Self {
        Self::with_clock(adapter, proxy, Arc::new(compat::unix_now))
    }

    pub fn with_clock(
        adapter: Arc<ChainProviderAdapter>,
        proxy: Arc<ContractProxy>,
        clock: Clock,
    ) -> Self {
        let interval = proxy.config().poll_interval;
        let (snapshot, _) = watch::channel(None);
        Self {
            adapter,
            proxy,
            snapshot,
            samples: Mutex::new(Samples::default()),
            clock,
            interval,
        }
    }

    /// The last published snapshot, `None` until both timers have sampled
    /// once.
    pub fn snapshot(&self) -> Option<PhaseSnapshot> {
        *self.snapshot.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<Option<PhaseSnapshot>> {
        self.snapshot.subscribe()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// One sale-phase tick: `presaleStarted`, then `presaleTimeEnded` only if
    /// started, then `owner`.
    pub async fn sample_phase(&self) -> TickOutcome {
        if !self.ready().await {
            return TickOutcome::Skipped;
        }
        match self.read_phase().await {
            Ok(sample) => {
                self.with_samples(|s| s.phase = Some(sample));
                self.publish();
                TickOutcome::Published
            }
            Err(e) => {
                warn!("sale phase read failed, keeping last snapshot: {e}");
                TickOutcome::Failed
            }
        }
    }

    /// One supply tick: `tokenIds` and `numAddressesWhitelisted`.
    pub async fn sample_supply(&self) -> TickOutcome {
        if !self.ready().await {
            return TickOutcome::Skipped;
        }
        match self.read_supply().await {
            Ok(sample) => {
                self.with_samples(|s| s.supply = Some(sample));
                self.publish();
                TickOutcome::Published
            }
            Err(e) => {
                warn!("supply read failed, keeping last snapshot: {e}");
                TickOutcome::Failed
            }
        }
    }

    /// Drops ownership for whichever account was sampled last and publishes
    /// that right away, ahead of the next owner read for `account`.
    pub fn forget_owner(&self, account: Option<Address>) {
        self.with_samples(|s| {
            if let Some(phase) = &mut s.phase {
                phase.is_owner = false;
                phase.owner_checked_for = account;
            }
        });
        self.snapshot.send_if_modified(|current| match current {
            Some(snapshot) if snapshot.is_owner || snapshot.owner_checked_for != account => {
                snapshot.is_owner = false;
                snapshot.owner_checked_for = account;
                true
            }
            _ => false,
        });
    }

    /// Out-of-cycle sample of both timers' reads.
    pub async fn refresh(&self) {
        debug!("refreshing sale state");
        self.sample_phase().await;
        self.sample_supply().await;
    }

    /// Samples the sale phase every interval until the presale is seen to
    /// have ended, at which point the loop cancels its own token.
    pub async fn run_phase_loop(&self, cancel: CancellationToken) {
        let mut interval = compat::interval::Interval::new(self.interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }
            self.sample_phase().await;
            if self.presale_ended() {
                info!("presale has ended, stopping the sale phase timer");
                cancel.cancel();
                break;
            }
        }
    }

    /// Samples supply every interval for as long as the session lives.
    pub async fn run_supply_loop(&self, cancel: CancellationToken) {
        let mut interval = compat::interval::Interval::new(self.interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }
            self.sample_supply().await;
        }
    }

    fn presale_ended(&self) -> bool {
        self.with_samples(|s| s.phase.is_some_and(|p| p.phase.is_ended()))
    }

    async fn ready(&self) -> bool {
        match self.adapter.check_network().await {
            Ok(true) => true,
            Ok(false) => {
                debug!("not on the required network, skipping tick");
                false
            }
            Err(e) => {
                warn!("could not read the network id: {e}");
                false
            }
        }
    }

    async fn read_phase(&self) -> Result<PhaseSample, ChainError> {
        let started = self.proxy.presale_started().await?;
        let ended = if started {
            self.proxy.presale_ended((self.clock)()).await?
        } else {
            false
        };
        // fail-closed: no account, or no answer, means no ownership
        let account = self.adapter.account();
        let is_owner = match account {
            Some(account) => match self.proxy.owner().await {
                Ok(owner) => owner == account,
                Err(e) => {
                    warn!("owner read failed, treating {account} as not owner: {e}");
                    false
                }
            },
            None => false,
        };
        Ok(PhaseSample {
            phase: SalePhase::from_flags(started, ended),
            is_owner,
            owner_checked_for: account,
        })
    }

    async fn read_supply(&self) -> Result<SupplySample, ChainError> {
        let tokens_minted = self.proxy.tokens_minted().await?;
        let whitelisted_count = self.proxy.whitelisted_count().await?;
        Ok(SupplySample {
            tokens_minted,
            whitelisted_count,
        })
    }

    /// Replaces the snapshot wholesale from the latest sample of each timer.
    fn publish(&self) {
        let (phase, supply) = self.with_samples(|s| (s.phase, s.supply));
        let (Some(mut phase), Some(supply)) = (phase, supply) else {
            return;
        };
        let sampled_at = (self.clock)();
        self.snapshot.send_modify(|current| {
            // the sale never returns from ended
            if current.is_some_and(|c| c.phase.is_ended()) {
                phase.phase = SalePhase::Ended;
            }
            *current = Some(PhaseSnapshot {
                phase: phase.phase,
                tokens_minted: supply.tokens_minted,
                whitelisted_count: supply.whitelisted_count,
                is_owner: phase.is_owner,
                owner_checked_for: phase.owner_checked_for,
                sampled_at,
            });
        });
    }

    fn with_samples<R>(&self, f: impl FnOnce(&mut Samples) -> R) -> R {
        let mut samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut samples)
    }
}

#[cfg(test)]
mod tests {
    use api::{mock::MockChain, Notifier, ProviderEvent};

    use super::*;

    const NOW: u64 = 1_700_000_100;

    async fn poller(chain: &Arc<MockChain>) -> PhasePoller {
        let config = MockChain::config();
        let adapter = Arc::new(ChainProviderAdapter::new(
            chain.handle(),
            config.required_chain_id,
            Notifier::new(),
        ));
        adapter.connect().await;
        let proxy = Arc::new(ContractProxy::new(adapter.clone(), config));
        PhasePoller::with_clock(adapter, proxy, Arc::new(|| NOW))
    }

    #[tokio::test]
    async fn publishes_once_both_timers_sampled() {
        let chain = MockChain::new(4);
        chain.with_state(|s| s.token_ids = U256::from(3));
        let poller = poller(&chain).await;

        assert!(poller.sample_phase().await.is_published());
        assert_eq!(poller.snapshot(), None);

        poller.sample_supply().await;
        let snapshot = poller.snapshot().unwrap();
        assert_eq!(snapshot.phase, SalePhase::NotStarted);
        assert_eq!(snapshot.tokens_minted, U256::from(3));
        assert_eq!(snapshot.sampled_at, NOW);
        assert!(!snapshot.is_owner);
    }

    #[tokio::test]
    async fn end_time_is_only_read_once_started() {
        let chain = MockChain::new(4);
        let poller = poller(&chain).await;

        poller.refresh().await;
        assert_eq!(chain.reads_of("presaleTimeEnded"), 0);

        chain.with_state(|s| {
            s.presale_started = true;
            s.presale_time_ended = U256::from(NOW + 60);
        });
        poller.refresh().await;
        assert_eq!(chain.reads_of("presaleTimeEnded"), 1);
        assert_eq!(poller.snapshot().unwrap().phase, SalePhase::PresaleOpen);
    }

    #[tokio::test]
    async fn failed_read_keeps_previous_snapshot() {
        let chain = MockChain::new(4);
        chain.with_state(|s| s.presale_started = true);
        let poller = poller(&chain).await;
        poller.refresh().await;
        let before = poller.snapshot();

        chain.with_state(|s| {
            s.owner = MockChain::USER;
            s.failing_reads.insert("presaleTimeEnded");
        });
        assert!(poller.sample_phase().await.is_failed());
        assert_eq!(poller.snapshot(), before);
    }

    #[tokio::test]
    async fn failed_supply_read_keeps_previous_snapshot() {
        let chain = MockChain::new(4);
        chain.with_state(|s| s.token_ids = U256::from(2));
        let poller = poller(&chain).await;
        poller.refresh().await;
        let before = poller.snapshot();

        chain.with_state(|s| {
            s.token_ids = U256::from(9);
            s.failing_reads.insert("numAddressesWhitelisted");
        });
        assert!(poller.sample_supply().await.is_failed());
        assert_eq!(poller.snapshot(), before);

        chain.with_state(|s| {
            s.failing_reads.clear();
            s.failing_reads.insert("tokenIds");
        });
        assert!(poller.sample_supply().await.is_failed());
        assert_eq!(poller.snapshot(), before);
    }

    #[tokio::test]
    async fn ended_never_reverts() {
        let chain = MockChain::new(4);
        chain.with_state(|s| {
            s.presale_started = true;
            s.presale_time_ended = U256::from(NOW - 1);
        });
        let poller = poller(&chain).await;
        poller.refresh().await;
        assert!(poller.snapshot().unwrap().presale_ended());

        // a contract reporting a later end time cannot reopen the presale
        chain.with_state(|s| s.presale_time_ended = U256::from(NOW + 1_000));
        poller.refresh().await;
        assert!(poller.snapshot().unwrap().presale_ended());
    }

    #[tokio::test]
    async fn owner_is_compared_with_the_connected_account() {
        let chain = MockChain::new(4);
        chain.with_state(|s| s.owner = MockChain::USER);
        let poller = poller(&chain).await;

        poller.refresh().await;
        let snapshot = poller.snapshot().unwrap();
        assert!(snapshot.is_owner);
        assert!(snapshot.is_owned_by(Some(MockChain::USER)));
    }

    #[tokio::test]
    async fn owner_read_failure_means_not_owner() {
        let chain = MockChain::new(4);
        chain.with_state(|s| s.owner = MockChain::USER);
        let poller = poller(&chain).await;
        poller.refresh().await;
        assert!(poller.snapshot().unwrap().is_owner);

        chain.with_state(|s| s.failing_reads.insert("owner"));
        assert!(poller.sample_phase().await.is_published());
        assert!(!poller.snapshot().unwrap().is_owner);
    }

    #[tokio::test]
    async fn account_switch_drops_ownership_before_the_next_read() {
        let chain = MockChain::new(4);
        chain.with_state(|s| s.owner = MockChain::USER);
        let poller = poller(&chain).await;
        poller.refresh().await;

        let other = Address::repeat_byte(0x55);
        chain.with_state(|s| s.failing_reads.insert("owner"));
        poller.adapter.handle_event(ProviderEvent::AccountsChanged(vec![other]));
        poller.forget_owner(Some(other));

        let snapshot = poller.snapshot().unwrap();
        assert!(!snapshot.is_owner);
        assert!(!snapshot.is_owned_by(Some(MockChain::USER)));

        // a failed owner read for the new account cannot bring it back
        poller.refresh().await;
        let snapshot = poller.snapshot().unwrap();
        assert!(!snapshot.is_owned_by(Some(other)));
        assert_eq!(snapshot.owner_checked_for, Some(other));
    }

    #[tokio::test]
    async fn wrong_network_skips_reads() {
        let chain = MockChain::new(4);
        let poller = poller(&chain).await;
        chain.switch_chain(1);

        assert!(poller.sample_phase().await.is_skipped());
        assert!(poller.sample_supply().await.is_skipped());
        assert_eq!(chain.reads_of("presaleStarted"), 0);
        assert_eq!(poller.snapshot(), None);
    }
}
