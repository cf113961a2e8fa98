//! Gates every mutating action behind connection, network, phase,
//! ownership and eligibility checks, and keeps at most one request per
//! action kind on its way to the chain.

use std::{collections::HashMap, sync::Arc};

use alloy_primitives::B256;
use api::{
    ActionKind, ChainError, ChainProviderAdapter, ConnectionState, ContractProxy, Notice, Notifier,
};
use dioxus_logger::tracing::{debug, info, warn};
use thiserror::Error;
use tokio::sync::watch;

use crate::{
    eligibility::{Eligibility, EligibilityChecker},
    poller::PhasePoller,
    snapshot::{PhaseSnapshot, SalePhase},
};

/// Why an action did not reach, or did not survive, the chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionFailure {
    #[error("connect your wallet first")]
    NotConnected,

    #[error("switch your wallet to network {expected}")]
    WrongNetwork { expected: u64 },

    #[error("not available in the current sale phase")]
    WrongPhase,

    #[error("your address is not in the whitelist")]
    NotWhitelisted,

    #[error("could not confirm whether your address is whitelisted")]
    EligibilityUnknown,

    #[error("your address is already in the whitelist")]
    AlreadyWhitelisted,

    #[error("only the contract owner can do this")]
    NotOwner,

    #[error("a previous request is still in progress")]
    AlreadyInFlight,

    #[error("the transaction was rejected in the wallet")]
    Rejected,

    #[error("transaction {0} reverted")]
    Reverted(B256),

    #[error("transaction {0} was not confirmed in time")]
    Timeout(B256),

    #[error(transparent)]
    Chain(ChainError),
}

impl From<ChainError> for ActionFailure {
    fn from(e: ChainError) -> Self {
        match e {
            ChainError::UserRejected => ActionFailure::Rejected,
            ChainError::WrongNetwork { expected, .. } => ActionFailure::WrongNetwork { expected },
            ChainError::TransactionReverted(hash) => ActionFailure::Reverted(hash),
            ChainError::TransactionTimeout(hash) => ActionFailure::Timeout(hash),
            other => ActionFailure::Chain(other),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseRequirement {
    NotStarted,
    /// Not started or open: anything but ended.
    NotEnded,
    PresaleOpen,
    Ended,
}

impl PhaseRequirement {
    pub fn admits(self, phase: SalePhase) -> bool {
        match self {
            PhaseRequirement::NotStarted => phase.is_not_started(),
            PhaseRequirement::NotEnded => !phase.is_ended(),
            PhaseRequirement::PresaleOpen => phase.is_presale_open(),
            PhaseRequirement::Ended => phase.is_ended(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EligibilityRequirement {
    Any,
    Whitelisted,
    NotWhitelisted,
}

impl EligibilityRequirement {
    pub fn needs_lookup(self) -> bool {
        self != EligibilityRequirement::Any
    }

    fn check(self, eligibility: Option<Eligibility>) -> Result<(), ActionFailure> {
        match (self, eligibility) {
            (EligibilityRequirement::Any, _) => Ok(()),
            (_, None | Some(Eligibility::Unknown)) => Err(ActionFailure::EligibilityUnknown),
            (EligibilityRequirement::Whitelisted, Some(Eligibility::Whitelisted)) => Ok(()),
            (EligibilityRequirement::Whitelisted, Some(_)) => Err(ActionFailure::NotWhitelisted),
            (EligibilityRequirement::NotWhitelisted, Some(Eligibility::NotWhitelisted)) => Ok(()),
            (EligibilityRequirement::NotWhitelisted, Some(_)) => {
                Err(ActionFailure::AlreadyWhitelisted)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::EnumIs)]
pub enum RequestState {
    Created,
    Validated,
    Submitted,
    Confirmed,
    Failed,
}

/// What the gateway knows when it validates a request.
#[derive(Clone, Debug)]
pub struct ValidationContext {
    pub connection: ConnectionState,
    pub network_valid: bool,
    pub required_network: u64,
    pub snapshot: Option<PhaseSnapshot>,
    pub eligibility: Option<Eligibility>,
}

/// One attempt at an action, from creation to a terminal state.
#[derive(Clone, Debug)]
pub struct ActionRequest {
    pub kind: ActionKind,
    pub required_phase: PhaseRequirement,
    pub required_eligibility: EligibilityRequirement,
    pub owner_only: bool,
    state: RequestState,
}

impl ActionRequest {
    pub fn new(kind: ActionKind) -> Self {
        let (required_phase, required_eligibility, owner_only) = match kind {
            ActionKind::JoinWhitelist => (
                PhaseRequirement::NotEnded,
                EligibilityRequirement::NotWhitelisted,
                false,
            ),
            ActionKind::PresaleMint => (
                PhaseRequirement::PresaleOpen,
                EligibilityRequirement::Whitelisted,
                false,
            ),
            ActionKind::PublicMint => (PhaseRequirement::Ended, EligibilityRequirement::Any, false),
            ActionKind::StartPresale => {
                (PhaseRequirement::NotStarted, EligibilityRequirement::Any, true)
            }
        };
        Self {
            kind,
            required_phase,
            required_eligibility,
            owner_only,
            state: RequestState::Created,
        }
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    /// Everything but eligibility, which needs a chain read.
    pub fn check_gates(&self, ctx: &ValidationContext) -> Result<(), ActionFailure> {
        if !ctx.connection.is_connected() {
            return Err(ActionFailure::NotConnected);
        }
        if !ctx.network_valid {
            return Err(ActionFailure::WrongNetwork {
                expected: ctx.required_network,
            });
        }
        let snapshot = ctx.snapshot.ok_or(ActionFailure::WrongPhase)?;
        if !self.required_phase.admits(snapshot.phase) {
            return Err(ActionFailure::WrongPhase);
        }
        if self.owner_only && !snapshot.is_owned_by(ctx.connection.account()) {
            return Err(ActionFailure::NotOwner);
        }
        Ok(())
    }

    /// Created → Validated, or Created → Failed with the first unmet
    /// precondition.
    pub fn validate(&mut self, ctx: &ValidationContext) -> Result<(), ActionFailure> {
        let checked = self
            .check_gates(ctx)
            .and_then(|()| self.required_eligibility.check(ctx.eligibility));
        self.state = match checked {
            Ok(()) => RequestState::Validated,
            Err(_) => RequestState::Failed,
        };
        checked
    }

    fn advance(&mut self, next: RequestState) {
        debug!("{} request: {:?} -> {next:?}", self.kind, self.state);
        self.state = next;
    }
}

/// Per-kind progress as the view sees it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, strum::EnumIs)]
pub enum ActionStatus {
    #[default]
    Idle,
    /// The slot is claimed and preconditions are being checked.
    Validating,
    Submitted,
    Confirmed,
    Failed,
}

impl ActionStatus {
    pub fn is_in_flight(self) -> bool {
        matches!(self, ActionStatus::Validating | ActionStatus::Submitted)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActionBoard {
    statuses: HashMap<ActionKind, ActionStatus>,
    /// The connected account is known to be in the whitelist, either from
    /// a confirmed join or from an eligibility lookup.
    pub joined_whitelist: bool,
}

impl ActionBoard {
    pub fn status(&self, kind: ActionKind) -> ActionStatus {
        self.statuses.get(&kind).copied().unwrap_or_default()
    }

    pub fn any_in_flight(&self) -> bool {
        self.statuses.values().any(|s| s.is_in_flight())
    }
}

pub struct ActionGateway {
    adapter: Arc<ChainProviderAdapter>,
    proxy: Arc<ContractProxy>,
    poller: Arc<PhasePoller>,
    eligibility: Arc<EligibilityChecker>,
    notifier: Notifier,
    board: watch::Sender<ActionBoard>,
}

impl ActionGateway {
    pub fn new(
        adapter: Arc<ChainProviderAdapter>,
        proxy: Arc<ContractProxy>,
        poller: Arc<PhasePoller>,
        eligibility: Arc<EligibilityChecker>,
        notifier: Notifier,
    ) -> Self {
        let (board, _) = watch::channel(ActionBoard::default());
        Self {
            adapter,
            proxy,
            poller,
            eligibility,
            notifier,
            board,
        }
    }

    pub fn board(&self) -> ActionBoard {
        self.board.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<ActionBoard> {
        self.board.subscribe()
    }

    /// Validates, submits and waits for `kind`, returning the confirmed
    /// transaction hash.
    ///
    /// A second call for the same kind while one is in progress fails with
    /// `AlreadyInFlight` and leaves the first undisturbed. Every failure is
    /// announced as a [`Notice::ActionFailed`].
    pub async fn perform(&self, kind: ActionKind) -> Result<B256, ActionFailure> {
        if !self.claim(kind) {
            warn!("{kind} is already in progress");
            return Err(self.announce_failure(kind, ActionFailure::AlreadyInFlight));
        }

        let mut request = ActionRequest::new(kind);
        let outcome = self.drive(&mut request).await;
        match outcome {
            Ok(hash) => {
                info!("{kind} confirmed in {hash}");
                self.set_status(kind, ActionStatus::Confirmed);
                self.notifier.emit(Notice::ActionConfirmed { kind });
                Ok(hash)
            }
            Err(failure) => {
                request.advance(RequestState::Failed);
                self.set_status(kind, ActionStatus::Failed);
                Err(self.announce_failure(kind, failure))
            }
        }
    }

    /// Drops what was learned about the previous account.
    pub fn forget_account(&self) {
        self.board.send_if_modified(|board| {
            std::mem::take(&mut board.joined_whitelist)
        });
    }

    async fn drive(&self, request: &mut ActionRequest) -> Result<B256, ActionFailure> {
        let kind = request.kind;
        let mut ctx = self.context();
        request.check_gates(&ctx)?;

        if request.required_eligibility.needs_lookup() {
            if let Some(account) = self.adapter.account() {
                let result = self.eligibility.check_eligibility(account).await;
                if result.eligibility.is_whitelisted() {
                    self.mark_joined();
                }
                ctx = ValidationContext {
                    eligibility: Some(result.eligibility),
                    ..self.context()
                };
            }
        }
        request.validate(&ctx)?;

        self.set_status(kind, ActionStatus::Submitted);
        let pending = self.proxy.submit(kind).await?;
        request.advance(RequestState::Submitted);
        debug!("{kind} submitted as {}", pending.hash());

        let hash = pending.wait().await?;
        request.advance(RequestState::Confirmed);
        if kind == ActionKind::JoinWhitelist {
            self.mark_joined();
        }
        self.poller.refresh().await;
        Ok(hash)
    }

    fn context(&self) -> ValidationContext {
        ValidationContext {
            connection: self.adapter.state(),
            network_valid: self.adapter.is_network_valid(),
            required_network: self.adapter.required_network(),
            snapshot: self.poller.snapshot(),
            eligibility: None,
        }
    }

    /// Claims the slot for `kind` unless a request for it is in flight.
    fn claim(&self, kind: ActionKind) -> bool {
        self.board.send_if_modified(|board| {
            if board.status(kind).is_in_flight() {
                false
            } else {
                board.statuses.insert(kind, ActionStatus::Validating);
                true
            }
        })
    }

    fn set_status(&self, kind: ActionKind, status: ActionStatus) {
        self.board.send_modify(|board| {
            board.statuses.insert(kind, status);
        });
    }

    fn mark_joined(&self) {
        self.board
            .send_if_modified(|board| !std::mem::replace(&mut board.joined_whitelist, true));
    }

    fn announce_failure(&self, kind: ActionKind, failure: ActionFailure) -> ActionFailure {
        info!("{kind} failed: {failure}");
        self.notifier.emit(Notice::ActionFailed {
            kind,
            message: failure.to_string(),
        });
        failure
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::U256;
    use api::mock::{MockChain, TxOutcome};

    use super::*;

    struct Fixture {
        chain: Arc<MockChain>,
        adapter: Arc<ChainProviderAdapter>,
        poller: Arc<PhasePoller>,
        gateway: ActionGateway,
        notifier: Notifier,
    }

    const NOW: u64 = 1_700_000_100;

    fn fixture(chain: Arc<MockChain>) -> Fixture {
        let config = MockChain::config();
        let notifier = Notifier::new();
        let adapter = Arc::new(ChainProviderAdapter::new(
            chain.handle(),
            config.required_chain_id,
            notifier.clone(),
        ));
        let proxy = Arc::new(ContractProxy::new(adapter.clone(), config));
        let poller = Arc::new(PhasePoller::with_clock(
            adapter.clone(),
            proxy.clone(),
            Arc::new(|| NOW),
        ));
        let eligibility = Arc::new(EligibilityChecker::new(proxy.clone()));
        let gateway = ActionGateway::new(
            adapter.clone(),
            proxy,
            poller.clone(),
            eligibility,
            notifier.clone(),
        );
        Fixture {
            chain,
            adapter,
            poller,
            gateway,
            notifier,
        }
    }

    fn open_presale(chain: &MockChain) {
        chain.with_state(|s| {
            s.presale_started = true;
            s.presale_time_ended = U256::from(NOW + 300);
        });
    }

    fn ctx(snapshot: Option<PhaseSnapshot>) -> ValidationContext {
        ValidationContext {
            connection: ConnectionState::Connected {
                network_id: 4,
                account: MockChain::USER,
            },
            network_valid: true,
            required_network: 4,
            snapshot,
            eligibility: None,
        }
    }

    fn snapshot(phase: SalePhase, is_owner: bool) -> PhaseSnapshot {
        PhaseSnapshot {
            phase,
            tokens_minted: U256::ZERO,
            whitelisted_count: 0,
            is_owner,
            owner_checked_for: Some(MockChain::USER),
            sampled_at: NOW,
        }
    }

    #[test]
    fn gates_fail_in_order() {
        let request = ActionRequest::new(ActionKind::StartPresale);

        let mut disconnected = ctx(None);
        disconnected.connection = ConnectionState::Disconnected;
        disconnected.network_valid = false;
        assert_eq!(
            request.check_gates(&disconnected),
            Err(ActionFailure::NotConnected)
        );

        let mut wrong_network = ctx(None);
        wrong_network.network_valid = false;
        assert_eq!(
            request.check_gates(&wrong_network),
            Err(ActionFailure::WrongNetwork { expected: 4 })
        );

        assert_eq!(request.check_gates(&ctx(None)), Err(ActionFailure::WrongPhase));
        assert_eq!(
            request.check_gates(&ctx(Some(snapshot(SalePhase::NotStarted, false)))),
            Err(ActionFailure::NotOwner)
        );
        assert_eq!(
            request.check_gates(&ctx(Some(snapshot(SalePhase::NotStarted, true)))),
            Ok(())
        );
    }

    #[test]
    fn ownership_sampled_for_another_account_does_not_count() {
        let request = ActionRequest::new(ActionKind::StartPresale);
        let mut ctx = ctx(Some(snapshot(SalePhase::NotStarted, true)));
        ctx.connection = ConnectionState::Connected {
            network_id: 4,
            account: MockChain::OWNER,
        };

        assert_eq!(request.check_gates(&ctx), Err(ActionFailure::NotOwner));
    }

    #[test]
    fn validating_holds_the_slot_like_a_submission() {
        let mut board = ActionBoard::default();
        board
            .statuses
            .insert(ActionKind::PresaleMint, ActionStatus::Validating);
        assert!(board.any_in_flight());

        board
            .statuses
            .insert(ActionKind::PresaleMint, ActionStatus::Failed);
        assert!(!board.any_in_flight());
    }

    #[test]
    fn unknown_eligibility_blocks() {
        let mut request = ActionRequest::new(ActionKind::PresaleMint);
        let mut ctx = ctx(Some(snapshot(SalePhase::PresaleOpen, false)));

        ctx.eligibility = Some(Eligibility::Unknown);
        assert_eq!(
            request.validate(&ctx),
            Err(ActionFailure::EligibilityUnknown)
        );
        assert!(request.state().is_failed());

        ctx.eligibility = Some(Eligibility::Whitelisted);
        let mut request = ActionRequest::new(ActionKind::PresaleMint);
        assert_eq!(request.validate(&ctx), Ok(()));
        assert!(request.state().is_validated());
    }

    #[tokio::test]
    async fn not_whitelisted_presale_mint_never_reaches_the_chain() {
        let f = fixture(MockChain::new(4));
        open_presale(&f.chain);
        f.adapter.connect().await;
        f.poller.refresh().await;
        let mut notices = f.notifier.subscribe();

        let result = f.gateway.perform(ActionKind::PresaleMint).await;

        assert_eq!(result, Err(ActionFailure::NotWhitelisted));
        assert!(f.chain.sent().is_empty());
        assert!(f.gateway.board().status(ActionKind::PresaleMint).is_failed());
        assert!(matches!(
            notices.try_recv(),
            Ok(Notice::ActionFailed {
                kind: ActionKind::PresaleMint,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn join_whitelist_marks_the_account_joined() {
        let f = fixture(MockChain::new(4));
        f.adapter.connect().await;
        f.poller.refresh().await;

        f.gateway.perform(ActionKind::JoinWhitelist).await.unwrap();

        assert!(f.gateway.board().joined_whitelist);
        // the refresh after confirmation already sees the new member
        assert_eq!(f.poller.snapshot().unwrap().whitelisted_count, 1);

        assert_eq!(
            f.gateway.perform(ActionKind::JoinWhitelist).await,
            Err(ActionFailure::AlreadyWhitelisted)
        );
        assert_eq!(f.chain.sent().len(), 1);

        f.gateway.forget_account();
        assert!(!f.gateway.board().joined_whitelist);
    }

    #[tokio::test]
    async fn start_presale_is_owner_only() {
        let f = fixture(MockChain::new(4));
        f.adapter.connect().await;
        f.poller.refresh().await;

        assert_eq!(
            f.gateway.perform(ActionKind::StartPresale).await,
            Err(ActionFailure::NotOwner)
        );

        f.chain.with_state(|s| s.owner = MockChain::USER);
        f.poller.refresh().await;
        f.gateway.perform(ActionKind::StartPresale).await.unwrap();
        assert_eq!(
            f.poller.snapshot().unwrap().phase,
            SalePhase::PresaleOpen
        );
    }

    #[tokio::test]
    async fn rejected_signature_is_reported_and_frees_the_slot() {
        let f = fixture(MockChain::new(4));
        f.chain.with_state(|s| {
            s.presale_started = true;
            s.presale_time_ended = U256::from(NOW - 1);
            s.tx_outcome = TxOutcome::Reject;
        });
        f.adapter.connect().await;
        f.poller.refresh().await;

        assert_eq!(
            f.gateway.perform(ActionKind::PublicMint).await,
            Err(ActionFailure::Rejected)
        );
        assert!(!f.gateway.board().any_in_flight());

        f.chain.with_state(|s| s.tx_outcome = TxOutcome::Success);
        assert!(f.gateway.perform(ActionKind::PublicMint).await.is_ok());
        assert_eq!(f.poller.snapshot().unwrap().tokens_minted, U256::from(1));
    }
}
