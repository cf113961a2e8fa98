//! An in-memory chain with the two sale contracts deployed, for tests.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};

use alloy_primitives::{address, Address, B256, Bytes, U256, U64};
use alloy_sol_types::{SolCall, SolValue};
use serde_json::{json, Value};
use tokio::sync::broadcast;

use crate::{
    config::SaleConfig,
    contracts::{ICryptoDevs, IWhitelist},
    error::{ChainError, ChainResult, USER_REJECTED_CODE},
    provider::{ChainProvider, ProviderEvent, ProviderHandle, TransactionRequest},
};

/// What happens to the next submitted transaction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TxOutcome {
    #[default]
    Success,
    Revert,
    /// Never mined until [`MockChain::mine_pending`] is called.
    Pending,
    /// The user declines to sign.
    Reject,
}

#[derive(Debug)]
pub struct MockState {
    pub chain_id: u64,
    pub accounts: Vec<Address>,
    pub no_wallet: bool,
    pub reject_connect: bool,
    pub connect_delay: Option<Duration>,
    pub presale_started: bool,
    pub presale_time_ended: U256,
    pub token_ids: U256,
    pub owner: Address,
    pub whitelisted: HashSet<Address>,
    /// Contract functions (by name) whose reads fail with a transport error.
    pub failing_reads: HashSet<&'static str>,
    pub tx_outcome: TxOutcome,
    /// Unix seconds used when `startPresale` sets the end of the window.
    pub now: u64,
    connect_prompts: usize,
    reads: HashMap<&'static str, usize>,
    sent: Vec<TransactionRequest>,
    receipts: HashMap<B256, Option<bool>>,
    pending: Vec<(B256, TransactionRequest)>,
}

pub struct MockChain {
    state: Mutex<MockState>,
    events: broadcast::Sender<ProviderEvent>,
}

impl MockChain {
    pub const USER: Address = address!("0x1111111111111111111111111111111111111111");
    pub const OWNER: Address = address!("0x2222222222222222222222222222222222222222");
    pub const WHITELIST: Address = address!("0x3333333333333333333333333333333333333333");
    pub const NFT: Address = address!("0x4444444444444444444444444444444444444444");

    /// A chain reporting `chain_id`, with `USER` as the wallet account and
    /// `OWNER` owning the sale contract.
    pub fn new(chain_id: u64) -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            state: Mutex::new(MockState {
                chain_id,
                accounts: vec![Self::USER],
                no_wallet: false,
                reject_connect: false,
                connect_delay: None,
                presale_started: false,
                presale_time_ended: U256::ZERO,
                token_ids: U256::ZERO,
                owner: Self::OWNER,
                whitelisted: HashSet::new(),
                failing_reads: HashSet::new(),
                tx_outcome: TxOutcome::Success,
                now: 1_700_000_000,
                connect_prompts: 0,
                reads: HashMap::new(),
                sent: Vec::new(),
                receipts: HashMap::new(),
                pending: Vec::new(),
            }),
            events,
        })
    }

    /// Configuration matching the deployed mock contracts.
    pub fn config() -> SaleConfig {
        SaleConfig {
            required_chain_id: 4,
            mint_price: U256::from(crate::config::DEFAULT_MINT_PRICE_WEI),
            whitelist_contract: Self::WHITELIST,
            nft_contract: Self::NFT,
            poll_interval: Duration::from_secs(5),
            confirmation_timeout: Duration::from_secs(60),
            receipt_poll_interval: Duration::from_secs(1),
        }
    }

    pub fn handle(self: &Arc<Self>) -> ProviderHandle {
        ProviderHandle::from_arc(self.clone())
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        let mut state = self.state.lock().expect("mock state poisoned");
        f(&mut state)
    }

    pub fn connect_prompts(&self) -> usize {
        self.with_state(|s| s.connect_prompts)
    }

    /// How many times the named contract function was read.
    pub fn reads_of(&self, function: &str) -> usize {
        self.with_state(|s| s.reads.get(function).copied().unwrap_or_default())
    }

    pub fn sent(&self) -> Vec<TransactionRequest> {
        self.with_state(|s| s.sent.clone())
    }

    /// Mines every transaction submitted under [`TxOutcome::Pending`].
    pub fn mine_pending(&self) {
        self.with_state(|s| {
            for (hash, tx) in std::mem::take(&mut s.pending) {
                apply(s, &tx);
                s.receipts.insert(hash, Some(true));
            }
        })
    }

    /// Simulates the user switching networks in the wallet.
    pub fn switch_chain(&self, chain_id: u64) {
        self.with_state(|s| s.chain_id = chain_id);
        let _ = self.events.send(ProviderEvent::ChainChanged(chain_id));
    }

    pub fn emit(&self, event: ProviderEvent) {
        let _ = self.events.send(event);
    }

    fn dispatch(&self, method: &str, params: &Value) -> ChainResult<Value> {
        let mut state = self.state.lock().expect("mock state poisoned");
        if state.no_wallet {
            return Err(ChainError::NoWallet);
        }
        match method {
            "eth_chainId" => Ok(json!(U64::from(state.chain_id))),
            "eth_requestAccounts" => {
                state.connect_prompts += 1;
                if state.reject_connect {
                    Err(ChainError::from_rpc(USER_REJECTED_CODE, "User rejected"))
                } else {
                    Ok(json!(state.accounts))
                }
            }
            "eth_accounts" => Ok(json!(state.accounts)),
            "eth_call" => {
                let to: Address = serde_json::from_value(params[0]["to"].clone())?;
                let data: Bytes = serde_json::from_value(params[0]["data"].clone())?;
                let out = call(&mut state, to, &data)?;
                Ok(json!(out))
            }
            "eth_sendTransaction" => {
                let tx: TransactionRequest = serde_json::from_value(params[0].clone())?;
                if state.tx_outcome == TxOutcome::Reject {
                    return Err(ChainError::from_rpc(USER_REJECTED_CODE, "User denied"));
                }
                state.sent.push(tx.clone());
                let hash = B256::with_last_byte(state.sent.len() as u8);
                let outcome = state.tx_outcome;
                match outcome {
                    TxOutcome::Success => {
                        apply(&mut state, &tx);
                        state.receipts.insert(hash, Some(true));
                    }
                    TxOutcome::Revert => {
                        state.receipts.insert(hash, Some(false));
                    }
                    TxOutcome::Pending | TxOutcome::Reject => {
                        state.pending.push((hash, tx));
                    }
                }
                Ok(json!(hash))
            }
            "eth_getTransactionReceipt" => {
                let hash: B256 = serde_json::from_value(params[0].clone())?;
                Ok(match state.receipts.get(&hash) {
                    Some(Some(ok)) => json!({ "status": U64::from(u64::from(*ok)) }),
                    _ => Value::Null,
                })
            }
            other => Err(ChainError::Rpc {
                code: -32601,
                message: format!("method {other} not found"),
            }),
        }
    }
}

fn call(state: &mut MockState, to: Address, data: &[u8]) -> ChainResult<Bytes> {
    if data.len() < 4 {
        return Err(ChainError::Rpc {
            code: -32000,
            message: "execution reverted".into(),
        });
    }
    let selector = &data[..4];
    let (name, encoded): (&'static str, Vec<u8>) = if to == MockChain::WHITELIST {
        if selector == IWhitelist::whitelistedAddressesCall::SELECTOR {
            let decoded = IWhitelist::whitelistedAddressesCall::abi_decode(data)?;
            (
                "whitelistedAddresses",
                state.whitelisted.contains(&decoded.account).abi_encode(),
            )
        } else if selector == IWhitelist::numAddressesWhitelistedCall::SELECTOR {
            (
                "numAddressesWhitelisted",
                U256::from(state.whitelisted.len()).abi_encode(),
            )
        } else {
            return Err(unknown_selector());
        }
    } else if to == MockChain::NFT {
        if selector == ICryptoDevs::ownerCall::SELECTOR {
            ("owner", state.owner.abi_encode())
        } else if selector == ICryptoDevs::presaleStartedCall::SELECTOR {
            ("presaleStarted", state.presale_started.abi_encode())
        } else if selector == ICryptoDevs::presaleTimeEndedCall::SELECTOR {
            ("presaleTimeEnded", state.presale_time_ended.abi_encode())
        } else if selector == ICryptoDevs::tokenIdsCall::SELECTOR {
            ("tokenIds", state.token_ids.abi_encode())
        } else {
            return Err(unknown_selector());
        }
    } else {
        // no code at the address
        return Ok(Bytes::new());
    };

    *state.reads.entry(name).or_default() += 1;
    if state.failing_reads.contains(name) {
        return Err(ChainError::Transport("connection reset by peer".into()));
    }
    Ok(Bytes::from(encoded))
}

fn unknown_selector() -> ChainError {
    ChainError::Rpc {
        code: -32000,
        message: "execution reverted: unknown selector".into(),
    }
}

/// Applies the effects of a mined transaction.
fn apply(state: &mut MockState, tx: &TransactionRequest) {
    let Some(selector) = tx.data.get(..4) else {
        return;
    };
    if selector == IWhitelist::addAddressToWhitelistCall::SELECTOR {
        state.whitelisted.insert(tx.from);
    } else if selector == ICryptoDevs::presaleMintCall::SELECTOR
        || selector == ICryptoDevs::mintCall::SELECTOR
    {
        state.token_ids += U256::from(1);
    } else if selector == ICryptoDevs::startPresaleCall::SELECTOR {
        state.presale_started = true;
        state.presale_time_ended = U256::from(state.now + 300);
    }
}

#[async_trait::async_trait]
impl ChainProvider for MockChain {
    async fn request(&self, method: &str, params: Value) -> ChainResult<Value> {
        if method == "eth_requestAccounts" {
            let delay = self.with_state(|s| s.connect_delay);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
        }
        self.dispatch(method, &params)
    }

    fn subscribe(&self) -> broadcast::Receiver<ProviderEvent> {
        self.events.subscribe()
    }
}
