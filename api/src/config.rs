//! Sale configuration: required network, mint price, contract addresses and
//! timing.

use std::{env, str::FromStr, time::Duration};

use alloy_primitives::{Address, U256};
use dioxus_logger::tracing::warn;

/// Rinkeby, the network the sale contracts are deployed on.
pub const DEFAULT_CHAIN_ID: u64 = 4;

/// 0.01 ether, in wei.
pub const DEFAULT_MINT_PRICE_WEI: u64 = 10_000_000_000_000_000;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Everything the client needs to know about the deployed sale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SaleConfig {
    /// The single network id on which actions are allowed.
    pub required_chain_id: u64,
    /// Attached as `value` to every mint. Never user input.
    pub mint_price: U256,
    pub whitelist_contract: Address,
    pub nft_contract: Address,
    /// Cadence of both the sale-phase and the supply timers.
    pub poll_interval: Duration,
    /// Upper bound on waiting for a submitted transaction to be mined.
    pub confirmation_timeout: Duration,
    /// How often a pending transaction polls for its receipt.
    pub receipt_poll_interval: Duration,
}

impl SaleConfig {
    /// Builds the configuration from environment variables, with in-code
    /// defaults.
    ///
    /// A variable set at runtime wins over one baked in at compile time (the
    /// only option in the browser).
    ///
    /// # Environment Variables
    /// - `REQUIRED_CHAIN_ID`: decimal network id. defaults to 4.
    /// - `MINT_PRICE_WEI`: decimal or 0x-hex amount. defaults to 0.01 ether.
    /// - `WHITELIST_CONTRACT_ADDRESS`, `NFT_CONTRACT_ADDRESS`: 0x addresses.
    /// - `POLL_INTERVAL_SECS`: defaults to 5.
    /// - `CONFIRMATION_TIMEOUT_SECS`: defaults to 300.
    /// - `RECEIPT_POLL_MILLIS`: defaults to 1000.
    pub fn from_env() -> Self {
        let required_chain_id = parsed(setting(
            "REQUIRED_CHAIN_ID",
            option_env!("REQUIRED_CHAIN_ID"),
        ))
        .unwrap_or(DEFAULT_CHAIN_ID);

        let mint_price = parsed(setting("MINT_PRICE_WEI", option_env!("MINT_PRICE_WEI")))
            .unwrap_or(U256::from(DEFAULT_MINT_PRICE_WEI));

        let whitelist_contract = contract_address(
            "WHITELIST_CONTRACT_ADDRESS",
            option_env!("WHITELIST_CONTRACT_ADDRESS"),
        );
        let nft_contract =
            contract_address("NFT_CONTRACT_ADDRESS", option_env!("NFT_CONTRACT_ADDRESS"));

        let poll_interval = parsed(setting(
            "POLL_INTERVAL_SECS",
            option_env!("POLL_INTERVAL_SECS"),
        ))
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_POLL_INTERVAL);

        let confirmation_timeout = parsed(setting(
            "CONFIRMATION_TIMEOUT_SECS",
            option_env!("CONFIRMATION_TIMEOUT_SECS"),
        ))
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_CONFIRMATION_TIMEOUT);

        let receipt_poll_interval = parsed(setting(
            "RECEIPT_POLL_MILLIS",
            option_env!("RECEIPT_POLL_MILLIS"),
        ))
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_RECEIPT_POLL_INTERVAL);

        Self {
            required_chain_id,
            mint_price,
            whitelist_contract,
            nft_contract,
            poll_interval,
            confirmation_timeout,
            receipt_poll_interval,
        }
    }
}

impl Default for SaleConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

fn setting(name: &str, baked: Option<&'static str>) -> Option<String> {
    env::var(name).ok().or_else(|| baked.map(str::to_string))
}

fn parsed<T: FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|v| v.trim().parse().ok())
}

fn contract_address(name: &str, baked: Option<&'static str>) -> Address {
    match parsed::<Address>(setting(name, baked)) {
        Some(address) => address,
        None => {
            warn!("{name} is not set or invalid; using the zero address");
            Address::ZERO
        }
    }
}
