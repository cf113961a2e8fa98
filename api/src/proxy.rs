//! Typed façade over the whitelist and NFT sale contracts.

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;

use crate::{
    adapter::ChainProviderAdapter,
    config::SaleConfig,
    contracts::{ICryptoDevs, IWhitelist},
    error::{ChainError, ChainResult},
    pending::PendingTransaction,
};

/// The four mutating actions the client can perform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
pub enum ActionKind {
    #[strum(to_string = "Join whitelist")]
    JoinWhitelist,
    #[strum(to_string = "Presale mint")]
    PresaleMint,
    #[strum(to_string = "Public mint")]
    PublicMint,
    #[strum(to_string = "Start presale")]
    StartPresale,
}

impl ActionKind {
    pub const ALL: [ActionKind; 4] = [
        ActionKind::JoinWhitelist,
        ActionKind::PresaleMint,
        ActionKind::PublicMint,
        ActionKind::StartPresale,
    ];

    /// Whether the write carries the mint price.
    pub fn is_payable(self) -> bool {
        matches!(self, ActionKind::PresaleMint | ActionKind::PublicMint)
    }
}

pub struct ContractProxy {
    adapter: Arc<ChainProviderAdapter>,
    config: SaleConfig,
}

impl ContractProxy {
    pub fn new(adapter: Arc<ChainProviderAdapter>, config: SaleConfig) -> Self {
        Self { adapter, config }
    }

    pub fn config(&self) -> &SaleConfig {
        &self.config
    }

    // --- reads: always through the read-only handle ---

    pub async fn is_whitelisted(&self, account: Address) -> ChainResult<bool> {
        self.read(
            self.config.whitelist_contract,
            IWhitelist::whitelistedAddressesCall { account },
        )
        .await
    }

    pub async fn whitelisted_count(&self) -> ChainResult<u64> {
        let count = self
            .read(
                self.config.whitelist_contract,
                IWhitelist::numAddressesWhitelistedCall {},
            )
            .await?;
        Ok(u64::from(count))
    }

    pub async fn presale_started(&self) -> ChainResult<bool> {
        self.read(self.config.nft_contract, ICryptoDevs::presaleStartedCall {})
            .await
    }

    /// Unix seconds at which the presale window closes.
    pub async fn presale_time_ended(&self) -> ChainResult<U256> {
        self.read(self.config.nft_contract, ICryptoDevs::presaleTimeEndedCall {})
            .await
    }

    /// Whether the presale window closed before `now` (unix seconds).
    pub async fn presale_ended(&self, now: u64) -> ChainResult<bool> {
        Ok(self.presale_time_ended().await? < U256::from(now))
    }

    pub async fn tokens_minted(&self) -> ChainResult<U256> {
        self.read(self.config.nft_contract, ICryptoDevs::tokenIdsCall {})
            .await
    }

    pub async fn owner(&self) -> ChainResult<Address> {
        self.read(self.config.nft_contract, ICryptoDevs::ownerCall {})
            .await
    }

    // --- writes: need a signer, resolve to a pending transaction ---

    pub async fn join_whitelist(&self) -> ChainResult<PendingTransaction> {
        self.write(
            self.config.whitelist_contract,
            IWhitelist::addAddressToWhitelistCall {},
            None,
        )
        .await
    }

    pub async fn presale_mint(&self) -> ChainResult<PendingTransaction> {
        self.write(
            self.config.nft_contract,
            ICryptoDevs::presaleMintCall {},
            Some(self.config.mint_price),
        )
        .await
    }

    pub async fn public_mint(&self) -> ChainResult<PendingTransaction> {
        self.write(
            self.config.nft_contract,
            ICryptoDevs::mintCall {},
            Some(self.config.mint_price),
        )
        .await
    }

    pub async fn start_presale(&self) -> ChainResult<PendingTransaction> {
        self.write(
            self.config.nft_contract,
            ICryptoDevs::startPresaleCall {},
            None,
        )
        .await
    }

    /// Issues the write backing `kind`.
    pub async fn submit(&self, kind: ActionKind) -> ChainResult<PendingTransaction> {
        match kind {
            ActionKind::JoinWhitelist => self.join_whitelist().await,
            ActionKind::PresaleMint => self.presale_mint().await,
            ActionKind::PublicMint => self.public_mint().await,
            ActionKind::StartPresale => self.start_presale().await,
        }
    }

    async fn read<C: SolCall>(&self, to: Address, call: C) -> ChainResult<C::Return> {
        let data = self
            .adapter
            .read_only_handle()
            .call(to, Bytes::from(call.abi_encode()))
            .await?;
        Ok(C::abi_decode_returns(&data)?)
    }

    async fn write<C: SolCall>(
        &self,
        to: Address,
        call: C,
        value: Option<U256>,
    ) -> ChainResult<PendingTransaction> {
        let signer = self.adapter.get_signer().map_err(|e| match e {
            ChainError::NoSigner => ChainError::SignerRequired,
            other => other,
        })?;
        let hash = signer
            .send(to, value, Bytes::from(call.abi_encode()))
            .await?;
        Ok(PendingTransaction::new(
            hash,
            signer.provider().clone(),
            self.config.confirmation_timeout,
            self.config.receipt_poll_interval,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{mock::MockChain, notice::Notifier};

    fn proxy(chain: &Arc<MockChain>) -> (ContractProxy, Arc<ChainProviderAdapter>) {
        let config = MockChain::config();
        let adapter = Arc::new(ChainProviderAdapter::new(
            chain.handle(),
            config.required_chain_id,
            Notifier::new(),
        ));
        (ContractProxy::new(adapter.clone(), config), adapter)
    }

    #[tokio::test]
    async fn reads_decode_contract_state() {
        let chain = MockChain::new(4);
        chain.with_state(|s| {
            s.presale_started = true;
            s.presale_time_ended = U256::from(1_700_000_000u64);
            s.token_ids = U256::from(7);
            s.whitelisted.insert(MockChain::USER);
        });
        let (proxy, _) = proxy(&chain);

        assert!(proxy.presale_started().await.unwrap());
        assert!(proxy.presale_ended(1_700_000_001).await.unwrap());
        assert!(!proxy.presale_ended(1_700_000_000).await.unwrap());
        assert_eq!(proxy.tokens_minted().await.unwrap(), U256::from(7));
        assert_eq!(proxy.owner().await.unwrap(), MockChain::OWNER);
        assert!(proxy.is_whitelisted(MockChain::USER).await.unwrap());
        assert!(!proxy.is_whitelisted(MockChain::OWNER).await.unwrap());
        assert_eq!(proxy.whitelisted_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn writes_require_a_signer() {
        let chain = MockChain::new(4);
        let (proxy, _) = proxy(&chain);

        let err = proxy.public_mint().await.unwrap_err();
        assert_eq!(err, ChainError::SignerRequired);
        assert!(chain.sent().is_empty());
    }

    #[tokio::test]
    async fn mints_attach_the_fixed_price() {
        let chain = MockChain::new(4);
        let (proxy, adapter) = proxy(&chain);
        adapter.connect().await;

        proxy.public_mint().await.unwrap().wait().await.unwrap();
        proxy.join_whitelist().await.unwrap().wait().await.unwrap();

        let sent = chain.sent();
        assert_eq!(sent[0].value, Some(MockChain::config().mint_price));
        assert_eq!(sent[0].to, MockChain::NFT);
        assert_eq!(sent[1].value, None);
        assert_eq!(sent[1].to, MockChain::WHITELIST);
    }

    #[tokio::test(start_paused = true)]
    async fn reverted_and_stuck_transactions_fail() {
        let chain = MockChain::new(4);
        let (proxy, adapter) = proxy(&chain);
        adapter.connect().await;

        chain.with_state(|s| s.tx_outcome = crate::mock::TxOutcome::Revert);
        let pending = proxy.public_mint().await.unwrap();
        let hash = pending.hash();
        assert_eq!(
            pending.wait().await,
            Err(ChainError::TransactionReverted(hash))
        );

        chain.with_state(|s| s.tx_outcome = crate::mock::TxOutcome::Pending);
        let pending = proxy.public_mint().await.unwrap();
        let hash = pending.hash();
        assert_eq!(
            pending.wait().await,
            Err(ChainError::TransactionTimeout(hash))
        );
    }
}
