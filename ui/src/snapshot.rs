use alloy_primitives::{Address, U256};

/// Where the sale is in its one-way lifecycle.
///
/// Encoding the phase as one value rather than two flags makes "ended but
/// never started" unrepresentable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::EnumIs)]
pub enum SalePhase {
    NotStarted,
    /// Presale started and its window has not closed.
    PresaleOpen,
    /// Presale window closed; public sale.
    Ended,
}

impl SalePhase {
    pub fn from_flags(presale_started: bool, presale_ended: bool) -> Self {
        match (presale_started, presale_ended) {
            (false, _) => SalePhase::NotStarted,
            (true, false) => SalePhase::PresaleOpen,
            (true, true) => SalePhase::Ended,
        }
    }
}

/// An immutable, internally consistent sample of on-chain sale state.
///
/// Produced only by the phase poller, which replaces it wholesale on every
/// successful tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseSnapshot {
    pub phase: SalePhase,
    pub tokens_minted: U256,
    pub whitelisted_count: u64,
    /// Whether `owner_checked_for` owns the sale contract. Never true
    /// unless the owner read succeeded and matched.
    pub is_owner: bool,
    /// The account the owner read was compared against.
    pub owner_checked_for: Option<Address>,
    /// Unix seconds.
    pub sampled_at: u64,
}

impl PhaseSnapshot {
    pub fn presale_started(&self) -> bool {
        !self.phase.is_not_started()
    }

    pub fn presale_ended(&self) -> bool {
        self.phase.is_ended()
    }

    /// Ownership as it applies to `account`. An owner flag sampled for a
    /// different account, or for none, counts as not owner.
    pub fn is_owned_by(&self, account: Option<Address>) -> bool {
        self.is_owner && account.is_some() && self.owner_checked_for == account
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ended_implies_started() {
        for started in [false, true] {
            for ended in [false, true] {
                let snapshot = PhaseSnapshot {
                    phase: SalePhase::from_flags(started, ended),
                    tokens_minted: U256::ZERO,
                    whitelisted_count: 0,
                    is_owner: false,
                    owner_checked_for: None,
                    sampled_at: 0,
                };
                if snapshot.presale_ended() {
                    assert!(snapshot.presale_started());
                }
            }
        }
        assert_eq!(SalePhase::from_flags(false, true), SalePhase::NotStarted);
    }

    #[test]
    fn ownership_is_tied_to_the_sampled_account() {
        let owner = Address::repeat_byte(0x22);
        let snapshot = PhaseSnapshot {
            phase: SalePhase::NotStarted,
            tokens_minted: U256::ZERO,
            whitelisted_count: 0,
            is_owner: true,
            owner_checked_for: Some(owner),
            sampled_at: 0,
        };

        assert!(snapshot.is_owned_by(Some(owner)));
        assert!(!snapshot.is_owned_by(Some(Address::repeat_byte(0x55))));
        assert!(!snapshot.is_owned_by(None));
    }
}
