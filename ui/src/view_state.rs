use alloy_primitives::Address;

use crate::snapshot::PhaseSnapshot;

/// What the mint screen shows. Always derived, never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::EnumIs, strum::Display)]
pub enum UiState {
    WalletDisconnected,
    WrongNetwork,
    Loading,
    OwnerCanStart,
    PresaleNotStarted,
    PresaleOpen,
    PresaleOpenAlreadyJoined,
    PublicSaleOpen,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DerivationInputs {
    pub connected: bool,
    /// The connected account, matched against the one the snapshot's owner
    /// flag was sampled for.
    pub account: Option<Address>,
    pub network_valid: bool,
    pub snapshot: Option<PhaseSnapshot>,
    pub action_in_flight: bool,
    pub joined_whitelist: bool,
}

/// Maps the inputs to a single state by fixed precedence: connection,
/// network, in-flight action, then sale phase. Until a first snapshot
/// exists the phase is unknown and the screen shows `Loading`.
///
/// `action_in_flight` covers a request still being validated as well as a
/// submitted one: the eligibility read runs after the slot is claimed, and
/// the button must not offer a second click in between.
pub fn derive_ui_state(inputs: &DerivationInputs) -> UiState {
    if !inputs.connected {
        return UiState::WalletDisconnected;
    }
    if !inputs.network_valid {
        return UiState::WrongNetwork;
    }
    if inputs.action_in_flight {
        return UiState::Loading;
    }
    let Some(snapshot) = inputs.snapshot else {
        return UiState::Loading;
    };
    if snapshot.is_owned_by(inputs.account) && !snapshot.presale_started() {
        UiState::OwnerCanStart
    } else if !snapshot.presale_started() {
        UiState::PresaleNotStarted
    } else if !snapshot.presale_ended() && inputs.joined_whitelist {
        UiState::PresaleOpenAlreadyJoined
    } else if !snapshot.presale_ended() {
        UiState::PresaleOpen
    } else {
        UiState::PublicSaleOpen
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::U256;

    use super::*;
    use crate::snapshot::SalePhase;

    const ME: Address = Address::repeat_byte(0x11);

    fn snapshot(phase: SalePhase, is_owner: bool) -> Option<PhaseSnapshot> {
        Some(PhaseSnapshot {
            phase,
            tokens_minted: U256::from(5),
            whitelisted_count: 2,
            is_owner,
            owner_checked_for: Some(ME),
            sampled_at: 0,
        })
    }

    fn ready(snapshot: Option<PhaseSnapshot>) -> DerivationInputs {
        DerivationInputs {
            connected: true,
            account: Some(ME),
            network_valid: true,
            snapshot,
            ..Default::default()
        }
    }

    #[test]
    fn phase_states() {
        let cases = [
            (snapshot(SalePhase::NotStarted, true), false, UiState::OwnerCanStart),
            (snapshot(SalePhase::NotStarted, false), true, UiState::PresaleNotStarted),
            (snapshot(SalePhase::PresaleOpen, false), false, UiState::PresaleOpen),
            (
                snapshot(SalePhase::PresaleOpen, true),
                true,
                UiState::PresaleOpenAlreadyJoined,
            ),
            (snapshot(SalePhase::Ended, true), true, UiState::PublicSaleOpen),
            (None, false, UiState::Loading),
        ];
        for (snapshot, joined, expected) in cases {
            let inputs = DerivationInputs {
                joined_whitelist: joined,
                ..ready(snapshot)
            };
            assert_eq!(derive_ui_state(&inputs), expected, "{inputs:?}");
        }
    }

    #[test]
    fn owner_flag_for_another_account_is_ignored() {
        let inputs = DerivationInputs {
            account: Some(Address::repeat_byte(0x55)),
            ..ready(snapshot(SalePhase::NotStarted, true))
        };
        assert_eq!(derive_ui_state(&inputs), UiState::PresaleNotStarted);
    }

    #[test]
    fn precedence_is_fixed() {
        let phases = [
            None,
            snapshot(SalePhase::NotStarted, true),
            snapshot(SalePhase::PresaleOpen, false),
            snapshot(SalePhase::Ended, false),
        ];
        for snapshot in phases {
            for flags in 0..8u8 {
                let inputs = DerivationInputs {
                    connected: true,
                    account: Some(ME),
                    network_valid: flags & 1 != 0,
                    snapshot,
                    action_in_flight: flags & 2 != 0,
                    joined_whitelist: flags & 4 != 0,
                };
                let state = derive_ui_state(&inputs);
                // pure: same inputs, same answer
                assert_eq!(state, derive_ui_state(&inputs));

                if !inputs.network_valid {
                    assert_eq!(state, UiState::WrongNetwork);
                } else if inputs.action_in_flight {
                    assert_eq!(state, UiState::Loading);
                }

                let disconnected = DerivationInputs {
                    connected: false,
                    ..inputs
                };
                assert_eq!(
                    derive_ui_state(&disconnected),
                    UiState::WalletDisconnected
                );
            }
        }
    }
}
