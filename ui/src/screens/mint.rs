//=============================================================================
// File: src/screens/mint.rs
//=============================================================================
use api::ActionKind;
use dioxus::prelude::*;
use dioxus_logger::tracing::debug;

use crate::{
    app_state::AppState,
    app_state_mut::AppStateMut,
    components::{notice_banner::NoticeBanner, pico::{Button, ButtonType, Card}},
    view_state::UiState,
};

#[component]
pub fn MintScreen() -> Element {
    let app_state = use_context::<AppState>();
    let app_state_mut = use_context::<AppStateMut>();

    let session = app_state.clone();
    let connect = use_callback(move |_: ()| {
        let session = session.clone();
        spawn(async move {
            session.connect().await;
        });
    });

    let session = app_state.clone();
    let perform = use_callback(move |kind: ActionKind| {
        let session = session.clone();
        spawn(async move {
            // failures reach the user as notices
            if let Err(e) = session.perform(kind).await {
                debug!("{kind}: {e}");
            }
        });
    });

    let ui_state = *app_state_mut.ui_state.read();
    let snapshot = *app_state_mut.snapshot.read();
    let account = app_state_mut.connection.read().account();
    let required_network = app_state.config().required_chain_id;

    let body = match ui_state {
        UiState::WalletDisconnected => rsx! {
            Button {
                on_click: move |_| connect.call(()),
                "Connect your wallet"
            }
        },
        UiState::WrongNetwork => rsx! {
            p { "Please switch your wallet to network {required_network}." }
        },
        UiState::Loading => rsx! {
            Button {
                busy: true,
                "Loading..."
            }
        },
        UiState::OwnerCanStart => rsx! {
            Button {
                on_click: move |_| perform.call(ActionKind::StartPresale),
                "Start presale!"
            }
        },
        UiState::PresaleNotStarted => rsx! {
            p { "Presale hasn't started yet." }
            JoinWhitelistButton { perform }
        },
        UiState::PresaleOpen => rsx! {
            p { "Presale has started! If your address is whitelisted, mint a Crypto Dev 🥳" }
            div {
                role: "group",
                JoinWhitelistButton { perform }
                Button {
                    on_click: move |_| perform.call(ActionKind::PresaleMint),
                    "Presale Mint 🚀"
                }
            }
        },
        UiState::PresaleOpenAlreadyJoined => rsx! {
            p { "Thanks for joining the Whitelist!" }
            Button {
                on_click: move |_| perform.call(ActionKind::PresaleMint),
                "Presale Mint 🚀"
            }
        },
        UiState::PublicSaleOpen => rsx! {
            p { "The presale has ended. Anyone can mint now." }
            Button {
                on_click: move |_| perform.call(ActionKind::PublicMint),
                "Public Mint 🚀"
            }
        },
    };

    rsx! {
        Card {
            title: "Welcome to Crypto Devs!",
            p { "It's an NFT collection for developers in Crypto." }
            if let Some(snapshot) = snapshot {
                p { "{snapshot.tokens_minted} have been minted" }
                p { "{snapshot.whitelisted_count} have already joined the Whitelist" }
            }
            if let Some(account) = account {
                p {
                    small { "Connected as {account}" }
                }
            }
            NoticeBanner {}
            {body}
        }
    }
}

#[component]
fn JoinWhitelistButton(perform: Callback<ActionKind>) -> Element {
    rsx! {
        Button {
            button_type: ButtonType::Secondary,
            outline: true,
            on_click: move |_| perform.call(ActionKind::JoinWhitelist),
            "Join the Whitelist"
        }
    }
}
