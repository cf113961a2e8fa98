// The client-side Dioxus application logic, and the sale-state core it renders.

use dioxus::prelude::*;

mod app_state;
mod app_state_mut;
mod components;
pub mod eligibility;
pub mod gateway;
pub mod hooks;
pub mod poller;
mod screens;
pub mod session;
pub mod snapshot;
pub mod tasks;
pub mod view_state;

pub use api::compat;

use app_state::AppState;
use app_state_mut::AppStateMut;
use components::pico::Container;
use hooks::use_session_sync::use_session_sync;
use screens::mint::MintScreen;
use session::MintSession;

const PICO_CSS: &str = "https://cdn.jsdelivr.net/npm/@picocss/pico@2/css/pico.cyan.min.css";

//=============================================================================
// MAIN APPLICATION COMPONENT (Client-side)
//=============================================================================

#[allow(non_snake_case)]
pub fn App() -> Element {
    let responsive_css = r#"
    html, body { min-height: 100%; margin: 0; }
    main.container { max-width: 640px; padding-top: 3rem; }
    [aria-busy="true"] { cursor: progress; }
    footer { text-align: center; color: var(--pico-muted-color); }
"#;

    rsx! {
        document::Meta {
            name: "viewport",
            content: "width=device-width, initial-scale=1.0",
        }
        document::Stylesheet {
            href: PICO_CSS,
        }
        style {
            "{responsive_css}"
        }
        LoadedApp {
            app_state: AppState::new(MintSession::global()),
        }
    }
}

/// Owns the session's context and its signal mirror.
#[component]
fn LoadedApp(app_state: AppState) -> Element {
    // Provide the stable, non-reactive AppState.
    use_context_provider(|| app_state.clone());

    let session = app_state.clone();
    use_hook(move || session.start());

    let ui_state = use_signal(|| app_state.ui_state());
    let snapshot = use_signal(|| app_state.poller().snapshot());
    let connection = use_signal(|| app_state.adapter().state());
    let last_notice = use_signal(|| None);
    use_context_provider(|| AppStateMut {
        ui_state,
        snapshot,
        connection,
        last_notice,
    });

    use_session_sync();

    rsx! {
        Container {
            MintScreen {}
            footer { "Made with ❤ by Crypto Devs" }
        }
    }
}
