use api::Notice;
use dioxus::prelude::*;

use crate::{app_state_mut::AppStateMut, hooks::use_session_sync::dismiss_notice};

fn tone(notice: &Notice) -> &'static str {
    match notice {
        Notice::NetworkRestored | Notice::ActionConfirmed { .. } => "var(--pico-ins-color)",
        _ => "var(--pico-del-color)",
    }
}

/// The latest notice, dismissable. Renders nothing without one.
#[component]
pub fn NoticeBanner() -> Element {
    let app_state_mut = use_context::<AppStateMut>();
    let notice = app_state_mut.last_notice.read().clone();

    let Some(notice) = notice else {
        return rsx! {};
    };
    let color = tone(&notice);
    rsx! {
        div {
            role: "alert",
            style: "display: flex; justify-content: space-between; align-items: center; border-left: 4px solid {color}; padding: 0.5rem 1rem; margin-bottom: 1rem;",
            span { "{notice}" }
            a {
                href: "#",
                onclick: move |event| {
                    event.prevent_default();
                    dismiss_notice(app_state_mut);
                },
                "✕"
            }
        }
    }
}
