use dioxus::prelude::*;
use dioxus_logger::tracing::warn;
use tokio::sync::broadcast::error::RecvError;

use crate::{app_state::AppState, app_state_mut::AppStateMut};

/// Mirrors the session's channels into the [`AppStateMut`] signals.
///
/// Any change to the connection, the snapshot or an action's progress
/// re-derives the UI state. Only the latest notice is kept.
pub fn use_session_sync() {
    let app_state = use_context::<AppState>();
    let app_state_mut = use_context::<AppStateMut>();

    use_coroutine(move |_rx: UnboundedReceiver<()>| {
        let session = app_state.clone();
        let mut state = app_state_mut;
        async move {
            let mut connection = session.adapter().watch();
            let mut snapshot = session.poller().watch();
            let mut board = session.gateway().watch();
            let mut notices = session.notifier().subscribe();
            loop {
                state.sync(&session);
                tokio::select! {
                    changed = connection.changed() => if changed.is_err() { break },
                    changed = snapshot.changed() => if changed.is_err() { break },
                    changed = board.changed() => if changed.is_err() { break },
                    notice = notices.recv() => match notice {
                        Ok(notice) => state.last_notice.set(Some(notice)),
                        Err(RecvError::Lagged(n)) => warn!("dropped {n} notices"),
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        }
    });
}

/// Clears the notice banner.
pub fn dismiss_notice(mut state: AppStateMut) {
    state.last_notice.set(None);
}
