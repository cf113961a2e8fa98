//! Defines the mutable, reactive state for the application's UI.

use api::{ConnectionState, Notice};
use dioxus::prelude::*;

use crate::{session::MintSession, snapshot::PhaseSnapshot, view_state::UiState};

/// A reactive state provided as a Dioxus context for mutable UI data.
///
/// Each signal mirrors a channel owned by the session; the view only reads
/// them, and only [`AppStateMut::sync`] writes them.
#[derive(Clone, Copy)]
pub struct AppStateMut {
    pub ui_state: Signal<UiState>,
    /// `None` until the first sale-state sample lands.
    pub snapshot: Signal<Option<PhaseSnapshot>>,
    pub connection: Signal<ConnectionState>,
    /// The most recent user-facing notice, until dismissed.
    pub last_notice: Signal<Option<Notice>>,
}

impl AppStateMut {
    /// Copies the session's current state into the signals.
    pub fn sync(&mut self, session: &MintSession) {
        self.connection.set(session.adapter().state());
        self.snapshot.set(session.poller().snapshot());
        self.ui_state.set(session.ui_state());
    }
}
