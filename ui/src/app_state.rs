use std::{ops::Deref, sync::Arc};

use crate::session::MintSession;

/// The stable, non-reactive half of the app state: the mint session.
#[derive(Clone)]
pub struct AppState(Arc<MintSession>);

impl Deref for AppState {
    type Target = Arc<MintSession>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// one session per process, so identity is equality
impl PartialEq for AppState {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl AppState {
    pub fn new(session: Arc<MintSession>) -> Self {
        Self(session)
    }
}
