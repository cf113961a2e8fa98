//! User-facing notifications, emitted as structured events for whatever
//! presentation layer is listening.

use tokio::sync::broadcast;

use crate::proxy::ActionKind;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    /// No browser wallet is installed.
    NoWallet,
    /// The connect popup was dismissed. Connecting can be offered again.
    ConnectionRejected,
    /// Emitted once per wrong-network episode.
    SwitchNetwork { expected: u64, actual: u64 },
    /// The wallet is back on the required network.
    NetworkRestored,
    ActionConfirmed { kind: ActionKind },
    ActionFailed { kind: ActionKind, message: String },
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::NoWallet => write!(f, "No wallet found. Install MetaMask to continue."),
            Notice::ConnectionRejected => write!(f, "Wallet connection was declined."),
            Notice::SwitchNetwork { expected, .. } => {
                write!(f, "Please switch your wallet to network {expected}.")
            }
            Notice::NetworkRestored => write!(f, "Connected to the right network."),
            Notice::ActionConfirmed { kind } => write!(f, "{kind} confirmed."),
            Notice::ActionFailed { kind, message } => write!(f, "{kind} failed: {message}"),
        }
    }
}

/// Fan-out of [`Notice`]s. Sending never fails, even with no listeners.
#[derive(Clone, Debug)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(32);
        Self { tx }
    }

    pub fn emit(&self, notice: Notice) {
        let _ = self.tx.send(notice);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
