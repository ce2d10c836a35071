//! Process-wide authentication signals.

use tokio::sync::broadcast;

/// Authentication state changes observed by the client core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// A login produced a fresh credential pair.
    LoggedIn,
    /// A refresh cycle succeeded.
    Refreshed,
    /// The user logged out explicitly.
    LoggedOut,
    /// A refresh cycle failed; the session has been cleared and the
    /// application should send the user back to the login screen.
    AuthenticationLost { reason: String },
}

/// Broadcast channel for [`AuthEvent`]s.
///
/// Events are dropped when nobody is subscribed.
#[derive(Clone)]
pub struct AuthEvents {
    tx: broadcast::Sender<AuthEvent>,
}

impl AuthEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// Subscribe to future events.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: AuthEvent) {
        tracing::debug!(event = ?event, receivers = self.tx.receiver_count(), "Auth event");
        let _ = self.tx.send(event);
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new()
    }
}
