//! Remote Change Channel
//!
//! Decides how the engine reacts to push events from the server. The
//! central rule: while a local save is scheduled or in flight, change
//! notifications are dropped, since they are most likely the echo of this
//! client's own write and refetching would overwrite unsent edits.
//!
//! This cannot tell an echo apart from a genuinely concurrent edit by
//! another session; the later local save wins in that case.

use serde_json::Value;

use super::session::Session;

/// Default identity whose changes concern every session
pub const DEFAULT_PRIVILEGED_IDENTITY: &str = "admin";

/// "Data changed for identity X"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
    pub affected_identity: String,
}

/// Events delivered by the push transport
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteEvent {
    DataChanged(ChangeNotification),
    /// Single/multi-user mode was toggled by session `origin`
    ModeChanged { origin: Option<String> },
    /// Server-side content refresh of one widget
    WidgetData { widget_id: String, data: Value },
    /// Transport (re)established and authenticated
    Connected { reconnect: bool },
    Disconnected,
}

/// Why a full fetch is issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchReason {
    ColdStart,
    Notification,
    Reconnect,
    Login,
    Logout,
    SessionExpired,
    ModeChanged,
    Manual,
}

impl FetchReason {
    /// Fetches that must not overwrite edits made while they ran
    pub fn is_guarded(&self) -> bool {
        matches!(self, FetchReason::Notification | FetchReason::Reconnect)
    }
}

/// Why an event was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// A local save is scheduled or in flight
    PendingLocalSave,
    /// The notification concerns another user
    OtherIdentity,
    /// This session initiated the mode change
    OwnModeChange,
    /// Nothing to do for a first connect or a drop
    Transport,
}

/// What the engine should do with an event
#[derive(Debug, Clone, PartialEq)]
pub enum Reaction {
    Ignore(IgnoreReason),
    Refetch(FetchReason),
    /// Refetch once the pending save has settled
    Deferred,
    /// Hard logout and reload of public data
    ForceLogout,
    ApplyWidgetData { widget_id: String, data: Value },
}

/// Push event reconciliation state
#[derive(Debug)]
pub struct RemoteChangeChannel {
    privileged_identity: String,
    connected: bool,
    deferred_refetch: bool,
}

impl RemoteChangeChannel {
    pub fn new(privileged_identity: impl Into<String>) -> Self {
        Self {
            privileged_identity: privileged_identity.into(),
            connected: false,
            deferred_refetch: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Classify `event`. `busy` is true while a save is scheduled or in
    /// flight.
    pub fn on_event(&mut self, event: RemoteEvent, busy: bool, session: &Session) -> Reaction {
        match event {
            RemoteEvent::DataChanged(notification) => {
                if busy {
                    return Reaction::Ignore(IgnoreReason::PendingLocalSave);
                }
                if self.concerns(&notification, session) {
                    Reaction::Refetch(FetchReason::Notification)
                } else {
                    Reaction::Ignore(IgnoreReason::OtherIdentity)
                }
            }
            RemoteEvent::ModeChanged { origin } => {
                if origin.as_deref() == Some(session.session_id.as_str()) {
                    Reaction::Ignore(IgnoreReason::OwnModeChange)
                } else {
                    Reaction::ForceLogout
                }
            }
            RemoteEvent::WidgetData { widget_id, data } => {
                Reaction::ApplyWidgetData { widget_id, data }
            }
            RemoteEvent::Connected { reconnect } => {
                self.connected = true;
                if !reconnect {
                    Reaction::Ignore(IgnoreReason::Transport)
                } else if busy {
                    self.deferred_refetch = true;
                    Reaction::Deferred
                } else {
                    Reaction::Refetch(FetchReason::Reconnect)
                }
            }
            RemoteEvent::Disconnected => {
                self.connected = false;
                Reaction::Ignore(IgnoreReason::Transport)
            }
        }
    }

    /// Take the refetch postponed by a reconnect during a save
    pub fn take_deferred(&mut self) -> bool {
        std::mem::take(&mut self.deferred_refetch)
    }

    fn concerns(&self, notification: &ChangeNotification, session: &Session) -> bool {
        let affected = notification.affected_identity.as_str();
        affected == self.privileged_identity || session.identity.username() == Some(affected)
    }
}

impl Default for RemoteChangeChannel {
    fn default() -> Self {
        Self::new(DEFAULT_PRIVILEGED_IDENTITY)
    }
}
