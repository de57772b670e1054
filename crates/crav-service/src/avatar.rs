//! Active avatar observer.
//!
//! Holds which chat-widget avatar is active and what it is doing. Readers
//! either poll [`AvatarHub::current`] or hold a [`watch::Receiver`] from
//! [`AvatarHub::subscribe`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

use crav_core::{glow_for, AvatarState, GlowParams};

/// The active avatar and its state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveAvatar {
    /// Avatar id chosen by the widget.
    pub avatar_id: String,
    /// Current state.
    pub state: AvatarState,
    /// Glow for `state`.
    pub glow: GlowParams,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

impl ActiveAvatar {
    fn new(avatar_id: String, state: AvatarState) -> Self {
        Self {
            avatar_id,
            state,
            glow: glow_for(state),
            updated_at: Utc::now(),
        }
    }
}

/// Single-slot observable holding the active avatar.
pub struct AvatarHub {
    tx: watch::Sender<Option<ActiveAvatar>>,
}

impl Default for AvatarHub {
    fn default() -> Self {
        Self::new()
    }
}

impl AvatarHub {
    /// No avatar active.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Snapshot of the active avatar.
    #[must_use]
    pub fn current(&self) -> Option<ActiveAvatar> {
        self.tx.borrow().clone()
    }

    /// Make `avatar_id` active in `state`, replacing any previous avatar.
    pub fn set_active(&self, avatar_id: &str, state: AvatarState) -> ActiveAvatar {
        let active = ActiveAvatar::new(avatar_id.to_string(), state);
        self.tx.send_replace(Some(active.clone()));
        tracing::debug!(avatar_id, state = state.as_str(), "Avatar activated");
        active
    }

    /// Change the state of the active avatar. Returns `None` if no avatar is
    /// active.
    pub fn set_state(&self, state: AvatarState) -> Option<ActiveAvatar> {
        let mut updated = None;
        self.tx.send_if_modified(|slot| match slot {
            Some(active) if active.state != state => {
                *active = ActiveAvatar::new(active.avatar_id.clone(), state);
                updated = Some(active.clone());
                true
            }
            Some(active) => {
                updated = Some(active.clone());
                false
            }
            None => false,
        });
        updated
    }

    /// Deactivate. Returns whether an avatar was active.
    pub fn clear(&self) -> bool {
        self.tx.send_replace(None).is_some()
    }

    /// Receiver that observes every subsequent change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<ActiveAvatar>> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_state_requires_an_active_avatar() {
        let hub = AvatarHub::new();
        assert!(hub.set_state(AvatarState::Speaking).is_none());
        assert!(!hub.clear());

        hub.set_active("nova", AvatarState::Idle);
        let speaking = hub.set_state(AvatarState::Speaking).unwrap();
        assert_eq!(speaking.avatar_id, "nova");
        assert_eq!(speaking.glow, glow_for(AvatarState::Speaking));
        assert!(hub.clear());
        assert!(hub.current().is_none());
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let hub = AvatarHub::new();
        let mut rx = hub.subscribe();

        hub.set_active("nova", AvatarState::Listening);
        rx.changed().await.unwrap();
        assert_eq!(
            rx.borrow_and_update().as_ref().map(|a| a.state),
            Some(AvatarState::Listening)
        );

        hub.set_state(AvatarState::Thinking);
        rx.changed().await.unwrap();
        assert_eq!(
            rx.borrow_and_update().as_ref().map(|a| a.state),
            Some(AvatarState::Thinking)
        );

        hub.clear();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());
    }

    #[test]
    fn unchanged_state_does_not_notify() {
        let hub = AvatarHub::new();
        hub.set_active("nova", AvatarState::Idle);
        let rx = hub.subscribe();
        hub.set_state(AvatarState::Idle);
        assert!(!rx.has_changed().unwrap());
    }
}
