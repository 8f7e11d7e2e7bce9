//! Attention state machine.

use aria_core::{AttentionChange, AttentionState, TransitionReason};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

/// Owns the current attention state. Written only by the coordinator worker;
/// readable from anywhere through the shared atomic.
pub(crate) struct AttentionTracker {
    state: Arc<AtomicU8>,
    notify: broadcast::Sender<AttentionChange>,
}

impl AttentionTracker {
    pub fn new(capacity: usize) -> Self {
        let (notify, _) = broadcast::channel(capacity.max(1));
        Self {
            state: Arc::new(AtomicU8::new(AttentionState::Normal.as_u8())),
            notify,
        }
    }

    pub fn current(&self) -> AttentionState {
        AttentionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AttentionChange> {
        self.notify.subscribe()
    }

    /// Move to `to`. Re-entering the current state does nothing and sends no
    /// notification.
    pub fn transition(
        &self,
        to: AttentionState,
        reason: TransitionReason,
        at: DateTime<Utc>,
    ) -> Option<AttentionChange> {
        let from = AttentionState::from_u8(self.state.swap(to.as_u8(), Ordering::AcqRel));
        if from == to {
            return None;
        }
        info!("Attention {} -> {} ({:?})", from, to, reason);
        let change = AttentionChange { from, to, at, reason };
        // No subscribers is fine.
        let _ = self.notify.send(change.clone());
        Some(change)
    }

    /// NORMAL -> ATTENTIVE on visual presence.
    pub fn on_presence(&self, at: DateTime<Utc>) -> Option<AttentionChange> {
        match self.current() {
            AttentionState::Normal => {
                self.transition(AttentionState::Attentive, TransitionReason::VisualPresence, at)
            }
            _ => None,
        }
    }

    /// ATTENTIVE -> FOCUSED on face-to-face interaction or high visual attention.
    pub fn on_interaction(&self, at: DateTime<Utc>) -> Option<AttentionChange> {
        match self.current() {
            AttentionState::Attentive => {
                self.transition(AttentionState::Focused, TransitionReason::Interaction, at)
            }
            _ => None,
        }
    }

    /// Any state -> NORMAL after the idle timeout.
    pub fn on_idle(&self, at: DateTime<Utc>) -> Option<AttentionChange> {
        self.transition(AttentionState::Normal, TransitionReason::Idle, at)
    }
}
