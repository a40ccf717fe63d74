//! Event Broadcaster
//!
//! Fan-out of completed state transitions to UI subscribers. Built on a
//! tokio broadcast channel: delivery order matches emit order, dropping a
//! subscription unsubscribes, and one subscriber's behavior can never
//! affect another or the broadcaster.
//!
//! Transient states are not broadcast; only terminal-stable outcomes are.

use tokio::sync::broadcast;

use crate::domain::entity::session::Session;

/// Broadcast channel capacity; a subscriber lagging past this many events
/// misses the oldest ones and is told so.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Completed auth state transition
#[derive(Debug, Clone)]
pub enum AuthEvent {
    /// A session was established or replaced wholesale
    SignedIn(Session),
    /// The session was cleared
    SignedOut,
    /// An attempt ended in the terminal error state
    AuthFailed(String),
}

/// Fan-out mechanism for auth state changes
#[derive(Debug)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<AuthEvent>,
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Subscribe to future transitions. Dropping the returned handle
    /// unsubscribes.
    pub fn subscribe(&self) -> AuthEvents {
        AuthEvents {
            rx: self.tx.subscribe(),
        }
    }

    pub(crate) fn emit(&self, event: AuthEvent) {
        // Err means no live subscribers, which is fine
        let receivers = self.tx.send(event).unwrap_or(0);
        tracing::trace!(receivers, "Auth event broadcast");
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Subscription handle; unsubscribes on drop
#[derive(Debug)]
pub struct AuthEvents {
    rx: broadcast::Receiver<AuthEvent>,
}

impl AuthEvents {
    /// Next event, or `None` once the broadcaster is gone.
    /// A lagged subscriber skips to the oldest retained event.
    pub async fn next(&mut self) -> Option<AuthEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Auth event subscriber lagged");
                }
            }
        }
    }

    /// Non-blocking poll used by UI ticks
    pub fn try_next(&mut self) -> Option<AuthEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Auth event subscriber lagged");
                }
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_delivered_in_order() {
        let broadcaster = EventBroadcaster::new();
        let mut events = broadcaster.subscribe();

        broadcaster.emit(AuthEvent::SignedOut);
        broadcaster.emit(AuthEvent::AuthFailed("nope".to_string()));

        assert!(matches!(events.next().await, Some(AuthEvent::SignedOut)));
        assert!(matches!(events.next().await, Some(AuthEvent::AuthFailed(_))));
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let broadcaster = EventBroadcaster::new();
        let events = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 1);

        drop(events);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_emit_without_subscribers_is_fine() {
        let broadcaster = EventBroadcaster::new();
        broadcaster.emit(AuthEvent::SignedOut);
    }
}
