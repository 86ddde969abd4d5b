use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tofui_core::SessionIdentity;
use tofui_ui::Event;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

type Connections = HashMap<SessionIdentity, HashMap<String, mpsc::Sender<Event>>>;

/// Every live session, grouped by the identity that opened it.
#[derive(Default)]
pub struct SessionRegistry {
    conn_counter: AtomicU64,
    sessions: Mutex<Connections>,
}

/// Removes its session from the registry when dropped.
pub struct Registration {
    registry: Arc<SessionRegistry>,
    identity: SessionIdentity,
    conn_id: String,
}

impl Registration {
    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn conn_id(&self) -> &str {
        &self.conn_id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.unregister(&self.identity, &self.conn_id);
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Connections> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn register(
        self: &Arc<Self>,
        identity: SessionIdentity,
        sender: mpsc::Sender<Event>,
    ) -> Registration {
        let conn_id = format!("conn-{}", self.conn_counter.fetch_add(1, Ordering::Relaxed) + 1);
        let count = {
            let mut sessions = self.lock();
            let entry = sessions.entry(identity.clone()).or_default();
            entry.insert(conn_id.clone(), sender);
            entry.len()
        };
        info!(
            event = "session_registered",
            identity = identity.short(),
            conn_id = %conn_id,
            connections = count
        );
        Registration {
            registry: Arc::clone(self),
            identity,
            conn_id,
        }
    }

    /// Returns whether the handle was registered.
    pub fn unregister(&self, identity: &SessionIdentity, conn_id: &str) -> bool {
        let mut sessions = self.lock();
        let Some(entry) = sessions.get_mut(identity) else {
            warn!(
                event = "session_unregister_unknown",
                identity = identity.short(),
                conn_id = %conn_id
            );
            return false;
        };
        let removed = entry.remove(conn_id).is_some();
        let remaining = entry.len();
        if entry.is_empty() {
            sessions.remove(identity);
        }
        drop(sessions);

        if removed {
            info!(
                event = "session_unregistered",
                identity = identity.short(),
                conn_id = %conn_id,
                connections = remaining
            );
        } else {
            warn!(
                event = "session_unregister_unknown",
                identity = identity.short(),
                conn_id = %conn_id
            );
        }
        removed
    }

    /// Posts `event` to every session of `identity` without blocking.
    /// Returns the number of sessions addressed.
    pub fn broadcast(&self, identity: &SessionIdentity, event: Event) -> usize {
        let targets: Vec<(String, mpsc::Sender<Event>)> = {
            let sessions = self.lock();
            match sessions.get(identity) {
                Some(entry) => entry
                    .iter()
                    .map(|(conn_id, sender)| (conn_id.clone(), sender.clone()))
                    .collect(),
                None => Vec::new(),
            }
        };
        if targets.is_empty() {
            debug!(
                event = "broadcast_no_sessions",
                identity = identity.short(),
                kind = event.kind()
            );
            return 0;
        }

        let mut addressed = 0;
        for (conn_id, sender) in targets {
            match sender.try_send(event.clone()) {
                Ok(()) => addressed += 1,
                Err(TrySendError::Full(event)) => match tokio::runtime::Handle::try_current() {
                    Ok(runtime) => {
                        runtime.spawn(async move {
                            let _ = sender.send(event).await;
                        });
                        addressed += 1;
                    }
                    Err(_) => warn!(
                        event = "broadcast_dropped",
                        identity = identity.short(),
                        conn_id = %conn_id
                    ),
                },
                Err(TrySendError::Closed(_)) => debug!(
                    event = "broadcast_closed_session",
                    identity = identity.short(),
                    conn_id = %conn_id
                ),
            }
        }
        addressed
    }

    /// Total live sessions.
    pub fn len(&self) -> usize {
        self.lock().values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn identity_count(&self) -> usize {
        self.lock().len()
    }

    pub fn connections(&self, identity: &SessionIdentity) -> usize {
        self.lock().get(identity).map_or(0, HashMap::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tofui_core::Credential;

    fn identity(raw: &str) -> SessionIdentity {
        SessionIdentity::parse(raw).expect("identity")
    }

    #[test]
    fn registrations_balance_on_drop() {
        let registry = Arc::new(SessionRegistry::new());
        let (tx, _rx) = mpsc::channel(4);
        let a = registry.register(identity("aa"), tx.clone());
        let b = registry.register(identity("aa"), tx.clone());
        let c = registry.register(identity("bb"), tx);
        assert_ne!(a.conn_id(), b.conn_id());
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.identity_count(), 2);

        drop(a);
        assert_eq!(registry.connections(&identity("aa")), 1);
        drop(b);
        assert_eq!(registry.connections(&identity("aa")), 0);
        assert_eq!(registry.identity_count(), 1);
        drop(c);
        assert!(registry.is_empty());
        assert_eq!(registry.identity_count(), 0);
    }

    #[test]
    fn unregister_unknown_handle_is_reported() {
        let registry = Arc::new(SessionRegistry::new());
        let (tx, _rx) = mpsc::channel(4);
        let registration = registry.register(identity("aa"), tx);
        assert!(!registry.unregister(&identity("aa"), "conn-999"));
        assert!(!registry.unregister(&identity("cc"), registration.conn_id()));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn broadcast_reaches_only_matching_identity() {
        let registry = Arc::new(SessionRegistry::new());
        let (tx_a1, mut rx_a1) = mpsc::channel(4);
        let (tx_a2, mut rx_a2) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        let _a1 = registry.register(identity("aa"), tx_a1);
        let _a2 = registry.register(identity("aa"), tx_a2);
        let _b = registry.register(identity("bb"), tx_b);

        let event = Event::CredentialUpdated(Credential::new(42, "tok"));
        assert_eq!(registry.broadcast(&identity("aa"), event.clone()), 2);

        assert_eq!(rx_a1.recv().await, Some(event.clone()));
        assert_eq!(rx_a2.recv().await, Some(event));
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn broadcast_to_absent_identity_is_a_no_op() {
        let registry = Arc::new(SessionRegistry::new());
        assert_eq!(registry.broadcast(&identity("aa"), Event::Quit), 0);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn full_queue_still_receives_broadcast() {
        let registry = Arc::new(SessionRegistry::new());
        let (tx, mut rx) = mpsc::channel(1);
        tx.try_send(Event::Quit).expect("fill queue");
        let _registration = registry.register(identity("aa"), tx);

        let event = Event::CredentialUpdated(Credential::new(7, "tok"));
        assert_eq!(registry.broadcast(&identity("aa"), event.clone()), 1);

        assert_eq!(rx.recv().await, Some(Event::Quit));
        assert_eq!(rx.recv().await, Some(event));
    }

    #[tokio::test]
    async fn closed_session_is_skipped() {
        let registry = Arc::new(SessionRegistry::new());
        let (tx_open, mut rx_open) = mpsc::channel(4);
        let (tx_closed, rx_closed) = mpsc::channel(4);
        drop(rx_closed);
        let _open = registry.register(identity("aa"), tx_open);
        let _closed = registry.register(identity("aa"), tx_closed);

        assert_eq!(registry.broadcast(&identity("aa"), Event::Quit), 1);
        assert_eq!(rx_open.recv().await, Some(Event::Quit));
    }
}
