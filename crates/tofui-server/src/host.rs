use ratatui::backend::Backend;
use ratatui::Terminal;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tofui_core::{ContentService, SessionIdentity};
use tofui_storage::{load_credential, KeyValueStore};
use tofui_ui::{AppRuntime, Event, Executor, DEFAULT_COMMAND_TIMEOUT};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::signin_url;
use crate::registry::{Registration, SessionRegistry};

pub const SESSION_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct HostSettings {
    pub signin_base_url: String,
    pub command_timeout: Duration,
}

impl HostSettings {
    pub fn new(signin_base_url: impl Into<String>) -> Self {
        Self {
            signin_base_url: signin_base_url.into(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

/// State shared by every connection the process serves.
#[derive(Clone)]
pub struct HostContext {
    pub registry: Arc<SessionRegistry>,
    pub store: Arc<dyn KeyValueStore>,
    pub content: Arc<dyn ContentService>,
    pub settings: HostSettings,
}

/// A session ready to be driven by a transport.
pub struct OpenSession {
    pub runtime: AppRuntime,
    pub events: mpsc::Receiver<Event>,
    /// Transports post input through this sender.
    pub sender: mpsc::Sender<Event>,
    pub executor: Executor,
    pub registration: Registration,
}

impl HostContext {
    pub fn new(
        registry: Arc<SessionRegistry>,
        store: Arc<dyn KeyValueStore>,
        content: Arc<dyn ContentService>,
        settings: HostSettings,
    ) -> Self {
        Self {
            registry,
            store,
            content,
            settings,
        }
    }

    pub async fn open_session(&self, identity: SessionIdentity) -> OpenSession {
        let store = Arc::clone(&self.store);
        let lookup = identity.clone();
        let loaded = tokio::task::spawn_blocking(move || load_credential(store.as_ref(), &lookup))
            .await
            .map_err(|err| err.to_string())
            .and_then(|result| result.map_err(|err| err.to_string()));
        let credential = match loaded {
            Ok(credential) => credential,
            Err(err) => {
                warn!(
                    event = "credential_load_failed",
                    identity = identity.short(),
                    error = %err
                );
                None
            }
        };
        let signed_in = credential.as_ref().map(|credential| credential.fid);
        let url = signin_url(&self.settings.signin_base_url, &identity);
        let runtime = AppRuntime::new(identity.clone(), credential, url);

        let (sender, events) = mpsc::channel(SESSION_QUEUE_CAPACITY);
        let executor = Executor::new(Arc::clone(&self.content), sender.clone())
            .with_timeout(self.settings.command_timeout);
        let registration = self.registry.register(identity.clone(), sender.clone());
        info!(
            event = "session_open",
            identity = identity.short(),
            conn_id = registration.conn_id(),
            fid = ?signed_in
        );

        OpenSession {
            runtime,
            events,
            sender,
            executor,
            registration,
        }
    }
}

/// Drives `session` on `terminal` until it quits, then unregisters it.
pub async fn run_session<B: Backend>(
    session: OpenSession,
    terminal: &mut Terminal<B>,
) -> io::Result<()> {
    let OpenSession {
        mut runtime,
        mut events,
        sender: _,
        executor,
        registration,
    } = session;
    let result = tofui_ui::drive(&mut runtime, terminal, &mut events, &executor).await;
    info!(
        event = "session_closed",
        identity = registration.identity().short(),
        conn_id = registration.conn_id()
    );
    drop(registration);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::backend::TestBackend;
    use tofui_core::{
        Cast, Channel, ChannelScope, ContentError, Credential, FeedRequest, PublishRequest,
        PublishResult, ReactionKind, User,
    };
    use tofui_storage::{save_credential, SqliteStore, StorageError};

    struct NoContent;

    #[async_trait]
    impl ContentService for NoContent {
        async fn get_feed(&self, _request: &FeedRequest) -> Result<Vec<Cast>, ContentError> {
            Ok(Vec::new())
        }

        async fn get_user(&self, fid: u64, _viewer: Option<u64>) -> Result<User, ContentError> {
            Ok(User {
                fid,
                ..User::default()
            })
        }

        async fn get_channel(&self, parent_url: &str) -> Result<Channel, ContentError> {
            Ok(Channel {
                parent_url: parent_url.to_string(),
                ..Channel::default()
            })
        }

        async fn list_channels(&self, _scope: ChannelScope) -> Result<Vec<Channel>, ContentError> {
            Ok(Vec::new())
        }

        async fn publish(&self, _request: &PublishRequest) -> Result<PublishResult, ContentError> {
            Err(ContentError::Unauthenticated)
        }

        async fn react(&self, _: &str, _: &str, _: ReactionKind) -> Result<(), ContentError> {
            Ok(())
        }
    }

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
            Err(StorageError::Poisoned)
        }

        fn set(&self, _key: &[u8], _value: &[u8]) -> Result<(), StorageError> {
            Err(StorageError::Poisoned)
        }

        fn delete(&self, _key: &[u8]) -> Result<bool, StorageError> {
            Err(StorageError::Poisoned)
        }

        fn keys(&self, _prefix: &[u8]) -> Result<Vec<Vec<u8>>, StorageError> {
            Err(StorageError::Poisoned)
        }
    }

    fn context(store: Arc<dyn KeyValueStore>) -> HostContext {
        HostContext::new(
            Arc::new(SessionRegistry::new()),
            store,
            Arc::new(NoContent),
            HostSettings::new("http://localhost:4200"),
        )
    }

    #[tokio::test]
    async fn open_session_loads_stored_credential() {
        let store = Arc::new(SqliteStore::open_in_memory().expect("store"));
        let identity = SessionIdentity::from_public_key(b"key-one");
        save_credential(store.as_ref(), &identity, &Credential::new(9, "tok")).expect("save");
        let ctx = context(store);

        let session = ctx.open_session(identity.clone()).await;
        assert_eq!(session.runtime.credential().map(|c| c.fid), Some(9));
        assert_eq!(ctx.registry.connections(&identity), 1);

        drop(session);
        assert!(ctx.registry.is_empty());
    }

    #[tokio::test]
    async fn store_failure_opens_signed_out_session() {
        let ctx = context(Arc::new(BrokenStore));
        let session = ctx.open_session(SessionIdentity::local()).await;
        assert!(session.runtime.credential().is_none());
        assert_eq!(ctx.registry.len(), 1);
    }

    #[tokio::test]
    async fn run_session_unregisters_after_quit() {
        let store = Arc::new(SqliteStore::open_in_memory().expect("store"));
        let ctx = context(store);
        let session = ctx.open_session(SessionIdentity::local()).await;
        session
            .sender
            .send(Event::Key(KeyEvent::new(
                KeyCode::Char('c'),
                KeyModifiers::CONTROL,
            )))
            .await
            .expect("queue quit");
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).expect("terminal");

        run_session(session, &mut terminal).await.expect("run");
        assert!(ctx.registry.is_empty());
    }
}
