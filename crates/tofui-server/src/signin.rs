use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use tofui_core::{ContentService, Credential, SessionIdentity};
use tofui_storage::{load_credential, save_credential, KeyValueStore, StorageError};
use tofui_ui::Event;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::host::HostContext;
use crate::registry::SessionRegistry;

const SIGNIN_PAGE: &str = include_str!("signin.html");

/// Everything the sign-in callback needs to bind a browser sign-in to the
/// terminal sessions that asked for it.
#[derive(Clone)]
pub struct SigninState {
    registry: Arc<SessionRegistry>,
    store: Arc<dyn KeyValueStore>,
    content: Arc<dyn ContentService>,
    client_id: String,
    base_url: String,
}

impl SigninState {
    pub fn new(ctx: &HostContext, client_id: impl Into<String>) -> Self {
        Self {
            registry: Arc::clone(&ctx.registry),
            store: Arc::clone(&ctx.store),
            content: Arc::clone(&ctx.content),
            client_id: client_id.into(),
            base_url: ctx.settings.signin_base_url.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SigninQuery {
    id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SuccessQuery {
    id: Option<String>,
    fid: Option<String>,
    token: Option<String>,
    signer_uuid: Option<String>,
    username: Option<String>,
    display_name: Option<String>,
}

pub fn router(state: SigninState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/signin", get(signin_page))
        .route("/signin/success", get(signin_success))
        .with_state(state)
}

pub async fn serve(
    state: SigninState,
    host: &str,
    port: u16,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind((host, port)).await?;
    info!(event = "signin_server_start", addr = %listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!(event = "signin_server_stopped");
    Ok(())
}

fn bad_request(message: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, format!("error: {}", message.into())).into_response()
}

fn parse_identity(raw: Option<&str>) -> Result<SessionIdentity, Response> {
    match raw.map(SessionIdentity::parse) {
        Some(Ok(identity)) => Ok(identity),
        Some(Err(err)) => Err(bad_request(format!("invalid id: {err}"))),
        None => Err(bad_request("missing id")),
    }
}

async fn signin_page(
    State(state): State<SigninState>,
    Query(query): Query<SigninQuery>,
) -> Response {
    let identity = match parse_identity(query.id.as_deref()) {
        Ok(identity) => identity,
        Err(response) => return response,
    };
    if state.client_id.is_empty() {
        warn!(event = "signin_client_id_missing");
    }
    let success_url = format!("{}/signin/success", state.base_url);
    let page = SIGNIN_PAGE
        .replace("{{client_id}}", &escape_html(&state.client_id))
        .replace("{{identity}}", identity.as_str())
        .replace("{{success_url}}", &escape_html(&success_url));
    Html(page).into_response()
}

async fn signin_success(
    State(state): State<SigninState>,
    Query(query): Query<SuccessQuery>,
) -> Response {
    let identity = match parse_identity(query.id.as_deref()) {
        Ok(identity) => identity,
        Err(response) => return response,
    };
    let Some(fid) = query.fid.as_deref().and_then(|raw| raw.trim().parse::<u64>().ok()) else {
        return bad_request("missing fid");
    };
    let Some(token) = query
        .token
        .or(query.signer_uuid)
        .filter(|token| !token.trim().is_empty())
    else {
        return bad_request("missing token");
    };

    let mut username = query.username.unwrap_or_default();
    let mut display_name = query.display_name.unwrap_or_default();
    if username.is_empty() {
        match state.content.get_user(fid, None).await {
            Ok(user) => {
                username = user.username;
                if display_name.is_empty() {
                    display_name = user.display_name;
                }
            }
            Err(err) => warn!(event = "signin_profile_lookup_failed", fid, error = %err),
        }
    }
    let credential = Credential::new(fid, token)
        .with_username(username)
        .with_display_name(display_name);

    let store = Arc::clone(&state.store);
    let stored = {
        let identity = identity.clone();
        let credential = credential.clone();
        tokio::task::spawn_blocking(move || {
            store_credential(store.as_ref(), &identity, &credential)
        })
        .await
    };
    let failure = match stored {
        Ok(Ok(())) => None,
        Ok(Err(err)) => Some(err.to_string()),
        Err(err) => Some(err.to_string()),
    };
    if let Some(err) = failure {
        error!(
            event = "credential_save_failed",
            identity = identity.short(),
            error = %err
        );
        return (StatusCode::INTERNAL_SERVER_ERROR, "error: could not store sign-in").into_response();
    }

    let sessions = state
        .registry
        .broadcast(&identity, Event::CredentialUpdated(credential));
    info!(
        event = "signin_completed",
        identity = identity.short(),
        fid,
        sessions
    );
    (StatusCode::OK, "success, you may now close the window").into_response()
}

/// Overwrites the stored credential, noting when the identity moves to a new fid.
fn store_credential(
    store: &dyn KeyValueStore,
    identity: &SessionIdentity,
    credential: &Credential,
) -> Result<(), StorageError> {
    match load_credential(store, identity) {
        Ok(Some(previous)) if previous.fid != credential.fid => warn!(
            event = "credential_rebound",
            identity = identity.short(),
            previous_fid = previous.fid,
            fid = credential.fid
        ),
        Ok(_) => {}
        Err(err) => warn!(
            event = "credential_load_failed",
            identity = identity.short(),
            error = %err
        ),
    }
    save_credential(store, identity, credential)
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostSettings;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tofui_core::{
        Cast, Channel, ChannelScope, ContentError, FeedRequest, PublishRequest, PublishResult,
        ReactionKind, User,
    };
    use std::sync::Mutex;
    use std::thread::ThreadId;
    use tofui_storage::SqliteStore;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    struct Directory;

    #[async_trait]
    impl ContentService for Directory {
        async fn get_feed(&self, _request: &FeedRequest) -> Result<Vec<Cast>, ContentError> {
            Ok(Vec::new())
        }

        async fn get_user(&self, fid: u64, _viewer: Option<u64>) -> Result<User, ContentError> {
            Ok(User {
                fid,
                username: format!("user{fid}"),
                display_name: format!("User {fid}"),
                ..User::default()
            })
        }

        async fn get_channel(&self, _parent_url: &str) -> Result<Channel, ContentError> {
            Err(ContentError::InvalidRequest("no channels".into()))
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

    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
            Ok(None)
        }

        fn set(&self, _key: &[u8], _value: &[u8]) -> Result<(), StorageError> {
            Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read only",
            )))
        }

        fn delete(&self, _key: &[u8]) -> Result<bool, StorageError> {
            Ok(false)
        }

        fn keys(&self, _prefix: &[u8]) -> Result<Vec<Vec<u8>>, StorageError> {
            Ok(Vec::new())
        }
    }

    struct ThreadRecordingStore {
        inner: SqliteStore,
        threads: Mutex<Vec<ThreadId>>,
    }

    impl ThreadRecordingStore {
        fn record(&self) {
            self.threads
                .lock()
                .expect("threads")
                .push(std::thread::current().id());
        }
    }

    impl KeyValueStore for ThreadRecordingStore {
        fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
            self.record();
            self.inner.get(key)
        }

        fn set(&self, key: &[u8], value: &[u8]) -> Result<(), StorageError> {
            self.record();
            self.inner.set(key, value)
        }

        fn delete(&self, key: &[u8]) -> Result<bool, StorageError> {
            self.record();
            self.inner.delete(key)
        }

        fn keys(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>, StorageError> {
            self.record();
            self.inner.keys(prefix)
        }
    }

    fn context(store: Arc<dyn KeyValueStore>) -> HostContext {
        HostContext::new(
            Arc::new(SessionRegistry::new()),
            store,
            Arc::new(Directory),
            HostSettings::new("https://tofui.example"),
        )
    }

    async fn get(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request"))
            .await
            .expect("response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[tokio::test]
    async fn health_answers_ok() {
        let ctx = context(Arc::new(SqliteStore::open_in_memory().expect("store")));
        let (status, body) = get(router(SigninState::new(&ctx, "client")), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn page_embeds_identity_and_client() {
        let ctx = context(Arc::new(SqliteStore::open_in_memory().expect("store")));
        let app = router(SigninState::new(&ctx, "client-123"));

        let (status, body) = get(app.clone(), "/signin?id=abc123").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("data-client_id=\"client-123\""));
        assert!(body.contains("id: \"abc123\""));
        assert!(body.contains("https://tofui.example/signin/success"));

        let (status, _) = get(app.clone(), "/signin").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = get(app, "/signin?id=%3Cscript%3E").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn success_rejects_incomplete_callbacks() {
        let ctx = context(Arc::new(SqliteStore::open_in_memory().expect("store")));
        let app = router(SigninState::new(&ctx, "client"));

        let (status, body) = get(app.clone(), "/signin/success?id=abc&token=t").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("missing fid"));

        let (status, _) = get(app.clone(), "/signin/success?id=abc&fid=nope&token=t").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = get(app.clone(), "/signin/success?id=abc&fid=1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("missing token"));

        let (status, _) = get(app, "/signin/success?fid=1&token=t").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn success_persists_without_live_sessions() {
        let store = Arc::new(SqliteStore::open_in_memory().expect("store"));
        let ctx = context(store.clone());
        let app = router(SigninState::new(&ctx, "client"));

        let (status, body) = get(app, "/signin/success?id=abc&fid=42&signer_uuid=uuid-1").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("success"));

        let identity = SessionIdentity::parse("abc").expect("identity");
        let stored = load_credential(store.as_ref(), &identity)
            .expect("load")
            .expect("credential");
        assert_eq!(stored.fid, 42);
        assert_eq!(stored.token, "uuid-1");
        assert_eq!(stored.username, "user42");
        assert_eq!(stored.display_name, "User 42");
    }

    #[tokio::test]
    async fn resign_in_overwrites_previous_credential() {
        let store = Arc::new(SqliteStore::open_in_memory().expect("store"));
        let ctx = context(store.clone());
        let app = router(SigninState::new(&ctx, "client"));
        let identity = SessionIdentity::parse("abc").expect("identity");

        get(app.clone(), "/signin/success?id=abc&fid=1&token=first&username=one").await;
        get(app, "/signin/success?id=abc&fid=2&token=second&username=two").await;

        let stored = load_credential(store.as_ref(), &identity)
            .expect("load")
            .expect("credential");
        assert_eq!(stored.fid, 2);
        assert_eq!(stored.username, "two");
    }

    #[tokio::test]
    async fn store_failure_does_not_broadcast() {
        let ctx = context(Arc::new(ReadOnlyStore));
        let identity = SessionIdentity::parse("abc").expect("identity");
        let (tx, mut rx) = mpsc::channel(4);
        let _registration = ctx.registry.register(identity, tx);
        let app = router(SigninState::new(&ctx, "client"));

        let (status, _) = get(app, "/signin/success?id=abc&fid=42&token=tok").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn callback_store_access_stays_off_the_runtime_thread() {
        let runtime_thread = std::thread::current().id();
        let store = Arc::new(ThreadRecordingStore {
            inner: SqliteStore::open_in_memory().expect("store"),
            threads: Mutex::new(Vec::new()),
        });
        let ctx = context(store.clone());
        let app = router(SigninState::new(&ctx, "client"));

        let (status, _) = get(app, "/signin/success?id=abc&fid=42&token=tok&username=a").await;
        assert_eq!(status, StatusCode::OK);

        let threads = store.threads.lock().expect("threads");
        assert_eq!(threads.len(), 2);
        assert!(threads.iter().all(|id| *id != runtime_thread));
    }
}
