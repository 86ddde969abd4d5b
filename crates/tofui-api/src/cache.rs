use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tofui_core::{
    Cast, Channel, ChannelScope, ContentError, ContentService, FeedRequest, PublishRequest,
    PublishResult, ReactionKind, User,
};
use tofui_storage::{get_json, KeyValueStore};
use tracing::{debug, warn};

/// Serves profile and channel lookups from the store when possible.
///
/// Feeds and writes always go to the wrapped service. Store failures are
/// logged and otherwise ignored; a cache miss is never an error. Store calls
/// run on the blocking pool so a slow disk never stalls session tasks.
pub struct CachedContentService {
    inner: Arc<dyn ContentService>,
    store: Arc<dyn KeyValueStore>,
}

impl CachedContentService {
    pub fn new(inner: Arc<dyn ContentService>, store: Arc<dyn KeyValueStore>) -> Self {
        Self { inner, store }
    }

    fn user_key(fid: u64) -> String {
        format!("user:{fid}")
    }

    fn channel_key(parent_url: &str) -> String {
        format!("channel:{parent_url}")
    }

    async fn read<T>(&self, key: String) -> Option<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let lookup = key.clone();
        match tokio::task::spawn_blocking(move || get_json::<T>(store.as_ref(), &lookup)).await {
            Ok(Ok(value)) => value,
            Ok(Err(err)) => {
                warn!(event = "cache_read_failed", key = %key, error = %err);
                None
            }
            Err(err) => {
                warn!(event = "cache_task_failed", key = %key, error = %err);
                None
            }
        }
    }

    async fn write<T: Serialize>(&self, key: String, value: &T) {
        self.write_all(vec![(key, value)]).await;
    }

    /// Stores every entry in one blocking task.
    async fn write_all<T: Serialize>(&self, entries: Vec<(String, &T)>) {
        let mut encoded = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            match serde_json::to_vec(value) {
                Ok(raw) => encoded.push((key, raw)),
                Err(err) => warn!(event = "cache_write_failed", key = %key, error = %err),
            }
        }
        if encoded.is_empty() {
            return;
        }
        let store = Arc::clone(&self.store);
        let written = tokio::task::spawn_blocking(move || {
            for (key, raw) in encoded {
                if let Err(err) = store.set(key.as_bytes(), &raw) {
                    warn!(event = "cache_write_failed", key = %key, error = %err);
                }
            }
        })
        .await;
        if let Err(err) = written {
            warn!(event = "cache_task_failed", error = %err);
        }
    }
}

#[async_trait]
impl ContentService for CachedContentService {
    async fn get_feed(&self, request: &FeedRequest) -> Result<Vec<Cast>, ContentError> {
        self.inner.get_feed(request).await
    }

    async fn get_user(&self, fid: u64, viewer_fid: Option<u64>) -> Result<User, ContentError> {
        // viewer-specific fields never enter or leave the shared entry
        if viewer_fid.is_some() {
            return self.inner.get_user(fid, viewer_fid).await;
        }
        if let Some(user) = self.read::<User>(Self::user_key(fid)).await {
            debug!(event = "cache_hit", kind = "user", fid);
            return Ok(user);
        }
        let user = self.inner.get_user(fid, None).await?;
        self.write(Self::user_key(fid), &user).await;
        Ok(user)
    }

    async fn get_channel(&self, parent_url: &str) -> Result<Channel, ContentError> {
        let key = Self::channel_key(parent_url);
        if let Some(channel) = self.read::<Channel>(key.clone()).await {
            debug!(event = "cache_hit", kind = "channel", parent_url);
            return Ok(channel);
        }
        let channel = self.inner.get_channel(parent_url).await?;
        self.write(key, &channel).await;
        Ok(channel)
    }

    async fn list_channels(&self, scope: ChannelScope) -> Result<Vec<Channel>, ContentError> {
        let channels = self.inner.list_channels(scope).await?;
        let entries: Vec<(String, &Channel)> = channels
            .iter()
            .filter(|channel| !channel.feed_url().is_empty())
            .map(|channel| (Self::channel_key(channel.feed_url()), channel))
            .collect();
        self.write_all(entries).await;
        Ok(channels)
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishResult, ContentError> {
        self.inner.publish(request).await
    }

    async fn react(
        &self,
        token: &str,
        cast_hash: &str,
        kind: ReactionKind,
    ) -> Result<(), ContentError> {
        self.inner.react(token, cast_hash, kind).await
    }
}
