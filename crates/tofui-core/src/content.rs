use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_FEED_LIMIT: u32 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct User {
    pub fid: u64,
    pub username: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub pfp_url: Option<String>,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub follower_count: u64,
    #[serde(default)]
    pub following_count: u64,
    #[serde(default)]
    pub viewer_following: bool,
}

impl User {
    pub fn handle(&self) -> String {
        format!("@{}", self.username)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CastReactions {
    pub likes: u64,
    pub recasts: u64,
    pub replies: u64,
    #[serde(default)]
    pub viewer_liked: bool,
    #[serde(default)]
    pub viewer_recasted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cast {
    pub hash: String,
    #[serde(default)]
    pub thread_hash: Option<String>,
    #[serde(default)]
    pub parent_hash: Option<String>,
    #[serde(default)]
    pub parent_url: Option<String>,
    #[serde(default)]
    pub parent_author_fid: Option<u64>,
    pub author: User,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub embeds: Vec<String>,
    #[serde(default)]
    pub reactions: CastReactions,
}

impl Cast {
    pub fn apply_reaction(&mut self, kind: ReactionKind) {
        match kind {
            ReactionKind::Like if !self.reactions.viewer_liked => {
                self.reactions.viewer_liked = true;
                self.reactions.likes += 1;
            }
            ReactionKind::Recast if !self.reactions.viewer_recasted => {
                self.reactions.viewer_recasted = true;
                self.reactions.recasts += 1;
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub parent_url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub follower_count: u64,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub lead_fid: Option<u64>,
}

impl Channel {
    /// Value casts carry in `parent_url` when they belong to this channel.
    pub fn feed_url(&self) -> &str {
        if self.parent_url.is_empty() {
            &self.url
        } else {
            &self.parent_url
        }
    }

    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        query.is_empty()
            || self.name.to_lowercase().contains(&query)
            || self.id.to_lowercase().contains(&query)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedKind {
    Following { fid: u64 },
    Trending,
    Channel { parent_url: String },
    Profile { fid: u64 },
    Thread { hash: String },
}

impl FeedKind {
    /// Resource key used to correlate responses with the view that asked.
    pub fn context_key(&self) -> String {
        match self {
            FeedKind::Following { fid } => format!("feed:following:{fid}"),
            FeedKind::Trending => "feed:trending".to_string(),
            FeedKind::Channel { parent_url } => format!("feed:channel:{parent_url}"),
            FeedKind::Profile { fid } => format!("feed:profile:{fid}"),
            FeedKind::Thread { hash } => format!("feed:thread:{hash}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedRequest {
    pub kind: FeedKind,
    pub limit: u32,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub viewer_fid: Option<u64>,
}

impl FeedRequest {
    pub fn new(kind: FeedKind) -> Self {
        Self {
            kind,
            limit: DEFAULT_FEED_LIMIT,
            cursor: None,
            viewer_fid: None,
        }
    }

    /// Home feed: the signed-in user's following feed, trending otherwise.
    pub fn home(viewer_fid: Option<u64>) -> Self {
        let kind = match viewer_fid {
            Some(fid) => FeedKind::Following { fid },
            None => FeedKind::Trending,
        };
        Self::new(kind).with_viewer(viewer_fid)
    }

    pub fn with_viewer(mut self, viewer_fid: Option<u64>) -> Self {
        self.viewer_fid = viewer_fid;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ChannelScope {
    Active { fid: u64 },
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionKind {
    Like,
    Recast,
}

impl ReactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ReactionKind::Like => "like",
            ReactionKind::Recast => "recast",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRequest {
    pub token: String,
    pub text: String,
    #[serde(default)]
    pub parent_hash: Option<String>,
    #[serde(default)]
    pub parent_author_fid: Option<u64>,
    #[serde(default)]
    pub channel_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResult {
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    #[error("network error: {0}")]
    Network(String),
    #[error("upstream returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("could not decode response: {0}")]
    Decode(String),
    #[error("request timed out after {0} ms")]
    Timeout(u64),
    #[error("sign in required")]
    Unauthenticated,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ContentError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ContentError::Network(_) | ContentError::Timeout(_) => true,
            ContentError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Remote content operations shared by every session.
#[async_trait]
pub trait ContentService: Send + Sync {
    async fn get_feed(&self, request: &FeedRequest) -> Result<Vec<Cast>, ContentError>;

    async fn get_user(&self, fid: u64, viewer_fid: Option<u64>) -> Result<User, ContentError>;

    async fn get_channel(&self, parent_url: &str) -> Result<Channel, ContentError>;

    async fn list_channels(&self, scope: ChannelScope) -> Result<Vec<Channel>, ContentError>;

    async fn publish(&self, request: &PublishRequest) -> Result<PublishResult, ContentError>;

    async fn react(
        &self,
        token: &str,
        cast_hash: &str,
        kind: ReactionKind,
    ) -> Result<(), ContentError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_cast() -> Cast {
        Cast {
            hash: "0xabc".to_string(),
            thread_hash: None,
            parent_hash: None,
            parent_url: None,
            parent_author_fid: None,
            author: User {
                fid: 3,
                username: "dwr".to_string(),
                ..User::default()
            },
            text: "gm".to_string(),
            timestamp: DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z")
                .expect("timestamp")
                .with_timezone(&Utc),
            embeds: Vec::new(),
            reactions: CastReactions::default(),
        }
    }

    #[test]
    fn home_feed_follows_signed_in_user() {
        let signed_in = FeedRequest::home(Some(42));
        assert_eq!(signed_in.kind, FeedKind::Following { fid: 42 });
        assert_eq!(signed_in.viewer_fid, Some(42));
        assert_eq!(signed_in.limit, DEFAULT_FEED_LIMIT);

        let anonymous = FeedRequest::home(None);
        assert_eq!(anonymous.kind, FeedKind::Trending);
        assert_eq!(anonymous.viewer_fid, None);
    }

    #[test]
    fn context_keys_distinguish_resources() {
        let rust = FeedKind::Channel {
            parent_url: "chain://rust".to_string(),
        };
        let zig = FeedKind::Channel {
            parent_url: "chain://zig".to_string(),
        };
        assert_ne!(rust.context_key(), zig.context_key());
        assert_eq!(
            FeedKind::Following { fid: 9 }.context_key(),
            "feed:following:9"
        );
    }

    #[test]
    fn reactions_are_counted_once() {
        let mut cast = sample_cast();
        cast.apply_reaction(ReactionKind::Like);
        cast.apply_reaction(ReactionKind::Like);
        cast.apply_reaction(ReactionKind::Recast);
        assert_eq!(cast.reactions.likes, 1);
        assert_eq!(cast.reactions.recasts, 1);
        assert!(cast.reactions.viewer_liked);
    }

    #[test]
    fn channel_matching_is_case_insensitive() {
        let channel = Channel {
            id: "rust".to_string(),
            name: "Rust Lang".to_string(),
            parent_url: "chain://rust".to_string(),
            ..Channel::default()
        };
        assert!(channel.matches("RUST"));
        assert!(channel.matches("lang"));
        assert!(channel.matches(""));
        assert!(!channel.matches("zig"));
        assert_eq!(channel.feed_url(), "chain://rust");
    }

    #[test]
    fn retryable_errors() {
        assert!(ContentError::Timeout(5000).is_retryable());
        assert!(ContentError::Status {
            status: 503,
            message: "unavailable".to_string()
        }
        .is_retryable());
        assert!(!ContentError::Status {
            status: 404,
            message: "missing".to_string()
        }
        .is_retryable());
        assert!(!ContentError::Unauthenticated.is_retryable());
    }
}
