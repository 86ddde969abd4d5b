use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tofui_core::{Cast, CastReactions, Channel, User};

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FeedResponse {
    #[serde(default)]
    pub casts: Vec<WireCast>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ConversationResponse {
    #[serde(default)]
    pub conversation: Conversation,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Conversation {
    #[serde(default)]
    pub cast: ConversationCast,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ConversationCast {
    #[serde(default)]
    pub direct_replies: Vec<WireCast>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct UsersResponse {
    #[serde(default)]
    pub users: Vec<WireUser>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChannelResponse {
    pub channel: WireChannel,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ChannelsResponse {
    #[serde(default)]
    pub channels: Vec<WireChannel>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PublishResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub cast: Option<PublishedCast>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PublishedCast {
    #[serde(default)]
    pub hash: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ReactionResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PublishBody<'a> {
    pub signer_uuid: &'a str,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_author_fid: Option<u64>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReactionBody<'a> {
    pub signer_uuid: &'a str,
    pub reaction_type: &'a str,
    pub target: &'a str,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WireCast {
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub thread_hash: Option<String>,
    #[serde(default)]
    pub parent_hash: Option<String>,
    #[serde(default)]
    pub parent_url: Option<String>,
    #[serde(default)]
    pub parent_author: Option<FidRef>,
    #[serde(default)]
    pub author: WireUser,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub embeds: Vec<WireEmbed>,
    #[serde(default)]
    pub reactions: WireReactions,
    #[serde(default)]
    pub replies: WireReplies,
    #[serde(default)]
    pub viewer_context: WireViewerContext,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct FidRef {
    #[serde(default)]
    pub fid: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WireEmbed {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WireReactions {
    #[serde(default)]
    pub likes_count: u64,
    #[serde(default)]
    pub recasts_count: u64,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WireReplies {
    #[serde(default)]
    pub count: u64,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WireViewerContext {
    #[serde(default)]
    pub liked: bool,
    #[serde(default)]
    pub recasted: bool,
    #[serde(default)]
    pub following: bool,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WireUser {
    #[serde(default)]
    pub fid: u64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub pfp_url: Option<String>,
    #[serde(default)]
    pub profile: WireProfile,
    #[serde(default)]
    pub follower_count: u64,
    #[serde(default)]
    pub following_count: u64,
    #[serde(default)]
    pub viewer_context: WireViewerContext,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WireProfile {
    #[serde(default)]
    pub bio: WireBio,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WireBio {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct WireChannel {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub follower_count: Option<u64>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub parent_url: Option<String>,
    #[serde(default)]
    pub lead: Option<FidRef>,
}

impl From<WireUser> for User {
    fn from(wire: WireUser) -> Self {
        User {
            fid: wire.fid,
            display_name: wire
                .display_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| wire.username.clone()),
            username: wire.username,
            pfp_url: wire.pfp_url,
            bio: wire.profile.bio.text,
            follower_count: wire.follower_count,
            following_count: wire.following_count,
            viewer_following: wire.viewer_context.following,
        }
    }
}

impl From<WireCast> for Cast {
    fn from(wire: WireCast) -> Self {
        Cast {
            hash: wire.hash,
            thread_hash: wire.thread_hash,
            parent_hash: wire.parent_hash,
            parent_url: wire.parent_url,
            parent_author_fid: wire.parent_author.and_then(|author| author.fid),
            author: wire.author.into(),
            text: wire.text,
            timestamp: wire.timestamp.unwrap_or_default(),
            embeds: wire.embeds.into_iter().filter_map(|embed| embed.url).collect(),
            reactions: CastReactions {
                likes: wire.reactions.likes_count,
                recasts: wire.reactions.recasts_count,
                replies: wire.replies.count,
                viewer_liked: wire.viewer_context.liked,
                viewer_recasted: wire.viewer_context.recasted,
            },
        }
    }
}

impl From<WireChannel> for Channel {
    fn from(wire: WireChannel) -> Self {
        Channel {
            parent_url: wire.parent_url.unwrap_or_else(|| wire.url.clone()),
            id: wire.id,
            name: wire.name,
            url: wire.url,
            description: wire.description.unwrap_or_default(),
            follower_count: wire.follower_count.unwrap_or_default(),
            image_url: wire.image_url,
            lead_fid: wire.lead.and_then(|lead| lead.fid),
        }
    }
}
