pub mod content;
pub mod identity;

pub use content::{
    Cast, CastReactions, Channel, ChannelScope, ContentError, ContentService, FeedKind,
    FeedRequest, PublishRequest, PublishResult, ReactionKind, User, DEFAULT_FEED_LIMIT,
};
pub use identity::{Credential, IdentityError, SessionIdentity};
