use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tofui_core::{
    Cast, Channel, ChannelScope, ContentError, ContentService, FeedKind, FeedRequest,
    PublishRequest, PublishResult, ReactionKind, User,
};
use tracing::debug;

use crate::wire::{
    ChannelResponse, ChannelsResponse, ConversationResponse, ErrorBody, FeedResponse, PublishBody,
    PublishResponse, ReactionBody, ReactionResponse, UsersResponse,
};

pub const DEFAULT_API_BASE_URL: &str = "https://api.neynar.com/v2/farcaster";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const CHANNEL_LIST_LIMIT: u32 = 200;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl ApiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            api_key: api_key.into(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    config: ApiConfig,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self, ContentError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let api_key = HeaderValue::from_str(&config.api_key)
            .map_err(|_| ContentError::InvalidRequest("api key is not a valid header".into()))?;
        headers.insert("api_key", api_key);

        let http = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| ContentError::Network(err.to_string()))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&'static str, String)],
    ) -> Result<T, ContentError> {
        debug!(event = "api_request", method = "GET", path);
        let request = self.http.get(self.url(path)).query(query);
        self.send(request).await
    }

    async fn post_json<B: serde::Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ContentError> {
        debug!(event = "api_request", method = "POST", path);
        let request = self.http.post(self.url(path)).json(body);
        self.send(request).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ContentError> {
        let response = request
            .send()
            .await
            .map_err(|err| self.map_transport_error(err))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| self.map_transport_error(err))?;
        if !status.is_success() {
            return Err(status_error(status, &body));
        }
        serde_json::from_slice(&body).map_err(|err| ContentError::Decode(err.to_string()))
    }

    fn map_transport_error(&self, err: reqwest::Error) -> ContentError {
        if err.is_timeout() {
            ContentError::Timeout(self.config.timeout.as_millis() as u64)
        } else if err.is_decode() {
            ContentError::Decode(err.to_string())
        } else {
            ContentError::Network(err.to_string())
        }
    }
}

fn status_error(status: StatusCode, body: &[u8]) -> ContentError {
    let message = serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.message)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
    if status == StatusCode::UNAUTHORIZED {
        return ContentError::Unauthenticated;
    }
    ContentError::Status {
        status: status.as_u16(),
        message,
    }
}

/// Path and query parameters for a feed request.
pub(crate) fn feed_query(request: &FeedRequest) -> (&'static str, Vec<(&'static str, String)>) {
    let mut query = Vec::new();
    let path = match &request.kind {
        FeedKind::Following { fid } => {
            query.push(("feed_type", "following".to_string()));
            query.push(("fid", fid.to_string()));
            "/feed"
        }
        FeedKind::Trending => "/feed/trending",
        FeedKind::Channel { parent_url } => {
            query.push(("feed_type", "filter".to_string()));
            query.push(("filter_type", "parent_url".to_string()));
            query.push(("parent_url", parent_url.clone()));
            "/feed"
        }
        FeedKind::Profile { fid } => {
            query.push(("feed_type", "filter".to_string()));
            query.push(("filter_type", "fids".to_string()));
            query.push(("fids", fid.to_string()));
            "/feed"
        }
        FeedKind::Thread { hash } => {
            query.push(("identifier", hash.clone()));
            query.push(("type", "hash".to_string()));
            query.push(("reply_depth", "1".to_string()));
            "/cast/conversation"
        }
    };
    query.push(("limit", request.limit.to_string()));
    if let Some(cursor) = &request.cursor {
        query.push(("cursor", cursor.clone()));
    }
    if let Some(viewer) = request.viewer_fid {
        query.push(("viewer_fid", viewer.to_string()));
    }
    (path, query)
}

#[async_trait]
impl ContentService for ApiClient {
    async fn get_feed(&self, request: &FeedRequest) -> Result<Vec<Cast>, ContentError> {
        let (path, query) = feed_query(request);
        if matches!(request.kind, FeedKind::Thread { .. }) {
            let response: ConversationResponse = self.get_json(path, &query).await?;
            return Ok(response
                .conversation
                .cast
                .direct_replies
                .into_iter()
                .map(Cast::from)
                .collect());
        }
        let response: FeedResponse = self.get_json(path, &query).await?;
        Ok(response.casts.into_iter().map(Cast::from).collect())
    }

    async fn get_user(&self, fid: u64, viewer_fid: Option<u64>) -> Result<User, ContentError> {
        let mut query = vec![("fids", fid.to_string())];
        if let Some(viewer) = viewer_fid {
            query.push(("viewer_fid", viewer.to_string()));
        }
        let response: UsersResponse = self.get_json("/user/bulk", &query).await?;
        response
            .users
            .into_iter()
            .next()
            .map(User::from)
            .ok_or_else(|| ContentError::Status {
                status: 404,
                message: format!("user {fid} not found"),
            })
    }

    async fn get_channel(&self, parent_url: &str) -> Result<Channel, ContentError> {
        let query = [
            ("id", parent_url.to_string()),
            ("type", "parent_url".to_string()),
        ];
        let response: ChannelResponse = self.get_json("/channel", &query).await?;
        Ok(response.channel.into())
    }

    async fn list_channels(&self, scope: ChannelScope) -> Result<Vec<Channel>, ContentError> {
        let response: ChannelsResponse = match scope {
            ChannelScope::Active { fid } => {
                let query = [("fid", fid.to_string()), ("limit", "25".to_string())];
                self.get_json("/channel/user", &query).await?
            }
            ChannelScope::All => {
                let query = [("limit", CHANNEL_LIST_LIMIT.to_string())];
                self.get_json("/channel/list", &query).await?
            }
        };
        Ok(response.channels.into_iter().map(Channel::from).collect())
    }

    async fn publish(&self, request: &PublishRequest) -> Result<PublishResult, ContentError> {
        if request.text.trim().is_empty() {
            return Err(ContentError::InvalidRequest("cast text is empty".into()));
        }
        let parent = request
            .parent_hash
            .as_deref()
            .or(request.channel_url.as_deref());
        let body = PublishBody {
            signer_uuid: &request.token,
            text: &request.text,
            parent,
            parent_author_fid: request.parent_author_fid,
        };
        let response: PublishResponse = self.post_json("/cast", &body).await?;
        match response.cast {
            Some(cast) if response.success => Ok(PublishResult { hash: cast.hash }),
            _ => Err(ContentError::Status {
                status: 200,
                message: "cast was not accepted".to_string(),
            }),
        }
    }

    async fn react(
        &self,
        token: &str,
        cast_hash: &str,
        kind: ReactionKind,
    ) -> Result<(), ContentError> {
        let body = ReactionBody {
            signer_uuid: token,
            reaction_type: kind.as_str(),
            target: cast_hash,
        };
        let response: ReactionResponse = self.post_json("/reaction", &body).await?;
        if response.success {
            Ok(())
        } else {
            Err(ContentError::Status {
                status: 200,
                message: response
                    .message
                    .unwrap_or_else(|| "reaction was not accepted".to_string()),
            })
        }
    }
}
