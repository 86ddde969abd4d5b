use std::sync::Arc;
use std::time::Duration;
use tofui_core::{
    ChannelScope, ContentError, ContentService, FeedRequest, PublishRequest, ReactionKind,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::event::{AsyncResult, Event, Outcome, Payload, RequestKind, ResultTag};

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Feed(FeedRequest),
    User {
        fid: u64,
        viewer_fid: Option<u64>,
    },
    Channel {
        parent_url: String,
    },
    Channels(ChannelScope),
    Publish(PublishRequest),
    React {
        token: String,
        hash: String,
        kind: ReactionKind,
    },
}

impl Request {
    pub fn kind(&self) -> RequestKind {
        match self {
            Request::Feed(_) => RequestKind::Feed,
            Request::User { .. } => RequestKind::User,
            Request::Channel { .. } => RequestKind::Channel,
            Request::Channels(_) => RequestKind::Channels,
            Request::Publish(_) => RequestKind::Publish,
            Request::React { .. } => RequestKind::React,
        }
    }
}

/// Asynchronous work requested by a component, tagged for correlation.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub tag: ResultTag,
    pub request: Request,
}

/// Runs commands off the session loop and posts one result event each.
#[derive(Clone)]
pub struct Executor {
    service: Arc<dyn ContentService>,
    events: mpsc::Sender<Event>,
    timeout: Duration,
}

impl Executor {
    pub fn new(service: Arc<dyn ContentService>, events: mpsc::Sender<Event>) -> Self {
        Self {
            service,
            events,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn spawn_all(&self, commands: Vec<Command>) {
        for command in commands {
            self.spawn(command);
        }
    }

    pub fn spawn(&self, command: Command) -> JoinHandle<()> {
        let executor = self.clone();
        tokio::spawn(async move {
            let Command { tag, request } = command;
            debug!(
                event = "command_started",
                target = tag.target.name(),
                context = %tag.context,
                generation = tag.generation
            );
            let outcome = executor.execute(request).await;
            if let Err(err) = &outcome {
                warn!(
                    event = "command_failed",
                    target = tag.target.name(),
                    context = %tag.context,
                    error = %err
                );
            }
            let result = Event::AsyncResult(AsyncResult { tag, outcome });
            if executor.events.send(result).await.is_err() {
                debug!(event = "command_result_dropped", reason = "session_closed");
            }
        })
    }

    pub async fn execute(&self, request: Request) -> Outcome {
        match tokio::time::timeout(self.timeout, perform(self.service.as_ref(), request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ContentError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}

async fn perform(service: &dyn ContentService, request: Request) -> Outcome {
    match request {
        Request::Feed(feed) => service.get_feed(&feed).await.map(Payload::Feed),
        Request::User { fid, viewer_fid } => {
            service.get_user(fid, viewer_fid).await.map(Payload::User)
        }
        Request::Channel { parent_url } => {
            service.get_channel(&parent_url).await.map(Payload::Channel)
        }
        Request::Channels(scope) => service.list_channels(scope).await.map(Payload::Channels),
        Request::Publish(publish) => service.publish(&publish).await.map(Payload::Published),
        Request::React { token, hash, kind } => {
            service.react(&token, &hash, kind).await?;
            Ok(Payload::Reacted { hash, kind })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Target, ViewName};
    use async_trait::async_trait;
    use tofui_core::{Cast, Channel, PublishResult, User};

    struct SlowService {
        delay: Duration,
    }

    #[async_trait]
    impl ContentService for SlowService {
        async fn get_feed(&self, _request: &FeedRequest) -> Result<Vec<Cast>, ContentError> {
            tokio::time::sleep(self.delay).await;
            Ok(Vec::new())
        }

        async fn get_user(&self, fid: u64, _viewer: Option<u64>) -> Result<User, ContentError> {
            Ok(User {
                fid,
                username: "alice".to_string(),
                ..User::default()
            })
        }

        async fn get_channel(&self, _parent_url: &str) -> Result<Channel, ContentError> {
            Err(ContentError::Network("connection refused".to_string()))
        }

        async fn list_channels(&self, _scope: ChannelScope) -> Result<Vec<Channel>, ContentError> {
            Ok(Vec::new())
        }

        async fn publish(&self, _request: &PublishRequest) -> Result<PublishResult, ContentError> {
            Ok(PublishResult {
                hash: "0x1".to_string(),
            })
        }

        async fn react(&self, _: &str, _: &str, _: ReactionKind) -> Result<(), ContentError> {
            Ok(())
        }
    }

    fn tag(request: RequestKind) -> ResultTag {
        ResultTag {
            target: Target::View(ViewName::Profile),
            request,
            context: "profile:7".to_string(),
            generation: 3,
        }
    }

    #[tokio::test]
    async fn result_carries_the_issuing_tag() {
        let (tx, mut rx) = mpsc::channel(4);
        let executor = Executor::new(
            Arc::new(SlowService {
                delay: Duration::ZERO,
            }),
            tx,
        );

        executor
            .spawn(Command {
                tag: tag(RequestKind::User),
                request: Request::User {
                    fid: 7,
                    viewer_fid: None,
                },
            })
            .await
            .expect("command task");

        let Some(Event::AsyncResult(result)) = rx.recv().await else {
            panic!("expected async result");
        };
        assert_eq!(result.tag, tag(RequestKind::User));
        let Ok(Payload::User(user)) = result.outcome else {
            panic!("expected user payload");
        };
        assert_eq!(user.fid, 7);
    }

    #[tokio::test]
    async fn hung_dependency_times_out() {
        let (tx, _rx) = mpsc::channel(4);
        let executor = Executor::new(
            Arc::new(SlowService {
                delay: Duration::from_secs(30),
            }),
            tx,
        )
        .with_timeout(Duration::from_millis(20));

        let outcome = executor
            .execute(Request::Feed(FeedRequest::home(None)))
            .await;
        assert_eq!(outcome, Err(ContentError::Timeout(20)));
    }

    #[tokio::test]
    async fn failures_are_delivered_as_results() {
        let (tx, mut rx) = mpsc::channel(4);
        let executor = Executor::new(
            Arc::new(SlowService {
                delay: Duration::ZERO,
            }),
            tx,
        );
        executor.spawn_all(vec![Command {
            tag: tag(RequestKind::Channel),
            request: Request::Channel {
                parent_url: "chain://rust".to_string(),
            },
        }]);

        let Some(Event::AsyncResult(result)) = rx.recv().await else {
            panic!("expected async result");
        };
        assert!(matches!(result.outcome, Err(ContentError::Network(_))));
    }

    #[tokio::test]
    async fn closed_session_drops_result_quietly() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let executor = Executor::new(
            Arc::new(SlowService {
                delay: Duration::ZERO,
            }),
            tx,
        );
        executor
            .spawn(Command {
                tag: tag(RequestKind::React),
                request: Request::React {
                    token: "t".to_string(),
                    hash: "0x1".to_string(),
                    kind: ReactionKind::Like,
                },
            })
            .await
            .expect("command task completes without panicking");
    }
}
