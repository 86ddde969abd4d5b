use crossterm::event::KeyEvent;
use tofui_core::{Cast, Channel, ContentError, Credential, PublishResult, ReactionKind, User};

/// Main views that can hold focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ViewName {
    Feed,
    Cast,
    Profile,
    Channel,
}

impl ViewName {
    pub const HOME: ViewName = ViewName::Feed;

    pub fn as_str(self) -> &'static str {
        match self {
            ViewName::Feed => "feed",
            ViewName::Cast => "cast",
            ViewName::Profile => "profile",
            ViewName::Channel => "channel",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OverlayKind {
    SignIn,
    Composer,
    QuickSwitch,
    Help,
    Sidebar,
}

impl OverlayKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OverlayKind::SignIn => "sign-in",
            OverlayKind::Composer => "composer",
            OverlayKind::QuickSwitch => "quick-switch",
            OverlayKind::Help => "help",
            OverlayKind::Sidebar => "sidebar",
        }
    }

    /// Dialog overlays draw over the main area; the sidebar keeps its panel.
    pub fn is_dialog(self) -> bool {
        !matches!(self, OverlayKind::Sidebar)
    }

    /// Transient overlays are dismissed by navigation.
    pub fn is_transient(self) -> bool {
        !matches!(self, OverlayKind::SignIn)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Target {
    View(ViewName),
    Overlay(OverlayKind),
}

impl Target {
    pub fn name(self) -> &'static str {
        match self {
            Target::View(view) => view.as_str(),
            Target::Overlay(overlay) => overlay.as_str(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Feed,
    User,
    Channel,
    Channels,
    Publish,
    React,
}

/// Correlates a command result with the component state that issued it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResultTag {
    pub target: Target,
    pub request: RequestKind,
    pub context: String,
    pub generation: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Feed(Vec<Cast>),
    User(User),
    Channel(Channel),
    Channels(Vec<Channel>),
    Published(PublishResult),
    Reacted { hash: String, kind: ReactionKind },
}

pub type Outcome = Result<Payload, ContentError>;

#[derive(Debug, Clone, PartialEq)]
pub struct AsyncResult {
    pub tag: ResultTag,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Key(KeyEvent),
    Resize { width: u16, height: u16 },
    Focus(ViewName),
    AsyncResult(AsyncResult),
    CredentialUpdated(Credential),
    Quit,
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Key(_) => "key",
            Event::Resize { .. } => "resize",
            Event::Focus(_) => "focus",
            Event::AsyncResult(_) => "async_result",
            Event::CredentialUpdated(_) => "credential_updated",
            Event::Quit => "quit",
        }
    }
}
