use crossterm::event::KeyEvent;
use std::io;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use tofui_core::{Cast, Credential, SessionIdentity};

use crate::command::{Command, Request};
use crate::event::{OverlayKind, Outcome, ResultTag, Target, ViewName};
use crate::theme::Theme;

/// Read-only session state handed to components on every call.
#[derive(Debug, Clone, Copy)]
pub struct ViewContext<'a> {
    pub identity: &'a SessionIdentity,
    pub credential: Option<&'a Credential>,
    pub signin_url: &'a str,
    pub theme: &'a Theme,
}

impl ViewContext<'_> {
    pub fn viewer_fid(&self) -> Option<u64> {
        self.credential.map(|credential| credential.fid)
    }

    pub fn token(&self) -> Option<&str> {
        self.credential.map(|credential| credential.token.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Home,
    Cast(Box<Cast>),
    Profile(u64),
    Channel(String),
}

impl Route {
    pub fn view(&self) -> ViewName {
        match self {
            Route::Home => ViewName::Feed,
            Route::Cast(_) => ViewName::Cast,
            Route::Profile(_) => ViewName::Profile,
            Route::Channel(_) => ViewName::Channel,
        }
    }
}

/// Where a new cast will be attached.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ComposeTarget {
    pub parent_hash: Option<String>,
    pub parent_author_fid: Option<u64>,
    pub parent_author: Option<String>,
    pub channel_url: Option<String>,
    pub channel_name: Option<String>,
}

impl ComposeTarget {
    pub fn reply_to(cast: &Cast) -> Self {
        Self {
            parent_hash: Some(cast.hash.clone()),
            parent_author_fid: Some(cast.author.fid),
            parent_author: Some(cast.author.username.clone()),
            channel_url: cast.parent_url.clone(),
            channel_name: None,
        }
    }

    pub fn channel(url: impl Into<String>, name: Option<String>) -> Self {
        Self {
            channel_url: Some(url.into()),
            channel_name: name,
            ..Self::default()
        }
    }

    pub fn describe(&self) -> String {
        match (&self.parent_author, &self.channel_name, &self.channel_url) {
            (Some(author), _, _) => format!("reply to @{author}"),
            (None, Some(name), _) => format!("new cast in /{name}"),
            (None, None, Some(url)) => format!("new cast in {url}"),
            (None, None, None) => "new cast".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Overlay {
    SignIn,
    Composer(ComposeTarget),
    QuickSwitch,
    Help,
    Sidebar,
}

impl Overlay {
    pub fn kind(&self) -> OverlayKind {
        match self {
            Overlay::SignIn => OverlayKind::SignIn,
            Overlay::Composer(_) => OverlayKind::Composer,
            Overlay::QuickSwitch => OverlayKind::QuickSwitch,
            Overlay::Help => OverlayKind::Help,
            Overlay::Sidebar => OverlayKind::Sidebar,
        }
    }
}

/// State changes a component asks the runtime to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Run(Command),
    Navigate(Route),
    Open(Overlay),
    /// Closes the overlay that returned it.
    Close,
    Back,
    Notice(String),
    /// Shows a link outside the terminal when the session can, otherwise
    /// prints it in the status line.
    OpenUrl(String),
}

/// Hands a URL to something that can display it, such as the host's browser.
pub trait UrlOpener: Send {
    fn open(&self, url: &str) -> io::Result<()>;
}

pub trait ViewComponent: Send {
    fn title(&self) -> String;

    fn init(&mut self, ctx: &ViewContext<'_>) -> Vec<Effect>;

    fn dispatch(&mut self, key: KeyEvent, ctx: &ViewContext<'_>) -> Vec<Effect>;

    fn resize(&mut self, width: u16, height: u16);

    fn render(&self, area: Rect, buf: &mut Buffer, ctx: &ViewContext<'_>);

    /// False when `tag` was issued for state this component has moved past.
    fn accepts(&self, tag: &ResultTag) -> bool;

    fn apply(&mut self, tag: &ResultTag, outcome: Outcome, ctx: &ViewContext<'_>) -> Vec<Effect>;

    fn enter(&mut self, _route: &Route, _ctx: &ViewContext<'_>) {}

    fn open(&mut self, _overlay: &Overlay, _ctx: &ViewContext<'_>) {}

    fn close(&mut self) {}

    /// Keys an exclusive overlay lets through to global navigation.
    fn delegates(&self, _key: &KeyEvent) -> bool {
        false
    }

    fn compose_target(&self) -> ComposeTarget {
        ComposeTarget::default()
    }
}

/// Generation counter that makes late results detectable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tagger {
    target: Target,
    context: String,
    generation: u64,
}

impl Tagger {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            context: String::new(),
            generation: 0,
        }
    }

    /// Starts a new generation, optionally for a different resource.
    pub fn reset(&mut self, context: impl Into<String>) {
        self.context = context.into();
        self.generation += 1;
    }

    pub fn bump(&mut self) {
        self.generation += 1;
    }

    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn tag(&self, request: &Request) -> ResultTag {
        ResultTag {
            target: self.target,
            request: request.kind(),
            context: self.context.clone(),
            generation: self.generation,
        }
    }

    pub fn command(&self, request: Request) -> Command {
        Command {
            tag: self.tag(&request),
            request,
        }
    }

    pub fn run(&self, request: Request) -> Effect {
        Effect::Run(self.command(request))
    }

    pub fn accepts(&self, tag: &ResultTag) -> bool {
        tag.target == self.target && tag.generation == self.generation && tag.context == self.context
    }
}
