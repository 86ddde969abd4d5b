use std::collections::{BTreeMap, VecDeque};

use crossterm::event::{KeyEvent, KeyEventKind};
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Clear, Paragraph, Widget};
use tofui_core::{Credential, SessionIdentity};
use tracing::{debug, info, warn};

use crate::command::Command;
use crate::component::{Effect, Overlay, Route, UrlOpener, ViewComponent, ViewContext};
use crate::event::{AsyncResult, Event, OverlayKind, Target, ViewName};
use crate::keymap::{GlobalAction, GlobalKeyMap};
use crate::layout::LayoutPlan;
use crate::theme::{ellipsize, Theme};
use crate::views::{
    CastView, ChannelView, Composer, FeedView, HelpOverlay, ProfileView, QuickSwitch, Sidebar,
    SignInPrompt,
};

type Pending = Vec<(Target, Effect)>;

struct Session {
    identity: SessionIdentity,
    credential: Option<Credential>,
    signin_url: String,
    theme: Theme,
}

impl Session {
    fn context(&self) -> ViewContext<'_> {
        ViewContext {
            identity: &self.identity,
            credential: self.credential.as_ref(),
            signin_url: &self.signin_url,
            theme: &self.theme,
        }
    }
}

/// Router state visible from outside, compared by replay tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterState {
    pub focused: ViewName,
    pub previous: Option<ViewName>,
    pub overlays: Vec<OverlayKind>,
    pub viewport: Rect,
    pub notice: Option<String>,
    pub credential: Option<Credential>,
    pub quit: bool,
}

/// One connected session: focus, overlays and every view component.
///
/// All state changes go through [`AppRuntime::dispatch`]; I/O only leaves as
/// returned [`Command`]s, so a runtime never blocks and never runs two events
/// at once.
pub struct AppRuntime {
    session: Session,
    keymap: GlobalKeyMap,
    components: BTreeMap<Target, Box<dyn ViewComponent>>,
    focused: ViewName,
    previous: Option<ViewName>,
    /// Last entry is the exclusive overlay.
    overlays: Vec<OverlayKind>,
    viewport: Rect,
    notice: Option<String>,
    /// Set only when the session runs on the user's own machine.
    opener: Option<Box<dyn UrlOpener>>,
    quit: bool,
}

impl AppRuntime {
    pub fn new(
        identity: SessionIdentity,
        credential: Option<Credential>,
        signin_url: impl Into<String>,
    ) -> Self {
        let mut components: BTreeMap<Target, Box<dyn ViewComponent>> = BTreeMap::new();
        components.insert(Target::View(ViewName::Feed), Box::new(FeedView::new()));
        components.insert(Target::View(ViewName::Cast), Box::new(CastView::new()));
        components.insert(Target::View(ViewName::Profile), Box::new(ProfileView::new()));
        components.insert(Target::View(ViewName::Channel), Box::new(ChannelView::new()));
        components.insert(
            Target::Overlay(OverlayKind::SignIn),
            Box::new(SignInPrompt::new()),
        );
        components.insert(
            Target::Overlay(OverlayKind::Composer),
            Box::new(Composer::new()),
        );
        components.insert(
            Target::Overlay(OverlayKind::QuickSwitch),
            Box::new(QuickSwitch::new()),
        );
        components.insert(
            Target::Overlay(OverlayKind::Help),
            Box::new(HelpOverlay::new()),
        );
        components.insert(
            Target::Overlay(OverlayKind::Sidebar),
            Box::new(Sidebar::new()),
        );

        Self {
            session: Session {
                identity,
                credential,
                signin_url: signin_url.into(),
                theme: Theme::default(),
            },
            keymap: GlobalKeyMap,
            components,
            focused: ViewName::HOME,
            previous: None,
            overlays: Vec::new(),
            viewport: Rect::default(),
            notice: None,
            opener: None,
            quit: false,
        }
    }

    /// Lets `OpenUrl` effects reach a browser instead of the status line.
    pub fn set_url_opener(&mut self, opener: Box<dyn UrlOpener>) {
        self.opener = Some(opener);
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.session.identity
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.session.credential.as_ref()
    }

    pub fn focused(&self) -> ViewName {
        self.focused
    }

    pub fn previous(&self) -> Option<ViewName> {
        self.previous
    }

    pub fn overlays(&self) -> &[OverlayKind] {
        &self.overlays
    }

    pub fn exclusive(&self) -> Option<OverlayKind> {
        self.overlays.last().copied()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn layout(&self) -> LayoutPlan {
        LayoutPlan::compute(self.viewport)
    }

    pub fn state(&self) -> RouterState {
        RouterState {
            focused: self.focused,
            previous: self.previous,
            overlays: self.overlays.clone(),
            viewport: self.viewport,
            notice: self.notice.clone(),
            credential: self.session.credential.clone(),
            quit: self.quit,
        }
    }

    /// Startup batch. Also re-run after sign-in to re-parameterise the feeds.
    pub fn init(&mut self) -> Vec<Command> {
        let mut pending = Pending::new();
        if self.session.credential.is_none() && !self.overlays.contains(&OverlayKind::SignIn) {
            pending.extend(self.open_overlay(Overlay::SignIn));
        }
        self.call(Target::View(ViewName::Feed), |component, ctx| {
            component.enter(&Route::Home, ctx)
        });
        pending.extend(self.init_component(Target::Overlay(OverlayKind::Sidebar)));
        pending.extend(self.init_component(Target::View(self.focused)));
        self.run(pending)
    }

    /// Opens the composer for the focused view, as `local --compose` does.
    pub fn request_compose(&mut self) -> Vec<Command> {
        let pending = self.global(GlobalAction::Compose);
        self.run(pending)
    }

    pub fn dispatch(&mut self, event: Event) -> Vec<Command> {
        debug!(
            event = "runtime_event",
            kind = event.kind(),
            identity = self.session.identity.short()
        );
        match event {
            Event::Key(key) => self.dispatch_key(key),
            Event::Resize { width, height } => {
                self.resize(width, height);
                Vec::new()
            }
            Event::Focus(view) => {
                self.close_transient();
                let pending = self.focus(view);
                self.run(pending)
            }
            Event::AsyncResult(result) => self.apply_result(result),
            Event::CredentialUpdated(credential) => {
                info!(
                    event = "credential_applied",
                    identity = self.session.identity.short(),
                    fid = credential.fid
                );
                self.notice = Some(format!("signed in as {}", credential.label()));
                self.session.credential = Some(credential);
                self.close_overlay(OverlayKind::SignIn);
                self.init()
            }
            Event::Quit => {
                self.quit = true;
                Vec::new()
            }
        }
    }

    fn dispatch_key(&mut self, key: KeyEvent) -> Vec<Command> {
        if key.kind == KeyEventKind::Release {
            return Vec::new();
        }
        if self.keymap.is_force_quit(&key) {
            self.quit = true;
            return Vec::new();
        }
        self.notice = None;

        if let Some(kind) = self.exclusive() {
            let target = Target::Overlay(kind);
            let delegated = self
                .components
                .get(&target)
                .is_some_and(|component| component.delegates(&key));
            if !delegated {
                let effects = self
                    .call(target, |component, ctx| component.dispatch(key, ctx))
                    .unwrap_or_default();
                return self.run(tagged(target, effects));
            }
        }

        if let Some(action) = self.keymap.action(&key) {
            let pending = self.global(action);
            return self.run(pending);
        }

        let target = Target::View(self.focused);
        let effects = self
            .call(target, |component, ctx| component.dispatch(key, ctx))
            .unwrap_or_default();
        self.run(tagged(target, effects))
    }

    fn global(&mut self, action: GlobalAction) -> Pending {
        match action {
            GlobalAction::Quit => {
                self.quit = true;
                Pending::new()
            }
            GlobalAction::Home => self.navigate(Route::Home),
            GlobalAction::Back => self.back(),
            GlobalAction::Compose => {
                let target = self
                    .components
                    .get(&Target::View(self.focused))
                    .map(|component| component.compose_target())
                    .unwrap_or_default();
                self.open_overlay(Overlay::Composer(target))
            }
            GlobalAction::QuickSwitch => self.open_overlay(Overlay::QuickSwitch),
            GlobalAction::Help => self.toggle(Overlay::Help),
            GlobalAction::Sidebar => self.toggle(Overlay::Sidebar),
        }
    }

    fn apply_result(&mut self, result: AsyncResult) -> Vec<Command> {
        let AsyncResult { tag, outcome } = result;
        let target = tag.target;
        let current = self
            .components
            .get(&target)
            .is_some_and(|component| component.accepts(&tag));
        if !current {
            debug!(
                event = "stale_result_discarded",
                target = target.name(),
                context = %tag.context,
                generation = tag.generation
            );
            return Vec::new();
        }
        let effects = self
            .call(target, |component, ctx| component.apply(&tag, outcome, ctx))
            .unwrap_or_default();
        self.run(tagged(target, effects))
    }

    fn resize(&mut self, width: u16, height: u16) {
        self.viewport = Rect::new(0, 0, width, height);
        let plan = self.layout();
        for (target, component) in self.components.iter_mut() {
            let area = match target {
                Target::View(_) => plan.main,
                Target::Overlay(OverlayKind::Sidebar) => plan.side,
                Target::Overlay(_) => plan.dialog,
            };
            component.resize(area.width, area.height);
        }
    }

    /// Applies effects breadth-first; effects raised while handling one are
    /// appended, so a component never re-enters the router recursively.
    fn run(&mut self, pending: Pending) -> Vec<Command> {
        let mut queue: VecDeque<(Target, Effect)> = pending.into();
        let mut commands = Vec::new();
        while let Some((source, effect)) = queue.pop_front() {
            match effect {
                Effect::Run(command) => commands.push(command),
                Effect::Navigate(route) => queue.extend(self.navigate(route)),
                Effect::Open(overlay) => queue.extend(self.open_overlay(overlay)),
                Effect::Close => {
                    if let Target::Overlay(kind) = source {
                        self.close_overlay(kind);
                    }
                }
                Effect::Back => queue.extend(self.back()),
                Effect::Notice(text) => self.notice = Some(text),
                Effect::OpenUrl(url) => self.open_url(url),
            }
        }
        commands
    }

    fn open_url(&mut self, url: String) {
        let Some(opener) = &self.opener else {
            self.notice = Some(format!("open {url}"));
            return;
        };
        match opener.open(&url) {
            Ok(()) => {
                debug!(event = "url_opened", url = %url);
                self.notice = Some(format!("opened {url}"));
            }
            Err(err) => {
                warn!(event = "url_open_failed", url = %url, error = %err);
                self.notice = Some(format!("open {url}"));
            }
        }
    }

    fn navigate(&mut self, route: Route) -> Pending {
        self.close_transient();
        let view = route.view();
        self.call(Target::View(view), |component, ctx| {
            component.enter(&route, ctx)
        });
        self.focus(view)
    }

    fn back(&mut self) -> Pending {
        match self.previous {
            Some(view) => self.focus(view),
            None if self.focused == ViewName::HOME => Pending::new(),
            None => self.focus(ViewName::HOME),
        }
    }

    fn focus(&mut self, view: ViewName) -> Pending {
        if view == ViewName::HOME {
            self.previous = None;
        } else if view != self.focused {
            self.previous = Some(self.focused);
        }
        self.focused = view;
        self.init_component(Target::View(view))
    }

    fn toggle(&mut self, overlay: Overlay) -> Pending {
        let kind = overlay.kind();
        if self.overlays.contains(&kind) {
            self.close_overlay(kind);
            Pending::new()
        } else {
            self.open_overlay(overlay)
        }
    }

    fn open_overlay(&mut self, overlay: Overlay) -> Pending {
        let overlay = match overlay {
            Overlay::Composer(_) if self.session.credential.is_none() => {
                self.notice = Some("sign in to publish".to_string());
                Overlay::SignIn
            }
            other => other,
        };
        let kind = overlay.kind();
        self.overlays.retain(|open| *open != kind);
        self.overlays.push(kind);
        let target = Target::Overlay(kind);
        let effects = self
            .call(target, |component, ctx| {
                component.open(&overlay, ctx);
                component.init(ctx)
            })
            .unwrap_or_default();
        tagged(target, effects)
    }

    fn close_overlay(&mut self, kind: OverlayKind) {
        let before = self.overlays.len();
        self.overlays.retain(|open| *open != kind);
        if self.overlays.len() != before {
            if let Some(component) = self.components.get_mut(&Target::Overlay(kind)) {
                component.close();
            }
        }
    }

    fn close_transient(&mut self) {
        let transient: Vec<OverlayKind> = self
            .overlays
            .iter()
            .copied()
            .filter(|kind| kind.is_transient())
            .collect();
        for kind in transient {
            self.close_overlay(kind);
        }
    }

    fn init_component(&mut self, target: Target) -> Pending {
        let effects = self
            .call(target, |component, ctx| component.init(ctx))
            .unwrap_or_default();
        tagged(target, effects)
    }

    fn call<R>(
        &mut self,
        target: Target,
        f: impl FnOnce(&mut dyn ViewComponent, &ViewContext<'_>) -> R,
    ) -> Option<R> {
        let ctx = self.session.context();
        let component = self.components.get_mut(&target)?;
        Some(f(component.as_mut(), &ctx))
    }

    /// Draws the full frame; reads state only.
    pub fn render(&self, area: Rect, buf: &mut Buffer) {
        let plan = LayoutPlan::compute(area);
        let ctx = self.session.context();

        if plan.side.width > 0 {
            if let Some(sidebar) = self.components.get(&Target::Overlay(OverlayKind::Sidebar)) {
                sidebar.render(plan.side, buf, &ctx);
            }
        }
        if let Some(view) = self.components.get(&Target::View(self.focused)) {
            view.render(plan.main, buf, &ctx);
        }
        let dialog = self.overlays.iter().rev().find(|kind| kind.is_dialog());
        if let Some(kind) = dialog {
            if let Some(overlay) = self.components.get(&Target::Overlay(*kind)) {
                Clear.render(plan.dialog, buf);
                overlay.render(plan.dialog, buf, &ctx);
            }
        }
        self.render_status(plan.status, buf);
    }

    fn render_status(&self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 {
            return;
        }
        let theme = &self.session.theme;
        let title = match self.exclusive() {
            Some(kind) => kind.as_str().to_string(),
            None => self
                .components
                .get(&Target::View(self.focused))
                .map(|view| view.title())
                .unwrap_or_default(),
        };
        let status = match (&self.notice, &self.session.credential) {
            (Some(notice), _) => Span::styled(notice.clone(), Style::default().fg(theme.warn)),
            (None, Some(credential)) => {
                Span::styled(credential.label(), Style::default().fg(theme.ok))
            }
            (None, None) => Span::styled("not signed in", theme.muted_style()),
        };
        let width = usize::from(area.width);
        Paragraph::new(Line::from(vec![
            Span::styled(" tofui ", theme.title_style()),
            Span::styled("│ ", theme.muted_style()),
            Span::styled(ellipsize(&title, width / 3), Style::default().fg(theme.text)),
            Span::styled(" │ ", theme.muted_style()),
            status,
            Span::styled("   ", theme.muted_style()),
            Span::styled(self.keymap.short_help(), theme.muted_style()),
        ]))
        .style(Style::default().bg(theme.surface))
        .render(area, buf);
    }

    /// Current viewport rendered off-screen, one string per row.
    pub fn render_lines(&self) -> Vec<String> {
        let area = self.viewport;
        let mut buf = Buffer::empty(area);
        self.render(area, &mut buf);
        (area.top()..area.bottom())
            .map(|y| {
                let row: String = (area.left()..area.right())
                    .map(|x| buf.get(x, y).symbol())
                    .collect();
                row.trim_end().to_string()
            })
            .collect()
    }

    pub fn render_text(&self) -> String {
        self.render_lines().join("\n")
    }
}

fn tagged(target: Target, effects: Vec<Effect>) -> Pending {
    effects.into_iter().map(|effect| (target, effect)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Request;
    use crate::event::{Payload, RequestKind};
    use crate::views::feed_list::fixtures::cast;
    use crossterm::event::{KeyCode, KeyModifiers};
    use std::io;
    use std::sync::{Arc, Mutex};
    use tofui_core::{ChannelScope, FeedKind, FeedRequest};

    #[derive(Clone, Default)]
    struct RecordingOpener {
        opened: Arc<Mutex<Vec<String>>>,
        broken: bool,
    }

    impl RecordingOpener {
        fn opened(&self) -> Vec<String> {
            self.opened.lock().expect("opened").clone()
        }
    }

    impl UrlOpener for RecordingOpener {
        fn open(&self, url: &str) -> io::Result<()> {
            if self.broken {
                return Err(io::Error::new(io::ErrorKind::NotFound, "no browser"));
            }
            self.opened.lock().expect("opened").push(url.to_string());
            Ok(())
        }
    }

    fn key(ch: char) -> Event {
        Event::Key(KeyEvent::new(KeyCode::Char(ch), KeyModifiers::NONE))
    }

    fn code(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn signed_in() -> AppRuntime {
        AppRuntime::new(
            SessionIdentity::from_public_key(b"ssh-ed25519 test"),
            Some(Credential::new(7, "tok").with_username("alice")),
            "http://localhost:4200/signin?id=test",
        )
    }

    fn feed_command(commands: &[Command]) -> Command {
        commands
            .iter()
            .find(|command| command.tag.request == RequestKind::Feed)
            .cloned()
            .expect("feed command")
    }

    fn loaded(runtime: &mut AppRuntime) -> Command {
        runtime.dispatch(Event::Resize {
            width: 100,
            height: 30,
        });
        let command = feed_command(&runtime.init());
        runtime.dispatch(Event::AsyncResult(AsyncResult {
            tag: command.tag.clone(),
            outcome: Ok(Payload::Feed(vec![
                cast("0x1", 1, "alice", "first"),
                cast("0x2", 2, "bob", "second"),
            ])),
        }));
        command
    }

    #[test]
    fn init_loads_following_feed_and_sidebar() {
        let mut runtime = signed_in();
        let commands = runtime.init();
        assert_eq!(
            feed_command(&commands).request,
            Request::Feed(FeedRequest::home(Some(7)))
        );
        assert!(commands
            .iter()
            .any(|command| command.request == Request::Channels(ChannelScope::Active { fid: 7 })));
        assert!(runtime.overlays().is_empty());
    }

    #[test]
    fn stale_result_leaves_state_untouched() {
        let mut runtime = signed_in();
        let first = loaded(&mut runtime);
        // reload moves the feed to a new generation
        let reload = runtime.dispatch(key('R'));
        assert_eq!(reload.len(), 1);

        let state = runtime.state();
        let frame = runtime.render_text();
        let commands = runtime.dispatch(Event::AsyncResult(AsyncResult {
            tag: first.tag.clone(),
            outcome: Ok(Payload::Feed(vec![cast("0x9", 9, "mallory", "late")])),
        }));
        assert!(commands.is_empty());
        assert_eq!(runtime.state(), state);
        assert_eq!(runtime.render_text(), frame);
        assert!(!frame.contains("late"));
    }

    #[test]
    fn result_for_abandoned_channel_is_discarded() {
        let mut runtime = signed_in();
        loaded(&mut runtime);
        runtime.dispatch(key('j'));
        let commands = runtime.dispatch(key('c'));
        // second cast has no channel
        assert!(commands.is_empty());
        assert_eq!(runtime.notice(), Some("cast is not in a channel"));

        let mut open = |url: &str| {
            let route = Effect::Navigate(Route::Channel(url.to_string()));
            runtime.run(vec![(Target::View(ViewName::Feed), route)])
        };
        let rust = open("chain://rust");
        let zig = open("chain://zig");
        let old = feed_command(&rust);
        let frame_before = runtime.render_text();
        let state = runtime.state();
        runtime.dispatch(Event::AsyncResult(AsyncResult {
            tag: old.tag,
            outcome: Ok(Payload::Feed(vec![cast("0x5", 5, "ferris", "crab")])),
        }));
        assert_eq!(runtime.state(), state);
        assert_eq!(runtime.render_text(), frame_before);
        assert!(matches!(
            &feed_command(&zig).request,
            Request::Feed(FeedRequest { kind: FeedKind::Channel { parent_url }, .. })
                if parent_url == "chain://zig"
        ));
    }

    #[test]
    fn replay_is_deterministic() {
        fn replay() -> (Vec<Vec<Command>>, RouterState, String) {
            let mut runtime = signed_in();
            let mut issued = Vec::new();
            issued.push(runtime.dispatch(Event::Resize {
                width: 90,
                height: 24,
            }));
            let init = runtime.init();
            let feed = feed_command(&init);
            issued.push(init);
            issued.push(runtime.dispatch(Event::AsyncResult(AsyncResult {
                tag: feed.tag,
                outcome: Ok(Payload::Feed(vec![
                    cast("0x1", 1, "alice", "gm"),
                    cast("0x2", 2, "bob", "gn"),
                ])),
            })));
            for event in [key('j'), code(KeyCode::Enter), key('?'), code(KeyCode::Esc)] {
                issued.push(runtime.dispatch(event));
            }
            (issued, runtime.state(), runtime.render_text())
        }

        let first = replay();
        let second = replay();
        assert_eq!(first, second);
        assert_eq!(first.1.focused, ViewName::Cast);
    }

    #[test]
    fn composer_consumes_navigation_keys() {
        let mut runtime = signed_in();
        loaded(&mut runtime);
        runtime.dispatch(key('P'));
        assert_eq!(runtime.exclusive(), Some(OverlayKind::Composer));

        let commands = runtime.dispatch(key('F'));
        assert!(commands.is_empty());
        assert_eq!(runtime.focused(), ViewName::Feed);
        assert_eq!(runtime.exclusive(), Some(OverlayKind::Composer));
        assert!(runtime.render_text().contains("F_"));

        runtime.dispatch(code(KeyCode::Esc));
        assert!(runtime.overlays().is_empty());
    }

    #[test]
    fn help_lets_navigation_through() {
        let mut runtime = signed_in();
        loaded(&mut runtime);
        runtime.dispatch(code(KeyCode::Enter));
        assert_eq!(runtime.focused(), ViewName::Cast);
        runtime.dispatch(key('?'));
        assert_eq!(runtime.exclusive(), Some(OverlayKind::Help));

        runtime.dispatch(key('F'));
        assert_eq!(runtime.focused(), ViewName::Feed);
        assert!(runtime.overlays().is_empty());
    }

    #[test]
    fn previous_view_is_single_level() {
        let mut runtime = signed_in();
        loaded(&mut runtime);

        runtime.dispatch(code(KeyCode::Enter));
        assert_eq!(runtime.focused(), ViewName::Cast);
        assert_eq!(runtime.previous(), Some(ViewName::Feed));

        runtime.dispatch(key('p'));
        assert_eq!(runtime.focused(), ViewName::Profile);
        assert_eq!(runtime.previous(), Some(ViewName::Cast));

        runtime.dispatch(code(KeyCode::Esc));
        assert_eq!(runtime.focused(), ViewName::Cast);

        runtime.dispatch(key('1'));
        assert_eq!(runtime.focused(), ViewName::Feed);
        assert_eq!(runtime.previous(), None);
        assert!(runtime.dispatch(code(KeyCode::Esc)).is_empty());
        assert_eq!(runtime.focused(), ViewName::Feed);
    }

    #[test]
    fn focus_event_keeps_sign_in_open() {
        let mut runtime = AppRuntime::new(SessionIdentity::local(), None, "http://x/signin?id=local");
        runtime.init();
        assert_eq!(runtime.exclusive(), Some(OverlayKind::SignIn));
        runtime.dispatch(Event::Focus(ViewName::Profile));
        assert_eq!(runtime.focused(), ViewName::Profile);
        assert_eq!(runtime.overlays(), &[OverlayKind::SignIn]);
    }

    #[test]
    fn resize_partition_stays_within_width() {
        let mut runtime = signed_in();
        for (width, height) in [(0, 0), (1, 1), (10, 3), (80, 24), (151, 40), (400, 100)] {
            runtime.dispatch(Event::Resize { width, height });
            let plan = runtime.layout();
            assert!(plan.side.width + plan.main.width <= width);
            assert!(plan.status.height <= 1);
            assert_eq!(runtime.render_lines().len(), usize::from(height));
        }
    }

    #[test]
    fn credential_update_reparameterises_init() {
        let mut runtime = AppRuntime::new(SessionIdentity::local(), None, "http://x/signin?id=local");
        let commands = runtime.init();
        assert_eq!(runtime.exclusive(), Some(OverlayKind::SignIn));
        assert_eq!(
            feed_command(&commands).request,
            Request::Feed(FeedRequest::home(None))
        );

        let commands = runtime.dispatch(Event::CredentialUpdated(
            Credential::new(42, "abc").with_username("alice"),
        ));
        assert!(runtime.overlays().is_empty());
        assert_eq!(runtime.notice(), Some("signed in as @alice"));
        assert_eq!(
            feed_command(&commands).request,
            Request::Feed(FeedRequest::home(Some(42)))
        );
        assert!(commands
            .iter()
            .any(|command| command.request == Request::Channels(ChannelScope::Active { fid: 42 })));
    }

    #[test]
    fn compose_without_credential_prompts_sign_in() {
        let mut runtime = AppRuntime::new(SessionIdentity::local(), None, "http://x/signin?id=local");
        runtime.dispatch(Event::Resize {
            width: 80,
            height: 24,
        });
        runtime.request_compose();
        assert_eq!(runtime.exclusive(), Some(OverlayKind::SignIn));
        assert_eq!(runtime.notice(), Some("sign in to publish"));
    }

    #[test]
    fn force_quit_beats_exclusive_overlay() {
        let mut runtime = signed_in();
        runtime.dispatch(key('P'));
        runtime.dispatch(key('q'));
        assert!(!runtime.should_quit());
        runtime.dispatch(Event::Key(KeyEvent::new(
            KeyCode::Char('c'),
            KeyModifiers::CONTROL,
        )));
        assert!(runtime.should_quit());
    }

    #[test]
    fn remote_session_prints_cast_links() {
        let mut runtime = signed_in();
        loaded(&mut runtime);
        let commands = runtime.dispatch(key('o'));
        assert!(commands.is_empty());
        assert_eq!(runtime.notice(), Some("open https://warpcast.com/alice/0x1"));
        assert_eq!(runtime.focused(), ViewName::Feed);
    }

    #[test]
    fn local_session_opens_cast_details_in_browser() {
        let opener = RecordingOpener::default();
        let mut runtime = signed_in();
        runtime.set_url_opener(Box::new(opener.clone()));
        loaded(&mut runtime);
        runtime.dispatch(key('j'));
        let commands = runtime.dispatch(code(KeyCode::Enter));
        assert_eq!(runtime.focused(), ViewName::Cast);
        assert!(!commands.is_empty());

        runtime.dispatch(key('o'));
        assert_eq!(opener.opened(), vec!["https://warpcast.com/bob/0x2".to_string()]);
        assert_eq!(runtime.notice(), Some("opened https://warpcast.com/bob/0x2"));
    }

    #[test]
    fn sign_in_link_follows_the_session_transport() {
        let url = "http://x/signin?id=local";

        let mut remote = AppRuntime::new(SessionIdentity::local(), None, url);
        remote.init();
        remote.dispatch(code(KeyCode::Enter));
        assert_eq!(remote.exclusive(), Some(OverlayKind::SignIn));
        assert_eq!(remote.notice(), Some("open http://x/signin?id=local"));

        let opener = RecordingOpener::default();
        let mut local = AppRuntime::new(SessionIdentity::local(), None, url);
        local.set_url_opener(Box::new(opener.clone()));
        local.init();
        local.dispatch(code(KeyCode::Enter));
        assert_eq!(local.exclusive(), Some(OverlayKind::SignIn));
        assert_eq!(opener.opened(), vec![url.to_string()]);
        assert_eq!(local.notice(), Some("opened http://x/signin?id=local"));
    }

    #[test]
    fn failed_browser_launch_falls_back_to_the_link() {
        let opener = RecordingOpener {
            broken: true,
            ..RecordingOpener::default()
        };
        let mut runtime = signed_in();
        runtime.set_url_opener(Box::new(opener.clone()));
        loaded(&mut runtime);
        runtime.dispatch(key('o'));
        assert!(opener.opened().is_empty());
        assert_eq!(runtime.notice(), Some("open https://warpcast.com/alice/0x1"));
    }
}
