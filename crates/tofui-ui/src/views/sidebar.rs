use crossterm::event::{KeyCode, KeyEvent};
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::block::{Position, Title};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, StatefulWidget};
use tofui_core::{Channel, ChannelScope};

use crate::command::Request;
use crate::component::{Effect, Overlay, Route, Tagger, ViewComponent, ViewContext};
use crate::event::{OverlayKind, Outcome, Payload, ResultTag, Target};
use crate::keymap::typed_char;
use crate::theme::ellipsize;

#[derive(Debug, Clone, PartialEq)]
enum Entry {
    Home,
    Profile(u64),
    Channel { label: String, url: String },
}

impl Entry {
    fn label(&self) -> String {
        match self {
            Entry::Home => "home".to_string(),
            Entry::Profile(_) => "my profile".to_string(),
            Entry::Channel { label, .. } => format!("/{label}"),
        }
    }

    fn route(&self) -> Route {
        match self {
            Entry::Home => Route::Home,
            Entry::Profile(fid) => Route::Profile(*fid),
            Entry::Channel { url, .. } => Route::Channel(url.clone()),
        }
    }
}

/// Side panel with shortcuts and the viewer's active channels.
///
/// Always drawn; it only takes keys while open as an overlay.
pub struct Sidebar {
    tagger: Tagger,
    active: bool,
    loaded_for: Option<u64>,
    channels: Vec<Channel>,
    error: Option<String>,
    selected: usize,
}

impl Default for Sidebar {
    fn default() -> Self {
        Self::new()
    }
}

impl Sidebar {
    pub fn new() -> Self {
        Self {
            tagger: Tagger::new(Target::Overlay(OverlayKind::Sidebar)),
            active: false,
            loaded_for: None,
            channels: Vec::new(),
            error: None,
            selected: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    fn entries(&self, ctx: &ViewContext<'_>) -> Vec<Entry> {
        let mut entries = vec![Entry::Home];
        if let Some(fid) = ctx.viewer_fid() {
            entries.push(Entry::Profile(fid));
        }
        entries.extend(self.channels.iter().map(|channel| Entry::Channel {
            label: channel.id.clone(),
            url: channel.feed_url().to_string(),
        }));
        entries
    }

    fn move_by(&mut self, delta: isize, len: usize) {
        if len == 0 {
            return;
        }
        self.selected = self.selected.saturating_add_signed(delta).min(len - 1);
    }
}

impl ViewComponent for Sidebar {
    fn title(&self) -> String {
        "sidebar".to_string()
    }

    /// Active channels are per account; nothing is fetched until sign-in.
    fn init(&mut self, ctx: &ViewContext<'_>) -> Vec<Effect> {
        let Some(fid) = ctx.viewer_fid() else {
            return Vec::new();
        };
        if self.loaded_for == Some(fid) {
            return Vec::new();
        }
        self.loaded_for = Some(fid);
        self.channels.clear();
        self.error = None;
        self.selected = 0;
        self.tagger.reset(format!("sidebar:{fid}"));
        vec![self
            .tagger
            .run(Request::Channels(ChannelScope::Active { fid }))]
    }

    fn open(&mut self, _overlay: &Overlay, _ctx: &ViewContext<'_>) {
        self.active = true;
    }

    fn close(&mut self) {
        self.active = false;
    }

    fn dispatch(&mut self, key: KeyEvent, ctx: &ViewContext<'_>) -> Vec<Effect> {
        let entries = self.entries(ctx);
        match (typed_char(&key), key.code) {
            (Some('j'), _) | (_, KeyCode::Down) => self.move_by(1, entries.len()),
            (Some('k'), _) | (_, KeyCode::Up) => self.move_by(-1, entries.len()),
            (_, KeyCode::Enter) => {
                if let Some(entry) = entries.get(self.selected) {
                    return vec![Effect::Navigate(entry.route()), Effect::Close];
                }
            }
            (_, KeyCode::Esc) | (_, KeyCode::Tab) => return vec![Effect::Close],
            _ => {}
        }
        Vec::new()
    }

    fn delegates(&self, key: &KeyEvent) -> bool {
        // global chords still work while browsing the sidebar
        typed_char(key).is_some_and(|ch| matches!(ch, 'F' | '1' | 'P' | '?' | 'q'))
    }

    fn resize(&mut self, _width: u16, _height: u16) {}

    fn render(&self, area: Rect, buf: &mut Buffer, ctx: &ViewContext<'_>) {
        let theme = ctx.theme;
        let width = usize::from(area.width.saturating_sub(4));
        let account = match ctx.credential {
            Some(credential) => credential.label(),
            None => "not signed in".to_string(),
        };

        let mut block = Block::default()
            .borders(Borders::ALL)
            .border_style(theme.border_style(self.active))
            .title(Span::styled(ellipsize(&account, width), theme.title_style()));
        if let Some(err) = &self.error {
            block = block.title(
                Title::from(Span::styled(
                    ellipsize(err, width),
                    Style::default().fg(theme.critical),
                ))
                .position(Position::Bottom),
            );
        }

        let items: Vec<ListItem> = self
            .entries(ctx)
            .iter()
            .map(|entry| {
                ListItem::new(Line::from(Span::styled(
                    ellipsize(&entry.label(), width),
                    Style::default().fg(theme.text),
                )))
            })
            .collect();
        let mut list = List::new(items).block(block);
        let mut state = ListState::default();
        if self.active {
            list = list
                .highlight_style(theme.selected_style())
                .highlight_symbol("> ");
            state = state.with_selected(Some(self.selected));
        }
        StatefulWidget::render(list, area, buf, &mut state);
    }

    fn accepts(&self, tag: &ResultTag) -> bool {
        self.tagger.accepts(tag)
    }

    fn apply(&mut self, _tag: &ResultTag, outcome: Outcome, _ctx: &ViewContext<'_>) -> Vec<Effect> {
        match outcome {
            Ok(Payload::Channels(channels)) => {
                self.channels = channels;
                self.error = None;
            }
            Ok(_) => {}
            Err(err) => {
                // allow the next init to retry
                self.loaded_for = None;
                self.error = Some(err.to_string());
            }
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::Theme;
    use crossterm::event::KeyModifiers;
    use tofui_core::{Credential, SessionIdentity};

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn active_channels_load_once_per_account() {
        let identity = SessionIdentity::local();
        let theme = Theme::default();
        let mut sidebar = Sidebar::new();

        let anonymous = ViewContext {
            identity: &identity,
            credential: None,
            signin_url: "",
            theme: &theme,
        };
        assert!(sidebar.init(&anonymous).is_empty());

        let credential = Credential::new(42, "abc");
        let ctx = ViewContext {
            credential: Some(&credential),
            ..anonymous
        };
        let effects = sidebar.init(&ctx);
        let [Effect::Run(command)] = effects.as_slice() else {
            panic!("expected channel list command");
        };
        assert_eq!(
            command.request,
            Request::Channels(ChannelScope::Active { fid: 42 })
        );
        assert!(sidebar.init(&ctx).is_empty());
    }

    #[test]
    fn enter_navigates_and_closes() {
        let identity = SessionIdentity::local();
        let theme = Theme::default();
        let credential = Credential::new(42, "abc");
        let ctx = ViewContext {
            identity: &identity,
            credential: Some(&credential),
            signin_url: "",
            theme: &theme,
        };
        let mut sidebar = Sidebar::new();
        let effects = sidebar.init(&ctx);
        let [Effect::Run(command)] = effects.as_slice() else {
            panic!("expected channel list command");
        };
        sidebar.apply(
            &command.tag,
            Ok(Payload::Channels(vec![Channel {
                id: "rust".to_string(),
                name: "Rust".to_string(),
                parent_url: "chain://rust".to_string(),
                ..Channel::default()
            }])),
            &ctx,
        );

        sidebar.open(&Overlay::Sidebar, &ctx);
        assert!(sidebar.is_active());
        sidebar.dispatch(key(KeyCode::Down), &ctx);
        sidebar.dispatch(key(KeyCode::Char('j')), &ctx);
        let effects = sidebar.dispatch(key(KeyCode::Enter), &ctx);
        assert_eq!(
            effects,
            vec![
                Effect::Navigate(Route::Channel("chain://rust".to_string())),
                Effect::Close
            ]
        );
        assert_eq!(sidebar.dispatch(key(KeyCode::Esc), &ctx), vec![Effect::Close]);
    }
}
