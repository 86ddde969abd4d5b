use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, StatefulWidget, Widget};
use tofui_core::{Channel, ChannelScope};

use crate::command::Request;
use crate::component::{Effect, Overlay, Route, Tagger, ViewComponent, ViewContext};
use crate::event::{OverlayKind, Outcome, Payload, ResultTag, Target};
use crate::keymap::typed_char;
use crate::theme::ellipsize;

/// Fuzzy channel picker opened with ctrl+k.
pub struct QuickSwitch {
    tagger: Tagger,
    query: String,
    channels: Vec<Channel>,
    loading: bool,
    error: Option<String>,
    selected: usize,
}

impl Default for QuickSwitch {
    fn default() -> Self {
        Self::new()
    }
}

impl QuickSwitch {
    pub fn new() -> Self {
        Self {
            tagger: Tagger::new(Target::Overlay(OverlayKind::QuickSwitch)),
            query: String::new(),
            channels: Vec::new(),
            loading: false,
            error: None,
            selected: 0,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn matches(&self) -> Vec<&Channel> {
        self.channels
            .iter()
            .filter(|channel| channel.matches(&self.query))
            .collect()
    }

    fn move_by(&mut self, delta: isize) {
        let len = self.matches().len();
        if len == 0 {
            return;
        }
        self.selected = self.selected.saturating_add_signed(delta).min(len - 1);
    }
}

impl ViewComponent for QuickSwitch {
    fn title(&self) -> String {
        "switch channel".to_string()
    }

    fn init(&mut self, _ctx: &ViewContext<'_>) -> Vec<Effect> {
        if !self.channels.is_empty() || self.loading {
            return Vec::new();
        }
        self.loading = true;
        self.error = None;
        self.tagger.reset("channels:all");
        vec![self.tagger.run(Request::Channels(ChannelScope::All))]
    }

    fn open(&mut self, _overlay: &Overlay, _ctx: &ViewContext<'_>) {
        self.query.clear();
        self.selected = 0;
    }

    fn dispatch(&mut self, key: KeyEvent, _ctx: &ViewContext<'_>) -> Vec<Effect> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => return vec![Effect::Close],
            KeyCode::Enter => {
                let url = self
                    .matches()
                    .get(self.selected)
                    .map(|channel| channel.feed_url().to_string());
                if let Some(url) = url {
                    return vec![Effect::Navigate(Route::Channel(url)), Effect::Close];
                }
            }
            KeyCode::Down => self.move_by(1),
            KeyCode::Up => self.move_by(-1),
            KeyCode::Char('n') if ctrl => self.move_by(1),
            KeyCode::Char('p') if ctrl => self.move_by(-1),
            KeyCode::Backspace => {
                self.query.pop();
                self.selected = 0;
            }
            _ => {
                if let Some(ch) = typed_char(&key) {
                    self.query.push(ch);
                    self.selected = 0;
                }
            }
        }
        Vec::new()
    }

    fn resize(&mut self, _width: u16, _height: u16) {}

    fn render(&self, area: Rect, buf: &mut Buffer, ctx: &ViewContext<'_>) {
        let theme = ctx.theme;
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(theme.border_style(true))
            .title(Span::styled(self.title(), theme.title_style()));
        let inner = block.inner(area);
        block.render(area, buf);

        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Min(0)])
            .split(inner);
        Paragraph::new(Line::from(vec![
            Span::styled("> ", Style::default().fg(theme.accent)),
            Span::styled(self.query.clone(), Style::default().fg(theme.text)),
            Span::styled("_", theme.muted_style()),
        ]))
        .render(sections[0], buf);

        let matches = self.matches();
        if matches.is_empty() {
            let message = match (&self.error, self.loading) {
                (Some(err), _) => Span::styled(
                    format!("error: {err}"),
                    Style::default().fg(theme.critical),
                ),
                (None, true) => Span::styled("loading channels...", theme.muted_style()),
                (None, false) => Span::styled("no matching channels", theme.muted_style()),
            };
            Paragraph::new(Line::from(message)).render(sections[1], buf);
            return;
        }

        let width = usize::from(sections[1].width.saturating_sub(2));
        let items: Vec<ListItem> = matches
            .iter()
            .map(|channel| {
                ListItem::new(Line::from(vec![
                    Span::styled(format!("/{}", channel.id), Style::default().fg(theme.text)),
                    Span::styled(
                        ellipsize(&format!("  {}", channel.name), width),
                        theme.muted_style(),
                    ),
                ]))
            })
            .collect();
        let list = List::new(items)
            .highlight_style(theme.selected_style())
            .highlight_symbol("> ");
        let mut state = ListState::default().with_selected(Some(self.selected));
        StatefulWidget::render(list, sections[1], buf, &mut state);
    }

    fn accepts(&self, tag: &ResultTag) -> bool {
        self.tagger.accepts(tag)
    }

    fn apply(&mut self, _tag: &ResultTag, outcome: Outcome, _ctx: &ViewContext<'_>) -> Vec<Effect> {
        self.loading = false;
        match outcome {
            Ok(Payload::Channels(channels)) => {
                self.channels = channels;
                self.selected = 0;
            }
            Ok(_) => {}
            Err(err) => self.error = Some(err.to_string()),
        }
        Vec::new()
    }
}
