use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget, Wrap};
use tofui_core::PublishRequest;

use crate::command::Request;
use crate::component::{ComposeTarget, Effect, Overlay, Tagger, ViewComponent, ViewContext};
use crate::event::{OverlayKind, Outcome, Payload, ResultTag, Target};
use crate::keymap::typed_char;

/// Protocol limit on cast text, counted in characters.
pub const MAX_CAST_CHARS: usize = 320;

/// Exclusive overlay for writing a cast or reply.
///
/// Consumes every key while open. Publishing goes through a y/n
/// confirmation so a stray ctrl+d never posts.
pub struct Composer {
    tagger: Tagger,
    target: ComposeTarget,
    text: String,
    confirming: bool,
    sending: bool,
    error: Option<String>,
}

impl Default for Composer {
    fn default() -> Self {
        Self::new()
    }
}

impl Composer {
    pub fn new() -> Self {
        Self {
            tagger: Tagger::new(Target::Overlay(OverlayKind::Composer)),
            target: ComposeTarget::default(),
            text: String::new(),
            confirming: false,
            sending: false,
            error: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn target(&self) -> &ComposeTarget {
        &self.target
    }

    pub fn is_confirming(&self) -> bool {
        self.confirming
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn remaining(&self) -> isize {
        MAX_CAST_CHARS as isize - self.text.chars().count() as isize
    }

    fn reset(&mut self) {
        self.text.clear();
        self.confirming = false;
        self.sending = false;
        self.error = None;
    }

    fn push(&mut self, ch: char) {
        if self.text.chars().count() >= MAX_CAST_CHARS {
            self.error = Some(format!("casts are limited to {MAX_CAST_CHARS} characters"));
            return;
        }
        self.error = None;
        self.text.push(ch);
    }

    fn request_publish(&mut self) {
        if self.text.trim().is_empty() {
            self.error = Some("nothing to publish".to_string());
            return;
        }
        self.error = None;
        self.confirming = true;
    }

    fn publish(&mut self, ctx: &ViewContext<'_>) -> Vec<Effect> {
        self.confirming = false;
        let Some(token) = ctx.token() else {
            return vec![Effect::Open(Overlay::SignIn)];
        };
        self.sending = true;
        self.tagger.bump();
        vec![self.tagger.run(Request::Publish(PublishRequest {
            token: token.to_string(),
            text: self.text.trim_end().to_string(),
            parent_hash: self.target.parent_hash.clone(),
            parent_author_fid: self.target.parent_author_fid,
            channel_url: self.target.channel_url.clone(),
        }))]
    }

    fn confirm_key(&mut self, key: &KeyEvent, ctx: &ViewContext<'_>) -> Vec<Effect> {
        match (typed_char(key), key.code) {
            (Some('y'), _) | (Some('Y'), _) => self.publish(ctx),
            (Some('n'), _) | (Some('N'), _) | (_, KeyCode::Esc) => {
                self.confirming = false;
                Vec::new()
            }
            _ => Vec::new(),
        }
    }
}

impl ViewComponent for Composer {
    fn title(&self) -> String {
        self.target.describe()
    }

    fn init(&mut self, _ctx: &ViewContext<'_>) -> Vec<Effect> {
        Vec::new()
    }

    fn open(&mut self, overlay: &Overlay, _ctx: &ViewContext<'_>) {
        let Overlay::Composer(target) = overlay else {
            return;
        };
        // a publish in flight keeps its draft until the result lands
        if self.sending || *target == self.target {
            return;
        }
        self.reset();
        self.target = target.clone();
        self.tagger.reset(format!("compose:{}", self.target.describe()));
    }

    fn close(&mut self) {
        self.confirming = false;
    }

    fn dispatch(&mut self, key: KeyEvent, ctx: &ViewContext<'_>) -> Vec<Effect> {
        if self.sending {
            return Vec::new();
        }
        if self.confirming {
            return self.confirm_key(&key, ctx);
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            if key.code == KeyCode::Char('d') {
                self.request_publish();
            }
            return Vec::new();
        }
        match key.code {
            KeyCode::Esc => {
                self.reset();
                return vec![Effect::Close];
            }
            KeyCode::Enter => self.push('\n'),
            KeyCode::Backspace => {
                self.text.pop();
                self.error = None;
            }
            _ => {
                if let Some(ch) = typed_char(&key) {
                    self.push(ch);
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
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(inner);

        let mut lines: Vec<Line> = self
            .text
            .split('\n')
            .map(|line| Line::from(Span::styled(line.to_string(), Style::default().fg(theme.text))))
            .collect();
        if let Some(last) = lines.last_mut() {
            last.spans.push(Span::styled("_", theme.muted_style()));
        }
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .render(sections[0], buf);

        let footer = if self.sending {
            Span::styled("publishing...", theme.muted_style())
        } else if self.confirming {
            Span::styled(
                "publish this cast? y/n",
                Style::default()
                    .fg(theme.warn)
                    .add_modifier(Modifier::BOLD),
            )
        } else if let Some(err) = &self.error {
            Span::styled(err.clone(), Style::default().fg(theme.critical))
        } else {
            let remaining = self.remaining();
            let style = if remaining < 20 {
                Style::default().fg(theme.warn)
            } else {
                theme.muted_style()
            };
            Span::styled(format!("{remaining} left  ctrl+d publish  esc discard"), style)
        };
        Paragraph::new(Line::from(footer)).render(sections[1], buf);
    }

    fn accepts(&self, tag: &ResultTag) -> bool {
        self.tagger.accepts(tag)
    }

    fn apply(&mut self, _tag: &ResultTag, outcome: Outcome, _ctx: &ViewContext<'_>) -> Vec<Effect> {
        self.sending = false;
        match outcome {
            Ok(Payload::Published(result)) => {
                self.reset();
                self.target = ComposeTarget::default();
                vec![
                    Effect::Close,
                    Effect::Notice(format!("cast published {}", result.hash)),
                ]
            }
            Ok(_) => Vec::new(),
            Err(err) => {
                self.error = Some(format!("publish failed: {err}"));
                Vec::new()
            }
        }
    }
}
