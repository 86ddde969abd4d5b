use crossterm::event::{KeyCode, KeyEvent};
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget, Wrap};

use crate::component::{Effect, Overlay, ViewComponent, ViewContext};
use crate::event::{Outcome, ResultTag};
use crate::keymap::{GlobalAction, GlobalKeyMap};

/// Prompt shown until the browser sign-in completes.
///
/// The overlay never finishes the flow itself: the session is told through
/// a credential update, which closes it.
pub struct SignInPrompt {
    keymap: GlobalKeyMap,
    revealed: bool,
}

impl Default for SignInPrompt {
    fn default() -> Self {
        Self::new()
    }
}

impl SignInPrompt {
    pub fn new() -> Self {
        Self {
            keymap: GlobalKeyMap,
            revealed: false,
        }
    }

    pub fn is_revealed(&self) -> bool {
        self.revealed
    }
}

impl ViewComponent for SignInPrompt {
    fn title(&self) -> String {
        "sign in".to_string()
    }

    fn init(&mut self, _ctx: &ViewContext<'_>) -> Vec<Effect> {
        Vec::new()
    }

    fn open(&mut self, _overlay: &Overlay, _ctx: &ViewContext<'_>) {
        self.revealed = false;
    }

    fn dispatch(&mut self, key: KeyEvent, ctx: &ViewContext<'_>) -> Vec<Effect> {
        match key.code {
            KeyCode::Enter => {
                self.revealed = true;
                vec![Effect::OpenUrl(ctx.signin_url.to_string())]
            }
            KeyCode::Esc => vec![Effect::Close],
            _ => Vec::new(),
        }
    }

    fn delegates(&self, key: &KeyEvent) -> bool {
        self.keymap.action(key) == Some(GlobalAction::Quit)
    }

    fn resize(&mut self, _width: u16, _height: u16) {}

    fn render(&self, area: Rect, buf: &mut Buffer, ctx: &ViewContext<'_>) {
        let theme = ctx.theme;
        let mut lines = vec![
            Line::from(Span::styled(
                "welcome to tofui",
                Style::default()
                    .fg(theme.title)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(Span::styled(
                "sign in to see your feed, publish and react.",
                Style::default().fg(theme.text),
            )),
            Line::from(""),
        ];
        if self.revealed {
            lines.push(Line::from(Span::styled(
                "open this link in a browser:",
                theme.muted_style(),
            )));
            lines.push(Line::from(Span::styled(
                ctx.signin_url.to_string(),
                Style::default()
                    .fg(theme.accent)
                    .add_modifier(Modifier::UNDERLINED),
            )));
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                "this screen updates once sign-in completes.",
                theme.muted_style(),
            )));
        } else {
            lines.push(Line::from(Span::styled(
                "enter  open sign-in link",
                Style::default().fg(theme.text),
            )));
        }
        lines.push(Line::from(Span::styled(
            "esc    browse without signing in",
            theme.muted_style(),
        )));
        lines.push(Line::from(Span::styled("q      quit", theme.muted_style())));

        Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(theme.border_style(true))
                    .title(Span::styled(self.title(), theme.title_style())),
            )
            .wrap(Wrap { trim: false })
            .render(area, buf);
    }

    fn accepts(&self, _tag: &ResultTag) -> bool {
        false
    }

    fn apply(&mut self, _tag: &ResultTag, _outcome: Outcome, _ctx: &ViewContext<'_>) -> Vec<Effect> {
        Vec::new()
    }
}
