use crossterm::event::{KeyCode, KeyEvent};
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::Style;
use ratatui::text::Span;
use ratatui::widgets::{Block, Borders, Row, Table, Widget};

use crate::component::{Effect, ViewComponent, ViewContext};
use crate::event::{Outcome, ResultTag};
use crate::keymap::{typed_char, Binding, GlobalAction, GlobalKeyMap, COMPOSER_BINDINGS, LIST_BINDINGS};

pub struct HelpOverlay {
    keymap: GlobalKeyMap,
}

impl Default for HelpOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl HelpOverlay {
    pub fn new() -> Self {
        Self {
            keymap: GlobalKeyMap,
        }
    }

    fn rows(&self) -> Vec<(&'static str, &'static Binding)> {
        let mut rows: Vec<(&'static str, &'static Binding)> = self
            .keymap
            .bindings()
            .map(|binding| ("global", binding))
            .collect();
        rows.extend(LIST_BINDINGS.iter().map(|binding| ("lists", binding)));
        rows.extend(COMPOSER_BINDINGS.iter().map(|binding| ("composer", binding)));
        rows
    }
}

impl ViewComponent for HelpOverlay {
    fn title(&self) -> String {
        "help".to_string()
    }

    fn init(&mut self, _ctx: &ViewContext<'_>) -> Vec<Effect> {
        Vec::new()
    }

    fn dispatch(&mut self, key: KeyEvent, _ctx: &ViewContext<'_>) -> Vec<Effect> {
        if key.code == KeyCode::Esc || typed_char(&key) == Some('?') {
            return vec![Effect::Close];
        }
        Vec::new()
    }

    /// Help is read-only, so navigation keeps working underneath it.
    fn delegates(&self, key: &KeyEvent) -> bool {
        matches!(
            self.keymap.action(key),
            Some(action) if !matches!(action, GlobalAction::Help | GlobalAction::Back)
        )
    }

    fn resize(&mut self, _width: u16, _height: u16) {}

    fn render(&self, area: Rect, buf: &mut Buffer, ctx: &ViewContext<'_>) {
        let theme = ctx.theme;
        let mut last_section = "";
        let rows: Vec<Row> = self
            .rows()
            .into_iter()
            .map(|(section, binding)| {
                let heading = if section == last_section { "" } else { section };
                last_section = section;
                Row::new(vec![
                    Span::styled(heading, theme.muted_style()),
                    Span::styled(binding.label, Style::default().fg(theme.accent)),
                    Span::styled(binding.help, Style::default().fg(theme.text)),
                ])
            })
            .collect();
        Table::new(
            rows,
            [
                Constraint::Length(10),
                Constraint::Length(10),
                Constraint::Min(10),
            ],
        )
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(theme.border_style(true))
                .title(Span::styled("keys (esc to close)", theme.title_style())),
        )
        .render(area, buf);
    }

    fn accepts(&self, _tag: &ResultTag) -> bool {
        false
    }

    fn apply(&mut self, _tag: &ResultTag, _outcome: Outcome, _ctx: &ViewContext<'_>) -> Vec<Effect> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    #[test]
    fn navigation_passes_through_help() {
        let help = HelpOverlay::new();
        let home = KeyEvent::new(KeyCode::Char('F'), KeyModifiers::NONE);
        let toggle = KeyEvent::new(KeyCode::Char('?'), KeyModifiers::NONE);
        let esc = KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE);
        assert!(help.delegates(&home));
        assert!(!help.delegates(&toggle));
        assert!(!help.delegates(&esc));
    }

    #[test]
    fn every_section_is_listed() {
        let help = HelpOverlay::new();
        let rows = help.rows();
        for section in ["global", "lists", "composer"] {
            assert!(rows.iter().any(|(name, _)| *name == section));
        }
        assert!(rows.iter().any(|(_, binding)| binding.label == "ctrl+c"));
    }
}
