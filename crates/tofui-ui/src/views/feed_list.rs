use crossterm::event::{KeyCode, KeyEvent};
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::block::{Position, Title};
use ratatui::widgets::{
    Block, Borders, List, ListItem, ListState, Paragraph, StatefulWidget, Widget, Wrap,
};
use tofui_core::{Cast, ContentError, ReactionKind};

use crate::command::Request;
use crate::component::{ComposeTarget, Effect, Overlay, Route, Tagger, ViewContext};
use crate::keymap::typed_char;
use crate::theme::{ellipsize, first_line, format_timestamp, Theme};

const PAGE_STEP: usize = 10;
pub const CAST_WEB_BASE: &str = "https://warpcast.com";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Loaded,
    Failed(String),
}

/// Selectable list of casts shared by every feed-like view.
#[derive(Debug, Clone, Default)]
pub struct FeedList {
    items: Vec<Cast>,
    selected: usize,
    state: LoadState,
}

impl FeedList {
    pub fn clear(&mut self) {
        self.items.clear();
        self.selected = 0;
        self.state = LoadState::Idle;
    }

    /// Existing items stay visible until the refresh lands.
    pub fn begin_loading(&mut self) {
        self.state = LoadState::Loading;
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn items(&self) -> &[Cast] {
        &self.items
    }

    pub fn set_items(&mut self, items: Vec<Cast>) {
        self.selected = self.selected.min(items.len().saturating_sub(1));
        self.items = items;
        self.state = LoadState::Loaded;
    }

    pub fn fail(&mut self, err: &ContentError) {
        self.state = LoadState::Failed(err.to_string());
    }

    pub fn selected(&self) -> Option<&Cast> {
        self.items.get(self.selected)
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    fn move_by(&mut self, delta: isize) {
        if self.items.is_empty() {
            return;
        }
        let last = self.items.len() - 1;
        self.selected = self.selected.saturating_add_signed(delta).min(last);
    }

    pub fn mark_reacted(&mut self, hash: &str, kind: ReactionKind) -> bool {
        match self.items.iter_mut().find(|cast| cast.hash == hash) {
            Some(cast) => {
                cast.apply_reaction(kind);
                true
            }
            None => false,
        }
    }

    /// Shared list bindings; `None` when the key is not a list key.
    pub fn handle_key(
        &mut self,
        key: &KeyEvent,
        ctx: &ViewContext<'_>,
        tagger: &Tagger,
    ) -> Option<Vec<Effect>> {
        if let Some(ch) = typed_char(key) {
            let effects = match ch {
                'j' => {
                    self.move_by(1);
                    Vec::new()
                }
                'k' => {
                    self.move_by(-1);
                    Vec::new()
                }
                'g' => {
                    self.selected = 0;
                    Vec::new()
                }
                'G' => {
                    self.selected = self.items.len().saturating_sub(1);
                    Vec::new()
                }
                'p' => self
                    .selected()
                    .map(|cast| vec![Effect::Navigate(Route::Profile(cast.author.fid))])
                    .unwrap_or_default(),
                'c' => self.selected().map(open_channel).unwrap_or_default(),
                'o' => self
                    .selected()
                    .map(|cast| vec![Effect::OpenUrl(cast_web_url(cast))])
                    .unwrap_or_default(),
                'l' => self
                    .selected()
                    .map(|cast| vec![reaction_effect(cast, ReactionKind::Like, ctx, tagger)])
                    .unwrap_or_default(),
                's' => self
                    .selected()
                    .map(|cast| vec![reaction_effect(cast, ReactionKind::Recast, ctx, tagger)])
                    .unwrap_or_default(),
                'r' => self
                    .selected()
                    .map(|cast| {
                        vec![Effect::Open(Overlay::Composer(ComposeTarget::reply_to(
                            cast,
                        )))]
                    })
                    .unwrap_or_default(),
                _ => return None,
            };
            return Some(effects);
        }

        let effects = match key.code {
            KeyCode::Down => {
                self.move_by(1);
                Vec::new()
            }
            KeyCode::Up => {
                self.move_by(-1);
                Vec::new()
            }
            KeyCode::PageDown => {
                self.move_by(PAGE_STEP as isize);
                Vec::new()
            }
            KeyCode::PageUp => {
                self.move_by(-(PAGE_STEP as isize));
                Vec::new()
            }
            KeyCode::Home => {
                self.selected = 0;
                Vec::new()
            }
            KeyCode::End => {
                self.selected = self.items.len().saturating_sub(1);
                Vec::new()
            }
            KeyCode::Enter => self
                .selected()
                .map(|cast| vec![Effect::Navigate(Route::Cast(Box::new(cast.clone())))])
                .unwrap_or_default(),
            _ => return None,
        };
        Some(effects)
    }

    pub fn render(&self, area: Rect, buf: &mut Buffer, theme: &Theme, title: &str) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(theme.border_style(false))
            .title(Span::styled(title.to_string(), theme.title_style()));

        if self.items.is_empty() {
            let message = match &self.state {
                LoadState::Idle | LoadState::Loading => {
                    Line::from(Span::styled("loading...", theme.muted_style()))
                }
                LoadState::Failed(err) => Line::from(Span::styled(
                    format!("error: {err}"),
                    Style::default().fg(theme.critical),
                )),
                LoadState::Loaded => Line::from(Span::styled(
                    "nothing here yet",
                    theme.muted_style(),
                )),
            };
            Paragraph::new(message)
                .block(block)
                .wrap(Wrap { trim: true })
                .render(area, buf);
            return;
        }

        let inner_width = area.width.saturating_sub(4) as usize;
        let items: Vec<ListItem> = self
            .items
            .iter()
            .map(|cast| ListItem::new(Text::from(cast_lines(cast, theme, inner_width))))
            .collect();

        let block = match &self.state {
            LoadState::Loading => block.title(
                Title::from(Span::styled(" refreshing ", theme.muted_style()))
                    .position(Position::Bottom),
            ),
            LoadState::Failed(err) => block.title(
                Title::from(Span::styled(
                    format!(" error: {} ", ellipsize(err, inner_width.saturating_sub(10))),
                    Style::default().fg(theme.critical),
                ))
                .position(Position::Bottom),
            ),
            _ => block,
        };

        let list = List::new(items)
            .block(block)
            .highlight_style(theme.selected_style())
            .highlight_symbol("> ");
        let mut state = ListState::default().with_selected(Some(self.selected));
        StatefulWidget::render(list, area, buf, &mut state);
    }
}

fn open_channel(cast: &Cast) -> Vec<Effect> {
    match &cast.parent_url {
        Some(url) => vec![Effect::Navigate(Route::Channel(url.clone()))],
        None => vec![Effect::Notice("cast is not in a channel".to_string())],
    }
}

pub fn cast_web_url(cast: &Cast) -> String {
    format!("{CAST_WEB_BASE}/{}/{}", cast.author.username, cast.hash)
}

pub fn reaction_effect(
    cast: &Cast,
    kind: ReactionKind,
    ctx: &ViewContext<'_>,
    tagger: &Tagger,
) -> Effect {
    match ctx.token() {
        Some(token) => tagger.run(Request::React {
            token: token.to_string(),
            hash: cast.hash.clone(),
            kind,
        }),
        None => Effect::Open(Overlay::SignIn),
    }
}

pub fn cast_lines(cast: &Cast, theme: &Theme, width: usize) -> Vec<Line<'static>> {
    let author = if cast.author.display_name.is_empty() {
        cast.author.username.clone()
    } else {
        cast.author.display_name.clone()
    };
    let liked = if cast.reactions.viewer_liked {
        Style::default().fg(theme.critical)
    } else {
        theme.muted_style()
    };
    let recasted = if cast.reactions.viewer_recasted {
        Style::default().fg(theme.ok)
    } else {
        theme.muted_style()
    };
    vec![
        Line::from(vec![
            Span::styled(
                author,
                Style::default()
                    .fg(theme.text)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!(" @{}", cast.author.username), theme.muted_style()),
            Span::styled(
                format!("  {}", format_timestamp(&cast.timestamp)),
                theme.muted_style(),
            ),
        ]),
        Line::from(Span::styled(
            ellipsize(first_line(&cast.text), width),
            Style::default().fg(theme.text),
        )),
        Line::from(vec![
            Span::styled(format!("♥ {}", cast.reactions.likes), liked),
            Span::raw("  "),
            Span::styled(format!("↻ {}", cast.reactions.recasts), recasted),
            Span::raw("  "),
            Span::styled(format!("↩ {}", cast.reactions.replies), theme.muted_style()),
        ]),
    ]
}
