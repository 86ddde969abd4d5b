use crossterm::event::KeyEvent;
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget, Wrap};
use tofui_core::{Cast, FeedKind, FeedRequest, ReactionKind};

use crate::command::Request;
use crate::component::{ComposeTarget, Effect, Overlay, Route, Tagger, ViewComponent, ViewContext};
use crate::event::{Outcome, Payload, RequestKind, ResultTag, Target, ViewName};
use crate::keymap::typed_char;
use crate::theme::format_timestamp;
use crate::views::feed_list::{cast_lines, cast_web_url, reaction_effect, FeedList};

/// Single cast with its direct replies.
pub struct CastView {
    tagger: Tagger,
    cast: Option<Cast>,
    replies: FeedList,
    height: u16,
}

impl Default for CastView {
    fn default() -> Self {
        Self::new()
    }
}

impl CastView {
    pub fn new() -> Self {
        Self {
            tagger: Tagger::new(Target::View(ViewName::Cast)),
            cast: None,
            replies: FeedList::default(),
            height: 0,
        }
    }

    pub fn cast(&self) -> Option<&Cast> {
        self.cast.as_ref()
    }

    fn header_height(&self) -> u16 {
        // half the view, leaving room for at least a few replies
        (self.height / 2).max(6)
    }

    fn main_cast_key(&mut self, ch: char, ctx: &ViewContext<'_>) -> Option<Vec<Effect>> {
        let cast = self.cast.as_ref()?;
        let effects = match ch {
            'l' => vec![reaction_effect(cast, ReactionKind::Like, ctx, &self.tagger)],
            's' => vec![reaction_effect(cast, ReactionKind::Recast, ctx, &self.tagger)],
            'r' => vec![Effect::Open(Overlay::Composer(ComposeTarget::reply_to(cast)))],
            'p' => vec![Effect::Navigate(Route::Profile(cast.author.fid))],
            'o' => vec![Effect::OpenUrl(cast_web_url(cast))],
            'c' => match &cast.parent_url {
                Some(url) => vec![Effect::Navigate(Route::Channel(url.clone()))],
                None => vec![Effect::Notice("cast is not in a channel".to_string())],
            },
            _ => return None,
        };
        Some(effects)
    }
}

impl ViewComponent for CastView {
    fn title(&self) -> String {
        match &self.cast {
            Some(cast) => format!("cast by @{}", cast.author.username),
            None => "cast".to_string(),
        }
    }

    fn init(&mut self, ctx: &ViewContext<'_>) -> Vec<Effect> {
        let Some(cast) = &self.cast else {
            return Vec::new();
        };
        let request = FeedRequest::new(FeedKind::Thread {
            hash: cast.hash.clone(),
        })
        .with_viewer(ctx.viewer_fid());
        self.tagger.bump();
        self.replies.begin_loading();
        vec![self.tagger.run(Request::Feed(request))]
    }

    fn enter(&mut self, route: &Route, _ctx: &ViewContext<'_>) {
        if let Route::Cast(cast) = route {
            self.tagger.reset(format!("cast:{}", cast.hash));
            self.cast = Some(cast.as_ref().clone());
            self.replies.clear();
        }
    }

    fn dispatch(&mut self, key: KeyEvent, ctx: &ViewContext<'_>) -> Vec<Effect> {
        if let Some(ch) = typed_char(&key) {
            if let Some(effects) = self.main_cast_key(ch, ctx) {
                return effects;
            }
        }
        self.replies
            .handle_key(&key, ctx, &self.tagger)
            .unwrap_or_default()
    }

    fn resize(&mut self, _width: u16, height: u16) {
        self.height = height;
    }

    fn render(&self, area: Rect, buf: &mut Buffer, ctx: &ViewContext<'_>) {
        let theme = ctx.theme;
        let Some(cast) = &self.cast else {
            Paragraph::new(Span::styled("no cast selected", theme.muted_style()))
                .block(Block::default().borders(Borders::ALL).title("cast"))
                .render(area, buf);
            return;
        };

        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(self.header_height()), Constraint::Min(0)])
            .split(area);

        let mut lines = cast_lines(cast, theme, usize::from(area.width.saturating_sub(2)));
        // full text replaces the one-line preview
        lines.remove(1);
        let stats = lines.pop();
        lines.push(Line::from(""));
        for text in cast.text.lines() {
            lines.push(Line::from(Span::styled(
                text.to_string(),
                Style::default().fg(theme.text),
            )));
        }
        for embed in &cast.embeds {
            lines.push(Line::from(Span::styled(
                format!("[{embed}]"),
                Style::default().fg(theme.accent),
            )));
        }
        lines.push(Line::from(""));
        if let Some(stats) = stats {
            lines.push(stats);
        }
        if let Some(url) = &cast.parent_url {
            lines.push(Line::from(Span::styled(
                format!("in {url}"),
                theme.muted_style(),
            )));
        }
        lines.push(Line::from(Span::styled(
            format!("posted {}", format_timestamp(&cast.timestamp)),
            theme.muted_style(),
        )));

        Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(theme.border_style(true))
                    .title(Span::styled(self.title(), theme.title_style())),
            )
            .wrap(Wrap { trim: false })
            .render(sections[0], buf);

        self.replies.render(
            sections[1],
            buf,
            theme,
            &format!("replies ({})", cast.reactions.replies),
        );
    }

    fn accepts(&self, tag: &ResultTag) -> bool {
        self.tagger.accepts(tag)
    }

    fn apply(&mut self, tag: &ResultTag, outcome: Outcome, _ctx: &ViewContext<'_>) -> Vec<Effect> {
        match (tag.request, outcome) {
            (_, Ok(Payload::Feed(replies))) => self.replies.set_items(replies),
            (_, Ok(Payload::Reacted { hash, kind })) => {
                if let Some(cast) = self.cast.as_mut().filter(|cast| cast.hash == hash) {
                    cast.apply_reaction(kind);
                } else {
                    self.replies.mark_reacted(&hash, kind);
                }
            }
            (RequestKind::React, Err(err)) => {
                return vec![Effect::Notice(format!("reaction failed: {err}"))];
            }
            (_, Err(err)) => self.replies.fail(&err),
            (_, Ok(_)) => {}
        }
        Vec::new()
    }

    fn compose_target(&self) -> ComposeTarget {
        self.cast
            .as_ref()
            .map(ComposeTarget::reply_to)
            .unwrap_or_default()
    }
}
