use crossterm::event::KeyEvent;
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget, Wrap};
use tofui_core::{Channel, FeedKind, FeedRequest};

use crate::command::Request;
use crate::component::{ComposeTarget, Effect, Route, Tagger, ViewComponent, ViewContext};
use crate::event::{Outcome, Payload, RequestKind, ResultTag, Target, ViewName};
use crate::keymap::typed_char;
use crate::views::feed_list::FeedList;

const HEADER_HEIGHT: u16 = 5;

/// Channel metadata above the channel feed.
pub struct ChannelView {
    tagger: Tagger,
    parent_url: Option<String>,
    channel: Option<Channel>,
    casts: FeedList,
}

impl Default for ChannelView {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelView {
    pub fn new() -> Self {
        Self {
            tagger: Tagger::new(Target::View(ViewName::Channel)),
            parent_url: None,
            channel: None,
            casts: FeedList::default(),
        }
    }

    pub fn parent_url(&self) -> Option<&str> {
        self.parent_url.as_deref()
    }

    pub fn channel(&self) -> Option<&Channel> {
        self.channel.as_ref()
    }

    pub fn casts(&self) -> &FeedList {
        &self.casts
    }

    fn header_lines(&self, ctx: &ViewContext<'_>) -> Vec<Line<'static>> {
        let theme = ctx.theme;
        match &self.channel {
            Some(channel) => vec![
                Line::from(vec![
                    Span::styled(
                        format!("/{}", channel.id),
                        Style::default()
                            .fg(theme.text)
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::styled(format!("  {}", channel.name), theme.muted_style()),
                    Span::styled(
                        format!("  {} followers", channel.follower_count),
                        theme.muted_style(),
                    ),
                ]),
                Line::from(Span::styled(
                    channel.description.clone(),
                    Style::default().fg(theme.text),
                )),
            ],
            None => vec![Line::from(Span::styled(
                self.parent_url.clone().unwrap_or_default(),
                theme.muted_style(),
            ))],
        }
    }
}

impl ViewComponent for ChannelView {
    fn title(&self) -> String {
        match (&self.channel, &self.parent_url) {
            (Some(channel), _) => format!("channel /{}", channel.id),
            (None, Some(url)) => format!("channel {url}"),
            (None, None) => "channel".to_string(),
        }
    }

    fn init(&mut self, ctx: &ViewContext<'_>) -> Vec<Effect> {
        let Some(parent_url) = self.parent_url.clone() else {
            return Vec::new();
        };
        self.tagger.bump();
        self.casts.begin_loading();
        let feed = FeedRequest::new(FeedKind::Channel {
            parent_url: parent_url.clone(),
        })
        .with_viewer(ctx.viewer_fid());
        vec![
            self.tagger.run(Request::Channel { parent_url }),
            self.tagger.run(Request::Feed(feed)),
        ]
    }

    fn enter(&mut self, route: &Route, _ctx: &ViewContext<'_>) {
        let Route::Channel(url) = route else {
            return;
        };
        if self.parent_url.as_deref() == Some(url.as_str()) {
            return;
        }
        self.tagger.reset(format!("channel:{url}"));
        self.parent_url = Some(url.clone());
        self.channel = None;
        self.casts.clear();
    }

    fn dispatch(&mut self, key: KeyEvent, ctx: &ViewContext<'_>) -> Vec<Effect> {
        if typed_char(&key) == Some('R') {
            return self.init(ctx);
        }
        self.casts
            .handle_key(&key, ctx, &self.tagger)
            .unwrap_or_default()
    }

    fn resize(&mut self, _width: u16, _height: u16) {}

    fn render(&self, area: Rect, buf: &mut Buffer, ctx: &ViewContext<'_>) {
        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(HEADER_HEIGHT), Constraint::Min(0)])
            .split(area);
        Paragraph::new(self.header_lines(ctx))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(ctx.theme.border_style(true))
                    .title(Span::styled(self.title(), ctx.theme.title_style())),
            )
            .wrap(Wrap { trim: true })
            .render(sections[0], buf);
        self.casts.render(sections[1], buf, ctx.theme, "casts");
    }

    fn accepts(&self, tag: &ResultTag) -> bool {
        self.tagger.accepts(tag)
    }

    fn apply(&mut self, tag: &ResultTag, outcome: Outcome, _ctx: &ViewContext<'_>) -> Vec<Effect> {
        match (tag.request, outcome) {
            (_, Ok(Payload::Channel(channel))) => self.channel = Some(channel),
            (_, Ok(Payload::Feed(casts))) => self.casts.set_items(casts),
            (_, Ok(Payload::Reacted { hash, kind })) => {
                self.casts.mark_reacted(&hash, kind);
            }
            // the feed still renders without metadata
            (RequestKind::Channel, Err(err)) => {
                return vec![Effect::Notice(format!("channel info unavailable: {err}"))];
            }
            (RequestKind::React, Err(err)) => {
                return vec![Effect::Notice(format!("reaction failed: {err}"))];
            }
            (_, Err(err)) => self.casts.fail(&err),
            (_, Ok(_)) => {}
        }
        Vec::new()
    }

    fn compose_target(&self) -> ComposeTarget {
        match &self.parent_url {
            Some(url) => ComposeTarget::channel(
                url.clone(),
                self.channel.as_ref().map(|channel| channel.id.clone()),
            ),
            None => ComposeTarget::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::Theme;
    use tofui_core::SessionIdentity;

    const RUST: &str = "chain://eip155:1/erc721:0xrust";

    #[test]
    fn channel_requests_metadata_and_feed() {
        let identity = SessionIdentity::local();
        let theme = Theme::default();
        let ctx = ViewContext {
            identity: &identity,
            credential: None,
            signin_url: "",
            theme: &theme,
        };
        let mut view = ChannelView::new();
        view.enter(&Route::Channel(RUST.to_string()), &ctx);
        let effects = view.init(&ctx);
        let [Effect::Run(meta), Effect::Run(feed)] = effects.as_slice() else {
            panic!("expected two commands, got {effects:?}");
        };
        assert_eq!(
            meta.request,
            Request::Channel {
                parent_url: RUST.to_string()
            }
        );
        assert_eq!(meta.tag.context, format!("channel:{RUST}"));
        assert!(matches!(
            &feed.request,
            Request::Feed(FeedRequest { kind: FeedKind::Channel { parent_url }, .. })
                if parent_url == RUST
        ));
    }

    #[test]
    fn compose_target_uses_channel_name() {
        let identity = SessionIdentity::local();
        let theme = Theme::default();
        let ctx = ViewContext {
            identity: &identity,
            credential: None,
            signin_url: "",
            theme: &theme,
        };
        let mut view = ChannelView::new();
        view.enter(&Route::Channel(RUST.to_string()), &ctx);
        let effects = view.init(&ctx);
        let Some(Effect::Run(meta)) = effects.first() else {
            panic!("expected channel command");
        };
        view.apply(
            &meta.tag,
            Ok(Payload::Channel(Channel {
                id: "rust".to_string(),
                name: "Rust".to_string(),
                parent_url: RUST.to_string(),
                ..Channel::default()
            })),
            &ctx,
        );
        let target = view.compose_target();
        assert_eq!(target.channel_url.as_deref(), Some(RUST));
        assert_eq!(target.describe(), "new cast in /rust");
        assert_eq!(view.title(), "channel /rust");
    }
}
