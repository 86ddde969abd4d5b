use crossterm::event::KeyEvent;
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget, Wrap};
use tofui_core::{ContentError, FeedKind, FeedRequest, User};

use crate::command::Request;
use crate::component::{Effect, Route, Tagger, ViewComponent, ViewContext};
use crate::event::{Outcome, Payload, RequestKind, ResultTag, Target, ViewName};
use crate::keymap::typed_char;
use crate::views::feed_list::FeedList;

const HEADER_HEIGHT: u16 = 7;

pub struct ProfileView {
    tagger: Tagger,
    fid: Option<u64>,
    user: Option<User>,
    user_error: Option<String>,
    casts: FeedList,
}

impl Default for ProfileView {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileView {
    pub fn new() -> Self {
        Self {
            tagger: Tagger::new(Target::View(ViewName::Profile)),
            fid: None,
            user: None,
            user_error: None,
            casts: FeedList::default(),
        }
    }

    pub fn fid(&self) -> Option<u64> {
        self.fid
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    fn header_lines(&self, ctx: &ViewContext<'_>) -> Vec<Line<'static>> {
        let theme = ctx.theme;
        if let Some(err) = &self.user_error {
            return vec![Line::from(Span::styled(
                format!("error: {err}"),
                Style::default().fg(theme.critical),
            ))];
        }
        let Some(user) = &self.user else {
            return vec![Line::from(Span::styled("loading...", theme.muted_style()))];
        };
        let mut name = vec![
            Span::styled(
                user.display_name.clone(),
                Style::default()
                    .fg(theme.text)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!(" {}", user.handle()), theme.muted_style()),
            Span::styled(format!("  fid:{}", user.fid), theme.muted_style()),
        ];
        if user.viewer_following {
            name.push(Span::styled("  following", Style::default().fg(theme.ok)));
        }
        vec![
            Line::from(name),
            Line::from(Span::styled(
                user.bio.clone(),
                Style::default().fg(theme.text),
            )),
            Line::from(""),
            Line::from(Span::styled(
                format!(
                    "{} followers  {} following",
                    user.follower_count, user.following_count
                ),
                theme.muted_style(),
            )),
        ]
    }
}

impl ViewComponent for ProfileView {
    fn title(&self) -> String {
        match (&self.user, self.fid) {
            (Some(user), _) => format!("profile {}", user.handle()),
            (None, Some(fid)) => format!("profile fid:{fid}"),
            (None, None) => "profile".to_string(),
        }
    }

    fn init(&mut self, ctx: &ViewContext<'_>) -> Vec<Effect> {
        let Some(fid) = self.fid else {
            return Vec::new();
        };
        self.tagger.bump();
        self.user_error = None;
        self.casts.begin_loading();
        let feed = FeedRequest::new(FeedKind::Profile { fid }).with_viewer(ctx.viewer_fid());
        vec![
            self.tagger.run(Request::User {
                fid,
                viewer_fid: ctx.viewer_fid(),
            }),
            self.tagger.run(Request::Feed(feed)),
        ]
    }

    fn enter(&mut self, route: &Route, _ctx: &ViewContext<'_>) {
        let Route::Profile(fid) = route else {
            return;
        };
        if self.fid == Some(*fid) {
            return;
        }
        self.tagger.reset(format!("profile:{fid}"));
        self.fid = Some(*fid);
        self.user = None;
        self.user_error = None;
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
            (_, Ok(Payload::User(user))) => self.user = Some(user),
            (_, Ok(Payload::Feed(casts))) => self.casts.set_items(casts),
            (_, Ok(Payload::Reacted { hash, kind })) => {
                self.casts.mark_reacted(&hash, kind);
            }
            (RequestKind::User, Err(err)) => self.user_error = Some(err.to_string()),
            (RequestKind::React, Err(err)) => {
                return vec![Effect::Notice(format!("reaction failed: {err}"))];
            }
            (_, Err(err)) => self.casts.fail(&err),
            (_, Ok(_)) => {}
        }
        Vec::new()
    }
}
