use crossterm::event::KeyEvent;
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use tofui_core::{FeedKind, FeedRequest};

use crate::command::Request;
use crate::component::{Effect, Route, Tagger, ViewComponent, ViewContext};
use crate::event::{Outcome, Payload, RequestKind, ResultTag, Target, ViewName};
use crate::keymap::typed_char;
use crate::views::feed_list::FeedList;

/// Home view: following feed when signed in, trending otherwise.
pub struct FeedView {
    tagger: Tagger,
    request: Option<FeedRequest>,
    list: FeedList,
}

impl Default for FeedView {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedView {
    pub fn new() -> Self {
        Self {
            tagger: Tagger::new(Target::View(ViewName::Feed)),
            request: None,
            list: FeedList::default(),
        }
    }

    pub fn request(&self) -> Option<&FeedRequest> {
        self.request.as_ref()
    }

    pub fn list(&self) -> &FeedList {
        &self.list
    }

    fn show(&mut self, request: FeedRequest) {
        if self.request.as_ref() == Some(&request) {
            return;
        }
        self.tagger.reset(request.kind.context_key());
        self.request = Some(request);
        self.list.clear();
    }

    fn load(&mut self) -> Vec<Effect> {
        let Some(request) = self.request.clone() else {
            return Vec::new();
        };
        self.tagger.bump();
        self.list.begin_loading();
        vec![self.tagger.run(Request::Feed(request))]
    }
}

impl ViewComponent for FeedView {
    fn title(&self) -> String {
        match self.request.as_ref().map(|request| &request.kind) {
            Some(FeedKind::Following { .. }) => "home".to_string(),
            Some(FeedKind::Trending) | None => "trending".to_string(),
            Some(FeedKind::Channel { parent_url }) => format!("feed {parent_url}"),
            Some(FeedKind::Profile { fid }) => format!("feed fid:{fid}"),
            Some(FeedKind::Thread { hash }) => format!("thread {hash}"),
        }
    }

    fn init(&mut self, ctx: &ViewContext<'_>) -> Vec<Effect> {
        if self.request.is_none() {
            self.show(FeedRequest::home(ctx.viewer_fid()));
        }
        self.load()
    }

    fn enter(&mut self, route: &Route, ctx: &ViewContext<'_>) {
        if *route == Route::Home {
            self.show(FeedRequest::home(ctx.viewer_fid()));
        }
    }

    fn dispatch(&mut self, key: KeyEvent, ctx: &ViewContext<'_>) -> Vec<Effect> {
        if typed_char(&key) == Some('R') {
            return self.load();
        }
        self.list
            .handle_key(&key, ctx, &self.tagger)
            .unwrap_or_default()
    }

    fn resize(&mut self, _width: u16, _height: u16) {}

    fn render(&self, area: Rect, buf: &mut Buffer, ctx: &ViewContext<'_>) {
        self.list.render(area, buf, ctx.theme, &self.title());
    }

    fn accepts(&self, tag: &ResultTag) -> bool {
        self.tagger.accepts(tag)
    }

    fn apply(&mut self, tag: &ResultTag, outcome: Outcome, _ctx: &ViewContext<'_>) -> Vec<Effect> {
        match (tag.request, outcome) {
            (_, Ok(Payload::Feed(casts))) => self.list.set_items(casts),
            (_, Ok(Payload::Reacted { hash, kind })) => {
                self.list.mark_reacted(&hash, kind);
            }
            (RequestKind::React, Err(err)) => {
                return vec![Effect::Notice(format!("reaction failed: {err}"))];
            }
            (_, Err(err)) => self.list.fail(&err),
            (_, Ok(_)) => {}
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::Theme;
    use crate::views::feed_list::fixtures::cast;
    use tofui_core::{ContentError, Credential, SessionIdentity};

    fn ctx_parts() -> (SessionIdentity, Theme) {
        (SessionIdentity::local(), Theme::default())
    }

    #[test]
    fn home_feed_follows_credential() {
        let (identity, theme) = ctx_parts();
        let credential = Credential::new(42, "abc");
        let ctx = ViewContext {
            identity: &identity,
            credential: Some(&credential),
            signin_url: "",
            theme: &theme,
        };

        let mut view = FeedView::new();
        view.enter(&Route::Home, &ctx);
        let effects = view.init(&ctx);
        let [Effect::Run(command)] = effects.as_slice() else {
            panic!("expected one feed command, got {effects:?}");
        };
        assert_eq!(
            command.request,
            Request::Feed(FeedRequest::home(Some(42)))
        );
        assert_eq!(view.title(), "home");
    }

    #[test]
    fn reload_makes_previous_response_stale() {
        let (identity, theme) = ctx_parts();
        let ctx = ViewContext {
            identity: &identity,
            credential: None,
            signin_url: "",
            theme: &theme,
        };
        let mut view = FeedView::new();
        let first = view.init(&ctx);
        let [Effect::Run(first)] = first.as_slice() else {
            panic!("expected feed command");
        };
        let second = view.init(&ctx);
        let [Effect::Run(second)] = second.as_slice() else {
            panic!("expected feed command");
        };

        assert!(!view.accepts(&first.tag));
        assert!(view.accepts(&second.tag));

        view.apply(
            &second.tag,
            Ok(Payload::Feed(vec![cast("0x1", 1, "alice", "gm")])),
            &ctx,
        );
        assert_eq!(view.list().items().len(), 1);
    }

    #[test]
    fn failed_reaction_keeps_items() {
        let (identity, theme) = ctx_parts();
        let ctx = ViewContext {
            identity: &identity,
            credential: None,
            signin_url: "",
            theme: &theme,
        };
        let mut view = FeedView::new();
        let effects = view.init(&ctx);
        let [Effect::Run(command)] = effects.as_slice() else {
            panic!("expected feed command");
        };
        view.apply(
            &command.tag,
            Ok(Payload::Feed(vec![cast("0x1", 1, "alice", "gm")])),
            &ctx,
        );

        let mut react_tag = command.tag.clone();
        react_tag.request = RequestKind::React;
        let effects = view.apply(&react_tag, Err(ContentError::Unauthenticated), &ctx);
        assert!(matches!(effects.as_slice(), [Effect::Notice(_)]));
        assert_eq!(view.list().items().len(), 1);
    }
}
