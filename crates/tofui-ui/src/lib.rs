//! Per-connection reactive runtime: routes key, resize and command-result
//! events to a fixed set of view components and renders them with ratatui.

pub mod command;
pub mod component;
pub mod drive;
pub mod event;
pub mod keymap;
pub mod layout;
pub mod runtime;
pub mod theme;
pub mod views;

pub use command::{Command, Executor, Request, DEFAULT_COMMAND_TIMEOUT};
pub use component::{
    ComposeTarget, Effect, Overlay, Route, Tagger, UrlOpener, ViewComponent, ViewContext,
};
pub use drive::drive;
pub use event::{
    AsyncResult, Event, OverlayKind, Outcome, Payload, RequestKind, ResultTag, Target, ViewName,
};
pub use keymap::{GlobalAction, GlobalKeyMap};
pub use layout::LayoutPlan;
pub use runtime::AppRuntime;
