mod cast;
mod channel;
mod composer;
mod feed;
pub mod feed_list;
mod help;
mod profile;
mod quick_switch;
mod sidebar;
mod signin;

pub use cast::CastView;
pub use channel::ChannelView;
pub use composer::{Composer, MAX_CAST_CHARS};
pub use feed::FeedView;
pub use help::HelpOverlay;
pub use profile::ProfileView;
pub use quick_switch::QuickSwitch;
pub use sidebar::Sidebar;
pub use signin::SignInPrompt;
