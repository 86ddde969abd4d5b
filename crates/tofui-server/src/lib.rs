//! Multi-session host for the tofui terminal client: SSH and local
//! transports, the session registry and the browser sign-in callback.

pub mod browser;
pub mod config;
pub mod host;
pub mod input;
pub mod local;
pub mod logging;
pub mod registry;
pub mod signin;
pub mod ssh;

pub use browser::SystemUrlOpener;
pub use config::{Cli, CliCommand, Config, ConfigError};
pub use host::{HostContext, HostSettings, OpenSession, SESSION_QUEUE_CAPACITY};
pub use registry::{Registration, SessionRegistry};
pub use signin::SigninState;
