use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tofui_ui::UrlOpener;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
struct OpenCommand {
    program: PathBuf,
    prefix_args: Vec<OsString>,
}

/// Opens links with the desktop's default handler. Only local sessions get
/// one; over SSH the browser lives on another machine.
#[derive(Debug, Clone)]
pub struct SystemUrlOpener {
    command: OpenCommand,
}

impl SystemUrlOpener {
    pub fn for_current_os() -> io::Result<Self> {
        let command = Self::command_for_os(std::env::consts::OS)?;
        Ok(Self { command })
    }

    fn command_for_os(target_os: &str) -> io::Result<OpenCommand> {
        match target_os {
            "macos" => Ok(OpenCommand {
                program: PathBuf::from("open"),
                prefix_args: Vec::new(),
            }),
            "linux" | "freebsd" | "openbsd" | "netbsd" => Ok(OpenCommand {
                program: PathBuf::from("xdg-open"),
                prefix_args: Vec::new(),
            }),
            "windows" => Ok(OpenCommand {
                program: PathBuf::from("cmd"),
                prefix_args: vec![
                    OsString::from("/C"),
                    OsString::from("start"),
                    OsString::from(""),
                ],
            }),
            _ => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("opening links is unsupported on `{target_os}`"),
            )),
        }
    }

    fn args_for_url(&self, url: &str) -> Vec<OsString> {
        let mut args = self.command.prefix_args.clone();
        args.push(OsString::from(url));
        args
    }
}

impl UrlOpener for SystemUrlOpener {
    fn open(&self, url: &str) -> io::Result<()> {
        // the terminal is in raw mode, so the child must not touch it
        let mut child = Command::new(&self.command.program)
            .args(self.args_for_url(url))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        std::thread::spawn(move || match child.wait() {
            Ok(status) => debug!(event = "url_opener_exited", status = %status),
            Err(err) => debug!(event = "url_opener_wait_failed", error = %err),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selects_the_platform_launcher() {
        let mac = SystemUrlOpener::command_for_os("macos").expect("macos command");
        assert_eq!(mac.program, PathBuf::from("open"));
        assert!(mac.prefix_args.is_empty());

        let linux = SystemUrlOpener::command_for_os("linux").expect("linux command");
        assert_eq!(linux.program, PathBuf::from("xdg-open"));

        let windows = SystemUrlOpener::command_for_os("windows").expect("windows command");
        assert_eq!(windows.program, PathBuf::from("cmd"));

        let err = SystemUrlOpener::command_for_os("plan9").expect_err("unsupported");
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
    }

    #[test]
    fn url_is_the_last_argument() {
        let opener = SystemUrlOpener {
            command: SystemUrlOpener::command_for_os("windows").expect("windows command"),
        };
        assert_eq!(
            opener.args_for_url("https://warpcast.com/alice/0x1"),
            vec![
                OsString::from("/C"),
                OsString::from("start"),
                OsString::from(""),
                OsString::from("https://warpcast.com/alice/0x1"),
            ]
        );
    }

    #[test]
    fn missing_launcher_is_an_error() {
        let opener = SystemUrlOpener {
            command: OpenCommand {
                program: PathBuf::from("tofui-no-such-launcher"),
                prefix_args: Vec::new(),
            },
        };
        let err = opener.open("https://warpcast.com").expect_err("spawn fails");
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
