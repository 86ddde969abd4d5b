use crossterm::event::{Event as TerminalEvent, EventStream};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use futures_util::StreamExt;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io;
use tofui_core::SessionIdentity;
use tofui_ui::Event;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::browser::SystemUrlOpener;
use crate::host::{self, HostContext};

/// Runs one session on the controlling terminal under the `local` identity.
pub async fn run_local(ctx: &HostContext, compose: bool) -> anyhow::Result<()> {
    let mut opened = ctx.open_session(SessionIdentity::local()).await;
    match SystemUrlOpener::for_current_os() {
        Ok(opener) => opened.runtime.set_url_opener(Box::new(opener)),
        Err(err) => warn!(event = "url_opener_unavailable", error = %err),
    }
    if compose {
        let commands = opened.runtime.request_compose();
        opened.executor.spawn_all(commands);
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let input = tokio::spawn(forward_terminal_events(opened.sender.clone()));
    let result = host::run_session(opened, &mut terminal).await;
    input.abort();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result?;
    Ok(())
}

async fn forward_terminal_events(events: mpsc::Sender<Event>) {
    let mut stream = EventStream::new();
    while let Some(next) = stream.next().await {
        let event = match next {
            Ok(TerminalEvent::Key(key)) => Event::Key(key),
            Ok(TerminalEvent::Resize(width, height)) => Event::Resize { width, height },
            Ok(_) => continue,
            Err(err) => {
                warn!(event = "terminal_input_error", error = %err);
                break;
            }
        };
        if events.send(event).await.is_err() {
            break;
        }
    }
    debug!(event = "terminal_input_closed");
}
