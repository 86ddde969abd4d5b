use std::io;

use ratatui::backend::Backend;
use ratatui::layout::Rect;
use ratatui::Terminal;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::command::Executor;
use crate::event::Event;
use crate::runtime::AppRuntime;

/// Runs one session until it quits or its event queue closes.
///
/// Events are handled strictly in arrival order; commands run on the
/// executor and come back through the same queue.
pub async fn drive<B: Backend>(
    runtime: &mut AppRuntime,
    terminal: &mut Terminal<B>,
    events: &mut mpsc::Receiver<Event>,
    executor: &Executor,
) -> io::Result<()> {
    let size = terminal.size()?;
    runtime.dispatch(Event::Resize {
        width: size.width,
        height: size.height,
    });
    executor.spawn_all(runtime.init());
    terminal.draw(|frame| runtime.render(frame.size(), frame.buffer_mut()))?;

    while let Some(event) = events.recv().await {
        if let Event::Resize { width, height } = event {
            terminal.resize(Rect::new(0, 0, width, height))?;
        }
        let commands = runtime.dispatch(event);
        executor.spawn_all(commands);
        if runtime.should_quit() {
            info!(
                event = "session_quit",
                identity = runtime.identity().short()
            );
            return Ok(());
        }
        terminal.draw(|frame| runtime.render(frame.size(), frame.buffer_mut()))?;
    }

    debug!(
        event = "session_events_closed",
        identity = runtime.identity().short()
    );
    Ok(())
}
