//! Terminal ownership and the cooperative event loop

use std::io::{self, Stdout};
use std::time::Duration;

use crossterm::event::{Event, EventStream};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use futures_util::StreamExt;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::{error, info};

use super::app::App;
use crate::ui::{self, Theme};
use crate::{Error, Result};

const TICK_INTERVAL: Duration = Duration::from_secs(1);

type Backend = CrosstermBackend<Stdout>;

/// Raw mode plus alternate screen, restored on drop.
struct TerminalGuard {
    terminal: Terminal<Backend>,
}

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode().map_err(|e| Error::terminal(format!("cannot enable raw mode: {}", e)))?;
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(Error::terminal(format!("cannot enter alternate screen: {}", e)));
        }
        let terminal = Terminal::new(CrosstermBackend::new(stdout))
            .map_err(|e| Error::terminal(e.to_string()))?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            error!("Failed to disable raw mode: {}", e);
        }
        if let Err(e) = execute!(self.terminal.backend_mut(), LeaveAlternateScreen) {
            error!("Failed to leave alternate screen: {}", e);
        }
        let _ = self.terminal.show_cursor();
    }
}

/// Run the dashboard until the user quits.
///
/// One `select!` loop multiplexes terminal input, the refresh tick, completions
/// of spawned work and debug poller events. All state lives in `app`.
pub async fn run(mut app: App) -> Result<()> {
    let mut messages = app
        .take_message_receiver()
        .ok_or_else(|| Error::internal("message receiver already taken"))?;
    let mut debug_events = app
        .debug
        .session
        .take_event_receiver()
        .ok_or_else(|| Error::internal("debug event receiver already taken"))?;

    let mut guard = TerminalGuard::enter()?;
    let theme = Theme::default();
    let mut events = EventStream::new();
    let mut ticker = tokio::time::interval(TICK_INTERVAL);

    info!("Dashboard started");
    app.start();

    let outcome = loop {
        if let Err(e) = guard.terminal.draw(|frame| ui::render(frame, &app, &theme)) {
            break Err(Error::terminal(format!("draw failed: {}", e)));
        }

        tokio::select! {
            _ = ticker.tick() => app.on_tick(),
            Some(message) = messages.recv() => app.apply(message),
            Some(event) = debug_events.recv() => app.debug.session.apply(event),
            maybe_event = events.next() => match maybe_event {
                Some(Ok(Event::Key(key))) => app.handle_key(key).await,
                Some(Ok(_)) => {}
                Some(Err(e)) => break Err(Error::terminal(format!("input error: {}", e))),
                None => break Ok(()),
            },
        }

        if app.should_quit() {
            break Ok(());
        }
    };

    app.shutdown().await;
    drop(guard);
    info!("Dashboard stopped");
    outcome
}
