//! Terminal rendering, one module per screen

pub mod backup;
pub mod channels;
pub mod dashboard;
pub mod debug;
pub mod diagnostics;
pub mod logs;
pub mod security;
pub mod settings;
pub mod theme;
pub mod widgets;

use chrono::Local;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Tabs};
use ratatui::Frame;

use crate::core::{App, Screen};
pub use theme::Theme;

pub fn render(frame: &mut Frame, app: &App, theme: &Theme) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(5),
            Constraint::Length(1),
        ])
        .split(frame.size());

    render_tabs(frame, chunks[0], app, theme);

    let body = chunks[1];
    match app.screen() {
        Screen::Dashboard => dashboard::render(frame, body, app, theme),
        Screen::Diagnostics => diagnostics::render(frame, body, app, theme),
        Screen::Channels => channels::render(frame, body, app, theme),
        Screen::Logs => logs::render(frame, body, app, theme),
        Screen::Security => security::render(frame, body, app, theme),
        Screen::Backup => backup::render(frame, body, app, theme),
        Screen::Settings => settings::render(frame, body, app, theme),
        Screen::Debug => debug::render(frame, body, app, theme),
    }

    render_footer(frame, chunks[2], app, theme);
}

fn render_tabs(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let titles: Vec<Line> = Screen::ALL
        .iter()
        .enumerate()
        .map(|(i, screen)| Line::from(format!("{} {}", i + 1, screen.title())))
        .collect();

    let title = format!("Asterisk Monitor v{} | {}", crate::VERSION, Local::now().format("%H:%M:%S"));
    let tabs = Tabs::new(titles)
        .block(widgets::panel(title, theme))
        .select(app.screen().index())
        .style(theme.muted())
        .highlight_style(theme.title())
        .divider(Span::styled("│", theme.border()));
    frame.render_widget(tabs, area);
}

fn help_text(app: &App) -> &'static str {
    if app.is_editing() {
        return "Enter: apply | Esc: stop editing | Tab: next field";
    }
    match app.screen() {
        Screen::Dashboard => "1-8: screens | r: refresh | q: quit",
        Screen::Diagnostics => "r: quick | f: full | c: clear | q: quit",
        Screen::Channels => "r: refresh | ↑/↓: select | q: quit",
        Screen::Logs => "e: edit | Tab: field | v: level | Enter: load | q: quit",
        Screen::Security => "r: quick scan | f: full audit | c: clear | q: quit",
        Screen::Backup => "b: backup | r: restore | l: list | e: edit | Tab: field | c: clear | q: quit",
        Screen::Settings => "↑/↓: field | e: edit | s: save | r: reset | q: quit",
        Screen::Debug => {
            "s: basic | a: audio | x: stop | l: log | f: filter | p: view | r: refresh | c: clear | q: quit"
        }
    }
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let footer = Paragraph::new(Line::from(Span::styled(help_text(app), theme.muted())));
    frame.render_widget(footer, area);
}
