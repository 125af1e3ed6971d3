use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Wrap};
use ratatui::Frame;

use super::theme::Theme;
use super::widgets::{panel, result_lines};
use crate::core::state::RunState;
use crate::core::App;

pub fn render(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    render_run(frame, area, &app.diagnostics, "Diagnostics", "Press r for a quick check or f for a full diagnostic.", theme);
}

/// Streamed results with a tally line. Shared by the diagnostics and security screens.
pub fn render_run(
    frame: &mut Frame,
    area: Rect,
    run: &RunState,
    title: &str,
    idle_hint: &str,
    theme: &Theme,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(area);

    let heading = if run.label.is_empty() {
        title.to_string()
    } else {
        format!("{}: {}", title, run.label)
    };

    let body = if run.results.is_empty() && !run.running {
        vec![Line::from(Span::styled(idle_hint.to_string(), theme.muted()))]
    } else {
        let mut lines = result_lines(&run.results, theme);
        if run.running {
            lines.push(Line::from(Span::styled("Running...", Style::default().fg(theme.info))));
        }
        lines
    };

    // Keep the newest results visible.
    let inner_height = chunks[0].height.saturating_sub(2) as usize;
    let scroll = body.len().saturating_sub(inner_height) as u16;
    let results = Paragraph::new(body)
        .block(panel(heading, theme))
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(results, chunks[0]);

    let summary = run.summary();
    let tally = Line::from(vec![
        Span::styled(format!("✔ {} passed  ", summary.success), Style::default().fg(theme.ok)),
        Span::styled(format!("⚠ {} warnings  ", summary.warning), Style::default().fg(theme.warn)),
        Span::styled(format!("✖ {} errors", summary.error), Style::default().fg(theme.critical)),
    ]);
    frame.render_widget(Paragraph::new(tally).block(panel("Summary", theme)), chunks[1]);
}
