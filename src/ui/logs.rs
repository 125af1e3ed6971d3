use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Wrap};
use ratatui::Frame;

use super::theme::Theme;
use super::widgets::panel;
use crate::core::state::LogField;
use crate::core::App;
use crate::services::classifier;

pub fn render(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let logs = &app.logs;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(3)])
        .split(area);

    let controls = vec![
        logs.lines_input.line(
            "Lines",
            logs.focus == LogField::Lines,
            logs.editing && logs.focus == LogField::Lines,
            theme,
        ),
        Line::from(vec![
            Span::styled("  Level: ", theme.base()),
            Span::styled(logs.query.level.as_str(), theme.title()),
            Span::styled("  (v to cycle)", theme.muted()),
        ]),
        logs.filter_input.line(
            "Filter",
            logs.focus == LogField::Filter,
            logs.editing && logs.focus == LogField::Filter,
            theme,
        ),
    ];
    let source = format!("Log Query: {}", app.config().paths.pbx_log);
    frame.render_widget(Paragraph::new(controls).block(panel(source, theme)), chunks[0]);

    let body: Vec<Line> = if logs.loading {
        vec![Line::from(Span::styled("Loading...", theme.muted()))]
    } else if logs.output.is_empty() {
        vec![Line::from(Span::styled("Press Enter to load logs", theme.muted()))]
    } else {
        logs.output
            .lines()
            .map(|line| {
                Line::from(
                    classifier::highlight(line)
                        .into_iter()
                        .map(|segment| Span::styled(segment.text, theme.highlight(segment.highlight)))
                        .collect::<Vec<_>>(),
                )
            })
            .collect()
    };
    let output = Paragraph::new(body)
        .block(panel("Log Entries", theme))
        .wrap(Wrap { trim: false });
    frame.render_widget(output, chunks[1]);
}
