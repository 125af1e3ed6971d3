//! Live debug capture view

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Wrap};
use ratatui::Frame;

use super::theme::Theme;
use super::widgets::panel;
use crate::core::state::DebugView;
use crate::core::App;
use crate::services::classifier;
use crate::services::debug::{SessionState, WAITING_PLACEHOLDER};

pub fn render(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let debug = &app.debug;
    let session = &debug.session;
    let audio = !session.audio_stats().is_empty();

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(5)])
        .split(area);

    let state = match session.state() {
        SessionState::Stopped => Span::styled("STOPPED", theme.muted()),
        SessionState::Running(mode) => Span::styled(
            format!("RUNNING ({})", mode.as_str().to_uppercase()),
            Style::default().fg(theme.ok),
        ),
    };
    let logging = if session.logging_enabled() {
        Span::styled("ON", Style::default().fg(theme.warn))
    } else {
        Span::styled("OFF", theme.muted())
    };
    let mut status = vec![Line::from(vec![
        Span::styled("Capture: ", theme.base()),
        state,
        Span::styled("  Filter: ", theme.base()),
        Span::styled(session.preset().label(), theme.title()),
        Span::styled("  Problem logging: ", theme.base()),
        logging,
        Span::styled(
            format!("  Problems: {}", session.problems().len()),
            theme.muted(),
        ),
    ])];
    if let Some(notice) = &debug.notice {
        let color = if notice.ok { theme.info } else { theme.critical };
        status.push(Line::from(Span::styled(notice.text.clone(), Style::default().fg(color))));
    }
    frame.render_widget(Paragraph::new(status).block(panel("Debug Capture", theme)), rows[0]);

    let body = if audio && debug.view == DebugView::Feed {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(rows[1]);
        frame.render_widget(
            Paragraph::new(session.audio_stats().to_string())
                .style(theme.base())
                .block(panel("Audio Statistics", theme))
                .wrap(Wrap { trim: false }),
            columns[1],
        );
        columns[0]
    } else {
        rows[1]
    };

    match debug.view {
        DebugView::Feed => render_feed(frame, body, app, theme),
        DebugView::Problems => frame.render_widget(
            Paragraph::new(session.problem_history_report())
                .style(theme.base())
                .block(panel("Problem Calls (session)", theme))
                .wrap(Wrap { trim: false }),
            body,
        ),
        DebugView::ProblemFile => frame.render_widget(
            Paragraph::new(debug.problem_file.clone())
                .style(theme.base())
                .block(panel(
                    format!("Problem Log: {}", session.problem_log().path().display()),
                    theme,
                ))
                .wrap(Wrap { trim: false }),
            body,
        ),
    }
}

fn render_feed(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let feed = app.debug.session.feed();
    let lines: Vec<Line> = if feed.is_empty() {
        vec![Line::from(Span::styled(WAITING_PLACEHOLDER, theme.muted()))]
    } else {
        feed.iter()
            .take(area.height.saturating_sub(2) as usize)
            .map(|entry| {
                Line::from(
                    classifier::highlight(entry)
                        .into_iter()
                        .map(|segment| Span::styled(segment.text, theme.highlight(segment.highlight)))
                        .collect::<Vec<_>>(),
                )
            })
            .collect()
    };
    frame.render_widget(
        Paragraph::new(lines)
            .block(panel("Live Feed (newest first)", theme))
            .wrap(Wrap { trim: false }),
        area,
    );
}
