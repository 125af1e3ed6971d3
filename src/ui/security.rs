use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use super::diagnostics::render_run;
use super::theme::Theme;
use super::widgets::panel;
use crate::core::App;

pub fn render(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(6), Constraint::Length(3)])
        .split(area);

    render_run(
        frame,
        chunks[0],
        &app.security.run,
        "Security",
        "Press r for a quick scan or f for a full security audit.",
        theme,
    );

    let checks = &app.config().security;
    let score = match app.security.score {
        Some(score) => Line::from(vec![
            Span::styled(format!("Score {}%  ", score.percent), theme.title()),
            Span::styled(score.posture.to_string(), theme.posture(score.posture)),
        ]),
        None => Line::from(Span::styled(
            format!(
                "Firewall checks: {} | Password checks: {} | SSL checks: {}",
                on_off(checks.check_firewall),
                on_off(checks.check_passwords),
                on_off(checks.check_ssl)
            ),
            theme.muted(),
        )),
    };
    frame.render_widget(Paragraph::new(score).block(panel("Posture", theme)), chunks[1]);
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}
