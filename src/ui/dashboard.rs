use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Gauge, List, ListItem, Paragraph};
use ratatui::Frame;

use super::theme::Theme;
use super::widgets::panel;
use crate::core::App;
use crate::services::alerts::ALERTS_SHOWN;
use crate::services::collector::SystemSnapshot;

pub fn render(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(8)])
        .split(area);

    let Some(snapshot) = app.dashboard.snapshot.as_ref() else {
        let waiting = Paragraph::new("Collecting system metrics...")
            .style(theme.muted())
            .block(panel("System Status", theme));
        frame.render_widget(waiting, area);
        return;
    };

    render_gauges(frame, rows[0], snapshot, theme);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(rows[1]);
    render_status(frame, columns[0], app, snapshot, theme);
    render_alerts(frame, columns[1], app, theme);
}

fn render_gauges(frame: &mut Frame, area: Rect, snapshot: &SystemSnapshot, theme: &Theme) {
    let cells = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(33),
            Constraint::Percentage(33),
            Constraint::Percentage(34),
        ])
        .split(area);

    let gauges = [
        ("CPU", snapshot.cpu_percent),
        ("Memory", snapshot.memory_percent),
        ("Disk", snapshot.disk_percent),
    ];
    for ((title, percent), cell) in gauges.into_iter().zip(cells.iter()) {
        let gauge = Gauge::default()
            .block(panel(title, theme))
            .gauge_style(Style::default().fg(theme.usage(percent)))
            .ratio((percent / 100.0).clamp(0.0, 1.0))
            .label(format!("{:.1}%", percent));
        frame.render_widget(gauge, *cell);
    }
}

fn field<'a>(label: &'a str, value: String, style: Style, theme: &Theme) -> Line<'a> {
    Line::from(vec![
        Span::styled(format!("{:<16}", label), theme.muted()),
        Span::styled(value, style),
    ])
}

fn render_status(frame: &mut Frame, area: Rect, app: &App, snapshot: &SystemSnapshot, theme: &Theme) {
    let process = if snapshot.process_running {
        ("running", Style::default().fg(theme.ok))
    } else {
        ("not running", Style::default().fg(theme.critical))
    };
    let peers_style = if snapshot.online_peers == 0 && snapshot.total_peers > 0 {
        Style::default().fg(theme.warn)
    } else {
        theme.base()
    };

    let mut lines = vec![
        field(
            "Service",
            snapshot.service_state.to_string(),
            theme.service(snapshot.service_state),
            theme,
        ),
        field("Process", process.0.to_string(), process.1, theme),
        field("PID", snapshot.process_id.clone(), theme.base(), theme),
        field("Uptime", snapshot.uptime.clone(), theme.base(), theme),
        field("Load average", snapshot.load_average.clone(), theme.base(), theme),
        Line::default(),
        field(
            "Active calls",
            snapshot.active_calls.to_string(),
            theme.base().add_modifier(Modifier::BOLD),
            theme,
        ),
        field(
            "SIP peers",
            format!("{} online / {} total", snapshot.online_peers, snapshot.total_peers),
            peers_style,
            theme,
        ),
        Line::default(),
    ];

    let updated = format!(
        "Updated {}{}",
        snapshot.collected_at.format("%H:%M:%S"),
        if app.dashboard.refreshing { " (refreshing)" } else { "" }
    );
    lines.push(Line::from(Span::styled(updated, theme.muted())));
    lines.push(Line::from(Span::styled(
        format!("Refresh every {}s", app.config().monitoring.refresh_interval),
        theme.muted(),
    )));

    frame.render_widget(Paragraph::new(lines).block(panel("Asterisk Status", theme)), area);
}

fn render_alerts(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let alerts = &app.dashboard.alerts;
    let items: Vec<ListItem> = if !alerts.is_enabled() {
        vec![ListItem::new(Span::styled("Alerts disabled", theme.muted()))]
    } else if alerts.is_empty() {
        vec![ListItem::new(Span::styled("No alerts", Style::default().fg(theme.ok)))]
    } else {
        alerts
            .recent()
            .into_iter()
            .map(|alert| ListItem::new(Span::styled(alert.to_string(), Style::default().fg(theme.warn))))
            .collect()
    };

    let title = format!("Alerts (last {})", ALERTS_SHOWN);
    frame.render_widget(List::new(items).block(panel(title, theme)), area);
}
