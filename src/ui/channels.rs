use ratatui::layout::{Constraint, Rect};
use ratatui::style::Modifier;
use ratatui::text::Span;
use ratatui::widgets::{Paragraph, Row, Table, TableState};
use ratatui::Frame;

use super::theme::Theme;
use super::widgets::panel;
use crate::core::App;

pub fn render(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let state = &app.channels;
    let title = match state.updated {
        Some(at) => format!(
            "Active Channels ({}) - updated {}",
            state.channels.len(),
            at.format("%H:%M:%S")
        ),
        None => "Active Channels".to_string(),
    };

    if state.channels.is_empty() {
        let empty = Paragraph::new(Span::styled("No active channels", theme.muted()))
            .block(panel(title, theme));
        frame.render_widget(empty, area);
        return;
    }

    let header = Row::new(vec!["Channel", "State", "Duration", "Caller ID", "Application"])
        .style(theme.title().add_modifier(Modifier::UNDERLINED));
    let rows = state.channels.iter().map(|channel| {
        Row::new(vec![
            channel.channel_name.clone(),
            channel.state.clone(),
            channel.duration.clone(),
            channel.caller_id.clone(),
            channel.application.clone(),
        ])
        .style(theme.base())
    });
    let widths = [
        Constraint::Percentage(30),
        Constraint::Percentage(12),
        Constraint::Percentage(12),
        Constraint::Percentage(26),
        Constraint::Percentage(20),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .block(panel(title, theme))
        .highlight_style(theme.selected())
        .highlight_symbol("▶ ");
    let mut table_state = TableState::default().with_selected(Some(state.selected));
    frame.render_stateful_widget(table, area, &mut table_state);
}
