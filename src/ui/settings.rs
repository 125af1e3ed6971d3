use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use super::theme::Theme;
use super::widgets::panel;
use crate::core::state::SettingField;
use crate::core::App;

pub fn render(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let form = &app.settings;
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(14), Constraint::Length(3)])
        .split(area);

    let mut lines = Vec::new();
    let mut section = "";
    for (i, (field, input)) in SettingField::ALL.iter().zip(form.inputs.iter()).enumerate() {
        if field.section() != section {
            section = field.section();
            if !lines.is_empty() {
                lines.push(Line::default());
            }
            lines.push(Line::from(Span::styled(section, theme.title())));
        }
        let focused = i == form.focus;
        lines.push(input.line(field.label(), focused, focused && form.editing, theme));
    }
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        "Security checks accept true or false.",
        theme.muted(),
    )));

    let title = format!("Settings: {}", app.config_path().display());
    frame.render_widget(Paragraph::new(lines).block(panel(title, theme)), chunks[0]);

    let status = match &form.notice {
        Some(notice) => {
            let color = if notice.ok { theme.ok } else { theme.critical };
            Line::from(Span::styled(notice.text.clone(), Style::default().fg(color)))
        }
        None => Line::from(Span::styled(
            format!("Editing: {}", form.focused_field().label()),
            theme.muted(),
        )),
    };
    frame.render_widget(Paragraph::new(status).block(panel("Status", theme)), chunks[1]);
}
