use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Wrap};
use ratatui::Frame;

use super::theme::Theme;
use super::widgets::{panel, result_lines};
use crate::core::state::BackupField;
use crate::core::App;

pub fn render(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let backup = &app.backup;
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(5), Constraint::Min(6)])
        .split(area);

    let mut controls = vec![
        backup.destination.line(
            "Backup directory",
            backup.focus == BackupField::Destination,
            backup.editing && backup.focus == BackupField::Destination,
            theme,
        ),
        backup.restore_path.line(
            "Restore from",
            backup.focus == BackupField::RestorePath,
            backup.editing && backup.focus == BackupField::RestorePath,
            theme,
        ),
    ];
    if let Some(notice) = &backup.notice {
        let color = if notice.ok { theme.ok } else { theme.critical };
        controls.push(Line::from(Span::styled(notice.text.clone(), Style::default().fg(color))));
    } else if !backup.stats.is_empty() {
        controls.push(Line::from(Span::styled(backup.stats.clone(), theme.muted())));
    }
    frame.render_widget(
        Paragraph::new(controls).block(panel("Backup & Restore", theme)),
        rows[0],
    );

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(rows[1]);

    let mut progress = result_lines(&backup.run.results, theme);
    if backup.run.running {
        progress.push(Line::from(Span::styled(
            format!("{} in progress...", backup.run.label),
            Style::default().fg(theme.info),
        )));
    } else if progress.is_empty() {
        progress.push(Line::from(Span::styled(
            "Press b to create a backup, r to restore the selected file.",
            theme.muted(),
        )));
    }
    let inner_height = columns[0].height.saturating_sub(2) as usize;
    let scroll = progress.len().saturating_sub(inner_height) as u16;
    frame.render_widget(
        Paragraph::new(progress)
            .block(panel("Progress", theme))
            .wrap(Wrap { trim: false })
            .scroll((scroll, 0)),
        columns[0],
    );

    let listing = if backup.listing.is_empty() {
        "Press l to list backups".to_string()
    } else {
        backup.listing.clone()
    };
    frame.render_widget(
        Paragraph::new(listing)
            .style(theme.base())
            .block(panel("Available Backups", theme))
            .wrap(Wrap { trim: false }),
        columns[1],
    );
}
