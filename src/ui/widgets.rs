//! Small widgets shared by the screens

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Modifier;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders};

use super::theme::Theme;
use crate::services::executor::CommandResult;

const MASK: char = '•';

/// Single-line editable text field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextInput {
    value: String,
    /// Cursor position in chars
    cursor: usize,
    placeholder: String,
    masked: bool,
}

impl TextInput {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let cursor = value.chars().count();
        Self {
            value,
            cursor,
            ..Self::default()
        }
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    /// Render the value as bullets.
    pub fn masked(mut self) -> Self {
        self.masked = true;
        self
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
        self.cursor = self.value.chars().count();
    }

    pub fn clear(&mut self) {
        self.set_value(String::new());
    }

    fn byte_offset(&self, chars: usize) -> usize {
        self.value
            .char_indices()
            .nth(chars)
            .map_or(self.value.len(), |(i, _)| i)
    }

    pub fn insert(&mut self, c: char) {
        let at = self.byte_offset(self.cursor);
        self.value.insert(at, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let at = self.byte_offset(self.cursor);
        self.value.remove(at);
    }

    pub fn delete(&mut self) {
        if self.cursor < self.value.chars().count() {
            let at = self.byte_offset(self.cursor);
            self.value.remove(at);
        }
    }

    /// Apply an editing key. Returns false for keys the field does not handle.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => self.clear(),
            KeyCode::Char(c) => self.insert(c),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right => self.cursor = (self.cursor + 1).min(self.value.chars().count()),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.value.chars().count(),
            _ => return false,
        }
        true
    }

    /// Text shown on screen: masked, placeholder, or the raw value.
    pub fn display(&self) -> String {
        if self.value.is_empty() {
            self.placeholder.clone()
        } else if self.masked {
            MASK.to_string().repeat(self.value.chars().count())
        } else {
            self.value.clone()
        }
    }

    /// `label: value` line. The cursor is drawn while `editing`.
    pub fn line<'a>(&self, label: &'a str, focused: bool, editing: bool, theme: &Theme) -> Line<'a> {
        let marker = if focused { "▶ " } else { "  " };
        let label_style = if focused { theme.title() } else { theme.base() };
        let value_style = if self.value.is_empty() {
            theme.muted()
        } else {
            theme.base()
        };

        let mut spans = vec![
            Span::styled(marker, theme.title()),
            Span::styled(format!("{}: ", label), label_style),
        ];
        let shown = self.display();
        if editing {
            let shown = if self.value.is_empty() { String::new() } else { shown };
            let split = shown
                .char_indices()
                .nth(self.cursor)
                .map_or(shown.len(), |(i, _)| i);
            let (before, after) = shown.split_at(split);
            let mut rest = after.chars();
            let under = rest.next().map_or(" ".to_string(), |c| c.to_string());
            spans.push(Span::styled(before.to_string(), value_style));
            spans.push(Span::styled(under, theme.selected().add_modifier(Modifier::REVERSED)));
            spans.push(Span::styled(rest.collect::<String>(), value_style));
        } else {
            spans.push(Span::styled(shown, value_style));
        }
        Line::from(spans)
    }
}

/// Rounded, titled block used by every panel.
pub fn panel<'a>(title: impl AsRef<str>, theme: &Theme) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(theme.border())
        .title(Span::styled(format!(" {} ", title.as_ref()), theme.title()))
}

/// One line per result: icon, name, message, and the captured error if any.
pub fn result_lines<'a>(results: &'a [CommandResult], theme: &Theme) -> Vec<Line<'a>> {
    let mut lines = Vec::with_capacity(results.len());
    for result in results {
        let style = theme.status(result.status);
        lines.push(Line::from(vec![
            Span::styled(format!("{} ", Theme::status_icon(result.status)), style),
            Span::styled(format!("{}: ", result.name), style.add_modifier(Modifier::BOLD)),
            Span::styled(result.message.as_str(), theme.base()),
        ]));
        if !result.error.is_empty() {
            lines.push(Line::from(Span::styled(
                format!("    {}", result.error),
                theme.muted(),
            )));
        }
    }
    lines
}

/// A `width`% by `height`-line rectangle centered in `area`.
pub fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - width.min(100)) / 2),
            Constraint::Percentage(width.min(100)),
            Constraint::Percentage((100 - width.min(100)) / 2),
        ])
        .split(vertical[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_editing_keys() {
        let mut input = TextInput::new("abc");
        assert_eq!(input.cursor(), 3);

        input.handle_key(key(KeyCode::Left));
        input.handle_key(key(KeyCode::Backspace));
        assert_eq!(input.value(), "ac");

        input.handle_key(key(KeyCode::Home));
        input.handle_key(key(KeyCode::Char('x')));
        assert_eq!(input.value(), "xac");

        input.handle_key(key(KeyCode::End));
        input.handle_key(key(KeyCode::Delete));
        assert_eq!(input.value(), "xac");
        assert!(!input.handle_key(key(KeyCode::Enter)));

        input.handle_key(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL));
        assert_eq!(input.value(), "");
    }

    #[test]
    fn test_multibyte_cursor() {
        let mut input = TextInput::new("né");
        input.handle_key(key(KeyCode::Left));
        input.handle_key(key(KeyCode::Char('x')));
        assert_eq!(input.value(), "nxé");
        input.handle_key(key(KeyCode::Right));
        input.handle_key(key(KeyCode::Backspace));
        assert_eq!(input.value(), "nx");
    }

    #[test]
    fn test_display() {
        assert_eq!(TextInput::new("").placeholder("50").display(), "50");
        assert_eq!(TextInput::new("secret").masked().display(), "••••••");
        assert_eq!(TextInput::new("host").display(), "host");
    }
}
