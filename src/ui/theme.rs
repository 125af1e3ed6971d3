//! Colour palette shared by every screen

use ratatui::style::{Color, Modifier, Style};

use crate::protocols::asterisk_cli::ServiceState;
use crate::services::classifier::Highlight;
use crate::services::executor::CommandStatus;
use crate::services::security::Posture;

/// Explicit palette handed to each render function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub text: Color,
    pub muted: Color,
    pub border: Color,
    pub accent: Color,
    pub ok: Color,
    pub warn: Color,
    pub critical: Color,
    pub info: Color,
    pub selection: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            text: Color::White,
            muted: Color::DarkGray,
            border: Color::Rgb(98, 114, 164),
            accent: Color::Rgb(139, 233, 253),
            ok: Color::Green,
            warn: Color::Yellow,
            critical: Color::Red,
            info: Color::Cyan,
            selection: Color::Rgb(68, 71, 90),
        }
    }
}

impl Theme {
    pub fn base(&self) -> Style {
        Style::default().fg(self.text)
    }

    pub fn muted(&self) -> Style {
        Style::default().fg(self.muted)
    }

    pub fn border(&self) -> Style {
        Style::default().fg(self.border)
    }

    pub fn title(&self) -> Style {
        Style::default().fg(self.accent).add_modifier(Modifier::BOLD)
    }

    pub fn selected(&self) -> Style {
        Style::default().bg(self.selection).add_modifier(Modifier::BOLD)
    }

    pub fn status(&self, status: CommandStatus) -> Style {
        let color = match status {
            CommandStatus::Success => self.ok,
            CommandStatus::Warning => self.warn,
            CommandStatus::Error => self.critical,
            CommandStatus::Info => self.info,
        };
        Style::default().fg(color)
    }

    pub fn status_icon(status: CommandStatus) -> &'static str {
        match status {
            CommandStatus::Success => "✔",
            CommandStatus::Warning => "⚠",
            CommandStatus::Error => "✖",
            CommandStatus::Info => "ℹ",
        }
    }

    pub fn service(&self, state: ServiceState) -> Style {
        let color = match state {
            ServiceState::Running => self.ok,
            ServiceState::Stopped | ServiceState::NotFound => self.critical,
            ServiceState::Unknown => self.warn,
        };
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    }

    pub fn highlight(&self, highlight: Option<Highlight>) -> Style {
        match highlight {
            Some(Highlight::Critical) => Style::default().fg(self.critical).add_modifier(Modifier::BOLD),
            Some(Highlight::Warning) => Style::default().fg(self.warn),
            Some(Highlight::Info) => Style::default().fg(self.info),
            None => self.base(),
        }
    }

    pub fn posture(&self, posture: Posture) -> Style {
        let color = match posture {
            Posture::Good => self.ok,
            Posture::NeedsImprovement => self.warn,
            Posture::Poor => self.critical,
        };
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    }

    /// Gauge colour for a usage percentage.
    pub fn usage(&self, percent: f64) -> Color {
        if percent >= 90.0 {
            self.critical
        } else if percent >= 75.0 {
            self.warn
        } else {
            self.ok
        }
    }
}
