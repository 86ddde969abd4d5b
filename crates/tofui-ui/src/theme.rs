use chrono::{DateTime, Utc};
use ratatui::style::{Color, Modifier, Style};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Theme {
    pub surface: Color,
    pub border: Color,
    pub border_active: Color,
    pub title: Color,
    pub text: Color,
    pub muted: Color,
    pub accent: Color,
    pub ok: Color,
    pub warn: Color,
    pub critical: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            surface: Color::Rgb(24, 20, 38),
            border: Color::Rgb(88, 80, 112),
            border_active: Color::Rgb(167, 139, 250),
            title: Color::Rgb(221, 214, 254),
            text: Color::Rgb(232, 230, 240),
            muted: Color::Rgb(150, 144, 170),
            accent: Color::Rgb(138, 99, 210),
            ok: Color::Rgb(34, 197, 94),
            warn: Color::Rgb(245, 158, 11),
            critical: Color::Rgb(239, 68, 68),
        }
    }
}

impl Theme {
    pub fn title_style(&self) -> Style {
        Style::default()
            .fg(self.title)
            .add_modifier(Modifier::BOLD)
    }

    pub fn muted_style(&self) -> Style {
        Style::default().fg(self.muted)
    }

    pub fn border_style(&self, active: bool) -> Style {
        if active {
            Style::default().fg(self.border_active)
        } else {
            Style::default().fg(self.border)
        }
    }

    pub fn selected_style(&self) -> Style {
        Style::default()
            .fg(self.text)
            .bg(self.accent)
            .add_modifier(Modifier::BOLD)
    }
}

pub fn ellipsize(input: &str, max: usize) -> String {
    if input.chars().count() <= max {
        return input.to_string();
    }
    if max <= 3 {
        return "...".chars().take(max).collect();
    }
    let prefix: String = input.chars().take(max - 3).collect();
    format!("{prefix}...")
}

/// Absolute timestamps keep frames reproducible across replays.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

pub fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}
