//! Theme and Colors

use ratatui::style::{Color, Modifier, Style};

use asset_wizard_core::NotifyLevel;

// ============================================================================
// Palette
// ============================================================================

/// Accent for titles and the active button
pub const ACCENT: Color = Color::Rgb(120, 200, 255);

/// System/dim text
pub const DIM_GRAY: Color = Color::Rgb(100, 100, 100);

/// Error red
pub const ERROR_RED: Color = Color::Rgb(255, 80, 80);

/// Warning amber
pub const WARNING_AMBER: Color = Color::Rgb(255, 190, 80);

/// Success green
pub const SUCCESS_GREEN: Color = Color::Rgb(120, 230, 120);

/// Gauge fill
pub const GAUGE_FILL: Color = Color::Rgb(100, 180, 255);

// ============================================================================
// Styles
// ============================================================================

/// Style of a navigation button
#[must_use]
pub fn button_style(enabled: bool) -> Style {
    if enabled {
        Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(DIM_GRAY)
    }
}

/// Color of a notification
#[must_use]
pub fn notify_color(level: NotifyLevel) -> Color {
    match level {
        NotifyLevel::Info => ACCENT,
        NotifyLevel::Warning => WARNING_AMBER,
        NotifyLevel::Error => ERROR_RED,
        NotifyLevel::Success => SUCCESS_GREEN,
    }
}
