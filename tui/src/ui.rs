//! Rendering
//!
//! Pure functions from [`DisplayState`] to a frame. Button state comes from
//! the wizard's published controls; nothing here decides what is enabled.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;

use asset_wizard_core::{ForwardAction, StepKind};

use crate::display::DisplayState;
use crate::theme::{
    button_style, notify_color, ACCENT, DIM_GRAY, ERROR_RED, GAUGE_FILL, SUCCESS_GREEN,
    WARNING_AMBER,
};

const INTRO_TEXT: &str = "\
This wizard extracts the resources of your game archives into a bundle.

You will need:
  - the archives (.xci, .nsp, or extracted romfs archives)
  - a product key file when any archive is a .xci or .nsp

Press → or Enter to begin.";

/// Draw the whole screen
pub fn render(frame: &mut Frame, display: &DisplayState, prompt: Option<&str>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(5),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_header(frame, chunks[0], display);
    match display.step {
        StepKind::Intro => render_intro(frame, chunks[1]),
        StepKind::AssetSelect => render_assets(frame, chunks[1], display),
        StepKind::ExtractProgress => render_progress(frame, chunks[1], display),
    }
    render_buttons(frame, chunks[2], display);
    render_status(frame, chunks[3], display);

    if let Some(input) = prompt {
        render_prompt(frame, chunks[1], input);
    }
}

fn render_header(frame: &mut Frame, area: Rect, display: &DisplayState) {
    let mut spans = vec![Span::styled(
        format!(" Step {}: {} ", display.step_index + 1, display.step.title()),
        Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
    )];
    if display.busy {
        spans.push(Span::styled("  working…", Style::default().fg(DIM_GRAY)));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_intro(frame: &mut Frame, area: Rect) {
    let body = Paragraph::new(INTRO_TEXT)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(" Welcome "));
    frame.render_widget(body, area);
}

// =============================================================================
// Asset Selection
// =============================================================================

fn render_assets(frame: &mut Frame, area: Rect, display: &DisplayState) {
    let warning_height = match &display.missing_files {
        Some(files) if !files.is_empty() => 3,
        _ => 0,
    };
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(warning_height)])
        .split(area);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(rows[0]);

    // Files
    let items: Vec<ListItem> = if display.files.is_empty() {
        vec![ListItem::new(Span::styled(
            "No archives yet. Press a to add.",
            Style::default().fg(DIM_GRAY),
        ))]
    } else {
        display
            .files
            .iter()
            .map(|f| ListItem::new(f.as_str()))
            .collect()
    };
    let files = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(" Archives "))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    let mut state = ListState::default();
    if !display.files.is_empty() {
        state.select(Some(display.highlighted));
    }
    frame.render_stateful_widget(files, columns[0], &mut state);

    // Keys
    let mut lines: Vec<Line> = display
        .keys
        .iter()
        .map(|k| {
            if display.selected_key.as_deref() == Some(k.as_str()) {
                Line::styled(format!("● {k}"), Style::default().fg(SUCCESS_GREEN))
            } else {
                Line::from(format!("○ {k}"))
            }
        })
        .collect();
    if let Some(selected) = &display.selected_key {
        if !display.keys.contains(selected) {
            lines.push(Line::styled(
                format!("● {selected}"),
                Style::default().fg(SUCCESS_GREEN),
            ));
        }
    }
    if lines.is_empty() {
        lines.push(Line::styled(
            "No key found. Press K to pick one.",
            Style::default().fg(DIM_GRAY),
        ));
    }
    let keys = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title(" Keys "));
    frame.render_widget(keys, columns[1]);

    // Missing files warning
    if let Some(missing) = display.missing_files.as_ref().filter(|m| !m.is_empty()) {
        let text = format!(
            "{} required file(s) missing: {}",
            missing.len(),
            missing.join(", ")
        );
        let warning = Paragraph::new(text)
            .style(Style::default().fg(WARNING_AMBER))
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::TOP));
        frame.render_widget(warning, rows[1]);
    }
}

// =============================================================================
// Extraction Progress
// =============================================================================

fn render_progress(frame: &mut Frame, area: Rect, display: &DisplayState) {
    let label_lines: Vec<Line> = display
        .step_label
        .split('\n')
        .filter(|l| !l.is_empty())
        .map(Line::from)
        .collect();
    let label_height = u16::try_from(label_lines.len()).unwrap_or(u16::MAX).min(4);

    let mut notes: Vec<Line> = Vec::new();
    if display.show_save_hint() {
        notes.push(Line::styled(
            "Bundle ready. Press → or Enter to save it.",
            Style::default().fg(SUCCESS_GREEN),
        ));
    }
    if display.saved {
        notes.push(Line::styled("Bundle saved.", Style::default().fg(SUCCESS_GREEN)));
    }
    for line in display.error_lines() {
        notes.push(Line::styled(line, Style::default().fg(ERROR_RED)));
    }
    let notes_height = u16::try_from(notes.len()).unwrap_or(u16::MAX).min(6);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(label_height),
            Constraint::Min(3),
            Constraint::Length(notes_height),
        ])
        .split(area);

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(" Progress "))
        .gauge_style(Style::default().fg(GAUGE_FILL))
        .ratio(display.progress_ratio())
        .label(format!("{:.1}%", display.progress.clamp(0.0, 100.0)));
    frame.render_widget(gauge, rows[0]);

    frame.render_widget(Paragraph::new(label_lines), rows[1]);

    let log_area = rows[2];
    let visible = usize::from(log_area.height.saturating_sub(2));
    let lines: Vec<&str> = display.log.lines().collect();
    let tail = lines[lines.len().saturating_sub(visible)..].join("\n");
    let log = Paragraph::new(tail)
        .style(Style::default().fg(DIM_GRAY))
        .block(Block::default().borders(Borders::ALL).title(" Log "));
    frame.render_widget(log, log_area);

    frame.render_widget(Paragraph::new(notes).wrap(Wrap { trim: true }), rows[3]);
}

// =============================================================================
// Chrome
// =============================================================================

fn render_buttons(frame: &mut Frame, area: Rect, display: &DisplayState) {
    let Some(controls) = &display.controls else {
        return;
    };
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    if controls.back.visible {
        let back = Paragraph::new(Span::styled(
            format!(" [← {}]", controls.back.label),
            button_style(controls.back.enabled),
        ));
        frame.render_widget(back, halves[0]);
    }

    if controls.forward.visible {
        let glyph = match controls.forward_action {
            ForwardAction::Next => "→",
            ForwardAction::Save => "⤓",
        };
        let forward = Paragraph::new(Span::styled(
            format!("[{} {glyph}] ", controls.forward.label),
            button_style(controls.forward.enabled),
        ))
        .alignment(ratatui::layout::Alignment::Right);
        frame.render_widget(forward, halves[1]);
    }
}

fn render_status(frame: &mut Frame, area: Rect, display: &DisplayState) {
    let line = match &display.notification {
        Some(note) => Line::styled(
            format!(" {}", note.message),
            Style::default().fg(notify_color(note.level)),
        ),
        None => Line::styled(key_hints(display.step), Style::default().fg(DIM_GRAY)),
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn render_prompt(frame: &mut Frame, body: Rect, input: &str) {
    let height = 3.min(body.height);
    let area = Rect::new(body.x, body.y + body.height - height, body.width, height);
    frame.render_widget(Clear, area);
    let prompt = Paragraph::new(format!("{input}▏")).block(
        Block::default()
            .borders(Borders::ALL)
            .title(" Archive paths (comma-separated, empty = file picker) "),
    );
    frame.render_widget(prompt, area);
}

/// Key help for the status line
#[must_use]
pub fn key_hints(step: StepKind) -> &'static str {
    match step {
        StepKind::Intro => " →/Enter next · q quit",
        StepKind::AssetSelect => {
            " a add · d remove · ↑↓ select · k key · K pick key · f find keys · ←/→ navigate · q quit"
        }
        StepKind::ExtractProgress => " ←/b back · →/Enter save when ready · q quit",
    }
}
