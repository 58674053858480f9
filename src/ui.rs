//! Terminal UI rendering.
//!
//! Layout, top to bottom: header (workflow and step), progress gauge, page
//! title and body, then a key legend built from the page's actions. The
//! notification line overlays the bottom row.
//!
//! This module renders from RenderState (immutable snapshot) and never
//! mutates application state.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Clear, Gauge, Paragraph, Wrap},
    Frame,
};

use crate::render::{ActionView, Notification, NotificationLevel, RenderState};

const COLOR_TEXT_DIMMED: Color = Color::Gray;
const COLOR_TEXT_MUTED: Color = Color::DarkGray;
const COLOR_ACCENT: Color = Color::Cyan;
const COLOR_LOADING: Color = Color::Yellow;

const HEADER_HEIGHT: u16 = 1;
const GAUGE_HEIGHT: u16 = 1;

pub fn draw(frame: &mut Frame, state: &RenderState) {
    let area = frame.area();

    if area.height < 4 {
        render_header(frame, state, area);
    } else {
        let chunks = Layout::vertical([
            Constraint::Length(HEADER_HEIGHT),
            Constraint::Length(GAUGE_HEIGHT),
            Constraint::Fill(1),
            Constraint::Length(1),
        ])
        .split(area);

        render_header(frame, state, chunks[0]);
        render_progress_bar(frame, state, chunks[1]);
        render_page(frame, state, chunks[2]);
        render_actions(frame, state, chunks[3]);
    }

    if let Some(ref notification) = state.notification {
        render_notification(frame, notification, area);
    }
}

fn render_header(frame: &mut Frame, state: &RenderState, area: Rect) {
    let mut spans = vec![
        Span::styled(
            state.workflow_id.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::styled("  ", Style::default()),
        Span::styled(state.step_label(), Style::default().fg(COLOR_TEXT_DIMMED)),
    ];
    if state.page_set != state.workflow_id && !state.page_set.is_empty() {
        spans.push(Span::styled(
            format!("  [{}]", state.page_set),
            Style::default().fg(COLOR_TEXT_MUTED),
        ));
    }
    if !state.persistence_enabled {
        spans.push(Span::styled(
            "  not saved",
            Style::default().fg(COLOR_TEXT_MUTED),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_progress_bar(frame: &mut Frame, state: &RenderState, area: Rect) {
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(COLOR_ACCENT).bg(Color::DarkGray))
        .percent(state.progress_percentage())
        .label(format!("{}%", state.progress_percentage()));
    frame.render_widget(gauge, area);
}

fn render_page(frame: &mut Frame, state: &RenderState, area: Rect) {
    let Some(page) = &state.page else {
        return;
    };

    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            page.title.clone(),
            Style::default().fg(COLOR_ACCENT).add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    lines.extend(page.body.iter().map(|l| Line::from(l.clone())));
    if state.is_initializing {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("{} loading", state.spinner()),
            Style::default().fg(COLOR_LOADING),
        )));
    }

    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
}

fn render_actions(frame: &mut Frame, state: &RenderState, area: Rect) {
    let actions = state.page.as_ref().map_or(&[][..], |p| &p.actions[..]);
    frame.render_widget(Paragraph::new(action_line(actions)), area);
}

/// `n next • b back │ q quit`, disabled actions muted.
fn action_line(actions: &[ActionView]) -> Line<'static> {
    let sep_style = Style::default().fg(COLOR_TEXT_MUTED);
    let mut spans: Vec<Span> = Vec::new();

    for (i, action) in actions.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" • ", sep_style));
        }
        let (key_style, label_style) = if action.enabled {
            (
                Style::default().add_modifier(Modifier::BOLD),
                Style::default().fg(COLOR_TEXT_DIMMED),
            )
        } else {
            (
                Style::default().fg(COLOR_TEXT_MUTED),
                Style::default().fg(COLOR_TEXT_MUTED),
            )
        };
        spans.push(Span::styled(action.key.to_string(), key_style));
        spans.push(Span::styled(format!(" {}", action.label), label_style));
    }

    if !spans.is_empty() {
        spans.push(Span::styled(" │ ", sep_style));
    }
    spans.push(Span::styled("q", Style::default().fg(COLOR_TEXT_DIMMED)));
    spans.push(Span::styled(" quit", sep_style));
    Line::from(spans)
}

/// Single-line notification on the bottom row: errors in red with an
/// "Error:" prefix, info in green.
fn render_notification(frame: &mut Frame, notification: &Notification, area: Rect) {
    let notification_area = Rect {
        x: area.x,
        y: area.y + area.height.saturating_sub(1),
        width: area.width,
        height: 1,
    };

    frame.render_widget(Clear, notification_area);

    let line = match notification.level {
        NotificationLevel::Error => Line::from(vec![
            Span::styled(
                "Error: ",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                notification.message.clone(),
                Style::default().fg(Color::Red),
            ),
        ]),
        NotificationLevel::Info => Line::from(Span::styled(
            notification.message.clone(),
            Style::default().fg(Color::Green),
        )),
    };

    frame.render_widget(Paragraph::new(line), notification_area);
}
