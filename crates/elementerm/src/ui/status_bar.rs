//! Header and footer bars.

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::{App, ConnectionState};

/// Renders the title, connection status and summary counts.
pub fn render_header(frame: &mut Frame, area: Rect, app: &App) {
    let (status_text, status_style) = get_status_display(&app.connection);

    let session_count = app.session_count();
    let mut stats = String::new();
    if session_count > 0 {
        let project_count = app.project_count();
        stats = format!(
            " | {} session{} | {} project{}",
            session_count,
            if session_count == 1 { "" } else { "s" },
            project_count,
            if project_count == 1 { "" } else { "s" },
        );

        let flow = app.flow_count();
        if flow > 0 {
            stats.push_str(&format!(" | {flow} in flow"));
        }
        let attention = app.attention_count();
        if attention > 0 {
            stats.push_str(&format!(" | {attention} need you"));
        }
    }

    let header_line = Line::from(vec![
        Span::styled(
            "ELEMENTERM",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        Span::styled(status_text, status_style),
        Span::styled(stats, Style::default().fg(Color::DarkGray)),
    ]);

    let border_style = match app.connection {
        ConnectionState::Connected => Style::default().fg(Color::Green),
        ConnectionState::Connecting => Style::default().fg(Color::Yellow),
        ConnectionState::Disconnected { .. } => Style::default().fg(Color::Red),
    };

    let header = Paragraph::new(header_line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style),
    );

    frame.render_widget(header, area);
}

/// Renders keybinding hints, plus the last snapshot error if any.
pub fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
    let key_style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let sep_style = Style::default().fg(Color::DarkGray);

    let mut hints = vec![
        Span::styled(" k/↑", key_style),
        Span::raw(" up"),
        Span::styled("  |  ", sep_style),
        Span::styled("j/↓", key_style),
        Span::raw(" down"),
        Span::styled("  |  ", sep_style),
        Span::styled("r", key_style),
        Span::raw(" reload"),
        Span::styled("  |  ", sep_style),
        Span::styled("q", key_style),
        Span::raw(" quit"),
    ];

    if let Some(error) = &app.last_error {
        hints.push(Span::styled("  |  ", sep_style));
        hints.push(Span::styled(error.clone(), Style::default().fg(Color::Red)));
    }

    let footer = Paragraph::new(Line::from(hints)).block(Block::default().borders(Borders::ALL));

    frame.render_widget(footer, area);
}

fn get_status_display(state: &ConnectionState) -> (&'static str, Style) {
    match state {
        ConnectionState::Connected => (
            "Live",
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ),
        ConnectionState::Connecting => (
            "Connecting...",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        ConnectionState::Disconnected { retry_count, .. } => {
            let text = if *retry_count > 3 {
                "No daemon (polling file)"
            } else {
                "Disconnected"
            };
            (text, Style::default().fg(Color::Red).add_modifier(Modifier::BOLD))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display_connected() {
        let (text, style) = get_status_display(&ConnectionState::Connected);
        assert_eq!(text, "Live");
        assert_eq!(style.fg, Some(Color::Green));
    }

    #[test]
    fn test_status_display_connecting() {
        let (text, style) = get_status_display(&ConnectionState::Connecting);
        assert_eq!(text, "Connecting...");
        assert_eq!(style.fg, Some(Color::Yellow));
    }

    #[test]
    fn test_status_display_disconnected_many_retries() {
        let state = ConnectionState::Disconnected {
            since: chrono::Utc::now(),
            retry_count: 5,
        };
        let (text, style) = get_status_display(&state);
        assert_eq!(text, "No daemon (polling file)");
        assert_eq!(style.fg, Some(Color::Red));
    }
}
