//! Session list widget: sessions grouped under their project.

use chrono::Utc;
use elementerm_core::Session;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

use crate::app::{App, ConnectionState};
use crate::status::time_since;
use crate::ui::theme::{domain_color, status_background, status_color};

/// Renders the grouped session list.
///
/// Each project gets a header row; only session rows are selectable. When
/// there is nothing to list, a message matching the situation is shown.
pub fn render_session_list(frame: &mut Frame, area: Rect, app: &App) {
    let rows = app.rows();
    if rows.is_empty() {
        render_empty_state(frame, area, app);
        return;
    }

    let now = Utc::now();
    let mut items: Vec<ListItem> = Vec::with_capacity(rows.len() + app.project_count());
    let mut current_project: Option<&str> = None;

    for (idx, session) in rows.iter().enumerate() {
        if current_project != Some(session.project.as_str()) {
            current_project = Some(session.project.as_str());
            items.push(project_header(&session.project));
        }
        items.push(create_session_item(session, idx == app.selected_index, now));
    }

    let title = format!(" Sessions ({}) ", rows.len());
    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(Color::White)),
    );

    frame.render_widget(list, area);
}

fn project_header(project: &str) -> ListItem<'static> {
    ListItem::new(Line::from(Span::styled(
        project.to_string(),
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )))
}

/// `> icon worktree [DOMAIN] branch  N files  age`
fn create_session_item(session: &Session, is_selected: bool, now: chrono::DateTime<Utc>) -> ListItem<'static> {
    let domain_span = match session.domain {
        Some(domain) => Span::styled(
            format!("{:<8}", format!("[{domain}]")),
            Style::default().fg(domain_color(domain)),
        ),
        None => Span::raw(" ".repeat(8)),
    };

    let files = session.files_modified.len();
    let spans = vec![
        Span::styled(
            if is_selected { "> " } else { "  " },
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("{} ", session.status.icon()),
            Style::default()
                .fg(status_color(session.status))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("{:<14} ", truncate_string(&session.worktree, 14)),
            Style::default().fg(Color::White),
        ),
        domain_span,
        Span::styled(
            format!("{:<22} ", truncate_string(&session.branch, 22)),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            format!("{files:>3} file{} ", if files == 1 { " " } else { "s" }),
            Style::default().fg(Color::White),
        ),
        Span::styled(
            time_since(session.last_activity, now),
            Style::default().fg(Color::DarkGray),
        ),
    ];

    let background = status_background(session.status).or(if is_selected {
        Some(Color::Rgb(30, 30, 40))
    } else {
        None
    });
    let style = match background {
        Some(color) => Style::default().bg(color),
        None => Style::default(),
    };

    ListItem::new(Line::from(spans)).style(style)
}

/// Truncates to `max_len` characters, ending in "..." when shortened.
pub(crate) fn truncate_string(s: &str, max_len: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

fn render_empty_state(frame: &mut Frame, area: Rect, app: &App) {
    let hint = |text: &'static str| {
        Line::from(Span::styled(
            text,
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        ))
    };

    let (title, lines, border) = if app.snapshot_missing {
        (
            " No State ",
            vec![
                Line::from(""),
                Line::from(Span::styled(
                    "No daemon has run yet",
                    Style::default().fg(Color::Yellow),
                )),
                Line::from(""),
                Line::from(Span::styled(
                    "  Run: elementerm start",
                    Style::default().fg(Color::Cyan),
                )),
            ],
            Color::Yellow,
        )
    } else {
        match &app.connection {
            ConnectionState::Connected => (
                " No Sessions ",
                vec![
                    Line::from(""),
                    Line::from(Span::styled(
                        "No active sessions",
                        Style::default().fg(Color::Yellow),
                    )),
                    Line::from(""),
                    Line::from(Span::styled(
                        "  Run: elementerm new --worktree feat-auth --domain BACK",
                        Style::default().fg(Color::Cyan),
                    )),
                ],
                Color::Yellow,
            ),
            ConnectionState::Connecting => (
                " Connecting ",
                vec![
                    Line::from(""),
                    Line::from(Span::styled(
                        "Connecting to elementerm daemon...",
                        Style::default().fg(Color::Yellow),
                    )),
                    Line::from(""),
                    hint("If this persists, check: elementermd status"),
                ],
                Color::Yellow,
            ),
            ConnectionState::Disconnected { retry_count, .. } => (
                " Disconnected ",
                vec![
                    Line::from(""),
                    Line::from(Span::styled(
                        "Daemon not reachable",
                        Style::default()
                            .fg(Color::Red)
                            .add_modifier(Modifier::BOLD),
                    )),
                    Line::from(""),
                    Line::from(format!("Retry attempt: {retry_count}")),
                    Line::from(""),
                    Line::from(Span::styled(
                        "  Start it with: elementerm start",
                        Style::default().fg(Color::Cyan),
                    )),
                    hint("Logs: ~/.elementerm/daemon.log"),
                ],
                Color::Red,
            ),
        }
    };

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(Style::default().fg(border)),
    );

    frame.render_widget(paragraph, area);
}
