//! Detail panel for the selected session.

use chrono::Utc;
use elementerm_core::Session;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::status::time_since;
use crate::ui::session_list::truncate_string;
use crate::ui::theme::{domain_color, status_color};

/// Most modified files listed before the rest are summarized.
const MAX_FILES_SHOWN: usize = 12;

pub fn render_detail_panel(frame: &mut Frame, area: Rect, session: Option<&Session>) {
    let Some(session) = session else {
        let block = Block::default()
            .title(" Details ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray));
        frame.render_widget(Paragraph::new("").block(block), area);
        return;
    };

    let border_color = if session.status.needs_attention() {
        status_color(session.status)
    } else {
        Color::Cyan
    };

    let block = Block::default()
        .title(format!(" {}/{} ", session.project, session.worktree))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

    let paragraph = Paragraph::new(build_detail_lines(session))
        .block(block)
        .wrap(Wrap { trim: false });
    frame.render_widget(paragraph, area);
}

fn build_detail_lines(session: &Session) -> Vec<Line<'static>> {
    let label_style = Style::default()
        .fg(Color::DarkGray)
        .add_modifier(Modifier::BOLD);
    let value_style = Style::default().fg(Color::White);
    let field = |label: &'static str, value: String| {
        Line::from(vec![Span::styled(label, label_style), Span::styled(value, value_style)])
    };

    let domain = match session.domain {
        Some(domain) => Span::styled(domain.to_string(), Style::default().fg(domain_color(domain))),
        None => Span::styled("-", value_style),
    };

    let mut lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("  Status: ", label_style),
            Span::styled(
                format!("{} {}", session.status.icon(), session.status),
                Style::default()
                    .fg(status_color(session.status))
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled("  Domain: ", label_style),
            domain,
        ]),
        Line::from(""),
        field("  Branch: ", session.branch.clone()),
        field("  Path:   ", session.cwd.clone()),
        field("  ID:     ", session.id.short().to_string()),
        field(
            "  Active: ",
            format!("{} ago", time_since(session.last_activity, Utc::now())),
        ),
    ];

    match &session.last_commit {
        Some(commit) => lines.push(field(
            "  Commit: ",
            format!(
                "{} {}",
                truncate_string(&commit.hash, 7),
                commit.message
            ),
        )),
        None => lines.push(field("  Commit: ", "-".to_string())),
    }
    if let Some(pid) = session.terminal_pid {
        lines.push(field("  PID:    ", pid.to_string()));
    }
    if let Some(agent_id) = &session.claude_session_id {
        lines.push(field("  Agent:  ", truncate_string(agent_id, 12)));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        format!("  Files modified ({})", session.files_modified.len()),
        label_style,
    )));
    for path in session.files_modified.iter().take(MAX_FILES_SHOWN) {
        lines.push(Line::from(Span::styled(format!("    {path}"), value_style)));
    }
    let hidden = session.files_modified.len().saturating_sub(MAX_FILES_SHOWN);
    if hidden > 0 {
        lines.push(Line::from(Span::styled(
            format!("    ... and {hidden} more"),
            Style::default().fg(Color::DarkGray),
        )));
    }

    lines
}
