//! Shared colors for dashboard widgets.

use elementerm_core::{DomainTag, SessionStatus};
use ratatui::style::Color;

/// Color of a session status icon.
pub fn status_color(status: SessionStatus) -> Color {
    match status {
        SessionStatus::Flow => Color::Green,
        SessionStatus::Waiting => Color::Yellow,
        SessionStatus::Ready => Color::Blue,
        SessionStatus::Attention => Color::Magenta,
        SessionStatus::Blocked => Color::Red,
        SessionStatus::Idle => Color::Gray,
    }
}

/// Row tint for statuses that want a human. Everything else is untinted.
pub fn status_background(status: SessionStatus) -> Option<Color> {
    match status {
        SessionStatus::Blocked => Some(Color::Rgb(50, 0, 0)),
        SessionStatus::Attention => Some(Color::Rgb(40, 0, 40)),
        _ => None,
    }
}

pub fn domain_color(domain: DomainTag) -> Color {
    match domain {
        DomainTag::Back => Color::LightBlue,
        DomainTag::Front => Color::LightMagenta,
        DomainTag::Seo => Color::LightGreen,
        DomainTag::Sec => Color::LightRed,
        DomainTag::Test => Color::LightYellow,
        DomainTag::Infra => Color::LightCyan,
        DomainTag::Doc => Color::White,
    }
}
