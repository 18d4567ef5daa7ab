//! Dashboard layout.

use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Header (3 lines), session list and detail side by side, footer (3 lines).
#[derive(Debug, Clone, Copy)]
pub struct AppLayout {
    pub header: Rect,
    pub list_area: Rect,
    pub detail_area: Rect,
    pub footer: Rect,
}

impl AppLayout {
    pub fn new(area: Rect) -> Self {
        let [header, content, footer] = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(5),
                Constraint::Length(3),
            ])
            .areas(area);

        let [list_area, detail_area] = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .areas(content);

        Self {
            header,
            list_area,
            detail_area,
            footer,
        }
    }
}
