//! Dashboard rendering.
//!
//! # Layout Structure
//!
//! ```text
//! +--------------------------------------------------+
//! |  Header: title, connection, counts               |  <- 3 lines
//! +-----------------------------+--------------------+
//! | myapp                       |  Status: ● flow    |
//! | > ● feat-auth [BACK] ...    |  Branch: wt/...    |
//! |   ○ feat-ui   [FRONT] ...   |  Files modified    |
//! +-----------------------------+--------------------+
//! |  Footer: keybinding hints                        |  <- 3 lines
//! +--------------------------------------------------+
//! ```

pub mod detail_panel;
pub mod layout;
pub mod session_list;
pub mod status_bar;
pub mod theme;

use layout::AppLayout;
use ratatui::Frame;

use crate::app::App;

pub use detail_panel::render_detail_panel;
pub use session_list::render_session_list;
pub use status_bar::{render_footer, render_header};

/// Renders the complete dashboard.
pub fn render(frame: &mut Frame, app: &App) {
    let layout = AppLayout::new(frame.area());

    render_header(frame, layout.header, app);
    render_footer(frame, layout.footer, app);
    render_session_list(frame, layout.list_area, app);
    render_detail_panel(frame, layout.detail_area, app.selected_session());
}
