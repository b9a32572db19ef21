use ratatui::layout::{Rect, Layout as RatLayout, Direction, Constraint};

pub struct Layout {
    pub inner_area: Rect,  // Area inside the outer border
    pub main_area: Rect,
    pub status_area: Rect,
}

impl Layout {
    /// Minimum terminal dimensions required for the browser
    /// Height: 2 outer borders + 2 list borders + 1 row + 1 status
    pub const MIN_WIDTH: u16 = 20;
    pub const MIN_HEIGHT: u16 = 6;

    fn inner(size: Rect) -> Rect {
        let width = size.width.max(Self::MIN_WIDTH);
        let height = size.height.max(Self::MIN_HEIGHT);
        Rect::new(
            size.x + 1,
            size.y + 1,
            width.saturating_sub(2),
            height.saturating_sub(2),
        )
    }

    /// Card list of `list_rows` rows at the top, status line at the bottom
    pub fn browser(size: Rect, list_rows: u16) -> Self {
        let inner_area = Self::inner(size);
        let vertical = RatLayout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(list_rows.saturating_add(2)), // List with borders
                Constraint::Min(0),
                Constraint::Length(1), // Status
            ])
            .split(inner_area);

        Self {
            inner_area,
            main_area: vertical[0],
            status_area: vertical[2],
        }
    }

    /// Card face filling the screen, status line at the bottom
    pub fn card(size: Rect) -> Self {
        let inner_area = Self::inner(size);
        let vertical = RatLayout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Min(1),
                Constraint::Length(1),
            ])
            .split(inner_area);

        Self {
            inner_area,
            main_area: vertical[0],
            status_area: vertical[1],
        }
    }
}
