use ratatui::layout::{Constraint, Direction, Layout, Rect};

pub const STATUS_HEIGHT: u16 = 1;
pub const SIDE_PANEL_MAX_WIDTH: u16 = 30;
pub const SIDE_PANEL_PERCENT: u16 = 20;
pub const DIALOG_WIDTH_PERCENT: u16 = 80;
pub const DIALOG_HEIGHT_PERCENT: u16 = 70;

/// Fixed screen partition shared by rendering and resize fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayoutPlan {
    pub side: Rect,
    pub main: Rect,
    pub status: Rect,
    pub dialog: Rect,
}

impl LayoutPlan {
    pub fn compute(area: Rect) -> Self {
        let status_height = area.height.min(STATUS_HEIGHT);
        let body_height = area.height - status_height;
        let side_width = side_panel_width(area.width);

        let side = Rect::new(area.x, area.y, side_width, body_height);
        let main = Rect::new(
            area.x + side_width,
            area.y,
            area.width - side_width,
            body_height,
        );
        let status = Rect::new(area.x, area.y + body_height, area.width, status_height);
        let dialog = centered_rect(DIALOG_WIDTH_PERCENT, DIALOG_HEIGHT_PERCENT, main);

        Self {
            side,
            main,
            status,
            dialog,
        }
    }
}

pub fn side_panel_width(width: u16) -> u16 {
    let share = (u32::from(width) * u32::from(SIDE_PANEL_PERCENT) / 100) as u16;
    share.min(SIDE_PANEL_MAX_WIDTH)
}

pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100u16.saturating_sub(percent_y)) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100u16.saturating_sub(percent_y)) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100u16.saturating_sub(percent_x)) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100u16.saturating_sub(percent_x)) / 2),
        ])
        .split(vertical[1])[1]
}
