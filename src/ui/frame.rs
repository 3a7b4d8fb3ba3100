//! Off-screen frame
//!
//! Each redraw composites the rain over the whole screen, then the terminal
//! panel (border, transcript grid, status line) on top of it. The renderer
//! only ever sees the finished frame.

use unicode_width::UnicodeWidthStr;

use crate::config::PanelConfig;
use crate::core::term::{AttrFlags, CellAttrs, Color, TermGrid};
use crate::ui::rain::RainField;

/// Rain glyph colour (#00FF41)
pub const RAIN_GREEN: (u8, u8, u8) = (0, 255, 65);
/// Page background the rain fades into
pub const RAIN_BACKGROUND: (u8, u8, u8) = (13, 2, 8);
/// Default transcript text colour (#00FF66)
pub const PANEL_FG: Color = Color::Rgb(0, 255, 102);
pub const PANEL_BG: Color = Color::Rgb(0, 0, 0);
pub const BORDER_FG: Color = Color::Rgb(0, 128, 45);

const TITLE: &str = " MATRIX TERMINAL ";
const BUSY_GLYPH: &str = "▌";
const INTENSITY_LEVELS: f32 = 12.0;

/// One screen cell
#[derive(Debug, Clone, PartialEq)]
pub struct FrameCell {
    /// Empty for the trailing half of a wide glyph
    pub text: String,
    pub fg: Color,
    pub bg: Color,
    pub flags: AttrFlags,
}

impl Default for FrameCell {
    fn default() -> Self {
        let (r, g, b) = RAIN_BACKGROUND;
        Self {
            text: " ".to_string(),
            fg: Color::Default,
            bg: Color::Rgb(r, g, b),
            flags: AttrFlags::empty(),
        }
    }
}

impl FrameCell {
    pub fn is_continuation(&self) -> bool {
        self.text.is_empty()
    }
}

/// Panel rectangle in screen cells, border included
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelLayout {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl PanelLayout {
    const MIN_WIDTH: u16 = 20;
    const MIN_HEIGHT: u16 = 6;

    /// Centre the panel on a `cols` x `rows` screen
    pub fn compute(cols: u16, rows: u16, config: &PanelConfig) -> Self {
        let scale = |total: u16, percent: u16, min: u16| {
            let wanted = (total as u32 * percent.clamp(10, 100) as u32 / 100) as u16;
            wanted.max(min.min(total)).min(total)
        };
        let width = scale(cols, config.width_percent, Self::MIN_WIDTH);
        let height = scale(rows, config.height_percent, Self::MIN_HEIGHT);
        Self {
            x: (cols - width) / 2,
            y: (rows - height) / 2,
            width,
            height,
        }
    }

    /// Size of the transcript area inside the border
    pub fn inner_size(&self) -> (u16, u16) {
        (
            self.width.saturating_sub(2).max(1),
            self.height.saturating_sub(2).max(1),
        )
    }

    pub fn inner_origin(&self) -> (u16, u16) {
        (self.x + 1, self.y + 1)
    }
}

/// Panel decorations that depend on session state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PanelStatus {
    /// Busy indicator phase; `None` when idle
    pub busy_pulse: Option<bool>,
    pub scroll_offset: usize,
}

pub struct Frame {
    width: u16,
    height: u16,
    cells: Vec<FrameCell>,
}

impl Frame {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![FrameCell::default(); width as usize * height as usize],
        }
    }

    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    pub fn cell(&self, x: u16, y: u16) -> Option<&FrameCell> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells.get(y as usize * self.width as usize + x as usize)
    }

    fn set(&mut self, x: u16, y: u16, cell: FrameCell) {
        if x < self.width && y < self.height {
            let idx = y as usize * self.width as usize + x as usize;
            self.cells[idx] = cell;
        }
    }

    /// Row as plain text, continuation cells skipped
    pub fn row_text(&self, y: u16) -> String {
        (0..self.width)
            .filter_map(|x| self.cell(x, y))
            .filter(|c| !c.is_continuation())
            .map(|c| c.text.as_str())
            .collect()
    }

    /// Paint the rain; cells outside the field stay background
    pub fn draw_rain(&mut self, rain: &RainField) {
        for y in 0..self.height {
            for x in 0..self.width {
                let Some(drop) = rain.cell(x, y) else {
                    continue;
                };
                if !drop.is_visible() {
                    continue;
                }
                let level = (drop.intensity * INTENSITY_LEVELS).round() / INTENSITY_LEVELS;
                let mut glyph = drop.glyph;
                if glyph.to_string().width() != 1 {
                    glyph = '|';
                }
                self.set(
                    x,
                    y,
                    FrameCell {
                        text: glyph.to_string(),
                        fg: blend(RAIN_BACKGROUND, RAIN_GREEN, level),
                        ..FrameCell::default()
                    },
                );
            }
        }
    }

    /// Paint the bordered panel holding the transcript grid
    pub fn draw_panel(&mut self, layout: &PanelLayout, grid: &TermGrid, status: PanelStatus) {
        self.draw_border(layout);

        let (inner_x, inner_y) = layout.inner_origin();
        let (inner_cols, inner_rows) = layout.inner_size();

        for row_idx in 0..inner_rows {
            let y = inner_y + row_idx;
            for x in 0..inner_cols {
                self.set(inner_x + x, y, panel_cell(" ", CellAttrs::default()));
            }

            let Some(row) = grid.row_at(row_idx as usize) else {
                continue;
            };
            let mut col: u16 = 0;
            for cell in &row.cells {
                if col >= inner_cols {
                    break;
                }
                if cell.is_continuation() {
                    col += 1;
                    continue;
                }
                let width = cell.width.max(1) as u16;
                if col + width > inner_cols {
                    break;
                }
                self.set(inner_x + col, y, panel_cell(cell.display_char(), cell.attrs));
                for w in 1..width {
                    self.set(inner_x + col + w, y, panel_cell("", cell.attrs));
                }
                col += width;
            }
        }

        self.draw_status(layout, status);
    }

    fn draw_border(&mut self, layout: &PanelLayout) {
        if layout.width < 2 || layout.height < 2 {
            return;
        }
        let right = layout.x + layout.width - 1;
        let bottom = layout.y + layout.height - 1;

        for x in layout.x..=right {
            let (top, low) = if x == layout.x {
                ("┌", "└")
            } else if x == right {
                ("┐", "┘")
            } else {
                ("─", "─")
            };
            self.set(x, layout.y, border_cell(top));
            self.set(x, bottom, border_cell(low));
        }
        for y in layout.y + 1..bottom {
            self.set(layout.x, y, border_cell("│"));
            self.set(right, y, border_cell("│"));
        }

        self.write_label(layout.x + 2, layout.y, TITLE, right, BORDER_FG);
    }

    fn draw_status(&mut self, layout: &PanelLayout, status: PanelStatus) {
        if layout.height < 2 {
            return;
        }
        let bottom = layout.y + layout.height - 1;
        let right = layout.x + layout.width - 1;

        if let Some(lit) = status.busy_pulse {
            let fg = if lit { PANEL_FG } else { BORDER_FG };
            let label = format!(" {} receiving ", BUSY_GLYPH);
            self.write_label(layout.x + 2, bottom, &label, right, fg);
        }
        if status.scroll_offset > 0 {
            let label = format!(" [↑ {} lines] ", status.scroll_offset);
            let start = right.saturating_sub(label.chars().count() as u16 + 1);
            self.write_label(start.max(layout.x + 1), bottom, &label, right, PANEL_FG);
        }
    }

    /// Single-width text on a border row, clipped before `limit`
    fn write_label(&mut self, x: u16, y: u16, text: &str, limit: u16, fg: Color) {
        for (i, ch) in text.chars().enumerate() {
            let col = x + i as u16;
            if col >= limit {
                break;
            }
            self.set(
                col,
                y,
                FrameCell {
                    text: ch.to_string(),
                    fg,
                    bg: PANEL_BG,
                    flags: AttrFlags::empty(),
                },
            );
        }
    }
}

fn border_cell(text: &str) -> FrameCell {
    FrameCell {
        text: text.to_string(),
        fg: BORDER_FG,
        bg: PANEL_BG,
        flags: AttrFlags::empty(),
    }
}

fn panel_cell(text: &str, attrs: CellAttrs) -> FrameCell {
    let fg = match attrs.fg {
        Color::Default => PANEL_FG,
        other => other,
    };
    let bg = match attrs.bg {
        Color::Default => PANEL_BG,
        other => other,
    };
    FrameCell {
        text: text.to_string(),
        fg,
        bg,
        flags: attrs.flags,
    }
}

fn blend(from: (u8, u8, u8), to: (u8, u8, u8), t: f32) -> Color {
    let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t.clamp(0.0, 1.0)).round() as u8;
    Color::Rgb(mix(from.0, to.0), mix(from.1, to.1), mix(from.2, to.2))
}
