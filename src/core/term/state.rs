//! Transcript grid state
//!
//! Cell grid, cursor and attributes that transcript text is projected onto.
//! Rows that scroll off the top are kept in a bounded scrollback so the panel
//! can be paged back through.

use std::collections::VecDeque;

use bitflags::bitflags;
use unicode_width::UnicodeWidthChar;

/// Default number of rows kept above the visible area
pub const SCROLLBACK_LIMIT: usize = 2000;

/// Projected screen of the transcript
pub struct TermGrid {
    pub cols: u16,
    pub rows: u16,
    lines: Vec<Row>,
    scrollback: VecDeque<Row>,
    scrollback_limit: usize,
    /// Rows scrolled back from the live view (0 = live)
    scroll_offset: usize,
    cursor: Cursor,
    pub attrs: CellAttrs,
}

/// Cursor position; `col == cols` means a wrap is pending
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cursor {
    pub col: u16,
    pub row: u16,
}

impl TermGrid {
    pub fn new(cols: u16, rows: u16) -> Self {
        let cols = cols.max(1);
        let rows = rows.max(1);
        Self {
            cols,
            rows,
            lines: (0..rows).map(|_| Row::new(cols)).collect(),
            scrollback: VecDeque::new(),
            scrollback_limit: SCROLLBACK_LIMIT,
            scroll_offset: 0,
            cursor: Cursor::default(),
            attrs: CellAttrs::default(),
        }
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Put a character at the cursor, wrapping at the right edge
    pub fn put_char(&mut self, ch: char) {
        let width = ch.width().unwrap_or(0) as u16;
        if width == 0 {
            self.append_to_previous_cell(ch);
            return;
        }

        if self.cursor.col + width > self.cols {
            self.lines[self.cursor.row as usize].wrapped = true;
            self.cursor.col = 0;
            self.linefeed();
        }

        let row = self.cursor.row as usize;
        let col = self.cursor.col as usize;
        self.clear_wide_remnants(row, col);

        let attrs = self.attrs;
        let cells = &mut self.lines[row].cells;
        cells[col] = Cell {
            grapheme: ch.to_string(),
            width: width as u8,
            attrs,
        };
        if width == 2 && col + 1 < cells.len() {
            cells[col + 1] = Cell::continuation(attrs);
        }

        self.cursor.col += width;
        self.scroll_offset = 0;
    }

    fn append_to_previous_cell(&mut self, ch: char) {
        let row = self.cursor.row as usize;
        let col = self.cursor.col as usize;
        if col > 0 {
            let mut target = col - 1;
            if self.lines[row].cells[target].is_continuation() && target > 0 {
                target -= 1;
            }
            self.lines[row].cells[target].grapheme.push(ch);
        }
    }

    fn clear_wide_remnants(&mut self, row: usize, col: usize) {
        let attrs = self.attrs;
        let cells = &mut self.lines[row].cells;
        if col > 0 && cells[col].is_continuation() {
            cells[col - 1].clear(attrs);
        }
        if cells[col].width == 2 && col + 1 < cells.len() {
            cells[col + 1].clear(attrs);
        }
    }

    /// Carriage return - move cursor to column 0
    pub fn carriage_return(&mut self) {
        self.cursor.col = 0;
    }

    /// Line feed - move cursor down, scrolling at the bottom
    pub fn linefeed(&mut self) {
        if self.cursor.row + 1 >= self.rows {
            self.scroll_up(1);
        } else {
            self.cursor.row += 1;
        }
    }

    /// Backspace - move cursor left, stepping back over a soft wrap
    pub fn backspace(&mut self) {
        if self.cursor.col > 0 {
            self.cursor.col = self.cursor.col.min(self.cols) - 1;
            return;
        }
        if self.cursor.row > 0 && self.lines[self.cursor.row as usize - 1].wrapped {
            self.cursor.row -= 1;
            self.lines[self.cursor.row as usize].wrapped = false;
            self.cursor.col = self.cols - 1;
        }
    }

    /// Horizontal tab (stops every 8 columns)
    pub fn horizontal_tab(&mut self) {
        let next = ((self.cursor.col / 8) + 1) * 8;
        self.cursor.col = next.min(self.cols - 1);
    }

    /// Scroll the whole grid up by n lines, feeding scrollback
    pub fn scroll_up(&mut self, n: u16) {
        for _ in 0..n {
            let removed = self.lines.remove(0);
            self.scrollback.push_back(removed);
            if self.scrollback.len() > self.scrollback_limit {
                self.scrollback.pop_front();
            }
            self.lines.push(Row::new(self.cols));
        }
    }

    pub fn cursor_up(&mut self, n: u16) {
        self.cursor.row = self.cursor.row.saturating_sub(n);
    }

    pub fn cursor_down(&mut self, n: u16) {
        self.cursor.row = (self.cursor.row + n).min(self.rows - 1);
    }

    pub fn cursor_forward(&mut self, n: u16) {
        self.cursor.col = (self.cursor.col + n).min(self.cols - 1);
    }

    pub fn cursor_backward(&mut self, n: u16) {
        self.cursor.col = self.cursor.col.min(self.cols - 1).saturating_sub(n);
    }

    /// Set cursor column (1-indexed)
    pub fn cursor_column(&mut self, col: u16) {
        self.cursor.col = col.saturating_sub(1).min(self.cols - 1);
    }

    /// Set cursor position (1-indexed parameters)
    pub fn cursor_position(&mut self, row: u16, col: u16) {
        self.cursor.row = row.saturating_sub(1).min(self.rows - 1);
        self.cursor.col = col.saturating_sub(1).min(self.cols - 1);
    }

    /// Erase in display (ED)
    pub fn erase_in_display(&mut self, mode: u16) {
        let attrs = self.attrs;
        let cursor_row = self.cursor.row as usize;
        match mode {
            0 => {
                self.erase_in_line(0);
                for row in self.lines.iter_mut().skip(cursor_row + 1) {
                    row.clear(attrs);
                }
            }
            1 => {
                for row in self.lines.iter_mut().take(cursor_row) {
                    row.clear(attrs);
                }
                self.erase_in_line(1);
            }
            2 => {
                for row in &mut self.lines {
                    row.clear(attrs);
                }
            }
            3 => {
                for row in &mut self.lines {
                    row.clear(attrs);
                }
                self.scrollback.clear();
                self.scroll_offset = 0;
            }
            _ => {}
        }
    }

    /// Erase in line (EL)
    pub fn erase_in_line(&mut self, mode: u16) {
        let attrs = self.attrs;
        let col = (self.cursor.col as usize).min(self.cols as usize);
        let row = &mut self.lines[self.cursor.row as usize];
        let range = match mode {
            0 => col..row.cells.len(),
            1 => 0..(col + 1).min(row.cells.len()),
            2 => 0..row.cells.len(),
            _ => return,
        };
        for cell in &mut row.cells[range] {
            cell.clear(attrs);
        }
    }

    /// Number of rows available above the live view
    pub fn scrollback_len(&self) -> usize {
        self.scrollback.len()
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn scroll_view_up(&mut self, n: usize) {
        self.scroll_offset = (self.scroll_offset + n).min(self.scrollback.len());
    }

    pub fn scroll_view_down(&mut self, n: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(n);
    }

    /// Row shown at `visible_row`, accounting for the scroll offset
    pub fn row_at(&self, visible_row: usize) -> Option<&Row> {
        if self.scroll_offset == 0 {
            return self.lines.get(visible_row);
        }
        let start = self.scrollback.len() - self.scroll_offset;
        let absolute = start + visible_row;
        if absolute < self.scrollback.len() {
            self.scrollback.get(absolute)
        } else {
            self.lines.get(absolute - self.scrollback.len())
        }
    }

    /// Plain text of a live row with trailing blanks removed
    pub fn line_text(&self, row: usize) -> String {
        self.lines
            .get(row)
            .map(Row::text)
            .unwrap_or_default()
    }

    /// Plain text of scrollback plus live rows, one line per row
    pub fn contents(&self) -> String {
        let mut lines: Vec<String> = self
            .scrollback
            .iter()
            .chain(self.lines.iter())
            .map(Row::text)
            .collect();
        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }
        lines.join("\n")
    }
}

/// A single row
#[derive(Clone)]
pub struct Row {
    pub cells: Vec<Cell>,
    /// Row ended in a soft wrap
    pub wrapped: bool,
}

impl Row {
    pub fn new(cols: u16) -> Self {
        Self {
            cells: vec![Cell::default(); cols as usize],
            wrapped: false,
        }
    }

    pub fn clear(&mut self, attrs: CellAttrs) {
        for cell in &mut self.cells {
            cell.clear(attrs);
        }
        self.wrapped = false;
    }

    pub fn text(&self) -> String {
        let mut out: String = self
            .cells
            .iter()
            .filter(|c| !c.is_continuation())
            .map(Cell::display_char)
            .collect();
        out.truncate(out.trim_end().len());
        out
    }
}

/// A single cell
#[derive(Clone)]
pub struct Cell {
    pub grapheme: String,
    pub width: u8,
    pub attrs: CellAttrs,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            grapheme: String::new(),
            width: 1,
            attrs: CellAttrs::default(),
        }
    }
}

impl Cell {
    pub fn clear(&mut self, attrs: CellAttrs) {
        self.grapheme.clear();
        self.width = 1;
        self.attrs = attrs;
    }

    pub fn continuation(attrs: CellAttrs) -> Self {
        Self {
            grapheme: String::new(),
            width: 0,
            attrs,
        }
    }

    pub fn is_continuation(&self) -> bool {
        self.width == 0
    }

    /// Display text (space if empty)
    pub fn display_char(&self) -> &str {
        if self.grapheme.is_empty() {
            " "
        } else {
            &self.grapheme
        }
    }
}

/// Cell attributes
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CellAttrs {
    pub fg: Color,
    pub bg: Color,
    pub flags: AttrFlags,
}

impl CellAttrs {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Color as set by SGR
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Color {
    #[default]
    Default,
    Indexed(u8),
    Rgb(u8, u8, u8),
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    pub struct AttrFlags: u8 {
        const BOLD          = 0b0000_0001;
        const DIM           = 0b0000_0010;
        const ITALIC        = 0b0000_0100;
        const UNDERLINE     = 0b0000_1000;
        const INVERSE       = 0b0001_0000;
        const HIDDEN        = 0b0010_0000;
        const STRIKETHROUGH = 0b0100_0000;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(grid: &mut TermGrid, text: &str) {
        for ch in text.chars() {
            grid.put_char(ch);
        }
    }

    #[test]
    fn test_wrap_and_reverse_wrap_backspace() {
        let mut grid = TermGrid::new(4, 3);
        write(&mut grid, "abcde");
        assert_eq!(grid.line_text(0), "abcd");
        assert_eq!(grid.line_text(1), "e");

        // Erase "e", then step back over the soft wrap and erase "d"
        grid.backspace();
        grid.put_char(' ');
        grid.backspace();
        grid.backspace();
        grid.put_char(' ');
        grid.backspace();
        assert_eq!(grid.line_text(0), "abc");
        assert_eq!(grid.cursor(), Cursor { col: 3, row: 0 });
    }

    #[test]
    fn test_backspace_after_last_column() {
        let mut grid = TermGrid::new(3, 2);
        write(&mut grid, "xyz");
        assert_eq!(grid.cursor().col, 3);
        grid.backspace();
        grid.put_char(' ');
        grid.backspace();
        assert_eq!(grid.line_text(0), "xy");
    }

    #[test]
    fn test_scrollback_and_view_offset() {
        let mut grid = TermGrid::new(10, 2);
        for line in ["one", "two", "three"] {
            write(&mut grid, line);
            grid.carriage_return();
            grid.linefeed();
        }
        assert_eq!(grid.scrollback_len(), 2);
        assert_eq!(grid.line_text(0), "three");

        grid.scroll_view_up(5);
        assert_eq!(grid.scroll_offset(), 2);
        assert_eq!(grid.row_at(0).map(Row::text).as_deref(), Some("one"));

        // New output snaps back to the live view
        grid.put_char('!');
        assert_eq!(grid.scroll_offset(), 0);
    }

    #[test]
    fn test_wide_chars_take_two_cells() {
        let mut grid = TermGrid::new(6, 1);
        write(&mut grid, "日本");
        assert_eq!(grid.cursor().col, 4);
        assert_eq!(grid.line_text(0), "日本");
    }
}
