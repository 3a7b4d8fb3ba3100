//! Terminal renderer using crossterm
//!
//! Owns the host terminal while mounted (raw mode, alternate screen, bracketed
//! paste) and flushes composed frames to it, writing only the cells that
//! changed since the previous flush.

use std::io::{self, Write};

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{DisableBracketedPaste, EnableBracketedPaste},
    execute, queue,
    style::{Attribute, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, Clear, ClearType, DisableLineWrap, EnableLineWrap, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use tracing::{debug, info};

use crate::core::term::{AttrFlags, Color};
use crate::ui::frame::{Frame, FrameCell};

/// Begin/end synchronized update (reduces flicker)
const SYNC_BEGIN: &str = "\x1b[?2026h";
const SYNC_END: &str = "\x1b[?2026l";

/// Terminal renderer
pub struct Renderer {
    /// Whether the terminal has been initialized
    initialized: bool,
    /// Previous frame, row-major; empty forces a full redraw
    prev_buffer: Vec<FrameCell>,
    size: (u16, u16),
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            initialized: false,
            prev_buffer: Vec::new(),
            size: (0, 0),
        }
    }

    /// Initialize the terminal for rendering
    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        // Raw mode is on: cleanup must run from here whatever fails next
        self.initialized = true;

        if let Err(e) = Self::enter_screen(&mut io::stdout()) {
            let _ = self.cleanup();
            return Err(e);
        }
        info!("Terminal initialized");
        Ok(())
    }

    fn enter_screen<W: Write>(out: &mut W) -> io::Result<()> {
        execute!(
            out,
            EnterAlternateScreen,
            EnableBracketedPaste,
            DisableLineWrap,
            Hide,
            Clear(ClearType::All),
            MoveTo(0, 0)
        )?;
        out.flush()
    }

    /// Restore the host terminal
    pub fn cleanup(&mut self) -> io::Result<()> {
        if !self.initialized {
            return Ok(());
        }
        self.initialized = false;

        let mut stdout = io::stdout();

        // Best effort: raw mode must still be disabled if any of these fail
        let _ = execute!(stdout, ResetColor, SetAttribute(Attribute::Reset));
        let _ = execute!(stdout, Show, EnableLineWrap);
        let _ = execute!(stdout, DisableBracketedPaste);
        let _ = execute!(stdout, LeaveAlternateScreen);
        let _ = stdout.flush();

        terminal::disable_raw_mode()?;
        info!("Terminal restored");
        Ok(())
    }

    /// Forget the previous frame so the next render redraws everything
    pub fn invalidate(&mut self) {
        self.prev_buffer.clear();
    }

    /// Flush a frame to stdout; `cursor` is where the caret should blink
    pub fn render(&mut self, frame: &Frame, cursor: Option<(u16, u16)>) -> io::Result<()> {
        let stdout = io::stdout();
        let mut stdout = io::BufWriter::with_capacity(65536, stdout.lock());
        self.render_to(&mut stdout, frame, cursor)?;
        stdout.flush()
    }

    /// Diff-based rendering - only update changed cells
    pub fn render_to<W: Write>(
        &mut self,
        out: &mut W,
        frame: &Frame,
        cursor: Option<(u16, u16)>,
    ) -> io::Result<()> {
        let (cols, rows) = frame.size();
        let full_redraw = self.size != (cols, rows) || self.prev_buffer.is_empty();
        if full_redraw {
            debug!("Full redraw at {}x{}", cols, rows);
            self.prev_buffer = vec![
                FrameCell {
                    text: "\x00".to_string(),
                    ..FrameCell::default()
                };
                cols as usize * rows as usize
            ];
            self.size = (cols, rows);
        }

        write!(out, "{}", SYNC_BEGIN)?;
        queue!(out, Hide)?;

        let mut last_style: Option<(Color, Color, AttrFlags)> = None;
        let mut last_pos: Option<(u16, u16)> = None;

        for y in 0..rows {
            for x in 0..cols {
                let Some(cell) = frame.cell(x, y) else {
                    continue;
                };
                let idx = y as usize * cols as usize + x as usize;
                if cell.is_continuation() {
                    self.prev_buffer[idx] = cell.clone();
                    continue;
                }
                if self.prev_buffer[idx] == *cell {
                    continue;
                }

                // Move cursor if not consecutive
                if last_pos != Some((x, y)) {
                    queue!(out, MoveTo(x, y))?;
                }

                let style = (cell.fg, cell.bg, cell.flags);
                if last_style != Some(style) {
                    apply_style(out, cell)?;
                    last_style = Some(style);
                }

                write!(out, "{}", cell.text)?;
                self.prev_buffer[idx] = cell.clone();

                // Wide glyphs advance past their continuation cell
                let advance = if frame.cell(x + 1, y).is_some_and(FrameCell::is_continuation) {
                    2
                } else {
                    1
                };
                last_pos = Some((x + advance, y));
            }
        }

        queue!(out, ResetColor, SetAttribute(Attribute::Reset))?;
        if let Some((x, y)) = cursor {
            queue!(out, MoveTo(x, y), Show)?;
        }
        write!(out, "{}", SYNC_END)?;
        Ok(())
    }

    /// Get terminal size
    pub fn size() -> io::Result<(u16, u16)> {
        terminal::size()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

/// Apply cell style
fn apply_style<W: Write>(out: &mut W, cell: &FrameCell) -> io::Result<()> {
    // Reset first
    queue!(out, SetAttribute(Attribute::Reset))?;

    if cell.flags.contains(AttrFlags::BOLD) {
        queue!(out, SetAttribute(Attribute::Bold))?;
    }
    if cell.flags.contains(AttrFlags::DIM) {
        queue!(out, SetAttribute(Attribute::Dim))?;
    }
    if cell.flags.contains(AttrFlags::ITALIC) {
        queue!(out, SetAttribute(Attribute::Italic))?;
    }
    if cell.flags.contains(AttrFlags::UNDERLINE) {
        queue!(out, SetAttribute(Attribute::Underlined))?;
    }
    if cell.flags.contains(AttrFlags::INVERSE) {
        queue!(out, SetAttribute(Attribute::Reverse))?;
    }
    if cell.flags.contains(AttrFlags::HIDDEN) {
        queue!(out, SetAttribute(Attribute::Hidden))?;
    }
    if cell.flags.contains(AttrFlags::STRIKETHROUGH) {
        queue!(out, SetAttribute(Attribute::CrossedOut))?;
    }

    queue!(
        out,
        SetForegroundColor(to_crossterm(cell.fg)),
        SetBackgroundColor(to_crossterm(cell.bg))
    )?;
    Ok(())
}

fn to_crossterm(color: Color) -> crossterm::style::Color {
    match color {
        Color::Default => crossterm::style::Color::Reset,
        Color::Indexed(n) => crossterm::style::Color::AnsiValue(n),
        Color::Rgb(r, g, b) => crossterm::style::Color::Rgb { r, g, b },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PanelConfig;
    use crate::core::term::{TermGrid, VtParser};
    use crate::ui::frame::{PanelLayout, PanelStatus};

    fn frame_with(text: &str) -> Frame {
        let layout = PanelLayout::compute(30, 8, &PanelConfig::default());
        let (cols, rows) = layout.inner_size();
        let mut grid = TermGrid::new(cols, rows);
        VtParser::new().feed_str(text, &mut grid);
        let mut frame = Frame::new(30, 8);
        frame.draw_panel(&layout, &grid, PanelStatus::default());
        frame
    }

    fn render(renderer: &mut Renderer, frame: &Frame) -> String {
        let mut out = Vec::new();
        renderer.render_to(&mut out, frame, Some((0, 0))).unwrap();
        String::from_utf8(out).unwrap()
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_enter_screen_sequences() {
        let mut out = Vec::new();
        Renderer::enter_screen(&mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("\x1b[?1049h"));
        assert!(out.contains("\x1b[?2004h"));
    }

    #[test]
    fn test_enter_screen_failure_is_reported() {
        let err = Renderer::enter_screen(&mut BrokenPipe).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_cleanup_without_init_is_noop() {
        let mut renderer = Renderer::new();
        assert!(renderer.cleanup().is_ok());
        assert!(!renderer.initialized);
    }

    #[test]
    fn test_first_render_draws_everything() {
        let mut renderer = Renderer::new();
        let out = render(&mut renderer, &frame_with("> help"));
        assert!(out.starts_with(SYNC_BEGIN));
        assert!(out.ends_with(SYNC_END));
        assert!(out.contains("MATRIX"));
        assert!(out.contains('h') && out.contains('p'));
    }

    #[test]
    fn test_unchanged_frame_writes_no_cells() {
        let mut renderer = Renderer::new();
        let frame = frame_with("> help");
        render(&mut renderer, &frame);
        let out = render(&mut renderer, &frame);
        assert!(!out.contains("help"));
        assert!(!out.contains("MATRIX"));
    }

    #[test]
    fn test_only_changed_cells_are_written() {
        let mut renderer = Renderer::new();
        render(&mut renderer, &frame_with("> hel"));
        let out = render(&mut renderer, &frame_with("> help"));
        assert!(out.contains('p'));
        assert!(!out.contains("hel"));
    }

    #[test]
    fn test_invalidate_forces_full_redraw() {
        let mut renderer = Renderer::new();
        let frame = frame_with("> help");
        render(&mut renderer, &frame);
        renderer.invalidate();
        let out = render(&mut renderer, &frame);
        assert!(out.contains("MATRIX"));
    }
}
