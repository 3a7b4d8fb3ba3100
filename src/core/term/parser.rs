//! VT sequence parser
//!
//! Interprets the control and escape sequences that transcript text carries
//! (SGR colours, erase, cursor movement) and applies them to a [`TermGrid`].
//! Input is already-decoded text, so the parser works on `char`s.

use super::state::{AttrFlags, Color, TermGrid};

/// Longest parameter list kept for a single CSI sequence
const MAX_PARAMS: usize = 16;

/// Parser state machine
#[derive(Default)]
pub struct VtParser {
    state: ParserState,
    params: Vec<u16>,
    current_param: Option<u16>,
    private: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Debug)]
enum ParserState {
    #[default]
    Ground,
    Escape,
    Csi,
    /// OSC and other string sequences are swallowed until BEL or ST
    OscString,
    EscapeInOsc,
}

impl VtParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a whole string
    pub fn feed_str(&mut self, text: &str, grid: &mut TermGrid) {
        for ch in text.chars() {
            self.feed(ch, grid);
        }
    }

    /// Feed a single character
    pub fn feed(&mut self, ch: char, grid: &mut TermGrid) {
        let in_string = matches!(self.state, ParserState::OscString | ParserState::EscapeInOsc);
        if (ch as u32) < 0x20 && !in_string {
            self.control(ch, grid);
            return;
        }

        match self.state {
            ParserState::Ground => {
                if ch != '\u{7f}' {
                    grid.put_char(ch);
                }
            }
            ParserState::Escape => self.escape(ch, grid),
            ParserState::Csi => self.csi(ch, grid),
            ParserState::OscString => match ch {
                '\u{07}' | '\u{9c}' => self.state = ParserState::Ground,
                '\u{1b}' => self.state = ParserState::EscapeInOsc,
                _ => {}
            },
            ParserState::EscapeInOsc => {
                // ST is ESC \; anything else starts a new escape
                if ch == '\\' {
                    self.state = ParserState::Ground;
                } else {
                    self.enter_escape();
                    self.escape(ch, grid);
                }
            }
        }
    }

    fn control(&mut self, ch: char, grid: &mut TermGrid) {
        match ch {
            '\u{1b}' => self.enter_escape(),
            '\u{08}' => grid.backspace(),
            '\t' => grid.horizontal_tab(),
            '\n' | '\u{0b}' | '\u{0c}' => grid.linefeed(),
            '\r' => grid.carriage_return(),
            _ => {}
        }
    }

    fn enter_escape(&mut self) {
        self.state = ParserState::Escape;
        self.params.clear();
        self.current_param = None;
        self.private = false;
    }

    fn escape(&mut self, ch: char, grid: &mut TermGrid) {
        self.state = ParserState::Ground;
        match ch {
            '[' => self.state = ParserState::Csi,
            ']' | 'P' | '_' | '^' => self.state = ParserState::OscString,
            'D' => grid.linefeed(),
            'E' => {
                grid.carriage_return();
                grid.linefeed();
            }
            'c' => {
                grid.erase_in_display(3);
                grid.cursor_position(1, 1);
                grid.attrs.reset();
            }
            _ => {}
        }
    }

    fn csi(&mut self, ch: char, grid: &mut TermGrid) {
        match ch {
            '0'..='9' => {
                let digit = ch as u16 - '0' as u16;
                self.current_param = Some(
                    self.current_param
                        .unwrap_or(0)
                        .saturating_mul(10)
                        .saturating_add(digit),
                );
            }
            ';' | ':' => {
                self.push_param();
            }
            '?' | '>' | '=' | '!' => self.private = true,
            ' '..='/' => {}
            '@'..='~' => {
                self.push_param();
                self.execute_csi(ch, grid);
                self.state = ParserState::Ground;
            }
            _ => self.state = ParserState::Ground,
        }
    }

    fn push_param(&mut self) {
        let value = self.current_param.take().unwrap_or(0);
        if self.params.len() < MAX_PARAMS {
            self.params.push(value);
        }
    }

    fn param(&self, index: usize, default: u16) -> u16 {
        match self.params.get(index) {
            Some(0) | None => default,
            Some(&n) => n,
        }
    }

    fn execute_csi(&mut self, final_char: char, grid: &mut TermGrid) {
        if self.private {
            // Mode switches are meaningless for a transcript projection
            return;
        }

        match final_char {
            'A' => grid.cursor_up(self.param(0, 1)),
            'B' => grid.cursor_down(self.param(0, 1)),
            'C' => grid.cursor_forward(self.param(0, 1)),
            'D' => grid.cursor_backward(self.param(0, 1)),
            'G' => grid.cursor_column(self.param(0, 1)),
            'H' | 'f' => grid.cursor_position(self.param(0, 1), self.param(1, 1)),
            'J' => grid.erase_in_display(self.params.first().copied().unwrap_or(0)),
            'K' => grid.erase_in_line(self.params.first().copied().unwrap_or(0)),
            'S' => grid.scroll_up(self.param(0, 1)),
            'm' => self.execute_sgr(grid),
            _ => {
                tracing::debug!(
                    "Unhandled CSI in transcript: params={:?}, final={:?}",
                    self.params,
                    final_char
                );
            }
        }
    }

    fn execute_sgr(&self, grid: &mut TermGrid) {
        let attrs = &mut grid.attrs;
        let mut iter = self.params.iter().copied();

        while let Some(param) = iter.next() {
            match param {
                0 => attrs.reset(),
                1 => attrs.flags |= AttrFlags::BOLD,
                2 => attrs.flags |= AttrFlags::DIM,
                3 => attrs.flags |= AttrFlags::ITALIC,
                4 => attrs.flags |= AttrFlags::UNDERLINE,
                7 => attrs.flags |= AttrFlags::INVERSE,
                8 => attrs.flags |= AttrFlags::HIDDEN,
                9 => attrs.flags |= AttrFlags::STRIKETHROUGH,
                22 => attrs.flags &= !(AttrFlags::BOLD | AttrFlags::DIM),
                23 => attrs.flags &= !AttrFlags::ITALIC,
                24 => attrs.flags &= !AttrFlags::UNDERLINE,
                27 => attrs.flags &= !AttrFlags::INVERSE,
                28 => attrs.flags &= !AttrFlags::HIDDEN,
                29 => attrs.flags &= !AttrFlags::STRIKETHROUGH,
                30..=37 => attrs.fg = Color::Indexed((param - 30) as u8),
                38 => {
                    if let Some(color) = extended_color(&mut iter) {
                        attrs.fg = color;
                    }
                }
                39 => attrs.fg = Color::Default,
                40..=47 => attrs.bg = Color::Indexed((param - 40) as u8),
                48 => {
                    if let Some(color) = extended_color(&mut iter) {
                        attrs.bg = color;
                    }
                }
                49 => attrs.bg = Color::Default,
                90..=97 => attrs.fg = Color::Indexed((param - 90 + 8) as u8),
                100..=107 => attrs.bg = Color::Indexed((param - 100 + 8) as u8),
                _ => {}
            }
        }
    }
}

/// `5;n` (256 colours) or `2;r;g;b` after a 38/48 selector
fn extended_color(iter: &mut impl Iterator<Item = u16>) -> Option<Color> {
    match iter.next()? {
        5 => iter.next().map(|n| Color::Indexed(n as u8)),
        2 => {
            let r = iter.next().unwrap_or(0) as u8;
            let g = iter.next().unwrap_or(0) as u8;
            let b = iter.next().unwrap_or(0) as u8;
            Some(Color::Rgb(r, g, b))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(text: &str) -> TermGrid {
        let mut grid = TermGrid::new(40, 5);
        let mut parser = VtParser::new();
        parser.feed_str(text, &mut grid);
        grid
    }

    #[test]
    fn test_sgr_colors_apply_and_reset() {
        let mut grid = TermGrid::new(20, 2);
        let mut parser = VtParser::new();

        parser.feed_str("\x1b[31m", &mut grid);
        assert_eq!(grid.attrs.fg, Color::Indexed(1));

        parser.feed_str("\x1b[38;2;0;255;65m", &mut grid);
        assert_eq!(grid.attrs.fg, Color::Rgb(0, 255, 65));

        parser.feed_str("\x1b[0m", &mut grid);
        assert_eq!(grid.attrs.fg, Color::Default);
    }

    #[test]
    fn test_escapes_are_not_printed() {
        let grid = project("\x1b[32m> \x1b[0mhelp\r\n\x1b[33mChecking\x1b[0m");
        assert_eq!(grid.line_text(0), "> help");
        assert_eq!(grid.line_text(1), "Checking");
    }

    #[test]
    fn test_backspace_space_backspace_erases() {
        let grid = project("abc\x08 \x08\x08 \x08");
        assert_eq!(grid.line_text(0), "a");
        assert_eq!(grid.cursor().col, 1);
    }

    #[test]
    fn test_osc_title_is_swallowed() {
        let grid = project("\x1b]0;title\x07ok");
        assert_eq!(grid.line_text(0), "ok");
    }

    #[test]
    fn test_split_escape_sequence_across_feeds() {
        let mut grid = TermGrid::new(20, 2);
        let mut parser = VtParser::new();
        parser.feed_str("\x1b[3", &mut grid);
        parser.feed_str("2mgo", &mut grid);
        assert_eq!(grid.line_text(0), "go");
        assert_eq!(grid.attrs.fg, Color::Indexed(2));
    }
}
