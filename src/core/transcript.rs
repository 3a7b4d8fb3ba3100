//! Terminal transcript
//!
//! The transcript is the ordered record of everything written to the terminal
//! output region. Text is only ever appended; `clear` drops it all at once.
//! Appends coalesce into the current line's chunk, and the oldest lines are
//! forgotten once the log outgrows what the scrollback could show anyway.
//! Alongside the log a [`TermGrid`] projection is kept up to date so the panel
//! can be drawn without re-parsing, and rebuilt from the log on resize.

use std::collections::VecDeque;

use crate::core::term::{TermGrid, VtParser};

/// Bytes of log kept for replay on resize
pub const MAX_LOG_BYTES: usize = 512 * 1024;

pub struct Transcript {
    /// Line-sized entries; only the last may lack a trailing line feed
    chunks: VecDeque<String>,
    bytes: usize,
    grid: TermGrid,
    parser: VtParser,
}

impl Transcript {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            chunks: VecDeque::new(),
            bytes: 0,
            grid: TermGrid::new(cols, rows),
            parser: VtParser::new(),
        }
    }

    /// Append text and project it onto the grid
    pub fn append(&mut self, chunk: impl Into<String>) {
        let chunk = chunk.into();
        if chunk.is_empty() {
            return;
        }
        self.parser.feed_str(&chunk, &mut self.grid);
        self.bytes += chunk.len();

        match self.chunks.back_mut() {
            Some(last) if !last.ends_with('\n') => last.push_str(&chunk),
            _ => self.chunks.push_back(chunk),
        }

        while self.bytes > MAX_LOG_BYTES && self.chunks.len() > 1 {
            if let Some(dropped) = self.chunks.pop_front() {
                self.bytes -= dropped.len();
            }
        }
    }

    /// Append text followed by a line break
    pub fn append_line(&mut self, line: impl AsRef<str>) {
        self.append(format!("{}\r\n", line.as_ref()));
    }

    /// Discard the whole transcript
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.bytes = 0;
        self.grid = TermGrid::new(self.grid.cols, self.grid.rows);
        self.parser = VtParser::new();
    }

    /// Re-project the log into a grid of a new size
    pub fn resize(&mut self, cols: u16, rows: u16) {
        if (cols, rows) == (self.grid.cols, self.grid.rows) {
            return;
        }
        self.grid = TermGrid::new(cols, rows);
        self.parser = VtParser::new();
        for chunk in &self.chunks {
            self.parser.feed_str(chunk, &mut self.grid);
        }
    }

    /// Number of logged lines
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Bytes currently held in the log
    pub fn log_bytes(&self) -> usize {
        self.bytes
    }

    /// Raw concatenation of the log, escape sequences included
    pub fn raw_text(&self) -> String {
        self.chunks.iter().map(String::as_str).collect()
    }

    /// What the panel shows, as plain text (scrollback included)
    pub fn screen_text(&self) -> String {
        self.grid.contents()
    }

    pub fn grid(&self) -> &TermGrid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut TermGrid {
        &mut self.grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_keeps_order_and_projects() {
        let mut transcript = Transcript::new(30, 4);
        transcript.append("\x1b[32m> \x1b[0m");
        transcript.append("he");
        transcript.append("lp");
        assert_eq!(transcript.raw_text(), "\x1b[32m> \x1b[0mhelp");
        assert_eq!(transcript.screen_text(), "> help");
    }

    #[test]
    fn test_appends_coalesce_per_line() {
        let mut transcript = Transcript::new(30, 4);
        for ch in "> chat hi".chars() {
            transcript.append(ch.to_string());
        }
        transcript.append("\r\n");
        assert_eq!(transcript.len(), 1);

        transcript.append("Sending");
        transcript.append_line("...");
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.raw_text(), "> chat hi\r\nSending...\r\n");
    }

    #[test]
    fn test_log_is_bounded_and_keeps_newest() {
        let mut transcript = Transcript::new(80, 10);
        let line = "x".repeat(99);
        let total = MAX_LOG_BYTES / 100 + 500;
        for i in 0..total {
            transcript.append_line(format!("{:<5}{}", i, &line[5..]));
        }
        assert!(transcript.log_bytes() <= MAX_LOG_BYTES);
        assert_eq!(transcript.log_bytes(), transcript.raw_text().len());
        assert!(transcript.len() < total);

        transcript.resize(100, 10);
        let screen = transcript.screen_text();
        assert!(screen.ends_with(&format!("{:<5}{}", total - 1, &line[5..])));
    }

    #[test]
    fn test_empty_chunks_are_not_recorded() {
        let mut transcript = Transcript::new(10, 2);
        transcript.append("");
        assert!(transcript.is_empty());
    }

    #[test]
    fn test_clear_resets_log_and_projection() {
        let mut transcript = Transcript::new(10, 2);
        transcript.append_line("one");
        transcript.append_line("two");
        transcript.append_line("three");
        transcript.clear();
        assert!(transcript.is_empty());
        assert_eq!(transcript.screen_text(), "");
        assert_eq!(transcript.grid().scrollback_len(), 0);
    }

    #[test]
    fn test_resize_reflows_from_log() {
        let mut transcript = Transcript::new(4, 4);
        transcript.append("abcdefgh");
        assert_eq!(transcript.screen_text(), "abcd\nefgh");

        transcript.resize(8, 4);
        assert_eq!(transcript.screen_text(), "abcdefgh");
        assert_eq!(transcript.len(), 1);
    }
}
