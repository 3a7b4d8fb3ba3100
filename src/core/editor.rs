//! Line input editor
//!
//! Raw keystrokes arrive one at a time; the editor owns the line being typed
//! and decides what each key echoes into the transcript. Credential entry
//! (`setkey <value>`) is masked from the moment the value starts.

use unicode_width::UnicodeWidthChar;

/// Glyph echoed in place of a masked character
pub const MASK_GLYPH: char = '*';

/// Commands whose argument is a secret
const MASKED_COMMANDS: &[&str] = &["setkey"];

/// One discrete key as seen by the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    /// Printable character, no blocking modifier held
    Char(char),
    Backspace,
    /// Enter
    Commit,
    /// Key pressed while alt/ctrl/meta was held
    Modified,
    /// Anything else (arrows, function keys, ...)
    Other,
}

/// What the editor wants written to the transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorAction {
    /// Echo text at the cursor
    Echo(String),
    /// Erase the last visible glyph; the sequence is ready to write
    Erase(String),
    /// Line finished: write the line break, then dispatch
    Commit(String),
    None,
}

/// Editable input line with masking state
#[derive(Debug, Default)]
pub struct LineEditor {
    buffer: String,
    /// Display width of what was echoed for each buffered char
    echoed: Vec<u8>,
    masking: bool,
}

impl LineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Whether the next printable key will be masked
    pub fn is_masking(&self) -> bool {
        self.masking
    }

    /// Cells taken up by the echoed line
    pub fn echo_width(&self) -> usize {
        self.echoed.iter().map(|&w| w as usize).sum()
    }

    /// The line as it was echoed, masking included
    pub fn echo_text(&self) -> String {
        self.buffer
            .char_indices()
            .map(|(idx, ch)| {
                if starts_masked_argument(&self.buffer[..idx]) {
                    MASK_GLYPH
                } else {
                    ch
                }
            })
            .collect()
    }

    /// Blank the echoed line and leave the cursor where it started.
    /// `None` when nothing has been echoed.
    pub fn erase_echo(&self) -> Option<String> {
        match self.echo_width() {
            0 => None,
            width => Some(erase_sequence(width)),
        }
    }

    pub fn on_key(&mut self, event: InputEvent) -> EditorAction {
        match event {
            InputEvent::Commit => {
                let line = std::mem::take(&mut self.buffer);
                self.echoed.clear();
                self.masking = false;
                EditorAction::Commit(line)
            }
            InputEvent::Backspace => {
                if self.buffer.pop().is_none() {
                    return EditorAction::None;
                }
                let width = self.echoed.pop().unwrap_or(1) as usize;
                self.masking = starts_masked_argument(&self.buffer);
                EditorAction::Erase(erase_sequence(width))
            }
            InputEvent::Char(ch) if !ch.is_control() => {
                let shown = if self.masking { MASK_GLYPH } else { ch };
                self.buffer.push(ch);
                self.echoed.push(shown.width().unwrap_or(0).max(1) as u8);
                self.masking = starts_masked_argument(&self.buffer);
                EditorAction::Echo(shown.to_string())
            }
            InputEvent::Char(_) | InputEvent::Modified | InputEvent::Other => EditorAction::None,
        }
    }
}

/// True once the line reads `<masked command><whitespace>`
fn starts_masked_argument(buffer: &str) -> bool {
    let line = buffer.trim_start();
    let Some(split) = line.find(char::is_whitespace) else {
        return false;
    };
    let name = &line[..split];
    MASKED_COMMANDS
        .iter()
        .any(|masked| name.eq_ignore_ascii_case(masked))
}

/// Cursor back, blank, cursor back again, once per cell
fn erase_sequence(width: usize) -> String {
    let mut seq = String::with_capacity(width * 3);
    seq.push_str(&"\x08".repeat(width));
    seq.push_str(&" ".repeat(width));
    seq.push_str(&"\x08".repeat(width));
    seq
}
