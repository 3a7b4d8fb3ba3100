//! Session state
//!
//! Everything the terminal knows about the current user session: the local
//! credential, the line being typed, the busy flag and the transcript. Owned by
//! the terminal and only mutated through the methods below.

use tracing::debug;

use super::editor::{EditorAction, InputEvent, LineEditor};
use super::transcript::Transcript;

/// Prompt written before every input line
pub const PROMPT: &str = "\x1b[32m> \x1b[0m";

pub struct Session {
    credential: Option<String>,
    editor: LineEditor,
    busy: bool,
    pub transcript: Transcript,
}

impl Session {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self {
            credential: None,
            editor: LineEditor::new(),
            busy: false,
            transcript: Transcript::new(cols, rows),
        }
    }

    /// Feed one key. Returns the finished line when the key was a commit.
    pub fn on_key(&mut self, event: InputEvent) -> Option<String> {
        match self.editor.on_key(event) {
            EditorAction::Echo(text) | EditorAction::Erase(text) => {
                self.transcript.append(text);
                None
            }
            EditorAction::Commit(line) => {
                self.transcript.append("\r\n");
                Some(line)
            }
            EditorAction::None => None,
        }
    }

    pub fn input(&self) -> &str {
        self.editor.buffer()
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    /// Replace the local credential; an empty value clears it
    pub fn set_credential(&mut self, credential: Option<String>) {
        self.credential = credential.filter(|c| !c.is_empty());
        debug!("Local credential present: {}", self.credential.is_some());
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Enter the busy state. False if already busy.
    pub fn begin_busy(&mut self) -> bool {
        if self.busy {
            return false;
        }
        self.busy = true;
        true
    }

    /// Leave the busy state. False if it was not set, so callers can tell a
    /// duplicate release apart.
    pub fn end_busy(&mut self) -> bool {
        std::mem::replace(&mut self.busy, false)
    }

    /// Write output ahead of the line being typed. The echoed line is
    /// blanked, the output appended where it started, then the line is echoed
    /// again so the editor's cursor stays at the end of what it owns.
    pub fn append_output(&mut self, text: impl Into<String>) {
        let Some(erase) = self.editor.erase_echo() else {
            self.transcript.append(text);
            return;
        };
        self.transcript.append(erase);
        self.transcript.append(text);
        self.transcript.append(self.editor.echo_text());
    }

    /// Arm the prompt for the next line
    pub fn show_prompt(&mut self) {
        self.append_output(PROMPT);
    }
}
