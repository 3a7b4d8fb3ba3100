//! Core terminal state, independent of any rendering or I/O.
//!
//! - **term**: VT parser and cell grid the transcript is projected onto
//! - **transcript**: append-only output log
//! - **editor**: raw-keystroke line editor with credential masking
//! - **decoder**: incremental UTF-8 decoder for streamed responses
//! - **printable**: strips control sequences from streamed reply text
//! - **session**: the per-terminal session state tying these together
//!
//! # Architecture
//!
//! ```text
//! Session
//! ├── credential (local API key)
//! ├── LineEditor (buffer + masking flag)
//! ├── busy flag
//! └── Transcript
//!     ├── chunk log
//!     └── TermGrid (via VtParser)
//! ```

pub mod decoder;
pub mod editor;
pub mod printable;
pub mod session;
pub mod term;
pub mod transcript;
