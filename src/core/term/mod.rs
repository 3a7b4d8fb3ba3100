//! Terminal projection of the transcript: a VT parser feeding a cell grid.

mod parser;
mod state;

pub use parser::VtParser;
pub use state::{AttrFlags, CellAttrs, Color, TermGrid};
