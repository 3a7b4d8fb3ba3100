//! User interface rendering and input handling.
//!
//! - **keymapper**: crossterm key events to editor input and terminal actions
//! - **rain**: the falling-character background
//! - **frame**: off-screen composition of rain and terminal panel
//! - **renderer**: diff flushes of composed frames to the host terminal

pub mod frame;
pub mod keymapper;
pub mod rain;
pub mod renderer;

pub use frame::{Frame, PanelLayout, PanelStatus};
pub use keymapper::{KeyAction, KeyMapper};
pub use rain::RainField;
pub use renderer::Renderer;
