//! Key mapping for terminal input
//!
//! Converts crossterm key events into the editor's input events, plus the few
//! keys the terminal handles itself (quit, paste, scrollback).

use bitflags::bitflags;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::core::editor::InputEvent;

bitflags! {
    /// Modifier keys
    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CTRL  = 0b0010;
        const ALT   = 0b0100;
        const META  = 0b1000;
    }
}

impl From<KeyModifiers> for Modifiers {
    fn from(mods: KeyModifiers) -> Self {
        let mut result = Modifiers::empty();
        if mods.contains(KeyModifiers::SHIFT) {
            result |= Modifiers::SHIFT;
        }
        if mods.contains(KeyModifiers::CONTROL) {
            result |= Modifiers::CTRL;
        }
        if mods.contains(KeyModifiers::ALT) {
            result |= Modifiers::ALT;
        }
        if mods.intersects(KeyModifiers::SUPER | KeyModifiers::META) {
            result |= Modifiers::META;
        }
        result
    }
}

impl Modifiers {
    /// Modifiers that stop a key from being typed
    pub fn blocks_typing(self) -> bool {
        self.intersects(Modifiers::CTRL | Modifiers::ALT | Modifiers::META)
    }
}

/// What a key means to the terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Forward to the line editor
    Input(InputEvent),
    /// Unmount and exit
    Quit,
    /// Read the clipboard and type its contents
    Paste,
    ScrollUp,
    ScrollDown,
    /// Key release and similar noise
    Ignore,
}

/// Key mapper for converting key events to terminal actions
pub struct KeyMapper;

impl KeyMapper {
    pub fn map(event: &KeyEvent) -> KeyAction {
        if event.kind == KeyEventKind::Release {
            return KeyAction::Ignore;
        }
        let mods = Modifiers::from(event.modifiers);

        if mods.contains(Modifiers::CTRL) && !mods.contains(Modifiers::ALT) {
            match event.code {
                KeyCode::Char('c') | KeyCode::Char('C') | KeyCode::Char('d') | KeyCode::Char('D') => {
                    return KeyAction::Quit
                }
                KeyCode::Char('v') | KeyCode::Char('V') => return KeyAction::Paste,
                _ => {}
            }
        }

        match event.code {
            KeyCode::PageUp if mods.contains(Modifiers::SHIFT) => KeyAction::ScrollUp,
            KeyCode::PageDown if mods.contains(Modifiers::SHIFT) => KeyAction::ScrollDown,
            KeyCode::Enter => KeyAction::Input(InputEvent::Commit),
            KeyCode::Backspace if !mods.blocks_typing() => KeyAction::Input(InputEvent::Backspace),
            KeyCode::Char(ch) => {
                if mods.blocks_typing() {
                    KeyAction::Input(InputEvent::Modified)
                } else {
                    KeyAction::Input(InputEvent::Char(ch))
                }
            }
            _ => KeyAction::Input(InputEvent::Other),
        }
    }

    /// Pasted text as a series of typed keys. Control characters are dropped.
    pub fn paste_events(text: &str) -> impl Iterator<Item = InputEvent> + '_ {
        text.chars()
            .filter(|ch| !ch.is_control())
            .map(InputEvent::Char)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_event(code: KeyCode, mods: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, mods)
    }

    #[test]
    fn test_char_keys() {
        let event = key_event(KeyCode::Char('a'), KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), KeyAction::Input(InputEvent::Char('a')));

        // Shift does not block typing
        let event = key_event(KeyCode::Char('A'), KeyModifiers::SHIFT);
        assert_eq!(KeyMapper::map(&event), KeyAction::Input(InputEvent::Char('A')));

        // Alt+x
        let event = key_event(KeyCode::Char('x'), KeyModifiers::ALT);
        assert_eq!(KeyMapper::map(&event), KeyAction::Input(InputEvent::Modified));

        // Ctrl+L
        let event = key_event(KeyCode::Char('l'), KeyModifiers::CONTROL);
        assert_eq!(KeyMapper::map(&event), KeyAction::Input(InputEvent::Modified));
    }

    #[test]
    fn test_terminal_keys() {
        let event = key_event(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(KeyMapper::map(&event), KeyAction::Quit);

        let event = key_event(KeyCode::Char('d'), KeyModifiers::CONTROL);
        assert_eq!(KeyMapper::map(&event), KeyAction::Quit);

        let event = key_event(KeyCode::Char('v'), KeyModifiers::CONTROL);
        assert_eq!(KeyMapper::map(&event), KeyAction::Paste);

        let event = key_event(KeyCode::PageUp, KeyModifiers::SHIFT);
        assert_eq!(KeyMapper::map(&event), KeyAction::ScrollUp);

        let event = key_event(KeyCode::PageUp, KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), KeyAction::Input(InputEvent::Other));
    }

    #[test]
    fn test_editing_keys() {
        let event = key_event(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), KeyAction::Input(InputEvent::Commit));

        let event = key_event(KeyCode::Backspace, KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), KeyAction::Input(InputEvent::Backspace));

        let event = key_event(KeyCode::Left, KeyModifiers::NONE);
        assert_eq!(KeyMapper::map(&event), KeyAction::Input(InputEvent::Other));
    }

    #[test]
    fn test_release_is_ignored() {
        let mut event = key_event(KeyCode::Char('a'), KeyModifiers::NONE);
        event.kind = KeyEventKind::Release;
        assert_eq!(KeyMapper::map(&event), KeyAction::Ignore);
    }

    #[test]
    fn test_paste_drops_control_chars() {
        let events: Vec<_> = KeyMapper::paste_events("sk-1\r\n\t2").collect();
        assert_eq!(
            events,
            vec![
                InputEvent::Char('s'),
                InputEvent::Char('k'),
                InputEvent::Char('-'),
                InputEvent::Char('1'),
                InputEvent::Char('2'),
            ]
        );
    }
}
