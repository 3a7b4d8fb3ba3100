//! Control sequence filtering for streamed replies
//!
//! Reply text is written into the transcript through the same VT parser as
//! everything else, so a reply carrying `ESC[2J` or a bare `\r` could rewrite
//! earlier output. The filter keeps printable text plus `\n` and `\t` and
//! swallows everything else, including sequences split across fragments.

#[derive(Clone, Copy, Default, PartialEq, Debug)]
enum FilterState {
    #[default]
    Ground,
    Escape,
    Csi,
    /// OSC, DCS, APC, PM and SOS bodies run until BEL or ST
    StringBody,
    EscapeInString,
}

/// Stateful filter reused across one whole stream
#[derive(Debug, Default)]
pub struct PrintableFilter {
    state: FilterState,
}

impl PrintableFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter one piece of decoded text
    pub fn filter(&mut self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for ch in text.chars() {
            if self.accept(ch) {
                out.push(ch);
            }
        }
        out
    }

    /// True while a sequence is still open
    pub fn in_sequence(&self) -> bool {
        self.state != FilterState::Ground
    }

    fn accept(&mut self, ch: char) -> bool {
        match self.state {
            FilterState::Ground => match ch {
                '\u{1b}' => {
                    self.state = FilterState::Escape;
                    false
                }
                '\u{9b}' => {
                    self.state = FilterState::Csi;
                    false
                }
                '\u{90}' | '\u{98}' | '\u{9d}' | '\u{9e}' | '\u{9f}' => {
                    self.state = FilterState::StringBody;
                    false
                }
                '\n' | '\t' => true,
                c => !c.is_control(),
            },
            FilterState::Escape => {
                self.state = match ch {
                    '[' => FilterState::Csi,
                    ']' | 'P' | 'X' | '^' | '_' => FilterState::StringBody,
                    '\u{1b}' => FilterState::Escape,
                    // intermediates keep the sequence open
                    '\u{20}'..='\u{2f}' => FilterState::Escape,
                    _ => FilterState::Ground,
                };
                false
            }
            FilterState::Csi => {
                self.state = match ch {
                    '\u{1b}' => FilterState::Escape,
                    '\u{40}'..='\u{7e}' => FilterState::Ground,
                    _ => FilterState::Csi,
                };
                false
            }
            FilterState::StringBody => {
                self.state = match ch {
                    '\u{07}' | '\u{9c}' => FilterState::Ground,
                    '\u{1b}' => FilterState::EscapeInString,
                    _ => FilterState::StringBody,
                };
                false
            }
            FilterState::EscapeInString => {
                if ch == '\\' {
                    self.state = FilterState::Ground;
                } else {
                    self.state = FilterState::Escape;
                    return self.accept(ch);
                }
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_passes() {
        let mut filter = PrintableFilter::new();
        assert_eq!(filter.filter("Wake up, Neo…\n\tfollow 🐇"), "Wake up, Neo…\n\tfollow 🐇");
    }

    #[test]
    fn test_screen_control_is_dropped() {
        let mut filter = PrintableFilter::new();
        assert_eq!(filter.filter("\x1b[2J\x1b[Hpwned\x1bc!"), "pwned!");
        assert_eq!(filter.filter("ab\x08\x08\rXY\x07"), "abXY");
        assert_eq!(filter.filter("\x1b[38;2;1;2;3mgreen\x1b[0m"), "green");
    }

    #[test]
    fn test_osc_body_is_swallowed() {
        let mut filter = PrintableFilter::new();
        assert_eq!(filter.filter("\x1b]0;owned title\x07ok"), "ok");
        assert_eq!(filter.filter("\x1b]8;;http://x\x1b\\link"), "link");
    }

    #[test]
    fn test_sequence_split_across_fragments() {
        let mut filter = PrintableFilter::new();
        assert_eq!(filter.filter("before\x1b"), "before");
        assert!(filter.in_sequence());
        assert_eq!(filter.filter("[2"), "");
        assert_eq!(filter.filter("Jafter"), "after");
        assert!(!filter.in_sequence());
    }
}
