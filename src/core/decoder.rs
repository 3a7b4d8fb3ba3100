//! Incremental UTF-8 decoding
//!
//! Response fragments arrive at arbitrary byte boundaries, so a multi-byte
//! sequence can be split across two (or more) fragments. The decoder keeps the
//! unfinished tail between calls instead of starting fresh per fragment.

/// Longest possible UTF-8 sequence
const MAX_SEQUENCE_LEN: usize = 4;

const REPLACEMENT: char = '\u{FFFD}';

/// Stateful decoder reused across one whole stream
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    /// Bytes of an incomplete sequence carried to the next fragment
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one fragment. Invalid bytes become U+FFFD; never fails.
    pub fn decode(&mut self, fragment: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(fragment);

        let mut out = String::with_capacity(bytes.len());
        let mut rest = bytes.as_slice();

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    // valid_up_to guarantees this prefix is UTF-8
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());

                    match e.error_len() {
                        Some(bad) => {
                            out.push(REPLACEMENT);
                            rest = &after[bad..];
                        }
                        None => {
                            // Truncated sequence at the end: wait for more bytes
                            debug_assert!(after.len() < MAX_SEQUENCE_LEN);
                            self.pending.extend_from_slice(after);
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Whether bytes of an unfinished sequence are being held back
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Flush at end of stream; a dangling partial sequence becomes U+FFFD
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            REPLACEMENT.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_fragments_concatenate() {
        let mut decoder = Utf8StreamDecoder::new();
        let text: String = ["Hel", "lo, ", "Mr. A", "nderson"]
            .iter()
            .map(|f| decoder.decode(f.as_bytes()))
            .collect();
        assert_eq!(text, "Hello, Mr. Anderson");
        assert!(!decoder.has_pending());
    }

    #[test]
    fn test_multibyte_split_at_every_boundary() {
        let source = "Mr. Ånderson – 日本 🐇";
        let bytes = source.as_bytes();

        for split in 0..=bytes.len() {
            let mut decoder = Utf8StreamDecoder::new();
            let mut text = decoder.decode(&bytes[..split]);
            text.push_str(&decoder.decode(&bytes[split..]));
            text.push_str(&decoder.finish());
            assert_eq!(text, source, "split at byte {split}");
        }
    }

    #[test]
    fn test_four_byte_char_fed_one_byte_at_a_time() {
        let mut decoder = Utf8StreamDecoder::new();
        let mut text = String::new();
        for byte in "🐇".as_bytes() {
            text.push_str(&decoder.decode(std::slice::from_ref(byte)));
        }
        assert_eq!(text, "🐇");
    }

    #[test]
    fn test_invalid_bytes_are_replaced_not_fatal() {
        let mut decoder = Utf8StreamDecoder::new();
        let text = decoder.decode(b"ok\xffgo");
        assert_eq!(text, "ok\u{FFFD}go");
    }

    #[test]
    fn test_truncated_tail_flushed_on_finish() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"a\xe6\x97"), "a");
        assert!(decoder.has_pending());
        assert_eq!(decoder.finish(), "\u{FFFD}");
        assert!(!decoder.has_pending());
    }
}
