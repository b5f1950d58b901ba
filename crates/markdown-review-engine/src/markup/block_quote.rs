/// Blockquote prefix recognition.
pub struct BlockQuote;

impl BlockQuote {
    /// The blockquote prefix character.
    pub const PREFIX: char = '>';

    /// Strips leading indentation and blockquote prefixes from a line,
    /// returning (depth, byte_offset).
    ///
    /// Handles `> text`, `>> nested` and `> > spaced nested`. The offset
    /// always skips leading spaces, so for a plain indented line it is the
    /// indentation width with a depth of 0.
    pub fn strip_prefixes(s: &str) -> (u8, usize) {
        let b = s.as_bytes();
        let mut i = 0usize;
        let mut depth = 0u8;

        loop {
            while i < b.len() && b[i] == b' ' {
                i += 1;
            }
            if i < b.len() && b[i] == (Self::PREFIX as u8) {
                depth = depth.saturating_add(1);
                i += 1;
                if i < b.len() && b[i] == b' ' {
                    i += 1;
                }
            } else {
                break;
            }
        }
        (depth, i)
    }

    /// Whether the line starts with at least one `>` (after indentation).
    pub fn is_quote_line(s: &str) -> bool {
        Self::strip_prefixes(s).0 > 0
    }

    /// A quote line with nothing after its prefixes, e.g. `>` or `> >`.
    pub fn is_bare(s: &str) -> bool {
        let (depth, offset) = Self::strip_prefixes(s);
        depth > 0 && s[offset..].trim().is_empty()
    }
}
