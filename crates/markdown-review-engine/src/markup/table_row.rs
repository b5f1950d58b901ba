use super::span::Span;

/// Pipe table row recognition.
pub struct TableRow;

impl TableRow {
    /// Whether the line reads as a table row: at least two unescaped pipes.
    pub fn is_row(line: &str) -> bool {
        Self::pipes(line).nth(1).is_some()
    }

    /// Whether every cell of the row is a delimiter like `---` or `:--:`.
    pub fn is_alignment(line: &str) -> bool {
        let cells = Self::cells(line);
        let mut seen = false;
        for cell in &cells {
            let cell = cell.slice(line).trim();
            if cell.is_empty() {
                continue;
            }
            let dashes = cell.strip_prefix(':').unwrap_or(cell);
            let dashes = dashes.strip_suffix(':').unwrap_or(dashes);
            if dashes.is_empty() || !dashes.bytes().all(|b| b == b'-') {
                return false;
            }
            seen = true;
        }
        seen && Self::is_row(line)
    }

    /// Spans of the text between pipes, including the pieces before the
    /// first pipe and after the last one.
    pub fn cells(line: &str) -> Vec<Span> {
        let mut cells = Vec::new();
        let mut start = 0;
        for pipe in Self::pipes(line) {
            cells.push(Span::new(start, pipe));
            start = pipe + 1;
        }
        cells.push(Span::new(start, line.len()));
        cells
    }

    fn pipes(line: &str) -> impl Iterator<Item = usize> + '_ {
        let bytes = line.as_bytes();
        bytes
            .iter()
            .enumerate()
            .filter(move |&(i, &b)| b == b'|' && (i == 0 || bytes[i - 1] != b'\\'))
            .map(|(i, _)| i)
    }
}
