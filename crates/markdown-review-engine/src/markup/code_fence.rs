/// Which delimiter a fenced code region was opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceKind {
    Backticks,
    Tildes,
}

/// Code fence recognition: ```` ``` ```` and `~~~` delimiters.
pub struct CodeFence;

impl CodeFence {
    pub const BACKTICKS: &'static str = "```";
    pub const TILDES: &'static str = "~~~";

    /// Maximum indentation before a fence delimiter is no longer a fence.
    const MAX_INDENT: usize = 3;

    /// Returns the fence kind if `line` is a fence delimiter line.
    pub fn sig(line: &str) -> Option<FenceKind> {
        let t = line.trim_end_matches(['\r', '\n']);
        let indent = t.len() - t.trim_start_matches(' ').len();
        if indent > Self::MAX_INDENT {
            return None;
        }
        let t = &t[indent..];
        if t.starts_with(Self::BACKTICKS) {
            Some(FenceKind::Backticks)
        } else if t.starts_with(Self::TILDES) {
            Some(FenceKind::Tildes)
        } else {
            None
        }
    }

    /// A backtick fence is only closed by backticks, tildes only by tildes.
    pub fn closes(kind: FenceKind, sig: Option<FenceKind>) -> bool {
        sig == Some(kind)
    }
}

/// Line-by-line tracker of whether we are inside a fenced code region.
#[derive(Debug, Clone, Copy, Default)]
pub struct FenceState {
    open: Option<FenceKind>,
}

impl FenceState {
    /// Feeds the next line and reports whether it belongs to a fenced region.
    ///
    /// Both delimiter lines count as fenced.
    pub fn step(&mut self, line: &str) -> bool {
        let sig = CodeFence::sig(line);
        match self.open {
            Some(kind) => {
                if CodeFence::closes(kind, sig) {
                    self.open = None;
                }
                true
            }
            None => {
                self.open = sig;
                sig.is_some()
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }
}
