//! # Source patching
//!
//! Projects a review session back onto the pristine source text so that
//! everything the reviewer did not touch (front matter, comments, the
//! author's whitespace habits) survives byte for byte.
//!
//! Edited elements are grouped by the baseline element they descend from:
//! split segments stay with the element they were split from, absorbed
//! neighbours merge into the absorbing group and inserted elements join
//! the group of their anchor. Each changed group replaces the source span
//! of its baseline members with its current content.
//!
//! Spans are located in two steps:
//!
//! 1. **anchor**: the text at the element's `{line, column}` must
//!    normalize to the element's baseline content
//! 2. **content search**: otherwise the baseline content must occur
//!    exactly once in the source, compared line window by line window
//!    after normalization
//!
//! If any group cannot be located the whole patch fails; callers fall back
//! to a reconstructed document. All replacements go through a single
//! [`xi_rope`] delta, so a patch is applied completely or not at all.

use std::collections::{HashMap, HashSet};

use relative_path::RelativePath;
use xi_rope::Rope;
use xi_rope::delta::Builder;

use crate::changes::{
    DocumentModel, Element, ElementModel, InsertPosition, Operation, OperationData,
    render_markdown,
};
use crate::error::ReviewError;
use crate::markup::{LineRef, Span, lines_with_spans};
use crate::normalize::{NormalizeOptions, normalize_with};

/// Patches `pristine` with the default normalizer, `None` on failure.
pub fn patch(pristine: &str, elements: &[Element], operations: &[Operation]) -> Option<String> {
    patch_with(pristine, elements, operations, &NormalizeOptions::default())
        .inspect_err(|err| log::warn!("source patch failed: {err}"))
        .ok()
}

/// Patches `pristine`, reporting why it could not be patched.
pub fn patch_with(
    pristine: &str,
    elements: &[Element],
    operations: &[Operation],
    options: &NormalizeOptions,
) -> Result<String, ReviewError> {
    Patcher::new(pristine, elements, operations, options).run(|_| true)
}

/// Patches one file of a multi-file document: only groups whose baseline
/// elements came from `path` are projected onto `pristine`.
pub fn patch_file(
    pristine: &str,
    path: &RelativePath,
    elements: &[Element],
    operations: &[Operation],
) -> Option<String> {
    let options = NormalizeOptions::default();
    Patcher::new(pristine, elements, operations, &options)
        .run(|e| e.source_file.as_deref() == Some(path))
        .inspect_err(|err| log::warn!("patching {path} failed: {err}"))
        .ok()
}

struct Patcher<'a> {
    pristine: &'a str,
    lines: Vec<LineRef<'a>>,
    baseline: &'a [Element],
    operations: &'a [Operation],
    options: &'a NormalizeOptions,
}

impl<'a> Patcher<'a> {
    fn new(
        pristine: &'a str,
        baseline: &'a [Element],
        operations: &'a [Operation],
        options: &'a NormalizeOptions,
    ) -> Self {
        Self {
            pristine,
            lines: lines_with_spans(pristine).collect(),
            baseline,
            operations,
            options,
        }
    }

    fn run(&self, in_scope: impl Fn(&Element) -> bool) -> Result<String, ReviewError> {
        if self.operations.is_empty() {
            return Ok(self.pristine.to_string());
        }

        let model = ElementModel::new(self.baseline.to_vec());
        let groups = self.group_roots(&model)?;
        let current = model.replay(self.operations);

        let mut replacements: Vec<(Span, String, &str)> = Vec::new();
        for root in touched_roots(self.operations, &groups) {
            let members: Vec<&Element> = self
                .baseline
                .iter()
                .filter(|e| groups.get(&e.id) == Some(&root))
                .collect();
            if !members.iter().all(|&e| in_scope(e)) {
                continue;
            }
            for op in self.operations.iter().filter(|op| groups.get(&op.element_id) == Some(&root)) {
                if let OperationData::Move(_) = op.data {
                    return Err(ReviewError::UnpatchableOperation {
                        operation_id: op.id,
                        kind: op.kind(),
                    });
                }
            }

            let old = render_markdown(&members.iter().copied().cloned().collect::<Vec<_>>());
            let new_members: Vec<Element> = current
                .iter()
                .filter(|e| groups.get(&e.id) == Some(&root))
                .cloned()
                .collect();
            let new = render_markdown(&new_members);
            if normalize_with(&old, self.options) == normalize_with(&new, self.options) {
                log::debug!("group {root} is unchanged after normalization, leaving source as is");
                continue;
            }

            let mut span: Option<Span> = None;
            for member in &members {
                let found = self.locate(member)?;
                span = Some(span.map_or(found, |s| {
                    Span::new(s.start.min(found.start), s.end.max(found.end))
                }));
            }
            let Some(mut span) = span else {
                continue;
            };
            if new.is_empty() {
                span = self.swallow_separator(span);
            }
            replacements.push((span, new, root));
        }

        replacements.sort_by_key(|(span, _, _)| span.start);
        for pair in replacements.windows(2) {
            if pair[0].0.end > pair[1].0.start {
                return Err(ReviewError::AmbiguousPatchTarget {
                    element_id: pair[1].2.to_string(),
                    matches: 2,
                });
            }
        }

        let rope = Rope::from(self.pristine);
        let mut builder = Builder::new(rope.len());
        for (span, text, root) in &replacements {
            log::debug!("patching {root} at {}..{}", span.start, span.end);
            builder.replace(span.start..span.end, Rope::from(text.as_str()));
        }
        Ok(builder.build().apply(&rope).to_string())
    }

    /// Maps every element id that ever existed in the session to the
    /// baseline element whose source span it belongs to.
    fn group_roots(&self, model: &ElementModel) -> Result<HashMap<String, &'a str>, ReviewError> {
        let mut roots: HashMap<String, &'a str> = self
            .baseline
            .iter()
            .map(|e| (e.id.clone(), e.id.as_str()))
            .collect();

        for (i, op) in self.operations.iter().enumerate() {
            match &op.data {
                OperationData::Insert(insert) => {
                    let anchor = match &insert.position {
                        InsertPosition::After(anchor) | InsertPosition::Before(anchor) => {
                            Some(anchor.clone())
                        }
                        InsertPosition::End => {
                            model.replay(&self.operations[..i]).last().map(|e| e.id.clone())
                        }
                    };
                    let root = anchor.and_then(|a| roots.get(&a).copied()).ok_or_else(|| {
                        ReviewError::AmbiguousPatchTarget {
                            element_id: op.element_id.clone(),
                            matches: 0,
                        }
                    })?;
                    roots.insert(op.element_id.clone(), root);
                }
                OperationData::SplitReplace(split) => {
                    let Some(&root) = roots.get(&op.element_id) else {
                        continue;
                    };
                    for absorbed in &split.absorbed_ids {
                        if let Some(&merged) = roots.get(absorbed) {
                            for value in roots.values_mut() {
                                if *value == merged {
                                    *value = root;
                                }
                            }
                        }
                    }
                    for segment in &split.segments {
                        roots.insert(segment.id.clone(), root);
                    }
                }
                OperationData::Edit(_) | OperationData::Delete(_) | OperationData::Move(_) => {}
            }
        }
        Ok(roots)
    }

    /// Finds the source span of a baseline element.
    fn locate(&self, element: &Element) -> Result<Span, ReviewError> {
        let target = normalize_with(&element.content, self.options);
        let target = target.trim();
        if let Some(position) = element.source_position {
            if let Some(span) = self.match_at_anchor(position.line, position.column, target) {
                return Ok(span);
            }
            log::debug!(
                "anchor {}:{} of {} no longer matches, searching by content",
                position.line,
                position.column,
                element.id
            );
        }

        let matches = self.search(target);
        match matches.as_slice() {
            [span] => Ok(*span),
            _ => Err(ReviewError::AmbiguousPatchTarget {
                element_id: element.id.clone(),
                matches: matches.len(),
            }),
        }
    }

    fn match_at_anchor(&self, line: usize, column: usize, target: &str) -> Option<Span> {
        let index = line.checked_sub(1)?;
        let start_line = self.lines.get(index)?;
        let column = column.saturating_sub(1);
        let offset = match start_line.text.char_indices().nth(column) {
            Some((offset, _)) => offset,
            None if column == start_line.text.chars().count() => start_line.text.len(),
            None => return None,
        };
        self.match_window(index, start_line.span.start + offset, target)
    }

    /// Every span, starting at a line start, whose text normalizes to
    /// `target`.
    fn search(&self, target: &str) -> Vec<Span> {
        let Some(first) = target.lines().next() else {
            return Vec::new();
        };
        let first = first.trim();
        self.lines
            .iter()
            .filter(|line| !line.is_blank())
            .filter(|line| normalize_with(line.text, self.options).trim() == first)
            .filter_map(|line| self.match_window(line.index, line.span.start, target))
            .collect()
    }

    /// The shortest run of lines from `start` whose normalization equals
    /// `target`. Blank lines inside the run are allowed since the
    /// normalizer may drop them.
    fn match_window(&self, first_line: usize, start: usize, target: &str) -> Option<Span> {
        if target.is_empty() {
            return None;
        }
        let max_lines = target.lines().count() * 2 + 2;
        let last_line = (first_line + max_lines).min(self.lines.len());
        self.lines[first_line..last_line]
            .iter()
            .filter(|line| !line.is_blank())
            .map(|line| Span::new(start, line.span.end.max(start)))
            .find(|span| normalize_with(span.slice(self.pristine), self.options).trim() == target)
    }

    /// Widens a deleted span so that one separator goes with it.
    fn swallow_separator(&self, span: Span) -> Span {
        let rest = &self.pristine[span.end..];
        let gap = rest.len() - rest.trim_start().len();
        if gap < rest.len() {
            // Content follows: take the gap up to the start of its line.
            let next = span.end + gap;
            let line_start = self.pristine[..next].rfind('\n').map_or(0, |i| i + 1);
            return Span::new(span.start, line_start.max(span.end));
        }
        let before = &self.pristine[..span.start];
        Span::new(before.trim_end().len(), self.pristine.len())
    }
}

/// Group roots touched by any operation, in first-touch order.
fn touched_roots<'a>(operations: &[Operation], groups: &HashMap<String, &'a str>) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    let mut roots = Vec::new();
    let mut touch = |id: &str| {
        if let Some(&root) = groups.get(id) {
            if seen.insert(root) {
                roots.push(root);
            }
        }
    };
    for op in operations {
        touch(&op.element_id);
        if let OperationData::SplitReplace(split) = &op.data {
            split.absorbed_ids.iter().for_each(|id| touch(id));
        }
    }
    roots
}
