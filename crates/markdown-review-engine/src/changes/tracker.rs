use std::collections::HashMap;

use super::element::{Element, ElementMetadata};
use super::model::ElementModel;
use super::operation::{
    DeleteData, EditData, InsertData, InsertPosition, MoveData, Operation, OperationData,
    OperationId, OperationKind, SplitReplaceData, SplitSegment,
};
use super::operation_log::{OperationEvent, OperationLog, SubscriptionId};
use crate::critic::{
    Attribution, StripOptions, strip_annotations_with, to_portable_annotations_with,
    to_presentation_markup_with,
};
use crate::diff::generate_changes_with;
use crate::error::ReviewError;
use crate::markup::split_blocks;
use crate::normalize::NormalizeOptions;
use crate::patch;

/// Content and metadata of one element produced by a split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementSegment {
    pub content: String,
    pub metadata: ElementMetadata,
}

/// Outcome of a split: the ids now occupying the split element's place and
/// the ids that left the document.
///
/// `removed_ids` starts from the split element and its absorbed neighbours
/// and drops every id that lives on in `element_ids`. The first segment
/// keeps the split element's id, so in practice only absorbed ids remain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitResult {
    pub element_ids: Vec<String>,
    pub removed_ids: Vec<String>,
}

/// A review session over one document.
///
/// Wraps an [`OperationLog`] of an [`ElementModel`] with the editing
/// operations the UI performs and the renderings it needs: per-element
/// tracked changes, whole-document exports and source patching.
pub struct ChangeTracker {
    log: OperationLog<ElementModel>,
    /// Explicit diff baselines, set while an element is open in the editor.
    baselines: HashMap<String, String>,
    options: NormalizeOptions,
}

impl ChangeTracker {
    pub fn new(elements: Vec<Element>) -> Self {
        Self::with_options(elements, NormalizeOptions::default())
    }

    pub fn with_options(elements: Vec<Element>, options: NormalizeOptions) -> Self {
        Self {
            log: OperationLog::new(ElementModel::new(elements)),
            baselines: HashMap::new(),
            options,
        }
    }

    pub fn options(&self) -> &NormalizeOptions {
        &self.options
    }

    // Editing

    /// Replaces an element's content (and optionally its metadata).
    ///
    /// Returns `Ok(None)` without recording anything when neither content
    /// nor metadata would change.
    pub fn edit(
        &mut self,
        id: &str,
        new_content: &str,
        user: Option<&str>,
        new_metadata: Option<ElementMetadata>,
    ) -> Result<Option<OperationId>, ReviewError> {
        let element = self.require(id)?;
        let content_changed = element.content != new_content;
        let new_metadata = new_metadata.filter(|m| *m != element.metadata);

        if !content_changed && new_metadata.is_none() {
            log::debug!("edit of {id} changes nothing, skipping");
            return Ok(None);
        }

        let data = EditData {
            old_content: element.content.clone(),
            new_content: new_content.to_string(),
            changes: generate_changes_with(&element.content, new_content, &self.options),
            old_metadata: new_metadata.as_ref().map(|_| element.metadata.clone()),
            new_metadata,
            source: user.map(str::to_string),
        };
        self.log
            .add_operation(id, OperationData::Edit(data), user)
            .map(Some)
    }

    /// Inserts a new element and returns its id.
    pub fn insert(
        &mut self,
        content: &str,
        metadata: ElementMetadata,
        position: InsertPosition,
        user: Option<&str>,
    ) -> Result<String, ReviewError> {
        let id = format!("inserted-{}", self.log.next_operation_id());
        let data = InsertData {
            content: content.to_string(),
            metadata,
            position,
            source: user.map(str::to_string),
        };
        self.log
            .add_operation(id.clone(), OperationData::Insert(data), user)?;
        Ok(id)
    }

    pub fn delete(&mut self, id: &str, user: Option<&str>) -> Result<OperationId, ReviewError> {
        let element = self.require(id)?;
        let data = DeleteData {
            original_content: element.content.clone(),
            original_metadata: element.metadata.clone(),
            source: user.map(str::to_string),
        };
        self.log
            .add_operation(id, OperationData::Delete(data), user)
    }

    /// Moves an element to `to_index` of the current state.
    pub fn move_element(
        &mut self,
        id: &str,
        to_index: usize,
        user: Option<&str>,
    ) -> Result<OperationId, ReviewError> {
        let from_index = self
            .current_state()
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| ReviewError::UnknownElement(id.to_string()))?;
        let data = MoveData {
            from_index,
            to_index,
            source: user.map(str::to_string),
        };
        self.log.add_operation(id, OperationData::Move(data), user)
    }

    /// Replaces one element by a sequence of segments.
    ///
    /// The first segment keeps the element's id; an empty segment list
    /// leaves a single empty element behind.
    pub fn replace_element_with_segments(
        &mut self,
        id: &str,
        segments: Vec<ReplacementSegment>,
        user: Option<&str>,
    ) -> Result<SplitResult, ReviewError> {
        self.replace_elements_with_segments(id, &[], segments, user)
    }

    /// Replaces an element and the `absorbed` neighbours merged into it by a
    /// sequence of segments, in a single operation.
    pub fn replace_elements_with_segments(
        &mut self,
        id: &str,
        absorbed: &[String],
        segments: Vec<ReplacementSegment>,
        user: Option<&str>,
    ) -> Result<SplitResult, ReviewError> {
        let element = self.require(id)?;
        let original_content = element.content.clone();
        let segments = if segments.is_empty() {
            vec![ReplacementSegment {
                content: String::new(),
                metadata: element.metadata.clone(),
            }]
        } else {
            segments
        };

        let op_id = self.log.next_operation_id();
        let segments: Vec<SplitSegment> = segments
            .into_iter()
            .enumerate()
            .map(|(i, segment)| SplitSegment {
                id: if i == 0 {
                    id.to_string()
                } else {
                    format!("split-{op_id}-{i}")
                },
                content: segment.content,
                metadata: segment.metadata,
            })
            .collect();
        let element_ids: Vec<String> = segments.iter().map(|s| s.id.clone()).collect();
        let mut removed_ids: Vec<String> = Vec::new();
        for removed in std::iter::once(id).chain(absorbed.iter().map(String::as_str)) {
            if !element_ids.iter().any(|kept| kept == removed)
                && !removed_ids.iter().any(|seen| seen == removed)
            {
                removed_ids.push(removed.to_string());
            }
        }

        let data = SplitReplaceData {
            original_content,
            segments,
            absorbed_ids: absorbed.to_vec(),
            source: user.map(str::to_string),
        };
        self.log
            .add_operation(id, OperationData::SplitReplace(data), user)?;
        Ok(SplitResult {
            element_ids,
            removed_ids,
        })
    }

    /// Splits an element along the top-level blocks of `markdown`.
    ///
    /// `metadata[i]` overrides the inferred metadata of the i-th block.
    pub fn split_element(
        &mut self,
        id: &str,
        markdown: &str,
        metadata: &[ElementMetadata],
        user: Option<&str>,
    ) -> Result<SplitResult, ReviewError> {
        let segments = split_blocks(markdown)
            .iter()
            .enumerate()
            .map(|(i, block)| ReplacementSegment {
                content: block.content(markdown).to_string(),
                metadata: metadata.get(i).cloned().unwrap_or_else(|| block.metadata()),
            })
            .collect();
        self.replace_element_with_segments(id, segments, user)
    }

    // History

    pub fn undo(&mut self) -> bool {
        self.baselines.clear();
        self.log.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.baselines.clear();
        self.log.redo()
    }

    pub fn can_undo(&self) -> bool {
        self.log.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.log.can_redo()
    }

    pub fn operations(&self) -> &[Operation] {
        self.log.operations()
    }

    /// Reloads operations from a saved draft.
    pub fn restore(&mut self, operations: Vec<Operation>) {
        self.baselines.clear();
        self.log.restore(operations);
    }

    pub fn clear(&mut self) {
        self.baselines.clear();
        self.log.clear();
    }

    pub fn has_unsaved_operations(&self) -> bool {
        self.log.has_unsaved_operations()
    }

    pub fn mark_saved(&mut self) {
        self.log.mark_saved();
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&OperationEvent) + 'static) -> SubscriptionId {
        self.log.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.log.unsubscribe(id)
    }

    // State

    pub fn baseline(&self) -> &[Element] {
        self.log.model().baseline()
    }

    pub fn current_state(&self) -> &[Element] {
        self.log.model().current()
    }

    pub fn state_after_operations(&self, count: usize) -> Vec<Element> {
        self.log.state_after_operations(count)
    }

    pub fn element(&self, id: &str) -> Option<&Element> {
        self.log.model().find(id)
    }

    pub fn element_content(&self, id: &str) -> Result<&str, ReviewError> {
        Ok(&self.require(id)?.content)
    }

    /// The user who last touched an element, if any.
    pub fn last_editor(&self, id: &str) -> Option<&str> {
        self.operations()
            .iter()
            .rev()
            .find(|op| op.element_id == id)
            .and_then(|op| op.user_id.as_deref())
    }

    // Baselines

    /// Pins the content tracked changes of `id` are computed against.
    pub fn set_element_baseline(&mut self, id: &str, content: &str) {
        self.baselines.insert(id.to_string(), content.to_string());
    }

    pub fn clear_element_baseline(&mut self, id: &str) {
        self.baselines.remove(id);
    }

    pub fn clear_all_baselines(&mut self) {
        self.baselines.clear();
    }

    /// Explicit baseline, else the original content, else empty for
    /// elements created during the session.
    fn element_baseline(&self, id: &str) -> &str {
        self.baselines
            .get(id)
            .map(String::as_str)
            .or_else(|| self.log.model().baseline_element(id).map(|e| e.content.as_str()))
            .unwrap_or("")
    }

    // Tracked rendering

    /// Element content with changes since its baseline as portable
    /// annotations.
    pub fn element_content_with_tracked_changes(&self, id: &str) -> Result<String, ReviewError> {
        let element = self.require(id)?;
        let baseline = self.element_baseline(id);
        if baseline == element.content {
            return Ok(element.content.clone());
        }
        let changes = generate_changes_with(baseline, &element.content, &self.options);
        if changes.is_empty() {
            return Ok(element.content.clone());
        }
        Ok(to_portable_annotations_with(baseline, &changes, &self.options))
    }

    /// Element content with changes since its baseline as `<ins>`/`<del>`
    /// markup.
    pub fn element_content_with_presentation(
        &self,
        id: &str,
        attribution: Option<&Attribution>,
    ) -> Result<String, ReviewError> {
        let element = self.require(id)?;
        let baseline = self.element_baseline(id);
        if baseline == element.content {
            return Ok(element.content.clone());
        }
        let changes = generate_changes_with(baseline, &element.content, &self.options);
        if changes.is_empty() {
            return Ok(element.content.clone());
        }
        Ok(to_presentation_markup_with(
            baseline,
            &changes,
            attribution,
            &self.options,
        ))
    }

    // Exports

    pub fn to_markdown(&self) -> String {
        render_markdown(self.current_state())
    }

    pub fn to_markdown_snapshot(&self, count: usize) -> String {
        render_markdown(&self.state_after_operations(count))
    }

    /// The current document with every annotation accepted, comments kept
    /// as HTML comments.
    pub fn to_clean_markdown(&self) -> String {
        clean(&self.to_markdown())
    }

    pub fn to_clean_markdown_snapshot(&self, count: usize) -> String {
        clean(&self.to_markdown_snapshot(count))
    }

    /// The current document with tracked changes as portable annotations.
    pub fn to_tracked_markdown(&self) -> String {
        self.current_state()
            .iter()
            .map(|e| {
                self.element_content_with_tracked_changes(&e.id)
                    .unwrap_or_else(|_| e.content.clone())
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// The current document as presentation markup, each element attributed
    /// through `attribution_for(last_editor)`.
    pub fn to_presentation_markup(
        &self,
        mut attribution_for: impl FnMut(&str) -> Option<Attribution>,
    ) -> String {
        self.current_state()
            .iter()
            .map(|e| {
                let attribution = self.last_editor(&e.id).and_then(&mut attribution_for);
                self.element_content_with_presentation(&e.id, attribution.as_ref())
                    .unwrap_or_else(|_| e.content.clone())
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// The current document with a comment annotation appended to each
    /// element listed in `comments`.
    pub fn to_markdown_with_comments(&self, comments: &HashMap<String, String>) -> String {
        self.current_state()
            .iter()
            .map(|e| match comments.get(&e.id) {
                Some(comment) if !comment.trim().is_empty() => {
                    format!("{} {comment}", e.content.trim_end())
                }
                _ => e.content.clone(),
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// One clean document per operation, in order.
    pub fn operation_snapshots(&self) -> Vec<String> {
        (1..=self.operations().len())
            .map(|count| self.to_clean_markdown_snapshot(count))
            .collect()
    }

    /// Human readable one-line summary of the session.
    pub fn summarize_operations(&self) -> String {
        let count = |kind: OperationKind| self.operations().iter().filter(|op| op.kind() == kind).count();
        let parts: Vec<String> = [
            (OperationKind::Insert, "Added"),
            (OperationKind::Delete, "Deleted"),
            (OperationKind::Edit, "Edited"),
            (OperationKind::Move, "Moved"),
            (OperationKind::SplitReplace, "Split"),
        ]
        .into_iter()
        .filter_map(|(kind, verb)| match count(kind) {
            0 => None,
            n => Some(format!("{verb} {n} element(s)")),
        })
        .collect();

        if parts.is_empty() {
            "No changes".to_string()
        } else {
            parts.join(", ")
        }
    }

    /// Projects the session onto the pristine source, or `None` when that is
    /// not possible.
    pub fn patch_source(&self, pristine: &str) -> Option<String> {
        patch::patch_with(pristine, self.baseline(), self.operations(), &self.options)
            .inspect_err(|err| log::warn!("source patch failed: {err}"))
            .ok()
    }

    fn require(&self, id: &str) -> Result<&Element, ReviewError> {
        self.element(id)
            .ok_or_else(|| ReviewError::UnknownElement(id.to_string()))
    }
}

/// Joins elements with a blank line, trailing whitespace trimmed.
pub(crate) fn render_markdown(elements: &[Element]) -> String {
    elements
        .iter()
        .map(|e| e.content.trim_end())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn clean(markdown: &str) -> String {
    strip_annotations_with(
        markdown,
        true,
        StripOptions {
            preserve_comments_as_html: true,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::ElementType;
    use pretty_assertions::assert_eq;

    fn para(id: &str, content: &str) -> Element {
        Element::new(id, content, ElementMetadata::new(ElementType::Para))
    }

    fn tracker() -> ChangeTracker {
        ChangeTracker::new(vec![
            para("intro", "Intro paragraph."),
            Element::new(
                "list",
                "- Item 1\n- Item 2",
                ElementMetadata::new(ElementType::BulletList),
            ),
            para("outro", "The end."),
        ])
    }

    #[test]
    fn ghost_edits_are_skipped() {
        let mut tracker = tracker();
        let result = tracker
            .edit("intro", "Intro paragraph.", Some("ann"), None)
            .expect("edit");
        assert_eq!(result, None);

        let same_meta = Some(ElementMetadata::new(ElementType::Para));
        let result = tracker
            .edit("intro", "Intro paragraph.", None, same_meta)
            .expect("edit");
        assert_eq!(result, None);
        assert!(tracker.operations().is_empty());
    }

    #[test]
    fn edit_records_changes() {
        let mut tracker = tracker();
        tracker
            .edit("list", "- Item 1\n- Item 2\n- Item 3", Some("ann"), None)
            .expect("edit");

        let OperationData::Edit(edit) = &tracker.operations()[0].data else {
            panic!("expected an edit");
        };
        assert_eq!(edit.changes.len(), 1);
        assert_eq!(
            tracker
                .element_content_with_tracked_changes("list")
                .expect("tracked"),
            "- Item 1\n- Item 2\n{++- Item 3++}"
        );
        assert_eq!(tracker.last_editor("list"), Some("ann"));
    }

    #[test]
    fn inserted_elements_render_as_additions() {
        let mut tracker = tracker();
        let id = tracker
            .insert(
                "Fresh text.",
                ElementMetadata::new(ElementType::Para),
                InsertPosition::After("intro".to_string()),
                None,
            )
            .expect("insert");

        assert_eq!(id, "inserted-1");
        assert_eq!(
            tracker.to_tracked_markdown(),
            "Intro paragraph.\n\n{++Fresh text.++}\n\n- Item 1\n- Item 2\n\nThe end."
        );
        assert_eq!(
            tracker.to_clean_markdown(),
            "Intro paragraph.\n\nFresh text.\n\n- Item 1\n- Item 2\n\nThe end."
        );
    }

    #[test]
    fn explicit_baseline_takes_precedence_until_undo() {
        let mut tracker = tracker();
        tracker
            .edit("intro", "Intro paragraph, edited.", None, None)
            .expect("edit");
        tracker.set_element_baseline("intro", "Intro paragraph, edited.");
        assert_eq!(
            tracker
                .element_content_with_tracked_changes("intro")
                .expect("tracked"),
            "Intro paragraph, edited."
        );

        tracker.edit("intro", "Intro text, edited.", None, None).expect("edit");
        assert!(tracker.undo());
        assert_eq!(
            tracker
                .element_content_with_tracked_changes("intro")
                .expect("tracked"),
            "Intro paragraph{++, edited++}."
        );
    }

    #[test]
    fn split_element_along_blocks() {
        let mut tracker = tracker();
        let result = tracker
            .split_element("intro", "# Heading\n\nBody text.", &[], Some("ann"))
            .expect("split");

        assert_eq!(result.element_ids, vec!["intro", "split-1-1"]);
        assert!(result.removed_ids.is_empty());
        let state = tracker.current_state();
        assert_eq!(state[0].metadata.kind, ElementType::Header);
        assert_eq!(state[0].metadata.level, Some(1));
        assert_eq!(state[1].content, "Body text.");
        assert_eq!(state.len(), 4);
    }

    #[test]
    fn absorbing_neighbours() {
        let mut tracker = tracker();
        let result = tracker
            .replace_elements_with_segments(
                "intro",
                &["list".to_string()],
                vec![ReplacementSegment {
                    content: "Merged.".to_string(),
                    metadata: ElementMetadata::new(ElementType::Para),
                }],
                None,
            )
            .expect("replace");

        assert_eq!(result.removed_ids, vec!["list"]);
        assert_eq!(tracker.to_markdown(), "Merged.\n\nThe end.");
    }

    #[test]
    fn removed_ids_skip_ids_that_live_on() {
        let mut tracker = tracker();
        let result = tracker
            .replace_elements_with_segments(
                "intro",
                &["list".to_string(), "intro".to_string(), "list".to_string()],
                vec![ReplacementSegment {
                    content: "Merged.".to_string(),
                    metadata: ElementMetadata::new(ElementType::Para),
                }],
                None,
            )
            .expect("replace");

        assert_eq!(result.element_ids, vec!["intro"]);
        assert_eq!(result.removed_ids, vec!["list"]);
    }

    #[test]
    fn empty_split_leaves_empty_element() {
        let mut tracker = tracker();
        tracker
            .replace_element_with_segments("outro", Vec::new(), None)
            .expect("replace");
        assert_eq!(tracker.element_content("outro").expect("content"), "");
    }

    #[test]
    fn summary_and_snapshots() {
        let mut tracker = tracker();
        assert_eq!(tracker.summarize_operations(), "No changes");

        tracker.edit("intro", "Intro.", None, None).expect("edit");
        tracker.delete("outro", None).expect("delete");
        tracker.move_element("list", 0, None).expect("move");

        assert_eq!(
            tracker.summarize_operations(),
            "Deleted 1 element(s), Edited 1 element(s), Moved 1 element(s)"
        );
        assert_eq!(
            tracker.operation_snapshots(),
            vec![
                "Intro.\n\n- Item 1\n- Item 2\n\nThe end.",
                "Intro.\n\n- Item 1\n- Item 2",
                "- Item 1\n- Item 2\n\nIntro.",
            ]
        );
    }

    #[test]
    fn comments_are_appended() {
        let tracker = tracker();
        let comments = HashMap::from([("outro".to_string(), "{>>Too short<<}".to_string())]);
        let markdown = tracker.to_markdown_with_comments(&comments);

        assert!(markdown.ends_with("The end. {>>Too short<<}"));
        assert_eq!(
            clean(&markdown),
            "Intro paragraph.\n\n- Item 1\n- Item 2\n\nThe end. <!-- review-comment Too short -->"
        );
    }

    #[test]
    fn presentation_uses_last_editor_attribution() {
        let mut tracker = tracker();
        tracker.edit("outro", "The very end.", Some("bob"), None).expect("edit");

        let html = tracker.to_presentation_markup(|user| {
            Some(Attribution {
                author: user.to_string(),
                color: "red".to_string(),
            })
        });
        assert!(html.contains(r#"data-critic-author="bob""#));
        assert!(html.starts_with("Intro paragraph."));
    }
}
