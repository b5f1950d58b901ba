use markdown_review_engine::changes::{ChangeTracker, Element, ElementMetadata, ElementType, InsertPosition};
use markdown_review_engine::critic::{Segment, scan_annotations};
use markdown_review_engine::markup::ListMarker;
use markdown_review_engine::{
    TextChange, apply_changes, generate_changes, normalize, strip_annotations,
    to_portable_annotations,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;

#[rstest]
#[case::appended_item("- Item 1\n- Item 2", "- Item 1\n- Item 2\n- Item 3")]
#[case::word_substitution("The quick brown fox", "The slow brown fox")]
#[case::paragraph_deletion("A\n\nB\n\nC", "A\n\nC")]
#[case::multi_line_insertion("A\n\nD", "A\n\nB\nC\n\nD")]
#[case::loose_marker_spacing("-   apple pie", "- apple tart")]
#[case::last_item_deletion("- a\n- b", "- a")]
#[case::middle_item_deletion("- a\n- b\n- c", "- a\n- c")]
#[case::repeated_item("- x\n- y", "- y\n- y")]
#[case::quote_paragraph_added("> Para A.", "> Para A.\n\n> Para B.")]
#[case::quote_paragraphs_removed("> qa qb\n\n> qa qb", "")]
#[case::nested_item("- a\n- b", "- a\n  - b")]
#[case::marker_change("- apple", "1. apple")]
#[case::dropped_indentation("a\n  - a", "a\na")]
#[case::skipped_blank_line("- b\n\n- a", "- b a")]
#[case::inserted_word("b", "a b")]
#[case::table_cell("| a | b |\n|---|---|\n| 1 | 2 |", "| a | b |\n|---|---|\n| 1 | 3 |")]
fn annotations_resolve_to_either_side(#[case] old: &str, #[case] new: &str) {
    let tracked = to_portable_annotations(old, &generate_changes(old, new));

    assert_eq!(normalize(&strip_annotations(&tracked, true)), normalize(new));
    assert_eq!(normalize(&strip_annotations(&tracked, false)), normalize(old));
}

#[rstest]
#[case("- a\n- b\n- c", "- a\n- c")]
#[case("- a\n- b", "- a\n- c")]
#[case("- a\n- b", "- a")]
#[case("1. first\n2. second", "1. first\n2. changed")]
#[case("-   apple pie", "- apple tart")]
#[case("- a\n- b", "- a\n  - b")]
#[case("- apple", "1. apple")]
fn removed_text_never_carries_the_list_marker(#[case] old: &str, #[case] new: &str) {
    let tracked = to_portable_annotations(old, &generate_changes(old, new));

    for segment in scan_annotations(&tracked).segments {
        let removed = match segment {
            Segment::Deletion(text) => text,
            Segment::Substitution { old, .. } => old,
            _ => continue,
        };
        assert!(!removed.is_empty(), "empty span in {tracked:?}");
        assert!(
            ListMarker::parse(removed).is_none(),
            "marker inside span in {tracked:?}"
        );
    }
}

#[test]
fn appended_list_item_scenario() {
    let old = "- Item 1\n- Item 2";
    let new = "- Item 1\n- Item 2\n- Item 3";
    let changes = generate_changes(old, new);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].text, "\n- Item 3");

    let tracked = to_portable_annotations(old, &changes);
    assert_eq!(tracked, "- Item 1\n- Item 2\n{++- Item 3++}");
    assert_eq!(strip_annotations(&tracked, false), old);
}

#[test]
fn blockquote_gap_scenario() {
    let raw = "> Para A.\n\n> Para B.";
    let normalized = normalize(raw);
    assert_eq!(normalized, "> Para A.\n>\n> Para B.");
    assert_eq!(generate_changes(raw, &normalized), vec![]);
}

#[rstest]
#[case::blocks("# Heading\n\nFirst paragraph.\n\n- a\n- b")]
#[case::fence("Intro.\n\n```\ncode\n\nmore code\n```")]
#[case::quote("> quoted\n> text\n\nAfter.")]
fn split_segments_cover_the_original(#[case] markdown: &str) {
    let mut tracker = ChangeTracker::new(vec![Element::new(
        "p1",
        "placeholder",
        ElementMetadata::new(ElementType::Para),
    )]);
    let result = tracker
        .split_element("p1", markdown, &[], None)
        .expect("split");

    let joined: Vec<&str> = result
        .element_ids
        .iter()
        .map(|id| tracker.element_content(id).expect("segment"))
        .collect();
    assert_eq!(joined.join("\n\n"), markdown);
}

/// Non-blank lines as (indentation, words): what survives once the
/// whitespace-only differences the generator drops are ignored.
fn shape(text: &str) -> Vec<(usize, Vec<String>)> {
    normalize(text)
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let indent = line.len() - line.trim_start().len();
            (indent, line.split_whitespace().map(str::to_string).collect())
        })
        .collect()
}

fn overlapping(changes: &[TextChange]) -> Option<(&TextChange, &TextChange)> {
    let mut sorted: Vec<&TextChange> = changes.iter().collect();
    sorted.sort_by_key(|c| (c.position, c.old_len()));
    sorted
        .windows(2)
        .find(|pair| pair[0].position + pair[0].old_len() > pair[1].position)
        .map(|pair| (pair[0], pair[1]))
}

fn markdown_line() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec![
        "",
        "a",
        "b a",
        "a b c",
        "  b",
        "- a",
        "- b",
        "- a b",
        "  - a",
        "    - b",
        "-   a",
        "1. a",
        "2. b a",
        "> a",
        "> b a",
        ">",
        "> - a",
        "| a | b |",
        "|---|---|",
        "| b | a |",
    ])
}

fn document() -> impl Strategy<Value = String> {
    prop::collection::vec(markdown_line(), 0..7).prop_map(|lines| lines.join("\n"))
}

proptest! {
    #[test]
    fn identical_documents_have_no_changes(doc in document()) {
        prop_assert_eq!(generate_changes(&doc, &doc), vec![]);
    }

    #[test]
    fn changes_never_overlap(old in document(), new in document()) {
        let changes = generate_changes(&old, &new);
        prop_assert!(overlapping(&changes).is_none(), "{:?}", overlapping(&changes));
    }

    #[test]
    fn applied_changes_give_the_new_text(old in document(), new in document()) {
        let changes = generate_changes(&old, &new);
        prop_assert_eq!(shape(&apply_changes(&old, &changes)), shape(&new));
    }

    #[test]
    fn accepting_and_rejecting_give_both_sides(old in document(), new in document()) {
        let tracked = to_portable_annotations(&old, &generate_changes(&old, &new));
        prop_assert_eq!(shape(&strip_annotations(&tracked, true)), shape(&new), "{}", tracked);
        prop_assert_eq!(shape(&strip_annotations(&tracked, false)), shape(&old), "{}", tracked);
    }

    #[test]
    fn removed_spans_are_single_line_and_marker_free(old in document(), new in document()) {
        let tracked = to_portable_annotations(&old, &generate_changes(&old, &new));
        for segment in scan_annotations(&tracked).segments {
            let removed = match segment {
                Segment::Deletion(text) => text,
                Segment::Substitution { old, .. } => old,
                _ => continue,
            };
            prop_assert!(!removed.is_empty(), "empty span in {:?}", tracked);
            prop_assert!(!removed.contains('\n'), "multi-line span in {:?}", tracked);
            prop_assert!(ListMarker::parse(removed).is_none(), "marker inside span in {:?}", tracked);
        }
    }
}

#[derive(Debug, Clone)]
enum Action {
    Edit(usize, String),
    Insert(usize, String),
    Delete(usize),
    Move(usize, usize),
}

fn action() -> impl Strategy<Value = Action> {
    prop_oneof![
        (any::<usize>(), "[a-z ]{0,12}").prop_map(|(i, s)| Action::Edit(i, s)),
        (any::<usize>(), "[a-z]{1,8}").prop_map(|(i, s)| Action::Insert(i, s)),
        any::<usize>().prop_map(Action::Delete),
        (any::<usize>(), 0usize..5).prop_map(|(i, to)| Action::Move(i, to)),
    ]
}

fn apply(tracker: &mut ChangeTracker, action: &Action) {
    let ids: Vec<String> = tracker.current_state().iter().map(|e| e.id.clone()).collect();
    if ids.is_empty() {
        return;
    }
    let pick = |i: usize| ids[i % ids.len()].as_str();
    let meta = ElementMetadata::new(ElementType::Para);
    let _ = match action {
        Action::Edit(i, text) => tracker.edit(pick(*i), text, Some("ann"), None).map(|_| ()),
        Action::Insert(i, text) => tracker
            .insert(text, meta, InsertPosition::After(pick(*i).to_string()), None)
            .map(|_| ()),
        Action::Delete(i) => tracker.delete(pick(*i), None).map(|_| ()),
        Action::Move(i, to) => tracker.move_element(pick(*i), *to, None).map(|_| ()),
    };
}

proptest! {
    #[test]
    fn undo_then_redo_restores_state(actions in prop::collection::vec(action(), 0..12), k in 0usize..12) {
        let meta = ElementMetadata::new(ElementType::Para);
        let mut tracker = ChangeTracker::new(vec![
            Element::new("a", "Alpha", meta.clone()),
            Element::new("b", "Beta", meta.clone()),
            Element::new("c", "Gamma", meta),
        ]);
        for action in &actions {
            apply(&mut tracker, action);
        }

        let before = tracker.current_state().to_vec();
        let k = k.min(tracker.operations().len());
        for _ in 0..k {
            prop_assert!(tracker.undo());
        }
        let replayed = tracker.state_after_operations(tracker.operations().len());
        prop_assert_eq!(tracker.current_state(), replayed.as_slice());
        for _ in 0..k {
            prop_assert!(tracker.redo());
        }
        prop_assert_eq!(tracker.current_state(), before.as_slice());
    }
}
