use std::fmt;

use crate::error::ReviewError;

/// The five annotation kinds of the portable format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationTag {
    Insertion,
    Deletion,
    Substitution,
    Highlight,
    Comment,
}

impl AnnotationTag {
    const ALL: [AnnotationTag; 5] = [
        AnnotationTag::Insertion,
        AnnotationTag::Deletion,
        AnnotationTag::Substitution,
        AnnotationTag::Highlight,
        AnnotationTag::Comment,
    ];

    /// Separator between old and new text of a substitution.
    pub const SUBSTITUTION_SEPARATOR: &'static str = "~>";

    pub fn open(self) -> &'static str {
        match self {
            AnnotationTag::Insertion => "{++",
            AnnotationTag::Deletion => "{--",
            AnnotationTag::Substitution => "{~~",
            AnnotationTag::Highlight => "{==",
            AnnotationTag::Comment => "{>>",
        }
    }

    pub fn close(self) -> &'static str {
        match self {
            AnnotationTag::Insertion => "++}",
            AnnotationTag::Deletion => "--}",
            AnnotationTag::Substitution => "~~}",
            AnnotationTag::Highlight => "==}",
            AnnotationTag::Comment => "<<}",
        }
    }

    /// The tag whose opening delimiter starts `s`, if any.
    fn opening(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tag| s.starts_with(tag.open()))
    }
}

impl fmt::Display for AnnotationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnnotationTag::Insertion => "insertion",
            AnnotationTag::Deletion => "deletion",
            AnnotationTag::Substitution => "substitution",
            AnnotationTag::Highlight => "highlight",
            AnnotationTag::Comment => "comment",
        };
        f.write_str(name)
    }
}

/// A run of annotated text as found by [`scan_annotations`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Insertion(&'a str),
    Deletion(&'a str),
    Substitution { old: &'a str, new: &'a str },
    /// Highlighted text, with the comment that directly follows it.
    Highlight {
        text: &'a str,
        comment: Option<&'a str>,
    },
    Comment(&'a str),
}

/// An opening delimiter with no matching closer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unterminated {
    pub offset: usize,
    pub tag: AnnotationTag,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationScan<'a> {
    pub segments: Vec<Segment<'a>>,
    /// Unterminated openers, left in the text segments as literal text.
    pub unterminated: Vec<Unterminated>,
}

/// Splits annotated text into plain and annotated segments.
///
/// Each opener pairs with the nearest following closer of the same kind;
/// annotations do not nest. An opener without a closer is kept as literal
/// text and reported in [`AnnotationScan::unterminated`].
pub fn scan_annotations(text: &str) -> AnnotationScan<'_> {
    let mut scan = AnnotationScan::default();
    let mut plain_start = 0;
    let mut i = 0;

    while let Some(rel) = text[i..].find('{') {
        let at = i + rel;
        i = at + 1;
        let Some(tag) = AnnotationTag::opening(&text[at..]) else {
            continue;
        };
        let body_start = at + tag.open().len();
        let Some(close) = text[body_start..].find(tag.close()) else {
            scan.unterminated.push(Unterminated { offset: at, tag });
            continue;
        };
        let body = &text[body_start..body_start + close];
        let mut end = body_start + close + tag.close().len();

        let segment = match tag {
            AnnotationTag::Insertion => Segment::Insertion(body),
            AnnotationTag::Deletion => Segment::Deletion(body),
            AnnotationTag::Comment => Segment::Comment(body),
            AnnotationTag::Substitution => {
                match body.split_once(AnnotationTag::SUBSTITUTION_SEPARATOR) {
                    Some((old, new)) => Segment::Substitution { old, new },
                    None => {
                        scan.unterminated.push(Unterminated { offset: at, tag });
                        continue;
                    }
                }
            }
            AnnotationTag::Highlight => {
                let comment = trailing_comment(&text[end..]);
                if let Some((comment, len)) = comment {
                    end += len;
                    Segment::Highlight {
                        text: body,
                        comment: Some(comment),
                    }
                } else {
                    Segment::Highlight {
                        text: body,
                        comment: None,
                    }
                }
            }
        };

        if at > plain_start {
            scan.segments.push(Segment::Text(&text[plain_start..at]));
        }
        scan.segments.push(segment);
        plain_start = end;
        i = end;
    }

    if plain_start < text.len() {
        scan.segments.push(Segment::Text(&text[plain_start..]));
    }
    scan
}

/// A comment directly attached to a highlight: its body and total length.
fn trailing_comment(rest: &str) -> Option<(&str, usize)> {
    let open = AnnotationTag::Comment.open();
    let close = AnnotationTag::Comment.close();
    let body = rest.strip_prefix(open)?;
    let len = body.find(close)?;
    Some((&body[..len], open.len() + len + close.len()))
}

/// Reports the first unterminated annotation in `text`.
pub fn validate_annotations(text: &str) -> Result<(), ReviewError> {
    match scan_annotations(text).unterminated.first() {
        Some(bad) => Err(ReviewError::MalformedAnnotation {
            offset: bad.offset,
            tag: bad.tag,
        }),
        None => Ok(()),
    }
}
