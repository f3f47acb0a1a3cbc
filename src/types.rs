//! Core domain types: locations, ranges, and link references.

use std::collections::HashMap;

/// A reference stored in a note's YAML frontmatter.
/// Identified by its key path, not by a text position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontmatterRef {
    /// Display text parsed from the value, if any.
    pub display: Option<String>,
    /// Dotted key path inside the frontmatter (`related`, `refs.0`).
    pub key: String,
    /// Link target text: path plus optional `#subpath`.
    pub link: String,
    /// The raw frontmatter value, e.g. `[[Note#Heading|label]]`.
    pub original: String,
}

/// A heading collected from a note's structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingCache {
    /// Heading text with markers stripped and whitespace trimmed.
    pub heading: String,
    /// ATX level, 1 through 6.
    pub level: usize,
    /// The heading's own line, excluding the trailing newline.
    pub position: Pos,
}

/// A located link or embed occurrence in a note's body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineRef {
    /// Display text captured outside the link target (markdown-style links).
    pub display: Option<String>,
    /// Link target text: path plus optional `#subpath`.
    pub link: String,
    /// The raw matched text, e.g. `![[Note#Heading]]` or `[label](Note.md)`.
    pub original: String,
    /// Absolute position of `original` in the note text.
    pub position: Pos,
}

/// A point in a note. `offset` is the authoritative absolute byte index;
/// `line` and `col` are derived and only used for editor interop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Loc {
    /// Zero-based byte column within the line.
    pub col: usize,
    /// Zero-based line number.
    pub line: usize,
    /// Absolute byte offset into the note text.
    pub offset: usize,
}

/// Everything the scanner extracts from one note.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteCache {
    /// Block anchors (`^id` at end of line) keyed by id.
    pub blocks: HashMap<String, Pos>,
    /// Embed occurrences (leading `!`).
    pub embeds: Vec<InlineRef>,
    /// References encoded in YAML frontmatter values.
    pub frontmatter_links: Vec<FrontmatterRef>,
    /// ATX headings in document order.
    pub headings: Vec<HeadingCache>,
    /// Plain link occurrences.
    pub links: Vec<InlineRef>,
}

/// A half-open range of note text. Compared only by `.offset`;
/// invariant: `start.offset <= end.offset`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pos {
    /// Exclusive end of the range.
    pub end: Loc,
    /// Inclusive start of the range.
    pub start: Loc,
}

impl Pos {
    /// Boundary-inclusive containment: a range ending exactly at
    /// `self.end` still counts as contained.
    pub fn contains(&self, inner: &Pos) -> bool {
        return self.start.offset <= inner.start.offset && inner.end.offset <= self.end.offset;
    }

    /// Build a range from two byte offsets, deriving line/col from the text.
    pub fn from_offsets(text: &str, start: usize, end: usize) -> Pos {
        return Pos {
            end: loc_at(text, end),
            start: loc_at(text, start),
        };
    }

    /// True iff the two ranges share at least one boundary or byte.
    pub fn overlaps(&self, other: &Pos) -> bool {
        return self.start.offset <= other.end.offset && other.start.offset <= self.end.offset;
    }
}

/// A link or embed occurrence, inline or frontmatter-encoded.
/// The encoding is decided once at ingestion and never re-sniffed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// Encoded as a YAML frontmatter value, identified by key.
    Frontmatter(FrontmatterRef),
    /// Encoded in the note body, identified by position.
    Inline(InlineRef),
}

impl Reference {
    /// Display text of the occurrence. For wikilinks this is the text
    /// after the last `|` and before the closing `]]`; otherwise the
    /// reference's own display field.
    pub fn display_text(&self) -> Option<String> {
        if self.is_wikilink() {
            let body = self.original().trim_start_matches('!');
            let inner = body.strip_prefix("[[").and_then(|s| return s.strip_suffix("]]"))?;
            let bar = inner.rfind('|')?;
            return inner.get(bar.saturating_add(1)..).map(String::from);
        }
        return match self {
            Reference::Frontmatter(r) => r.display.clone(),
            Reference::Inline(r) => r.display.clone(),
        };
    }

    /// True iff the occurrence is an embed (raw text starts with `!`).
    pub fn is_embed(&self) -> bool {
        return self.original().starts_with('!');
    }

    /// True iff the occurrence uses bracket (`[[...]]`) form.
    pub fn is_wikilink(&self) -> bool {
        return self.original().trim_start_matches('!').starts_with("[[");
    }

    /// Link target text: path plus optional `#subpath`.
    pub fn link(&self) -> &str {
        return match self {
            Reference::Frontmatter(r) => &r.link,
            Reference::Inline(r) => &r.link,
        };
    }

    /// The raw occurrence text.
    pub fn original(&self) -> &str {
        return match self {
            Reference::Frontmatter(r) => &r.original,
            Reference::Inline(r) => &r.original,
        };
    }
}

/// Where a reference's subpath landed inside the target note.
/// Used to test whether the *target* of a reference, not its
/// occurrence, lies inside a moved range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubpathResult {
    /// Resolved to a block anchor; carries the anchor line's position.
    Block {
        /// The line carrying the `^id` anchor.
        position: Pos,
    },
    /// Resolved to a heading; carries the heading's own line position.
    Heading {
        /// The heading line itself, not the section under it.
        position: Pos,
    },
}

/// Derive the full location of a byte offset. Offsets past the end of
/// the text are clamped to the end.
pub fn loc_at(text: &str, offset: usize) -> Loc {
    let clamped = offset.min(text.len());
    let prefix = text.get(..clamped).unwrap_or(text);
    let line_start = prefix.rfind('\n').map_or(0, |i| return i.saturating_add(1));
    return Loc {
        col: clamped.saturating_sub(line_start),
        line: prefix.matches('\n').count(),
        offset: clamped,
    };
}

/// Replace the span `[pos.start.offset, pos.end.offset)` of `text` with
/// `replacement`. Pure; callers applying several splices must go in
/// descending-offset order so earlier offsets stay valid.
pub fn splice(text: &str, pos: &Pos, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len().saturating_add(replacement.len()));
    out.push_str(text.get(..pos.start.offset).unwrap_or(text));
    out.push_str(replacement);
    out.push_str(text.get(pos.end.offset..).unwrap_or(""));
    return out;
}
