//! Range calculators: explicit selections and enclosing heading sections.

use std::path::Path;

use crate::error::Error;
use crate::extract::InFileRange;
use crate::types::{Loc, loc_at};

/// Derive the section around a cursor line: from the nearest heading
/// line at or above the cursor (or the document start when there is
/// none) to just before the next heading line below it (or the document
/// end). The end excludes the newline that precedes the next heading.
///
/// `cursor_line` is zero-based and counts the trailing phantom line of
/// a newline-terminated document, matching editor line addressing.
///
/// # Errors
///
/// Returns `Error::RangeOutOfBounds` if `cursor_line` is past the last
/// line.
pub fn heading_section_range(
    document: &Path,
    text: &str,
    cursor_line: usize,
) -> Result<InFileRange, Error> {
    let lines: Vec<&str> = text.split('\n').collect();
    if cursor_line >= lines.len() {
        return Err(Error::RangeOutOfBounds {
            limit: lines.len(),
            path: document.to_path_buf(),
            value: cursor_line,
        });
    }

    let mut starts: Vec<usize> = Vec::with_capacity(lines.len());
    let mut offset = 0_usize;
    for line in &lines {
        starts.push(offset);
        offset = offset.saturating_add(line.len()).saturating_add(1);
    }

    let current = (0..=cursor_line)
        .rev()
        .find(|&i| return lines.get(i).is_some_and(|l| return is_heading(l)));
    let next = (cursor_line.saturating_add(1)..lines.len())
        .find(|&i| return lines.get(i).is_some_and(|l| return is_heading(l)));

    let start = match current {
        None => Loc {
            col: 0,
            line: 0,
            offset: 0,
        },
        Some(i) => loc_at(text, starts.get(i).copied().unwrap_or(0)),
    };
    let end = match next {
        None => loc_at(text, text.len()),
        Some(i) => loc_at(text, starts.get(i).copied().unwrap_or(text.len()).saturating_sub(1)),
    };

    return Ok(InFileRange {
        document: document.to_path_buf(),
        end,
        start,
    });
}

/// True for ATX heading lines: one to six `#` followed by a space.
pub fn is_heading(line: &str) -> bool {
    let hashes = line.chars().take_while(|c| return *c == '#').count();
    return (1..=6).contains(&hashes) && line.chars().nth(hashes) == Some(' ');
}

/// Build a range from explicit selection offsets.
///
/// # Errors
///
/// Returns `Error::RangeOutOfBounds` for reversed offsets, offsets past
/// the end of the note, or offsets inside a multi-byte character.
pub fn selection_range(
    document: &Path,
    text: &str,
    start: usize,
    end: usize,
) -> Result<InFileRange, Error> {
    if end > text.len() {
        return Err(Error::RangeOutOfBounds {
            limit: text.len(),
            path: document.to_path_buf(),
            value: end,
        });
    }
    if start > end {
        return Err(Error::RangeOutOfBounds {
            limit: end,
            path: document.to_path_buf(),
            value: start,
        });
    }
    if !text.is_char_boundary(start) || !text.is_char_boundary(end) {
        return Err(Error::RangeOutOfBounds {
            limit: text.len(),
            path: document.to_path_buf(),
            value: start.max(end),
        });
    }

    return Ok(InFileRange {
        document: document.to_path_buf(),
        end: loc_at(text, end),
        start: loc_at(text, start),
    });
}
