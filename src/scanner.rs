//! Per-note structure extraction: links, embeds, headings, block anchors,
//! and frontmatter references.

use std::collections::HashMap;
use std::path::Path;

use regex::Regex;
use tree_sitter::{Node, Parser};

use crate::error::Error;
use crate::frontmatter;
use crate::types::{HeadingCache, InlineRef, NoteCache, Pos};

/// Compiled patterns for inline reference extraction. Built once and
/// reused across the whole index pass.
#[derive(Debug)]
pub struct Scanner {
    /// `[display](target)` and `![display](target)` occurrences.
    markdown_link: Regex,
    /// `[[target|display]]` and `![[target|display]]` occurrences.
    wikilink: Regex,
}

impl Default for Scanner {
    fn default() -> Self {
        return Self::new();
    }
}

impl Scanner {
    /// Compile the reference patterns.
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded patterns are invalid (compile-time invariant).
    pub fn new() -> Self {
        return Self {
            markdown_link: Regex::new(r"(!?)\[([^\[\]]*)\]\(([^()]*)\)").expect("valid regex"),
            wikilink: Regex::new(r"(!?)\[\[([^\[\]]+)\]\]").expect("valid regex"),
        };
    }

    /// Extract inline links and embeds from the note body. The body starts
    /// at `body_offset` so frontmatter values never produce positioned
    /// references; positions are absolute into the full note text.
    fn collect_inline_refs(
        &self,
        content: &str,
        body_offset: usize,
    ) -> (Vec<InlineRef>, Vec<InlineRef>) {
        let body = content.get(body_offset..).unwrap_or("");
        let mut links: Vec<InlineRef> = Vec::new();
        let mut embeds: Vec<InlineRef> = Vec::new();
        let mut wiki_spans: Vec<(usize, usize)> = Vec::new();

        for cap in self.wikilink.captures_iter(body) {
            let Some(whole) = cap.get(0) else { continue };
            let Some(inner) = cap.get(2).map(|m| return m.as_str()) else {
                continue;
            };
            let target = match inner.split_once('|') {
                None => inner,
                Some((target, _display)) => target,
            };
            wiki_spans.push((whole.start(), whole.end()));

            let reference = InlineRef {
                display: None,
                link: target.to_string(),
                original: whole.as_str().to_string(),
                position: Pos::from_offsets(
                    content,
                    body_offset.saturating_add(whole.start()),
                    body_offset.saturating_add(whole.end()),
                ),
            };
            if cap.get(1).is_some_and(|m| return m.as_str() == "!") {
                embeds.push(reference);
            } else {
                links.push(reference);
            }
        }

        for cap in self.markdown_link.captures_iter(body) {
            let Some(whole) = cap.get(0) else { continue };
            let inside_wikilink = wiki_spans
                .iter()
                .any(|&(start, end)| return whole.start() < end && start < whole.end());
            if inside_wikilink {
                continue;
            }

            let Some(raw_target) = cap.get(3).map(|m| return m.as_str()) else {
                continue;
            };
            if raw_target.is_empty() || is_external_target(raw_target) {
                continue;
            }

            let display = cap
                .get(2)
                .map(|m| return m.as_str())
                .filter(|s| return !s.is_empty())
                .map(String::from);

            let reference = InlineRef {
                display,
                link: raw_target.replace("%20", " "),
                original: whole.as_str().to_string(),
                position: Pos::from_offsets(
                    content,
                    body_offset.saturating_add(whole.start()),
                    body_offset.saturating_add(whole.end()),
                ),
            };
            if cap.get(1).is_some_and(|m| return m.as_str() == "!") {
                embeds.push(reference);
            } else {
                links.push(reference);
            }
        }

        links.sort_by_key(|r| return r.position.start.offset);
        embeds.sort_by_key(|r| return r.position.start.offset);
        return (links, embeds);
    }

    /// Build the full structural cache for one note.
    ///
    /// # Errors
    ///
    /// Returns `Error::ParseFailed` if tree-sitter cannot parse the note.
    pub fn scan_note(&self, path: &Path, content: &str) -> Result<NoteCache, Error> {
        let body_offset = frontmatter::split(content).map_or(0, |(_, offset)| return offset);
        let (links, embeds) = self.collect_inline_refs(content, body_offset);

        let mut headings = collect_headings(path, content)?;
        headings.retain(|h| return h.position.start.offset >= body_offset);

        return Ok(NoteCache {
            blocks: collect_blocks(content),
            embeds,
            frontmatter_links: frontmatter::collect_links(content),
            headings,
            links,
        });
    }
}

/// Scan lines for trailing `^id` block anchors. The anchor's position is
/// the line carrying it, excluding trailing whitespace.
fn collect_blocks(content: &str) -> HashMap<String, Pos> {
    let mut blocks = HashMap::new();
    let mut line_start = 0_usize;

    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_end();
        if let Some(id) = parse_block_anchor(trimmed) {
            let position = Pos::from_offsets(
                content,
                line_start,
                line_start.saturating_add(trimmed.len()),
            );
            blocks.insert(id, position);
        }
        line_start = line_start.saturating_add(line.len());
    }
    return blocks;
}

/// Walk the markdown tree and collect every ATX heading with its own
/// line position.
///
/// # Errors
///
/// Returns `Error::ParseFailed` if the language cannot be set or parsing
/// fails.
fn collect_headings(path: &Path, content: &str) -> Result<Vec<HeadingCache>, Error> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_md::LANGUAGE.into())
        .map_err(|e| {
            return Error::ParseFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            };
        })?;

    let tree = parser.parse(content, None).ok_or_else(|| {
        return Error::ParseFailed {
            path: path.to_path_buf(),
            reason: "tree-sitter returned None".to_string(),
        };
    })?;

    let mut headings = Vec::new();
    walk_heading_nodes(tree.root_node(), content, &mut headings);
    return Ok(headings);
}

/// Build a `HeadingCache` from an `atx_heading` node. The position spans
/// the heading line only, newline excluded.
fn heading_from_node(node: Node<'_>, content: &str) -> Option<HeadingCache> {
    let start = node.start_byte();
    let rest = content.get(start..)?;
    let line_len = rest.find('\n').unwrap_or(rest.len());
    let line = rest.get(..line_len)?;

    let level = line.chars().take_while(|c| return *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }

    return Some(HeadingCache {
        heading: line.trim_start_matches('#').trim().to_string(),
        level,
        position: Pos::from_offsets(content, start, start.saturating_add(line_len)),
    });
}

/// True for link targets that leave the vault entirely.
fn is_external_target(target: &str) -> bool {
    return target.contains("://") || target.starts_with("mailto:");
}

/// Parse a trailing `^id` anchor from a trimmed line. The anchor must be
/// the whole line or preceded by a space, and the id must be
/// alphanumeric-or-hyphen.
fn parse_block_anchor(trimmed: &str) -> Option<String> {
    let caret = trimmed.rfind('^')?;
    let id = trimmed.get(caret.saturating_add(1)..)?;
    if id.is_empty() || !id.chars().all(|c| return c.is_ascii_alphanumeric() || c == '-') {
        return None;
    }
    let boundary_ok = caret == 0
        || trimmed
            .as_bytes()
            .get(caret.saturating_sub(1))
            .is_some_and(|b| return *b == b' ');
    if !boundary_ok {
        return None;
    }
    return Some(id.to_string());
}

/// Recursive document-order walk collecting `atx_heading` nodes.
fn walk_heading_nodes(node: Node<'_>, content: &str, headings: &mut Vec<HeadingCache>) {
    if node.kind() == "atx_heading" {
        if let Some(h) = heading_from_node(node, content) {
            headings.push(h);
        }
        return;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_heading_nodes(child, content, headings);
    }
}
