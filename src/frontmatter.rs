//! Frontmatter primitives: split, reference collection, and keyed patching.
//!
//! Frontmatter is the leading `---`-delimited YAML block of a note. It is a
//! structured key/value store, so edits are keyed by field path rather than
//! by text offset. The note body below the closing delimiter is preserved
//! byte-for-byte by every operation here.

use serde_yaml::Value;

use crate::error::Error;
use crate::types::FrontmatterRef;

/// Collect every wikilink-valued entry from a note's frontmatter.
/// Nested mappings produce dotted keys (`meta.source`), sequences
/// indexed keys (`related.0`). Notes without frontmatter, or with
/// unparseable frontmatter, contribute nothing — a malformed foreign
/// note must not fail a whole index pass.
pub fn collect_links(content: &str) -> Vec<FrontmatterRef> {
    let Some((yaml, _)) = split(content) else {
        return Vec::new();
    };
    let Ok(root) = serde_yaml::from_str::<Value>(yaml) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    collect_links_from_value(&root, "", &mut out);
    return out;
}

/// Recursive walk over YAML values, threading the dotted key path.
fn collect_links_from_value(value: &Value, key_path: &str, out: &mut Vec<FrontmatterRef>) {
    match value {
        Value::Mapping(map) => {
            for (key, child) in map {
                let Some(name) = key.as_str() else { continue };
                let child_path = join_key(key_path, name);
                collect_links_from_value(child, &child_path, out);
            }
        },
        Value::Sequence(seq) => {
            for (idx, child) in seq.iter().enumerate() {
                let child_path = join_key(key_path, &idx.to_string());
                collect_links_from_value(child, &child_path, out);
            }
        },
        Value::String(s) => {
            if let Some(r) = parse_wikilink_value(s, key_path) {
                out.push(r);
            }
        },
        _ => {},
    }
    return;
}

/// Append a segment to a dotted key path.
fn join_key(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        return segment.to_string();
    }
    return format!("{prefix}.{segment}");
}

/// Parse a frontmatter string value as a wikilink reference.
/// Only values that are entirely a wikilink count.
fn parse_wikilink_value(value: &str, key_path: &str) -> Option<FrontmatterRef> {
    if key_path.is_empty() {
        return None;
    }
    let body = value.trim().trim_start_matches('!');
    let inner = body.strip_prefix("[[")?.strip_suffix("]]")?;
    if inner.is_empty() || inner.contains("[[") {
        return None;
    }

    let (link, display) = match inner.rsplit_once('|') {
        None => (inner, None),
        Some((link, display)) => (link, Some(display.to_string())),
    };

    return Some(FrontmatterRef {
        display,
        key: key_path.to_string(),
        link: link.to_string(),
        original: value.trim().to_string(),
    });
}

/// Replace the values at the given dotted key paths, keeping every other
/// key and the entire note body intact. Keys that no longer exist are
/// skipped. Returns the rewritten note text.
///
/// The frontmatter block is re-serialized, so incidental formatting
/// (quoting style, spacing) may change; key order is preserved.
///
/// # Errors
///
/// Returns `Error::Yaml` if the frontmatter cannot be parsed or
/// re-serialized.
pub fn patch(content: &str, updates: &[(String, String)]) -> Result<String, Error> {
    let Some((yaml, body_offset)) = split(content) else {
        return Ok(content.to_string());
    };

    let mut root: Value = serde_yaml::from_str(yaml)?;
    for (key_path, new_value) in updates {
        set_value(&mut root, key_path, new_value);
    }

    let serialized = serde_yaml::to_string(&root)?;
    let body = content.get(body_offset..).unwrap_or("");
    return Ok(format!("---\n{serialized}---\n{body}"));
}

/// Assign a string value at a dotted key path. Missing intermediate
/// keys abort the assignment; patching never invents structure.
fn set_value(root: &mut Value, key_path: &str, new_value: &str) {
    let mut current = root;
    let mut segments = key_path.split('.').peekable();

    while let Some(segment) = segments.next() {
        let is_last = segments.peek().is_none();
        let next = match current {
            Value::Mapping(map) => map
                .iter_mut()
                .find(|(key, _)| return key.as_str() == Some(segment))
                .map(|(_, value)| return value),
            Value::Sequence(seq) => segment.parse::<usize>().ok().and_then(|i| return seq.get_mut(i)),
            _ => None,
        };
        let Some(next) = next else { return };
        if is_last {
            *next = Value::String(new_value.to_string());
            return;
        }
        current = next;
    }
    return;
}

/// Split a note into its frontmatter YAML and the byte offset where the
/// body begins. The block must start at the very first line and close
/// with a `---` (or `...`) line. Returns `None` when there is none.
pub fn split(content: &str) -> Option<(&str, usize)> {
    let after_open = content.strip_prefix("---\n")?;
    let open_len = content.len().saturating_sub(after_open.len());

    let mut scanned = 0_usize;
    for line in after_open.split_inclusive('\n') {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            let yaml = after_open.get(..scanned)?;
            let body_offset = open_len.saturating_add(scanned).saturating_add(line.len());
            return Some((yaml, body_offset));
        }
        scanned = scanned.saturating_add(line.len());
    }
    return None;
}
