//! Reference rewriting: repointing references at a new target, and
//! relocating references that travel with extracted text.

use std::path::{Path, PathBuf};

use crate::index::{self, VaultIndex};
use crate::linkgen::{self, LinkStyle};
use crate::types::{Pos, Reference, SubpathResult};

/// A reference's target, fully resolved through the index.
pub struct ResolvedLink {
    /// The path component of the link target text.
    pub linkpath: String,
    /// The subpath component, leading `#` kept (empty for none).
    pub subpath: String,
    /// Where the subpath landed inside the target, when it did.
    pub subpath_result: Option<SubpathResult>,
    /// The concrete note the link path resolved to, if any.
    pub target: Option<PathBuf>,
}

/// Force generated reference text to the occurrence's original form.
/// The generator picks embed-vs-plain from the target's file type, which
/// may disagree with how the occurrence was written; the occurrence wins.
pub fn align_embed_marker(text: String, embed: bool) -> String {
    if embed && !text.starts_with('!') {
        return format!("!{text}");
    }
    if !embed && text.starts_with('!') {
        return text.get(1..).unwrap_or("").to_string();
    }
    return text;
}

/// Resolve a reference's textual target from its containing note.
pub fn resolve_reference(
    index: &VaultIndex,
    reference: &Reference,
    context: &Path,
) -> ResolvedLink {
    let (linkpath, subpath) = index::parse_linktext(reference.link());
    let target = index.resolve_linkpath(linkpath, context);
    let subpath_result = target
        .as_deref()
        .and_then(|t| return index.resolve_subpath(t, subpath));

    return ResolvedLink {
        linkpath: linkpath.to_string(),
        subpath: subpath.to_string(),
        subpath_result,
        target,
    };
}

/// Rewrite a reference whose containing note moves from `source_note`
/// into `new_context` (the reference travels with the extracted text).
///
/// Returns `None` when no rewrite should happen: the target is
/// unresolved (left as literal text), or the link is a self-reference
/// into the moved range itself — its resolution after the move is
/// ambiguous, so it is deliberately left untouched.
pub fn rewrite_source(
    index: &VaultIndex,
    reference: &Reference,
    source_note: &Path,
    range: &Pos,
    new_context: &Path,
    style: LinkStyle,
) -> Option<String> {
    let resolved = resolve_reference(index, reference, source_note);
    let target = resolved.target?;

    if target == source_note
        && resolved
            .subpath_result
            .as_ref()
            .is_some_and(|r| return index::target_falls_in_range(r, range))
    {
        return None;
    }

    let display = reference.display_text();
    let generated = linkgen::generate(
        index,
        &target,
        new_context,
        &resolved.subpath,
        display.as_deref(),
        style,
    );
    return Some(align_embed_marker(generated, reference.is_embed()));
}

/// Rewrite a reference to point at `new_target`, keeping its subpath,
/// display text, and embed/plain form. `context` is the note containing
/// the reference.
pub fn rewrite_target(
    index: &VaultIndex,
    reference: &Reference,
    new_target: &Path,
    context: &Path,
    style: LinkStyle,
) -> String {
    let (_, subpath) = index::parse_linktext(reference.link());
    let display = reference.display_text();
    let generated = linkgen::generate(
        index,
        new_target,
        context,
        subpath,
        display.as_deref(),
        style,
    );
    return align_embed_marker(generated, reference.is_embed());
}
