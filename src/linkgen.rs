//! Idiomatic reference text generation.
//!
//! Given a concrete target, the note the reference will live in, and an
//! optional subpath and display text, produce the reference text a user
//! would have written by hand. The embed-vs-plain decision here is based
//! only on the target's file type (non-markdown targets default to
//! embeds); occurrence-form preservation is the rewriter's job.

use std::path::{Component, Path};

use crate::index::VaultIndex;

/// Which reference syntax generated text uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStyle {
    /// `[display](relative/path.md#subpath)` with `%20`-encoded spaces.
    Markdown,
    /// `[[Shortest Name#subpath|display]]`.
    Wikilink,
}

/// Produce reference text for `target` as seen from `context`.
/// `subpath` keeps its leading `#` (empty for none).
pub fn generate(
    index: &VaultIndex,
    target: &Path,
    context: &Path,
    subpath: &str,
    display: Option<&str>,
    style: LinkStyle,
) -> String {
    let body = match style {
        LinkStyle::Markdown => generate_markdown(target, context, subpath, display),
        LinkStyle::Wikilink => generate_wikilink(index, target, subpath, display),
    };

    if is_markdown_note(target) {
        return body;
    }
    return format!("!{body}");
}

/// Markdown-style reference with a context-relative, space-encoded path.
fn generate_markdown(
    target: &Path,
    context: &Path,
    subpath: &str,
    display: Option<&str>,
) -> String {
    let context_dir = context.parent().unwrap_or(Path::new(""));
    let rel = relative_path(context_dir, target);
    let encoded_path = rel.replace(' ', "%20");
    let encoded_subpath = subpath.replace(' ', "%20");

    let label = match display {
        None => stem_of(target),
        Some(d) if d.is_empty() => stem_of(target),
        Some(d) => d.to_string(),
    };
    return format!("[{label}]({encoded_path}{encoded_subpath})");
}

/// Wikilink reference using the shortest unambiguous name.
fn generate_wikilink(
    index: &VaultIndex,
    target: &Path,
    subpath: &str,
    display: Option<&str>,
) -> String {
    let name = shortest_name(index, target);
    return match display {
        Some(d) if !d.is_empty() => format!("[[{name}{subpath}|{d}]]"),
        _ => format!("[[{name}{subpath}]]"),
    };
}

/// True for `.md` targets.
fn is_markdown_note(target: &Path) -> bool {
    return target.extension().is_some_and(|ext| return ext == "md");
}

/// Walk `to` relative to `from_dir`, popping common components and
/// inserting `..` for what remains of `from_dir`.
fn relative_path(from_dir: &Path, to: &Path) -> String {
    let from: Vec<Component<'_>> = from_dir.components().collect();
    let dest: Vec<Component<'_>> = to.components().collect();

    let common = from
        .iter()
        .zip(dest.iter())
        .take_while(|(a, b)| return a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    for _ in from.iter().skip(common) {
        parts.push("..".to_string());
    }
    for component in dest.iter().skip(common) {
        parts.push(component.as_os_str().to_string_lossy().to_string());
    }
    return parts.join("/");
}

/// The vault's shortest unambiguous name for a file: the bare stem for a
/// markdown note whose stem is unique, the bare file name for a unique
/// non-markdown file, and the full vault path (extension stripped for
/// notes) otherwise.
fn shortest_name(index: &VaultIndex, target: &Path) -> String {
    if is_markdown_note(target) {
        let stem = stem_of(target);
        let same_stem = index
            .files()
            .iter()
            .filter(|p| {
                return p.extension().is_some_and(|ext| return ext == "md")
                    && p.file_stem().is_some_and(|s| return s.to_string_lossy() == stem.as_str());
            })
            .count();
        if same_stem <= 1 {
            return stem;
        }
        return target.with_extension("").display().to_string();
    }

    let name = target
        .file_name()
        .map_or_else(|| return target.display().to_string(), |f| {
            return f.to_string_lossy().to_string();
        });
    let same_name = index
        .files()
        .iter()
        .filter(|p| {
            return p.file_name().is_some_and(|f| return f.to_string_lossy() == name.as_str());
        })
        .count();
    if same_name <= 1 {
        return name;
    }
    return target.display().to_string();
}

/// File stem as display fallback.
fn stem_of(target: &Path) -> String {
    return target
        .file_stem()
        .map_or_else(String::new, |s| return s.to_string_lossy().to_string());
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::vault::Vault;

    fn index_with(files: &[&str]) -> (tempfile::TempDir, VaultIndex) {
        let dir = tempfile::tempdir().unwrap();
        for path in files {
            let full = dir.path().join(path);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(full, "").unwrap();
        }
        let vault = Vault::open(dir.path()).unwrap();
        let mut index = VaultIndex::new();
        index.refresh(&vault).unwrap();
        return (dir, index);
    }

    #[test]
    fn wikilink_uses_unique_stem() {
        let (_dir, index) = index_with(&["sub/Dest.md", "Main.md"]);
        let text = generate(
            &index,
            &PathBuf::from("sub/Dest.md"),
            Path::new("Main.md"),
            "#B",
            None,
            LinkStyle::Wikilink,
        );
        assert_eq!(text, "[[Dest#B]]");
    }

    #[test]
    fn wikilink_falls_back_to_full_path_on_ambiguity() {
        let (_dir, index) = index_with(&["a/Dest.md", "b/Dest.md", "Main.md"]);
        let text = generate(
            &index,
            &PathBuf::from("b/Dest.md"),
            Path::new("Main.md"),
            "",
            None,
            LinkStyle::Wikilink,
        );
        assert_eq!(text, "[[b/Dest]]");
    }

    #[test]
    fn wikilink_carries_display_text() {
        let (_dir, index) = index_with(&["Dest.md", "Main.md"]);
        let text = generate(
            &index,
            &PathBuf::from("Dest.md"),
            Path::new("Main.md"),
            "",
            Some("label"),
            LinkStyle::Wikilink,
        );
        assert_eq!(text, "[[Dest|label]]");
    }

    #[test]
    fn non_markdown_target_defaults_to_embed() {
        let (_dir, index) = index_with(&["img/pic.png", "Main.md"]);
        let text = generate(
            &index,
            &PathBuf::from("img/pic.png"),
            Path::new("Main.md"),
            "",
            None,
            LinkStyle::Wikilink,
        );
        assert_eq!(text, "![[pic.png]]");
    }

    #[test]
    fn markdown_style_is_context_relative() {
        let (_dir, index) = index_with(&["docs/Other.md", "docs/Main.md", "Dest.md"]);
        let from_docs = generate(
            &index,
            &PathBuf::from("docs/Other.md"),
            Path::new("docs/Main.md"),
            "#h",
            Some("a"),
            LinkStyle::Markdown,
        );
        assert_eq!(from_docs, "[a](Other.md#h)");

        let from_root = generate(
            &index,
            &PathBuf::from("docs/Other.md"),
            Path::new("Dest.md"),
            "#h",
            Some("a"),
            LinkStyle::Markdown,
        );
        assert_eq!(from_root, "[a](docs/Other.md#h)");
    }

    #[test]
    fn markdown_style_encodes_spaces() {
        let (_dir, index) = index_with(&["Sub Dir/My Note.md", "Main.md"]);
        let text = generate(
            &index,
            &PathBuf::from("Sub Dir/My Note.md"),
            Path::new("Main.md"),
            "#A B",
            None,
            LinkStyle::Markdown,
        );
        assert_eq!(text, "[My Note](Sub%20Dir/My%20Note.md#A%20B)");
    }
}
