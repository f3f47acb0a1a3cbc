//! Vault-wide structural index: per-note caches, link-path resolution,
//! subpath resolution, and backlink queries.

use std::collections::{BTreeSet, HashMap};
use std::path::{Component, Path, PathBuf};

use crate::error::Error;
use crate::scanner::Scanner;
use crate::types::{HeadingCache, NoteCache, Pos, Reference, SubpathResult};
use crate::vault::Vault;

/// Cached structure for every note in the vault, plus the file listing
/// used for link-path resolution.
///
/// The index never watches the filesystem; callers that may hold stale
/// state must run [`VaultIndex::refresh`] and only trust cached links
/// after it returns. The refresh is a full synchronous pass, so its
/// return *is* the completion signal.
#[derive(Debug)]
pub struct VaultIndex {
    caches: HashMap<PathBuf, NoteCache>,
    files: BTreeSet<PathBuf>,
    scanner: Scanner,
}

impl Default for VaultIndex {
    fn default() -> Self {
        return Self::new();
    }
}

impl VaultIndex {
    /// An empty index. Useless until the first `refresh`.
    pub fn new() -> Self {
        return Self {
            caches: HashMap::new(),
            files: BTreeSet::new(),
            scanner: Scanner::new(),
        };
    }

    /// Every note with a reference resolving to `target`, grouped by the
    /// referencing note. Includes the target note's own self-references;
    /// callers decide whether to skip those.
    pub fn backlinks_for(&self, target: &Path) -> HashMap<PathBuf, Vec<Reference>> {
        let mut grouped: HashMap<PathBuf, Vec<Reference>> = HashMap::new();

        for (path, cache) in &self.caches {
            for link in cache.links.iter().chain(cache.embeds.iter()) {
                let (linkpath, _) = parse_linktext(&link.link);
                if self.resolve_linkpath(linkpath, path).as_deref() == Some(target) {
                    grouped
                        .entry(path.clone())
                        .or_default()
                        .push(Reference::Inline(link.clone()));
                }
            }
            for link in &cache.frontmatter_links {
                let (linkpath, _) = parse_linktext(&link.link);
                if self.resolve_linkpath(linkpath, path).as_deref() == Some(target) {
                    grouped
                        .entry(path.clone())
                        .or_default()
                        .push(Reference::Frontmatter(link.clone()));
                }
            }
        }
        return grouped;
    }

    /// The structural cache for one note, if the note was present during
    /// the last refresh.
    pub fn cache(&self, note: &Path) -> Option<&NoteCache> {
        return self.caches.get(note);
    }

    /// All files seen by the last refresh.
    pub fn files(&self) -> &BTreeSet<PathBuf> {
        return &self.files;
    }

    /// Re-scan the whole vault. Replaces the file listing and every note
    /// cache; when this returns, the index reflects the vault as it was
    /// read during this pass.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if a listed note cannot be read, or
    /// `Error::ParseFailed` if a note's structure cannot be parsed.
    pub fn refresh(&mut self, vault: &Vault) -> Result<(), Error> {
        let files: BTreeSet<PathBuf> = vault.list_files().into_iter().collect();
        let mut caches = HashMap::new();

        for path in &files {
            if path.extension().is_some_and(|ext| return ext == "md") {
                let content = vault.read_note(path)?;
                caches.insert(path.clone(), self.scanner.scan_note(path, &content)?);
            }
        }

        self.caches = caches;
        self.files = files;
        return Ok(());
    }

    /// Resolve a link-path string relative to the note containing it.
    ///
    /// Tried in order: the exact vault path (with `.md` completion), the
    /// path relative to the context note's directory (`./`/`../`
    /// collapsed), then a unique-basename lookup where the shortest path
    /// wins. An empty link path is the context note itself (`[[#Heading]]`).
    /// `None` is a legitimate outcome, not an error.
    pub fn resolve_linkpath(&self, linkpath: &str, context: &Path) -> Option<PathBuf> {
        let trimmed = linkpath.trim();
        if trimmed.is_empty() {
            return Some(context.to_path_buf());
        }

        let direct = PathBuf::from(trimmed);
        if self.files.contains(&direct) {
            return Some(direct);
        }
        let with_md = PathBuf::from(format!("{trimmed}.md"));
        if self.files.contains(&with_md) {
            return Some(with_md);
        }

        let context_dir = context.parent().unwrap_or(Path::new(""));
        let joined = normalize_path(&context_dir.join(trimmed));
        if self.files.contains(&joined) {
            return Some(joined);
        }
        let joined_md = PathBuf::from(format!("{}.md", joined.display()));
        if self.files.contains(&joined_md) {
            return Some(joined_md);
        }

        if trimmed.contains('/') {
            return None;
        }
        return self.resolve_by_basename(trimmed);
    }

    /// Shortest-path basename lookup. Names with an extension match the
    /// file name exactly; bare names match markdown note stems.
    fn resolve_by_basename(&self, name: &str) -> Option<PathBuf> {
        let wants_extension = name.contains('.');
        let mut candidates: Vec<&PathBuf> = self
            .files
            .iter()
            .filter(|p| {
                if wants_extension {
                    return p.file_name().is_some_and(|f| return f == name);
                }
                return p.extension().is_some_and(|ext| return ext == "md")
                    && p.file_stem().is_some_and(|stem| return stem == name);
            })
            .collect();

        candidates.sort_by_key(|p| return (p.as_os_str().len(), (*p).clone()));
        return candidates.first().map(|p| return (*p).clone());
    }

    /// Resolve a subpath against a note's cache from the last refresh.
    pub fn resolve_subpath(&self, note: &Path, subpath: &str) -> Option<SubpathResult> {
        return resolve_subpath_in(self.cache(note)?, subpath);
    }
}

/// Collapse `.` and `..` components without touching the filesystem.
/// Preserves leading `..` when there is nothing left to pop.
fn normalize_path(path: &Path) -> PathBuf {
    let mut components: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {},
            Component::ParentDir => {
                let can_pop = matches!(
                    components.last(),
                    Some(c) if !matches!(c, Component::ParentDir)
                );
                if can_pop {
                    components.pop();
                } else {
                    components.push(component);
                }
            },
            other => components.push(other),
        }
    }
    return components.iter().collect();
}

/// Split a link target into its path and subpath parts. The subpath
/// keeps its leading `#`; an absent subpath is the empty string.
pub fn parse_linktext(link: &str) -> (&str, &str) {
    return match link.find('#') {
        None => (link, ""),
        Some(i) => (
            link.get(..i).unwrap_or(link),
            link.get(i..).unwrap_or(""),
        ),
    };
}

/// Resolve a `#Heading`, `#A#B` chain, or `#^block` subpath against a
/// specific cache snapshot. Heading chains match in document order,
/// case-insensitively, with each chained segment nested deeper than the
/// one before it; the result carries the *last* matched heading's own
/// position.
pub fn resolve_subpath_in(cache: &NoteCache, subpath: &str) -> Option<SubpathResult> {
    let rest = subpath.strip_prefix('#').unwrap_or(subpath);
    if rest.is_empty() {
        return None;
    }

    if let Some(block_id) = rest.strip_prefix('^') {
        let position = cache
            .blocks
            .get(block_id)
            .or_else(|| return cache.blocks.get(&block_id.to_lowercase()))?;
        return Some(SubpathResult::Block {
            position: position.clone(),
        });
    }

    let mut cursor = 0_usize;
    let mut level_floor = 0_usize;
    let mut found: Option<&HeadingCache> = None;
    for segment in rest.split('#') {
        let wanted = segment.trim();
        let matched = cache
            .headings
            .iter()
            .enumerate()
            .skip(cursor)
            .find(|(_, h)| {
                return h.level > level_floor && h.heading.eq_ignore_ascii_case(wanted);
            })?;
        level_floor = matched.1.level;
        found = Some(matched.1);
        cursor = matched.0.saturating_add(1);
    }

    return found.map(|heading| {
        return SubpathResult::Heading {
            position: heading.position.clone(),
        };
    });
}

/// True iff the reference's *target* (not its occurrence) lies inside
/// the given range: a heading whose own line is contained, or a block
/// whose anchor line is contained.
pub fn target_falls_in_range(result: &SubpathResult, range: &Pos) -> bool {
    return match result {
        SubpathResult::Block { position } => range.contains(position),
        SubpathResult::Heading { position } => range.contains(position),
    };
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use super::*;

    fn vault_with(files: &[(&str, &str)]) -> (tempfile::TempDir, Vault, VaultIndex) {
        let dir = tempfile::tempdir().unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(full, content).unwrap();
        }
        let vault = Vault::open(dir.path()).unwrap();
        let mut index = VaultIndex::new();
        index.refresh(&vault).unwrap();
        return (dir, vault, index);
    }

    #[test]
    fn parse_linktext_splits_at_first_hash() {
        assert_eq!(parse_linktext("Note#A#B"), ("Note", "#A#B"));
        assert_eq!(parse_linktext("Note"), ("Note", ""));
        assert_eq!(parse_linktext("#A"), ("", "#A"));
    }

    #[test]
    fn resolves_by_unique_stem() {
        let (_dir, _vault, index) = vault_with(&[("sub/Other.md", ""), ("Main.md", "")]);
        assert_eq!(
            index.resolve_linkpath("Other", Path::new("Main.md")),
            Some(PathBuf::from("sub/Other.md"))
        );
    }

    #[test]
    fn ambiguous_stem_prefers_shortest_path() {
        let (_dir, _vault, index) =
            vault_with(&[("Other.md", ""), ("sub/Other.md", ""), ("Main.md", "")]);
        assert_eq!(
            index.resolve_linkpath("Other", Path::new("Main.md")),
            Some(PathBuf::from("Other.md"))
        );
    }

    #[test]
    fn resolves_vault_path_and_md_completion() {
        let (_dir, _vault, index) = vault_with(&[("sub/Other.md", "")]);
        assert_eq!(
            index.resolve_linkpath("sub/Other", Path::new("Main.md")),
            Some(PathBuf::from("sub/Other.md"))
        );
    }

    #[test]
    fn resolves_relative_to_context() {
        let (_dir, _vault, index) = vault_with(&[("docs/Other.md", ""), ("docs/Main.md", "")]);
        assert_eq!(
            index.resolve_linkpath("./Other", Path::new("docs/Main.md")),
            Some(PathBuf::from("docs/Other.md"))
        );
    }

    #[test]
    fn empty_linkpath_is_the_context_note() {
        let (_dir, _vault, index) = vault_with(&[("Main.md", "")]);
        assert_eq!(
            index.resolve_linkpath("", Path::new("Main.md")),
            Some(PathBuf::from("Main.md"))
        );
    }

    #[test]
    fn unresolved_linkpath_is_none() {
        let (_dir, _vault, index) = vault_with(&[("Main.md", "")]);
        assert_eq!(index.resolve_linkpath("Nowhere", Path::new("Main.md")), None);
    }

    #[test]
    fn resolves_heading_chain_in_document_order() {
        let content = "# A\n## B\ntext\n# C\n## B\n";
        let (_dir, _vault, index) = vault_with(&[("N.md", content)]);
        let cache = index.cache(Path::new("N.md")).unwrap();

        let first = resolve_subpath_in(cache, "#B").unwrap();
        let SubpathResult::Heading { position } = first else {
            panic!("expected heading");
        };
        assert_eq!(content.get(position.start.offset..position.end.offset), Some("## B"));

        let chained = resolve_subpath_in(cache, "#C#B").unwrap();
        let SubpathResult::Heading { position } = chained else {
            panic!("expected heading");
        };
        assert_eq!(position.start.offset, content.rfind("## B").unwrap());
    }

    #[test]
    fn resolves_block_subpath() {
        let (_dir, _vault, index) = vault_with(&[("N.md", "para ^b1\n")]);
        let cache = index.cache(Path::new("N.md")).unwrap();
        assert!(matches!(
            resolve_subpath_in(cache, "#^b1"),
            Some(SubpathResult::Block { .. })
        ));
        assert_eq!(resolve_subpath_in(cache, "#^nope"), None);
    }

    #[test]
    fn backlinks_group_by_referencing_note() {
        let (_dir, _vault, index) = vault_with(&[
            ("Source.md", "# B\n"),
            ("X.md", "see [[Source#B]]\n"),
            ("Y.md", "---\nrelated: \"[[Source]]\"\n---\n"),
            ("Z.md", "nothing here\n"),
        ]);
        let grouped = index.backlinks_for(Path::new("Source.md"));
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped.get(Path::new("X.md")).unwrap().len(), 1);
        assert!(matches!(
            grouped.get(Path::new("Y.md")).unwrap()[0],
            Reference::Frontmatter(_)
        ));
    }
}
