//! Extraction engine: move a contiguous text range from one note to
//! another, rewriting every reference that would otherwise break.
//!
//! One task is one linear pipeline of four ordered phases:
//!
//! 1. compute the extracted content, repointing the links that travel
//!    with it;
//! 2. edit the source note (frontmatter patch + one batched content
//!    splice);
//! 3. update backlinks in every other note, concurrently;
//! 4. append the payload to the destination.
//!
//! A failure in any phase aborts the remaining phases. There is no
//! compensating rollback: edits already applied stay applied, and the
//! error surfaces to the caller as a single notification.

use std::path::{Path, PathBuf};

use crate::config::{Config, ResolvedReplacement};
use crate::error::Error;
use crate::frontmatter;
use crate::index::{self, VaultIndex};
use crate::linkgen;
use crate::rewrite;
use crate::types::{FrontmatterRef, InlineRef, Loc, NoteCache, Pos, Reference, splice};
use crate::vault::Vault;

/// A contiguous range inside one note.
#[derive(Debug, Clone)]
pub struct InFileRange {
    /// Vault-relative path of the note containing the range.
    pub document: PathBuf,
    /// Exclusive end of the range.
    pub end: Loc,
    /// Inclusive start of the range.
    pub start: Loc,
}

/// Counters reported back to the command layer after a completed
/// extraction.
#[derive(Debug, Default)]
pub struct ExtractionOutcome {
    /// Other notes whose backlinks were rewritten in phase 3.
    pub backlink_notes: usize,
    /// Size of the payload appended to the destination.
    pub extracted_bytes: usize,
    /// Total references rewritten across all phases.
    pub rewritten_references: usize,
}

/// What to move and where. Created once per invocation and immutable
/// for the duration of one extraction.
#[derive(Debug, Clone)]
pub struct ExtractionSpec {
    /// The note receiving the extracted content.
    pub destination: PathBuf,
    /// The span being moved out of the source note.
    pub source_range: InFileRange,
}

/// One extraction in flight. Collaborators are injected, never reached
/// for ambiently, so tests can substitute throwaway vaults.
#[derive(Debug)]
pub struct ExtractionTask<'a> {
    config: &'a Config,
    index: &'a mut VaultIndex,
    spec: ExtractionSpec,
    /// Source note structure snapshotted right after the phase-1 index
    /// refresh. All later sub-target tests use this snapshot: phase 2
    /// rewrites the source note on disk, but queued edits refer to the
    /// pre-edit offsets.
    src_cache: Option<NoteCache>,
    vault: &'a Vault,
}

/// Which queues a backlink update pass may apply.
#[derive(Clone, Copy)]
struct UpdateScope {
    content: bool,
    frontmatter: bool,
}

impl UpdateScope {
    /// Both queues: the normal phase-3 pass.
    const ALL: UpdateScope = UpdateScope {
        content: true,
        frontmatter: true,
    };
    /// Frontmatter queue only: phase 2a on the source note, whose
    /// content edits are batched separately.
    const FRONTMATTER_ONLY: UpdateScope = UpdateScope {
        content: false,
        frontmatter: true,
    };
}

impl<'a> ExtractionTask<'a> {
    /// Build a task, failing fast — before any mutation — when the
    /// destination is not a markdown note.
    ///
    /// # Errors
    ///
    /// Returns `Error::NonMarkdownDestination` for a non-`.md` destination.
    pub fn new(
        vault: &'a Vault,
        index: &'a mut VaultIndex,
        config: &'a Config,
        spec: ExtractionSpec,
    ) -> Result<Self, Error> {
        if !spec.destination.extension().is_some_and(|ext| return ext == "md") {
            return Err(Error::NonMarkdownDestination {
                path: spec.destination.clone(),
            });
        }
        return Ok(Self {
            config,
            index,
            spec,
            src_cache: None,
            vault,
        });
    }

    /// Run all four phases in order.
    ///
    /// # Errors
    ///
    /// Returns the first phase error; completed phases are not rolled back.
    pub fn process(mut self) -> Result<ExtractionOutcome, Error> {
        let mut outcome = ExtractionOutcome::default();

        let extracted = self.compute_extracted_content(&mut outcome)?;
        outcome.extracted_bytes = extracted.len();

        self.update_source_note(&mut outcome)?;
        self.update_backlinks_in_other_notes(&mut outcome)?;
        self.append_to_destination(&extracted)?;

        return Ok(outcome);
    }

    /// Phase 4: append the payload to the destination, separated from
    /// existing trailing content by exactly one blank line.
    fn append_to_destination(&self, extracted: &str) -> Result<(), Error> {
        return self.vault.process(&self.spec.destination, |mut data| {
            if !data.trim_end().is_empty() {
                data.push_str("\n\n");
            }
            data.push_str(extracted);
            return Ok(data);
        });
    }

    /// Phase 1: read the source, force an index refresh, repoint every
    /// link whose occurrence lies inside the range, and slice out the
    /// payload.
    ///
    /// Links are processed in descending occurrence-start order so that
    /// earlier offsets stay valid across splices; the running
    /// `end_offset` absorbs each length difference so the final cut
    /// point tracks the replacements.
    fn compute_extracted_content(
        &mut self,
        outcome: &mut ExtractionOutcome,
    ) -> Result<String, Error> {
        let src = self.spec.source_range.document.clone();
        let mut data = self.vault.read_note(&src)?;

        // The index may predate the read; never trust cached link
        // positions until a full pass has completed.
        self.index.refresh(self.vault)?;
        let cache = self
            .index
            .cache(&src)
            .ok_or_else(|| return Error::CacheMissing { path: src.clone() })?
            .clone();

        let range = self.range();
        let style = self.config.link_style();
        let mut end_offset = range.end.offset;

        let mut inline: Vec<&InlineRef> = cache.links.iter().chain(cache.embeds.iter()).collect();
        inline.sort_by(|a, b| return b.position.start.offset.cmp(&a.position.start.offset));

        for link in inline {
            if !range.contains(&link.position) {
                continue;
            }
            let reference = Reference::Inline(link.clone());
            let Some(new_link) = rewrite::rewrite_source(
                self.index,
                &reference,
                &src,
                &range,
                &self.spec.destination,
                style,
            ) else {
                continue;
            };
            end_offset = end_offset
                .saturating_add(new_link.len())
                .saturating_sub(link.original.len());
            data = splice(&data, &link.position, &new_link);
            outcome.rewritten_references = outcome.rewritten_references.saturating_add(1);
        }

        self.src_cache = Some(cache);
        return Ok(data
            .get(range.start.offset..end_offset)
            .unwrap_or("")
            .to_string());
    }

    /// The extraction range as a plain `Pos`.
    fn range(&self) -> Pos {
        return Pos {
            end: self.spec.source_range.end,
            start: self.spec.source_range.start,
        };
    }

    /// Text that takes the place of the extracted range in the source.
    fn replacement_text(&self) -> String {
        let option = self.config.resolve_replacement(self.vault.root());
        if option == ResolvedReplacement::None {
            return String::new();
        }

        let link = linkgen::generate(
            self.index,
            &self.spec.destination,
            &self.spec.source_range.document,
            "",
            None,
            self.config.link_style(),
        );
        if option == ResolvedReplacement::Embed {
            return rewrite::align_embed_marker(link, true);
        }
        return link;
    }

    /// Phase 3 worker, shared with phase 2a: queue the backlinks whose
    /// sub-target falls inside the moved range, routed by encoding, then
    /// apply each queue as one write against this note.
    fn update_backlinks_in_note(
        &self,
        backlinks: &[Reference],
        note: &Path,
        scope: UpdateScope,
    ) -> Result<usize, Error> {
        let src = &self.spec.source_range.document;
        let range = self.range();
        let src_cache = self
            .src_cache
            .as_ref()
            .ok_or_else(|| return Error::CacheMissing { path: src.clone() })?;
        let style = self.config.link_style();

        let mut inline_queue: Vec<&InlineRef> = Vec::new();
        let mut frontmatter_queue: Vec<&FrontmatterRef> = Vec::new();

        for backlink in backlinks {
            if let Reference::Inline(link) = backlink {
                // Occurrences inside the extracted range already moved
                // with the content in phase 1.
                if note == src.as_path() && range.contains(&link.position) {
                    continue;
                }
            }
            let (_, subpath) = index::parse_linktext(backlink.link());
            let Some(result) = index::resolve_subpath_in(src_cache, subpath) else {
                continue;
            };
            if !index::target_falls_in_range(&result, &range) {
                continue;
            }
            match backlink {
                Reference::Frontmatter(link) => frontmatter_queue.push(link),
                Reference::Inline(link) => inline_queue.push(link),
            }
        }

        let mut updated = 0_usize;

        if scope.content && !inline_queue.is_empty() {
            inline_queue.sort_by(|a, b| {
                return b.position.start.offset.cmp(&a.position.start.offset);
            });
            updated = updated.saturating_add(inline_queue.len());
            self.vault.process(note, |mut data| {
                for link in &inline_queue {
                    let new_link = rewrite::rewrite_target(
                        self.index,
                        &Reference::Inline((*link).clone()),
                        &self.spec.destination,
                        note,
                        style,
                    );
                    data = splice(&data, &link.position, &new_link);
                }
                return Ok(data);
            })?;
        }

        if scope.frontmatter && !frontmatter_queue.is_empty() {
            let updates: Vec<(String, String)> = frontmatter_queue
                .iter()
                .map(|link| {
                    let new_link = rewrite::rewrite_target(
                        self.index,
                        &Reference::Frontmatter((*link).clone()),
                        &self.spec.destination,
                        note,
                        style,
                    );
                    return (link.key.clone(), new_link);
                })
                .collect();
            updated = updated.saturating_add(updates.len());
            self.vault
                .process(note, |data| return frontmatter::patch(&data, &updates))?;
        }

        return Ok(updated);
    }

    /// Phase 3: update backlinks in every other note. Each note is a
    /// distinct file, so the per-note updates run as concurrent tasks;
    /// all of them are joined before phase 4, and the first error (if
    /// any) surfaces after the join.
    fn update_backlinks_in_other_notes(
        &self,
        outcome: &mut ExtractionOutcome,
    ) -> Result<(), Error> {
        let src = self.spec.source_range.document.clone();
        let grouped = self.index.backlinks_for(&src);

        let (tx, rx) = crossbeam_channel::unbounded();
        std::thread::scope(|scope| {
            for (path, backlinks) in &grouped {
                if path.as_path() == src.as_path() {
                    continue;
                }
                let tx = tx.clone();
                scope.spawn(move || {
                    let result = self.update_backlinks_in_note(backlinks, path, UpdateScope::ALL);
                    let _ = tx.send(result);
                });
            }
        });
        drop(tx);

        let mut first_error: Option<Error> = None;
        for result in rx {
            match result {
                Err(e) => first_error = first_error.or(Some(e)),
                Ok(0) => {},
                Ok(count) => {
                    outcome.backlink_notes = outcome.backlink_notes.saturating_add(1);
                    outcome.rewritten_references =
                        outcome.rewritten_references.saturating_add(count);
                },
            }
        }

        return match first_error {
            None => Ok(()),
            Some(e) => Err(e),
        };
    }

    /// Phase 2: patch the source note's own frontmatter, then apply the
    /// content edits as one batched write.
    fn update_source_note(&self, outcome: &mut ExtractionOutcome) -> Result<(), Error> {
        let src = self.spec.source_range.document.clone();
        let cache = self
            .src_cache
            .as_ref()
            .ok_or_else(|| return Error::CacheMissing { path: src.clone() })?
            .clone();

        self.update_source_frontmatter(&cache, outcome)?;
        self.update_source_content(&cache, outcome)?;
        return Ok(());
    }

    /// Phase 2b: every link outside the extracted range whose resolved
    /// target falls inside it now points at the destination; the range
    /// itself becomes the configured replacement text. All edits land in
    /// one write, in descending-offset order.
    fn update_source_content(
        &self,
        cache: &NoteCache,
        outcome: &mut ExtractionOutcome,
    ) -> Result<(), Error> {
        let src = &self.spec.source_range.document;
        let range = self.range();
        let style = self.config.link_style();

        let mut edits: Vec<(Pos, String)> = Vec::new();
        for link in cache.links.iter().chain(cache.embeds.iter()) {
            if range.contains(&link.position) {
                continue;
            }
            let reference = Reference::Inline(link.clone());
            let resolved = rewrite::resolve_reference(self.index, &reference, src);
            if resolved.target.as_deref() != Some(src.as_path()) {
                continue;
            }
            let Some(result) = resolved.subpath_result else {
                continue;
            };
            if !index::target_falls_in_range(&result, &range) {
                continue;
            }

            let new_link = rewrite::rewrite_target(
                self.index,
                &reference,
                &self.spec.destination,
                src,
                style,
            );
            edits.push((link.position.clone(), new_link));
        }
        outcome.rewritten_references = outcome.rewritten_references.saturating_add(edits.len());

        edits.push((range, self.replacement_text()));
        edits.sort_by(|a, b| return b.0.start.offset.cmp(&a.0.start.offset));

        return self.vault.process(src, |mut data| {
            for (pos, text) in &edits {
                data = splice(&data, pos, text);
            }
            return Ok(data);
        });
    }

    /// Phase 2a: frontmatter references whose target is the source note
    /// itself go through the same queue as backlinks — they are only
    /// repointed when their sub-target actually falls inside the moved
    /// range.
    fn update_source_frontmatter(
        &self,
        cache: &NoteCache,
        outcome: &mut ExtractionOutcome,
    ) -> Result<(), Error> {
        let src = &self.spec.source_range.document;

        let self_refs: Vec<Reference> = cache
            .frontmatter_links
            .iter()
            .filter(|link| {
                let (linkpath, _) = index::parse_linktext(&link.link);
                return self.index.resolve_linkpath(linkpath, src).as_deref() == Some(src.as_path());
            })
            .map(|link| return Reference::Frontmatter(link.clone()))
            .collect();

        let count =
            self.update_backlinks_in_note(&self_refs, src, UpdateScope::FRONTMATTER_ONLY)?;
        outcome.rewritten_references = outcome.rewritten_references.saturating_add(count);
        return Ok(());
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use super::*;
    use crate::types::loc_at;

    struct Fixture {
        config: Config,
        dir: tempfile::TempDir,
        index: VaultIndex,
        vault: Vault,
    }

    fn fixture(files: &[(&str, &str)]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(full, content).unwrap();
        }
        let vault = Vault::open(dir.path()).unwrap();
        let config = Config::load(dir.path()).unwrap();
        return Fixture {
            config,
            dir,
            index: VaultIndex::new(),
            vault,
        };
    }

    fn spec_for(source: &str, text: &str, start: usize, end: usize, dest: &str) -> ExtractionSpec {
        return ExtractionSpec {
            destination: PathBuf::from(dest),
            source_range: InFileRange {
                document: PathBuf::from(source),
                end: loc_at(text, end),
                start: loc_at(text, start),
            },
        };
    }

    fn read(fixture: &Fixture, path: &str) -> String {
        return fixture.vault.read_note(Path::new(path)).unwrap();
    }

    #[test]
    fn non_markdown_destination_fails_before_any_mutation() {
        let mut f = fixture(&[("Source.md", "# B\nbar\n"), ("pic.png", "")]);
        let spec = spec_for("Source.md", "# B\nbar\n", 0, 8, "pic.png");
        let err = ExtractionTask::new(&f.vault, &mut f.index, &f.config, spec).unwrap_err();
        assert!(matches!(err, Error::NonMarkdownDestination { .. }));
        assert_eq!(read(&f, "Source.md"), "# B\nbar\n");
    }

    #[test]
    fn end_to_end_heading_extraction_with_link_replacement() {
        let text = "# A\nfoo\n# B\nbar\n";
        let mut f = fixture(&[
            ("Source.md", text),
            ("Dest.md", ""),
            (".carve.toml", "replacement = \"link\"\n"),
        ]);
        f.config = Config::load(f.dir.path()).unwrap();

        let spec = spec_for("Source.md", text, 8, text.len(), "Dest.md");
        let task = ExtractionTask::new(&f.vault, &mut f.index, &f.config, spec).unwrap();
        let outcome = task.process().unwrap();

        assert_eq!(read(&f, "Source.md"), "# A\nfoo\n[[Dest]]");
        assert_eq!(read(&f, "Dest.md"), "# B\nbar\n");
        assert_eq!(outcome.extracted_bytes, 8);
    }

    #[test]
    fn none_replacement_round_trips_the_text() {
        let text = "# A\nfoo\n# B\nbar\n";
        let mut f = fixture(&[
            ("Source.md", text),
            ("Dest.md", ""),
            (".carve.toml", "replacement = \"none\"\n"),
        ]);
        f.config = Config::load(f.dir.path()).unwrap();

        let spec = spec_for("Source.md", text, 8, text.len(), "Dest.md");
        let task = ExtractionTask::new(&f.vault, &mut f.index, &f.config, spec).unwrap();
        task.process().unwrap();

        assert_eq!(read(&f, "Source.md"), "# A\nfoo\n");
        assert_eq!(read(&f, "Dest.md"), "# B\nbar\n");
    }

    #[test]
    fn destination_with_content_gets_one_blank_line() {
        let text = "# A\nfoo\n# B\nbar\n";
        let mut f = fixture(&[
            ("Source.md", text),
            ("Dest.md", "existing\n"),
            (".carve.toml", "replacement = \"none\"\n"),
        ]);
        f.config = Config::load(f.dir.path()).unwrap();

        let spec = spec_for("Source.md", text, 8, text.len(), "Dest.md");
        let task = ExtractionTask::new(&f.vault, &mut f.index, &f.config, spec).unwrap();
        task.process().unwrap();

        assert_eq!(read(&f, "Dest.md"), "existing\n\n\n# B\nbar\n");
    }

    #[test]
    fn inline_backlinks_in_other_notes_are_repointed() {
        let text = "# A\nfoo\n# B\nbar\n";
        let mut f = fixture(&[
            ("Source.md", text),
            ("Dest.md", ""),
            ("X.md", "see [[Source#B]] and [[Source#A]]\n"),
            (".carve.toml", "replacement = \"none\"\n"),
        ]);
        f.config = Config::load(f.dir.path()).unwrap();

        let spec = spec_for("Source.md", text, 8, text.len(), "Dest.md");
        let task = ExtractionTask::new(&f.vault, &mut f.index, &f.config, spec).unwrap();
        let outcome = task.process().unwrap();

        assert_eq!(read(&f, "X.md"), "see [[Dest#B]] and [[Source#A]]\n");
        assert_eq!(outcome.backlink_notes, 1);
    }

    #[test]
    fn frontmatter_backlinks_in_other_notes_are_repointed() {
        let text = "# A\nfoo\n# B\nbar\n";
        let mut f = fixture(&[
            ("Source.md", text),
            ("Dest.md", ""),
            ("Y.md", "---\nrelated: \"[[Source#B]]\"\n---\nbody\n"),
            (".carve.toml", "replacement = \"none\"\n"),
        ]);
        f.config = Config::load(f.dir.path()).unwrap();

        let spec = spec_for("Source.md", text, 8, text.len(), "Dest.md");
        let task = ExtractionTask::new(&f.vault, &mut f.index, &f.config, spec).unwrap();
        task.process().unwrap();

        let updated = read(&f, "Y.md");
        assert!(updated.contains("[[Dest#B]]"), "got: {updated}");
        assert!(updated.ends_with("---\nbody\n"));
    }

    #[test]
    fn source_links_into_moved_range_point_at_destination() {
        let text = "intro [[#B]]\n# B\nbar\n";
        let mut f = fixture(&[
            ("Source.md", text),
            ("Dest.md", ""),
            (".carve.toml", "replacement = \"none\"\n"),
        ]);
        f.config = Config::load(f.dir.path()).unwrap();

        let start = text.find("# B").unwrap();
        let spec = spec_for("Source.md", text, start, text.len(), "Dest.md");
        let task = ExtractionTask::new(&f.vault, &mut f.index, &f.config, spec).unwrap();
        task.process().unwrap();

        assert_eq!(read(&f, "Source.md"), "intro [[Dest#B]]\n");
        assert_eq!(read(&f, "Dest.md"), "# B\nbar\n");
    }

    #[test]
    fn self_reference_inside_range_stays_literal() {
        let text = "# A\nfoo\n# B\nbar [[#B]]\n";
        let mut f = fixture(&[
            ("Source.md", text),
            ("Dest.md", ""),
            (".carve.toml", "replacement = \"none\"\n"),
        ]);
        f.config = Config::load(f.dir.path()).unwrap();

        let spec = spec_for("Source.md", text, 8, text.len(), "Dest.md");
        let task = ExtractionTask::new(&f.vault, &mut f.index, &f.config, spec).unwrap();
        task.process().unwrap();

        assert_eq!(read(&f, "Dest.md"), "# B\nbar [[#B]]\n");
    }

    #[test]
    fn source_frontmatter_self_reference_into_range_is_repointed() {
        let text = "---\nsection: \"[[Source#B]]\"\nother: \"[[Source#A]]\"\n---\n# A\nfoo\n# B\nbar\n";
        let mut f = fixture(&[
            ("Source.md", text),
            ("Dest.md", ""),
            (".carve.toml", "replacement = \"none\"\n"),
        ]);
        f.config = Config::load(f.dir.path()).unwrap();

        let start = text.find("# B").unwrap();
        let spec = spec_for("Source.md", text, start, text.len(), "Dest.md");
        let task = ExtractionTask::new(&f.vault, &mut f.index, &f.config, spec).unwrap();
        task.process().unwrap();

        let updated = read(&f, "Source.md");
        assert!(updated.contains("[[Dest#B]]"), "got: {updated}");
        assert!(updated.contains("[[Source#A]]"));
    }

    #[test]
    fn travelling_links_keep_resolving_from_the_destination() {
        let text = "# B\nsee [x](Other.md#h)\n";
        let mut f = fixture(&[
            ("docs/Source.md", text),
            ("docs/Other.md", "# h\n"),
            ("Dest.md", ""),
            (".carve.toml", "replacement = \"none\"\nlink_style = \"markdown\"\n"),
        ]);
        f.config = Config::load(f.dir.path()).unwrap();

        let spec = spec_for("docs/Source.md", text, 0, text.len(), "Dest.md");
        let task = ExtractionTask::new(&f.vault, &mut f.index, &f.config, spec).unwrap();
        task.process().unwrap();

        assert_eq!(read(&f, "Dest.md"), "# B\nsee [x](docs/Other.md#h)\n");
    }

    #[test]
    fn embedded_backlink_keeps_its_embed_marker() {
        let text = "# A\nfoo\n# B\nbar\n";
        let mut f = fixture(&[
            ("Source.md", text),
            ("Dest.md", ""),
            ("X.md", "![[Source#B]]\n"),
            (".carve.toml", "replacement = \"none\"\n"),
        ]);
        f.config = Config::load(f.dir.path()).unwrap();

        let spec = spec_for("Source.md", text, 8, text.len(), "Dest.md");
        let task = ExtractionTask::new(&f.vault, &mut f.index, &f.config, spec).unwrap();
        task.process().unwrap();

        assert_eq!(read(&f, "X.md"), "![[Dest#B]]\n");
    }
}
