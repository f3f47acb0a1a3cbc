//! Core CLI commands for carve: extract a selection, extract a heading
//! section. Pure glue: compute the range, hand everything to the engine,
//! report what happened.

use std::path::Path;

use crate::config::Config;
use crate::error::Error;
use crate::extract::{ExtractionSpec, ExtractionTask, InFileRange};
use crate::index::VaultIndex;
use crate::range;
use crate::vault::Vault;

/// Extract the heading section around a one-based cursor line.
///
/// # Errors
///
/// Returns errors from vault access, range calculation, config loading,
/// or any extraction phase.
pub fn extract_heading(
    vault_root: &Path,
    source: &Path,
    dest: &Path,
    line: usize,
) -> Result<(), Error> {
    let vault = Vault::open(vault_root)?;
    let text = vault.read_note(source)?;
    let source_range = range::heading_section_range(source, &text, line.saturating_sub(1))?;
    return run_extraction(&vault, vault_root, source_range, dest);
}

/// Extract an explicit byte-offset selection.
///
/// # Errors
///
/// Returns errors from vault access, range calculation, config loading,
/// or any extraction phase.
pub fn extract_selection(
    vault_root: &Path,
    source: &Path,
    dest: &Path,
    start: usize,
    end: usize,
) -> Result<(), Error> {
    let vault = Vault::open(vault_root)?;
    let text = vault.read_note(source)?;
    let source_range = range::selection_range(source, &text, start, end)?;
    return run_extraction(&vault, vault_root, source_range, dest);
}

/// Shared tail of both commands: build the task, make sure the
/// destination exists (picking a brand-new note is allowed), run it,
/// and print a one-line summary.
///
/// # Errors
///
/// Returns errors from config loading or any extraction phase.
fn run_extraction(
    vault: &Vault,
    vault_root: &Path,
    source_range: InFileRange,
    dest: &Path,
) -> Result<(), Error> {
    let config = Config::load(vault_root)?;
    let spec = ExtractionSpec {
        destination: dest.to_path_buf(),
        source_range,
    };

    let mut index = VaultIndex::new();
    let task = ExtractionTask::new(vault, &mut index, &config, spec)?;
    vault.ensure_note(dest)?;
    let outcome = task.process()?;

    eprintln!(
        "Extracted {} bytes to {}",
        outcome.extracted_bytes,
        dest.display()
    );
    if outcome.rewritten_references > 0 {
        eprintln!(
            "Rewrote {} references ({} other notes touched)",
            outcome.rewritten_references, outcome.backlink_notes
        );
    }
    return Ok(());
}
