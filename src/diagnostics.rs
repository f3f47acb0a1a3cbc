//! Error rendering: every failure surfaces as one structured markdown
//! diagnostic on stderr.

use crate::error::Error;

const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Render an error as valid markdown with bold headings and print to stderr.
pub fn print_error(e: &Error) {
    let md = render_error(e);
    for line in md.lines() {
        if line.starts_with('#') {
            eprintln!("{BOLD}{line}{RESET}");
        } else {
            eprintln!("{line}");
        }
    }
}

/// Render an error as a structured markdown diagnostic.
///
/// Each variant produces a block with what happened and, where there is
/// one, how to fix it. Extraction has no rollback, so mid-operation
/// failures tell the user to inspect rather than blindly retry.
pub fn render_error(e: &Error) -> String {
    match e {
        Error::CacheMissing { path } => format!("\
# Error: Structural Cache Missing

`{}` had no cache even after a full index pass — the note was
deleted or moved while the extraction ran.

## Fix

Already-applied edits are not rolled back. Inspect the source and
destination notes before retrying.
", path.display()),

        Error::Io(e) => format!("\
# Error: I/O

{e}
"),

        Error::NonMarkdownDestination { path } => format!("\
# Error: Non-Markdown Destination

Cannot extract into `{}` — the destination must be a `.md` note.
", path.display()),

        Error::NoteNotFound { path } => format!("\
# Error: Note Not Found

`{}` does not exist in the vault.
", path.display()),

        Error::ParseFailed { path, reason } => format!("\
# Error: Parse Failed

Could not parse the structure of `{}`: {reason}
", path.display()),

        Error::RangeOutOfBounds { limit, path, value } => format!("\
# Error: Range Out Of Bounds

{value} exceeds {limit} in `{}`.

## Fix

Offsets are byte positions into the note; lines are one-based.
", path.display()),

        Error::TomlDe(e) => format!("\
# Error: Malformed Config

`.carve.toml` exists but could not be parsed:

{e}

## Fix

Valid keys: `replacement = \"link\" | \"embed\" | \"none\" | \"same\"`,
`link_style = \"wikilink\" | \"markdown\"`.
"),

        Error::VaultNotFound { path } => format!("\
# Error: Vault Not Found

`{}` is not a directory.
", path.display()),

        Error::Yaml(e) => format!("\
# Error: Frontmatter

{e}
"),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn every_diagnostic_leads_with_a_heading() {
        let rendered = render_error(&Error::NoteNotFound {
            path: PathBuf::from("gone.md"),
        });
        assert!(rendered.starts_with("# Error:"));
        assert!(rendered.contains("gone.md"));
    }

    #[test]
    fn cache_missing_warns_about_missing_rollback() {
        let rendered = render_error(&Error::CacheMissing {
            path: PathBuf::from("Source.md"),
        });
        assert!(rendered.contains("not rolled back"));
    }
}
