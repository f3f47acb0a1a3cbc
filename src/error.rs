//! Crate-level error types for carve diagnostics.

use std::path::PathBuf;

/// All errors in carve carry enough context to produce a useful diagnostic
/// without a debugger. Each variant names the note, range, or reason for
/// failure.
#[allow(clippy::error_impl_error, reason = "crate-internal error type in binary")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A note expected to have a structural cache has none. This is only
    /// reachable after an explicit index refresh, so it means the note was
    /// deleted or moved mid-operation.
    #[error("no structural cache for {}", path.display())]
    CacheMissing {
        /// Vault-relative path of the note without a cache.
        path: PathBuf,
    },

    /// Underlying I/O error from the filesystem.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// Extraction destination is not a markdown note. Checked at task
    /// construction, before any mutation.
    #[error("cannot extract to non-markdown file: {}", path.display())]
    NonMarkdownDestination {
        /// The rejected destination path.
        path: PathBuf,
    },

    /// A note named by the command does not exist in the vault.
    #[error("note not found: {}", path.display())]
    NoteNotFound {
        /// Vault-relative path of the missing note.
        path: PathBuf,
    },

    /// Tree-sitter failed to parse a note's structure.
    #[error("parse failed: {}: {reason}", path.display())]
    ParseFailed {
        /// The note that failed to parse.
        path: PathBuf,
        /// Description of the parse failure.
        reason: String,
    },

    /// A selection range is reversed or lands outside the note text.
    #[error("range out of bounds in {}: {value} exceeds {limit}", path.display())]
    RangeOutOfBounds {
        /// The maximum valid value (note length or line count).
        limit: usize,
        /// The note the range was computed against.
        path: PathBuf,
        /// The offending offset or line number.
        value: usize,
    },

    /// TOML deserialization of `.carve.toml` failed.
    #[error("toml deserialize: {0}")]
    TomlDe(
        /// The wrapped TOML deserialization error.
        #[from]
        toml::de::Error,
    ),

    /// Vault root directory does not exist or is not a directory.
    #[error("vault not found: {}", path.display())]
    VaultNotFound {
        /// The rejected vault root.
        path: PathBuf,
    },

    /// YAML frontmatter could not be parsed or re-serialized.
    #[error("frontmatter: {0}")]
    Yaml(
        /// The wrapped YAML error.
        #[from]
        serde_yaml::Error,
    ),
}
