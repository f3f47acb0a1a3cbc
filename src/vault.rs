//! Vault storage: reading, writing, and listing notes under one root.
//!
//! All paths exposed here are vault-relative. Writes always go through a
//! single whole-file replacement, so one `process` call is one atomic
//! edit step from the caller's point of view.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::Error;

/// A directory tree of markdown notes.
#[derive(Debug)]
pub struct Vault {
    root: PathBuf,
}

impl Vault {
    /// Create the note (and its parent directories) if it does not exist.
    /// Existing notes are left untouched.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the directories or file cannot be created.
    pub fn ensure_note(&self, note: &Path) -> Result<(), Error> {
        let path = self.root.join(note);
        if path.exists() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, "")?;
        return Ok(());
    }

    /// List every file in the vault, vault-relative and sorted. Markdown
    /// notes are what the index parses, but link targets may be any file
    /// (images, attachments), so all of them are listed.
    pub fn list_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = WalkDir::new(&self.root)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| return e.file_type().is_file())
            .filter_map(|e| {
                return e.path().strip_prefix(&self.root).ok().map(Path::to_path_buf);
            })
            .filter(|p| return !is_hidden(p))
            .collect();
        files.sort();
        return files;
    }

    /// Open an existing vault root.
    ///
    /// # Errors
    ///
    /// Returns `Error::VaultNotFound` if the root is not a directory.
    pub fn open(root: &Path) -> Result<Self, Error> {
        if !root.is_dir() {
            return Err(Error::VaultNotFound {
                path: root.to_path_buf(),
            });
        }
        return Ok(Self {
            root: root.to_path_buf(),
        });
    }

    /// Read-modify-write one note as a single edit step.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoteNotFound` if the note does not exist, or
    /// whatever the transform itself fails with.
    pub fn process<F>(&self, note: &Path, transform: F) -> Result<(), Error>
    where
        F: FnOnce(String) -> Result<String, Error>,
    {
        let content = self.read_note(note)?;
        let updated = transform(content)?;
        std::fs::write(self.root.join(note), updated)?;
        return Ok(());
    }

    /// Read the full text of a note.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoteNotFound` if the note does not exist,
    /// or `Error::Io` for other read failures.
    pub fn read_note(&self, note: &Path) -> Result<String, Error> {
        return match std::fs::read_to_string(self.root.join(note)) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::NoteNotFound {
                path: note.to_path_buf(),
            }),
            Err(e) => Err(Error::Io(e)),
            Ok(content) => Ok(content),
        };
    }

    /// The vault root directory.
    pub fn root(&self) -> &Path {
        return &self.root;
    }
}

/// Skip dotfiles and dot-directories (`.obsidian`, `.git`) anywhere in
/// the relative path.
fn is_hidden(relative: &Path) -> bool {
    return relative.components().any(|c| {
        return c.as_os_str().to_string_lossy().starts_with('.');
    });
}
