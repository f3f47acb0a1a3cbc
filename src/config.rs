//! Settings loaded from `.carve.toml`, plus the host-default deferral
//! for vaults that already carry a Note Composer configuration.

use std::path::Path;

use serde::Deserialize;

use crate::error::Error;
use crate::linkgen::LinkStyle;

/// Project configuration from `.carve.toml` at the vault root.
#[derive(Debug)]
pub struct Config {
    link_style: LinkStyle,
    replacement: Replacement,
}

/// Raw TOML structure for `.carve.toml`.
#[derive(Deserialize)]
struct CarveTomlConfig {
    #[serde(default)]
    link_style: Option<RawLinkStyle>,
    #[serde(default)]
    replacement: Option<Replacement>,
}

/// Serde-facing mirror of [`LinkStyle`].
#[derive(Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum RawLinkStyle {
    Markdown,
    Wikilink,
}

/// What the extracted range is replaced with in the source note.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Replacement {
    /// An embedded reference to the destination.
    Embed,
    /// A plain reference to the destination.
    Link,
    /// Nothing; the range is simply removed.
    None,
    /// Defer to the vault's own Note Composer setting.
    Same,
}

/// [`Replacement`] with the host deferral already applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedReplacement {
    /// An embedded reference to the destination.
    Embed,
    /// A plain reference to the destination.
    Link,
    /// Nothing; the range is simply removed.
    None,
}

impl Config {
    /// The reference syntax used for generated link text.
    pub fn link_style(&self) -> LinkStyle {
        return self.link_style;
    }

    /// Load config from `.carve.toml` in the vault root.
    /// Returns defaults if the file doesn't exist. Returns an error if the
    /// file exists but is malformed — never silently falls back to
    /// defaults when the user wrote a config file.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if reading fails (other than not-found),
    /// or `Error::TomlDe` if the TOML is malformed.
    pub fn load(root: &Path) -> Result<Self, Error> {
        let path = root.join(".carve.toml");
        let content = match std::fs::read_to_string(&path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::defaults());
            },
            Err(e) => return Err(Error::Io(e)),
            Ok(c) => c,
        };

        let raw: CarveTomlConfig = toml::from_str(&content)?;
        return Ok(Self {
            link_style: match raw.link_style {
                None | Some(RawLinkStyle::Wikilink) => LinkStyle::Wikilink,
                Some(RawLinkStyle::Markdown) => LinkStyle::Markdown,
            },
            replacement: raw.replacement.unwrap_or(Replacement::Same),
        });
    }

    /// Resolve the replacement option, applying the `same` deferral
    /// against the given vault root.
    pub fn resolve_replacement(&self, vault_root: &Path) -> ResolvedReplacement {
        return match self.replacement {
            Replacement::Embed => ResolvedReplacement::Embed,
            Replacement::Link => ResolvedReplacement::Link,
            Replacement::None => ResolvedReplacement::None,
            Replacement::Same => host_replacement_default(vault_root),
        };
    }

    /// Defaults: wikilink style, defer replacement to the host.
    fn defaults() -> Self {
        return Self {
            link_style: LinkStyle::Wikilink,
            replacement: Replacement::Same,
        };
    }
}

/// Shape of `.obsidian/note-composer.json`, the host's own equivalent
/// setting. Only the field we defer to.
#[derive(Deserialize)]
struct NoteComposerOptions {
    #[serde(default, rename = "replacementText")]
    replacement_text: Option<String>,
}

/// Read the host's replacement setting. This is a foreign file, so any
/// missing or malformed state falls back to a plain link rather than
/// failing the extraction.
fn host_replacement_default(vault_root: &Path) -> ResolvedReplacement {
    let path = vault_root.join(".obsidian").join("note-composer.json");
    let Ok(content) = std::fs::read_to_string(path) else {
        return ResolvedReplacement::Link;
    };
    let Ok(options) = serde_json::from_str::<NoteComposerOptions>(&content) else {
        return ResolvedReplacement::Link;
    };

    return match options.replacement_text.as_deref() {
        Some("embed") => ResolvedReplacement::Embed,
        Some("none") => ResolvedReplacement::None,
        _ => ResolvedReplacement::Link,
    };
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use super::*;

    #[test]
    fn absent_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.link_style(), LinkStyle::Wikilink);
        // No host file either: "same" falls back to a plain link.
        assert_eq!(config.resolve_replacement(dir.path()), ResolvedReplacement::Link);
    }

    #[test]
    fn explicit_replacement_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".carve.toml"), "replacement = \"none\"\n").unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.resolve_replacement(dir.path()), ResolvedReplacement::None);
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".carve.toml"), "replacement = \"nonsense\"\n").unwrap();
        assert!(matches!(Config::load(dir.path()), Err(Error::TomlDe(_))));
    }

    #[test]
    fn same_defers_to_host_setting() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".obsidian")).unwrap();
        std::fs::write(
            dir.path().join(".obsidian/note-composer.json"),
            "{\"replacementText\": \"embed\"}",
        )
        .unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.resolve_replacement(dir.path()), ResolvedReplacement::Embed);
    }

    #[test]
    fn malformed_host_setting_falls_back_to_link() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".obsidian")).unwrap();
        std::fs::write(dir.path().join(".obsidian/note-composer.json"), "not json").unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.resolve_replacement(dir.path()), ResolvedReplacement::Link);
    }

    #[test]
    fn markdown_link_style_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".carve.toml"), "link_style = \"markdown\"\n").unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.link_style(), LinkStyle::Markdown);
    }
}
