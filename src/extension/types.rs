//! Extension type definitions
//!
//! Media kinds and their compatibility constants, the descriptor variants
//! an extension can be surfaced as, and the handle wrapping a loaded
//! foreign source.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::loader::LoadError;
use crate::source::anime::AnimeSource;
use crate::source::manga::MangaSource;

/// The two extension families the bridge can host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Anime,
    Manga,
}

impl MediaKind {
    /// Required-feature sentinel a package declares, also the metadata key prefix
    pub fn feature(self) -> &'static str {
        match self {
            MediaKind::Anime => "tachiyomi.animeextension",
            MediaKind::Manga => "tachiyomi.extension",
        }
    }

    /// Branding prefix stripped from package labels
    pub fn label_prefix(self) -> &'static str {
        match self {
            MediaKind::Anime => "Aniyomi: ",
            MediaKind::Manga => "Tachiyomi: ",
        }
    }

    /// Supported lib-version range, inclusive on both ends
    pub fn lib_version_range(self) -> (f64, f64) {
        match self {
            MediaKind::Anime => (12.0, 15.0),
            MediaKind::Manga => (1.2, 1.5),
        }
    }

    pub fn supports_lib_version(self, lib_version: f64) -> bool {
        let (min, max) = self.lib_version_range();
        lib_version >= min && lib_version <= max
    }

    /// Item type reported to the transport (1 = anime, 0 = manga)
    pub fn item_type(self) -> u8 {
        match self {
            MediaKind::Anime => 1,
            MediaKind::Manga => 0,
        }
    }

    /// Full metadata key for a suffix such as `.class`
    pub fn metadata_key(self, suffix: &str) -> String {
        format!("{}{}", self.feature(), suffix)
    }

    pub fn from_is_anime(is_anime: bool) -> Self {
        if is_anime {
            MediaKind::Anime
        } else {
            MediaKind::Manga
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Anime => "anime",
            MediaKind::Manga => "manga",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lib version of a package: its version name up to (excluding) the last
/// dot-separated component, read as a number.
///
/// `"14.3"` gives `14.0`, `"1.4.12"` gives `1.4`.
pub fn parse_lib_version(version_name: &str) -> Option<f64> {
    let head = match version_name.rfind('.') {
        Some(idx) => &version_name[..idx],
        None => version_name,
    };
    head.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Everything after the first occurrence of `prefix`, or the whole label
pub fn strip_label_prefix<'a>(label: &'a str, prefix: &str) -> &'a str {
    match label.find(prefix) {
        Some(idx) => &label[idx + prefix.len()..],
        None => label,
    }
}

/// A loaded foreign source, anime or manga
#[derive(Clone)]
pub enum SourceHandle {
    Anime(Arc<dyn AnimeSource>),
    Manga(Arc<dyn MangaSource>),
}

impl SourceHandle {
    pub fn kind(&self) -> MediaKind {
        match self {
            SourceHandle::Anime(_) => MediaKind::Anime,
            SourceHandle::Manga(_) => MediaKind::Manga,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            SourceHandle::Anime(source) => source.id(),
            SourceHandle::Manga(source) => source.id(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            SourceHandle::Anime(source) => source.name(),
            SourceHandle::Manga(source) => source.name(),
        }
    }

    /// Language tag, only catalogue sources carry one
    pub fn lang(&self) -> Option<&str> {
        match self {
            SourceHandle::Anime(source) => source.as_catalogue().map(|c| c.lang()),
            SourceHandle::Manga(source) => source.as_catalogue().map(|c| c.lang()),
        }
    }

    pub fn base_url(&self) -> Option<&str> {
        match self {
            SourceHandle::Anime(source) => source.as_catalogue().and_then(|c| c.base_url()),
            SourceHandle::Manga(source) => source.as_catalogue().and_then(|c| c.base_url()),
        }
    }
}

impl fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceHandle")
            .field("kind", &self.kind())
            .field("id", &self.id())
            .field("name", &self.name())
            .field("lang", &self.lang())
            .finish()
    }
}

/// Successfully loaded extension
#[derive(Debug, Clone)]
pub struct InstalledExtension {
    pub kind: MediaKind,
    pub name: String,
    pub pkg_name: String,
    pub version_name: String,
    pub version_code: i64,
    pub lib_version: f64,
    /// Empty, a single language tag, or `"all"`
    pub lang: String,
    pub is_nsfw: bool,
    pub has_readme: bool,
    pub has_changelog: bool,
    pub sources: Vec<SourceHandle>,
    pub pkg_factory: Option<String>,
    pub icon_path: Option<PathBuf>,
    pub has_update: bool,
    pub is_obsolete: bool,
    pub is_unofficial: bool,
}

impl InstalledExtension {
    /// Base URL of the first source, empty when it has none
    pub fn base_url(&self) -> String {
        self.sources
            .first()
            .and_then(|source| source.base_url())
            .unwrap_or_default()
            .to_string()
    }

    pub fn supported_languages(&self) -> Vec<String> {
        self.sources
            .iter()
            .map(|source| source.lang().unwrap_or_default().to_string())
            .collect()
    }
}

/// One source listed in a repository index entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableSource {
    pub id: i64,
    pub lang: String,
    pub name: String,
    pub base_url: String,
}

/// Extension discoverable in a remote repository
#[derive(Debug, Clone, PartialEq)]
pub struct AvailableExtension {
    pub kind: MediaKind,
    pub name: String,
    pub pkg_name: String,
    pub version_name: String,
    pub version_code: i64,
    pub lib_version: f64,
    pub lang: String,
    pub is_nsfw: bool,
    pub has_readme: bool,
    pub has_changelog: bool,
    pub sources: Vec<AvailableSource>,
    pub apk_name: String,
    pub repository: String,
    pub icon_url: String,
}

impl AvailableExtension {
    pub fn supported_languages(&self) -> Vec<String> {
        self.sources.iter().map(|source| source.lang.clone()).collect()
    }
}

/// Installed package whose signature is not trusted yet
#[derive(Debug, Clone, PartialEq)]
pub struct UntrustedExtension {
    pub kind: MediaKind,
    pub name: String,
    pub pkg_name: String,
    pub version_name: String,
    pub version_code: i64,
    pub lib_version: f64,
    pub signature_hash: String,
}

/// Outcome of discovering or loading one extension
#[derive(Debug, Clone)]
pub enum ExtensionDescriptor {
    Installed(InstalledExtension),
    Available(AvailableExtension),
    Untrusted(UntrustedExtension),
    Error { package: String, error: LoadError },
}

impl ExtensionDescriptor {
    pub fn package_name(&self) -> &str {
        match self {
            ExtensionDescriptor::Installed(ext) => &ext.pkg_name,
            ExtensionDescriptor::Available(ext) => &ext.pkg_name,
            ExtensionDescriptor::Untrusted(ext) => &ext.pkg_name,
            ExtensionDescriptor::Error { package, .. } => package,
        }
    }
}
