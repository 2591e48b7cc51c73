//! Shared calling convention over anime and manga sources
//!
//! The dispatcher only ever talks to [`SourceMethods`]. Results are always
//! anime-shaped; the manga adapter converts on the way in and out.

use std::sync::Arc;

use async_trait::async_trait;

use super::anime::{AnimesPage, SAnime, SEpisode, Video};
use super::anime_methods::AnimeSourceMethods;
use super::manga::Page;
use super::manga_methods::MangaSourceMethods;
use crate::core::error::{BridgeError, Result};
use crate::extension::types::{InstalledExtension, MediaKind, SourceHandle};
use crate::preference::PreferenceScreen;

/// Reported when a source has no settings
pub const NO_PREFERENCES_MESSAGE: &str = "This source does not support preferences.";

#[async_trait]
pub trait SourceMethods: Send + Sync {
    fn media_kind(&self) -> MediaKind;

    fn source_id(&self) -> i64;

    /// Empty when the source is not network backed
    fn base_url(&self) -> String;

    async fn get_popular(&self, page: u32) -> Result<AnimesPage>;

    async fn get_latest_updates(&self, page: u32) -> Result<AnimesPage>;

    async fn get_search_results(&self, query: &str, page: u32) -> Result<AnimesPage>;

    async fn get_details(&self, media: &SAnime) -> Result<SAnime>;

    /// Anime only
    async fn get_episode_list(&self, media: &SAnime) -> Result<Vec<SEpisode>>;

    /// Anime only
    async fn get_video_list(&self, episode: &SEpisode) -> Result<Vec<Video>>;

    /// Manga only, chapters come back as episodes
    async fn get_chapter_list(&self, media: &SAnime) -> Result<Vec<SEpisode>>;

    /// Manga only
    async fn get_page_list(&self, chapter: &SEpisode) -> Result<Vec<Page>>;

    /// Fails with `NoPreferenceScreen` when the source is not configurable
    fn setup_preference_screen(&self, screen: &mut PreferenceScreen) -> Result<()>;
}

pub(crate) fn not_applicable(operation: &str, kind: MediaKind) -> BridgeError {
    BridgeError::NotApplicable(format!("{} is not available for {} sources", operation, kind))
}

pub(crate) fn no_preference_screen() -> BridgeError {
    BridgeError::NoPreferenceScreen(NO_PREFERENCES_MESSAGE.to_string())
}

/// Build the adapter for one of an extension's sources.
///
/// `lang_index` selects among bundled sources; out of range (or absent)
/// falls back to the first source.
pub fn resolve_methods(
    extension: &InstalledExtension,
    lang_index: Option<usize>,
) -> Result<Arc<dyn SourceMethods>> {
    let handle = lang_index
        .and_then(|index| extension.sources.get(index))
        .or_else(|| extension.sources.first())
        .ok_or_else(|| {
            BridgeError::SourceUnavailable(format!(
                "{} source with ID '{}' not found.",
                capitalized(extension.kind),
                extension.pkg_name
            ))
        })?;

    let methods: Arc<dyn SourceMethods> = match handle {
        SourceHandle::Anime(source) => Arc::new(AnimeSourceMethods::new(source.clone())?),
        SourceHandle::Manga(source) => Arc::new(MangaSourceMethods::new(source.clone())?),
    };
    Ok(methods)
}

fn capitalized(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Anime => "Anime",
        MediaKind::Manga => "Manga",
    }
}
