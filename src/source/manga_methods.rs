//! Manga adapter
//!
//! Drives a manga catalogue through the anime-shaped calling convention.
//! Records are converted field by field in both directions; chapters come
//! back as episodes numbered by [`find_chapter_number`](super::convert::find_chapter_number).

use std::sync::Arc;

use async_trait::async_trait;

use super::anime::{AnimesPage, SAnime, SEpisode, Video};
use super::convert::{anime_to_manga, chapter_to_episode, episode_to_chapter, manga_to_anime, mangas_page_to_animes_page};
use super::manga::{MangaCatalogueSource, MangaSource, Page};
use super::methods::{no_preference_screen, not_applicable, SourceMethods};
use crate::core::error::{BridgeError, Result};
use crate::extension::types::MediaKind;
use crate::preference::PreferenceScreen;

pub struct MangaSourceMethods {
    source: Arc<dyn MangaSource>,
}

impl MangaSourceMethods {
    /// The source must be a catalogue
    pub fn new(source: Arc<dyn MangaSource>) -> Result<Self> {
        if source.as_catalogue().is_none() {
            return Err(BridgeError::SourceUnavailable(format!(
                "Manga source '{}' is not a catalogue source",
                source.name()
            )));
        }
        Ok(Self { source })
    }

    fn catalogue(&self) -> Result<&dyn MangaCatalogueSource> {
        self.source.as_catalogue().ok_or_else(|| {
            BridgeError::SourceUnavailable(format!("Manga source '{}' is not a catalogue source", self.source.name()))
        })
    }
}

#[async_trait]
impl SourceMethods for MangaSourceMethods {
    fn media_kind(&self) -> MediaKind {
        MediaKind::Manga
    }

    fn source_id(&self) -> i64 {
        self.source.id()
    }

    fn base_url(&self) -> String {
        self.source
            .as_catalogue()
            .and_then(|c| c.base_url())
            .unwrap_or_default()
            .to_string()
    }

    async fn get_popular(&self, page: u32) -> Result<AnimesPage> {
        self.catalogue()?
            .get_popular_manga(page)
            .await
            .map(mangas_page_to_animes_page)
            .map_err(|e| BridgeError::source_call("getPopularManga", e))
    }

    async fn get_latest_updates(&self, page: u32) -> Result<AnimesPage> {
        self.catalogue()?
            .get_latest_updates(page)
            .await
            .map(mangas_page_to_animes_page)
            .map_err(|e| BridgeError::source_call("getLatestUpdates", e))
    }

    async fn get_search_results(&self, query: &str, page: u32) -> Result<AnimesPage> {
        let catalogue = self.catalogue()?;
        catalogue
            .get_search_manga(page, query, catalogue.filter_list())
            .await
            .map(mangas_page_to_animes_page)
            .map_err(|e| BridgeError::source_call("getSearchManga", e))
    }

    async fn get_details(&self, media: &SAnime) -> Result<SAnime> {
        self.catalogue()?
            .get_manga_details(&anime_to_manga(media))
            .await
            .map(|manga| manga_to_anime(&manga))
            .map_err(|e| BridgeError::source_call("getMangaDetails", e))
    }

    async fn get_episode_list(&self, _media: &SAnime) -> Result<Vec<SEpisode>> {
        Err(not_applicable("getEpisodeList", MediaKind::Manga))
    }

    async fn get_video_list(&self, _episode: &SEpisode) -> Result<Vec<Video>> {
        Err(not_applicable("getVideoList", MediaKind::Manga))
    }

    async fn get_chapter_list(&self, media: &SAnime) -> Result<Vec<SEpisode>> {
        let chapters = self
            .catalogue()?
            .get_chapter_list(&anime_to_manga(media))
            .await
            .map_err(|e| BridgeError::source_call("getChapterList", e))?;
        Ok(chapters.iter().map(chapter_to_episode).collect())
    }

    async fn get_page_list(&self, chapter: &SEpisode) -> Result<Vec<Page>> {
        self.catalogue()?
            .get_page_list(&episode_to_chapter(chapter))
            .await
            .map_err(|e| BridgeError::source_call("getPageList", e))
    }

    fn setup_preference_screen(&self, screen: &mut PreferenceScreen) -> Result<()> {
        let configurable = self
            .catalogue()?
            .as_configurable()
            .ok_or_else(no_preference_screen)?;
        configurable.setup_preference_screen(screen);
        Ok(())
    }
}
