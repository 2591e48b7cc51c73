//! Anime adapter
//!
//! Delegates one to one to the anime catalogue. Sources that also
//! implement [`HosterSource`](super::anime::HosterSource) get the two-phase
//! video listing: hosters first, then each hoster's videos with the hoster
//! name prefixed to the video title.

use std::sync::Arc;

use async_trait::async_trait;

use super::anime::{AnimeCatalogueSource, AnimeSource, AnimesPage, SAnime, SEpisode, Video};
use super::manga::Page;
use super::methods::{no_preference_screen, not_applicable, SourceMethods};
use crate::core::error::{BridgeError, Result};
use crate::extension::types::MediaKind;
use crate::preference::PreferenceScreen;

pub struct AnimeSourceMethods {
    source: Arc<dyn AnimeSource>,
}

impl AnimeSourceMethods {
    /// The source must be a catalogue
    pub fn new(source: Arc<dyn AnimeSource>) -> Result<Self> {
        if source.as_catalogue().is_none() {
            return Err(BridgeError::SourceUnavailable(format!(
                "Anime source '{}' is not a catalogue source",
                source.name()
            )));
        }
        Ok(Self { source })
    }

    fn catalogue(&self) -> Result<&dyn AnimeCatalogueSource> {
        self.source.as_catalogue().ok_or_else(|| {
            BridgeError::SourceUnavailable(format!("Anime source '{}' is not a catalogue source", self.source.name()))
        })
    }
}

#[async_trait]
impl SourceMethods for AnimeSourceMethods {
    fn media_kind(&self) -> MediaKind {
        MediaKind::Anime
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
            .get_popular_anime(page)
            .await
            .map_err(|e| BridgeError::source_call("getPopularAnime", e))
    }

    async fn get_latest_updates(&self, page: u32) -> Result<AnimesPage> {
        self.catalogue()?
            .get_latest_updates(page)
            .await
            .map_err(|e| BridgeError::source_call("getLatestUpdates", e))
    }

    async fn get_search_results(&self, query: &str, page: u32) -> Result<AnimesPage> {
        let catalogue = self.catalogue()?;
        catalogue
            .get_search_anime(page, query, catalogue.filter_list())
            .await
            .map_err(|e| BridgeError::source_call("getSearchAnime", e))
    }

    async fn get_details(&self, media: &SAnime) -> Result<SAnime> {
        self.catalogue()?
            .get_anime_details(media)
            .await
            .map_err(|e| BridgeError::source_call("getAnimeDetails", e))
    }

    async fn get_episode_list(&self, media: &SAnime) -> Result<Vec<SEpisode>> {
        self.catalogue()?
            .get_episode_list(media)
            .await
            .map_err(|e| BridgeError::source_call("getEpisodeList", e))
    }

    async fn get_video_list(&self, episode: &SEpisode) -> Result<Vec<Video>> {
        let catalogue = self.catalogue()?;

        let Some(hosters) = catalogue.as_hoster_source() else {
            return catalogue
                .get_video_list(episode)
                .await
                .map_err(|e| BridgeError::source_call("getVideoList", e));
        };

        let hoster_list = hosters
            .get_hoster_list(episode)
            .await
            .map_err(|e| BridgeError::source_call("getHosterList", e))?;
        tracing::debug!(episode = %episode.url, hosters = hoster_list.len(), "Resolving videos per hoster");

        let mut videos = Vec::new();
        for hoster in &hoster_list {
            let hoster_videos = hosters
                .get_hoster_videos(hoster)
                .await
                .map_err(|e| BridgeError::source_call("getVideoList", e))?;
            videos.extend(hoster_videos.into_iter().map(|video| Video {
                title: format!("{} - {}", hoster.name, video.title),
                ..video
            }));
        }
        Ok(videos)
    }

    async fn get_chapter_list(&self, _media: &SAnime) -> Result<Vec<SEpisode>> {
        Err(not_applicable("getChapterList", MediaKind::Anime))
    }

    async fn get_page_list(&self, _chapter: &SEpisode) -> Result<Vec<Page>> {
        Err(not_applicable("getPageList", MediaKind::Anime))
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
