//! Anime source capability family
//!
//! These traits are what an anime extension package implements. The bridge
//! only ever sees them through `Arc<dyn AnimeSource>` handles produced by the
//! extension loader.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::filter::FilterList;
use super::ConfigurableSource;

/// Publication status codes shared by anime and manga records
pub mod status {
    pub const UNKNOWN: i32 = 0;
    pub const ONGOING: i32 = 1;
    pub const COMPLETED: i32 = 2;
    pub const LICENSED: i32 = 3;
    pub const PUBLISHING_FINISHED: i32 = 4;
    pub const CANCELLED: i32 = 5;
    pub const ON_HIATUS: i32 = 6;
}

/// How often a source wants its details refreshed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateStrategy {
    #[default]
    AlwaysUpdate,
    OnlyFetchOnce,
}

/// Anime record. `url` is the source-relative identity key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SAnime {
    pub url: String,
    pub title: String,
    pub artist: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    /// Comma separated genre list, as sources report it
    pub genre: Option<String>,
    pub status: i32,
    pub thumbnail_url: Option<String>,
    pub update_strategy: UpdateStrategy,
    pub initialized: bool,
}

impl SAnime {
    pub fn create() -> Self {
        Self::default()
    }

    /// Split the genre string into distinct, non-blank entries
    pub fn genres(&self) -> Vec<String> {
        let mut genres: Vec<String> = Vec::new();
        for genre in self.genre.as_deref().unwrap_or_default().split(',') {
            let genre = genre.trim();
            if !genre.is_empty() && !genres.iter().any(|g| g == genre) {
                genres.push(genre.to_string());
            }
        }
        genres
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SEpisode {
    pub url: String,
    pub name: String,
    /// Milliseconds since the epoch, 0 when unknown
    pub date_upload: i64,
    pub episode_number: f32,
    pub scanlator: Option<String>,
}

impl SEpisode {
    pub fn create() -> Self {
        Self::default()
    }
}

/// Subtitle or audio track attached to a video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub url: String,
    pub lang: String,
}

impl Track {
    pub fn new(url: impl Into<String>, lang: impl Into<String>) -> Self {
        Self { url: url.into(), lang: lang.into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Video {
    pub title: String,
    pub url: String,
    pub quality: String,
    pub headers: Option<HashMap<String, String>>,
    pub subtitle_tracks: Vec<Track>,
    pub audio_tracks: Vec<Track>,
}

impl Video {
    pub fn new(url: impl Into<String>, title: impl Into<String>, quality: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            quality: quality.into(),
            ..Self::default()
        }
    }
}

/// A video host an episode is mirrored on
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hoster {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnimesPage {
    pub animes: Vec<SAnime>,
    pub has_next_page: bool,
}

impl AnimesPage {
    pub fn new(animes: Vec<SAnime>, has_next_page: bool) -> Self {
        Self { animes, has_next_page }
    }
}

/// Base anime source. Every object an anime package exposes implements this.
pub trait AnimeSource: Send + Sync {
    fn id(&self) -> i64;

    fn name(&self) -> &str;

    /// Browse/search capability, if this source is a catalogue
    fn as_catalogue(&self) -> Option<&dyn AnimeCatalogueSource> {
        None
    }
}

#[async_trait]
pub trait AnimeCatalogueSource: AnimeSource {
    fn lang(&self) -> &str;

    /// Base URL for network-backed sources
    fn base_url(&self) -> Option<&str> {
        None
    }

    fn filter_list(&self) -> FilterList {
        FilterList::default()
    }

    async fn get_popular_anime(&self, page: u32) -> anyhow::Result<AnimesPage>;

    async fn get_latest_updates(&self, page: u32) -> anyhow::Result<AnimesPage>;

    async fn get_search_anime(
        &self,
        page: u32,
        query: &str,
        filters: FilterList,
    ) -> anyhow::Result<AnimesPage>;

    async fn get_anime_details(&self, anime: &SAnime) -> anyhow::Result<SAnime>;

    async fn get_episode_list(&self, anime: &SAnime) -> anyhow::Result<Vec<SEpisode>>;

    async fn get_video_list(&self, episode: &SEpisode) -> anyhow::Result<Vec<Video>>;

    /// Two-phase video listing, for sources that split videos by host
    fn as_hoster_source(&self) -> Option<&dyn HosterSource> {
        None
    }

    fn as_configurable(&self) -> Option<&dyn ConfigurableSource> {
        None
    }
}

#[async_trait]
pub trait HosterSource: Send + Sync {
    async fn get_hoster_list(&self, episode: &SEpisode) -> anyhow::Result<Vec<Hoster>>;

    async fn get_hoster_videos(&self, hoster: &Hoster) -> anyhow::Result<Vec<Video>>;
}

/// Expands into several sources, usually one per language
pub trait AnimeSourceFactory: Send + Sync {
    fn create_sources(&self) -> Vec<Arc<dyn AnimeSource>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genres_split_and_dedup() {
        let anime = SAnime {
            genre: Some("Action, Comedy,  ,Action,Drama".to_string()),
            ..SAnime::create()
        };
        assert_eq!(anime.genres(), vec!["Action", "Comedy", "Drama"]);
    }

    #[test]
    fn test_genres_empty() {
        assert!(SAnime::create().genres().is_empty());
    }
}
