//! Manga source capability family
//!
//! Manga packages populate their records lazily, so `url` and `title` on
//! [`SManga`] may be missing. Reading them goes through [`SManga::url`] and
//! [`SManga::title`], which report the gap as an [`UninitializedField`].

use std::sync::Arc;

use async_trait::async_trait;

use super::anime::{status, UpdateStrategy};
use super::filter::FilterList;
use super::ConfigurableSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("field '{0}' accessed before initialization")]
pub struct UninitializedField(pub &'static str);

#[derive(Debug, Clone, PartialEq)]
pub struct SManga {
    pub url: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub genre: Option<String>,
    pub status: i32,
    pub thumbnail_url: Option<String>,
    pub update_strategy: UpdateStrategy,
    pub initialized: bool,
}

impl Default for SManga {
    fn default() -> Self {
        Self {
            url: None,
            title: None,
            artist: None,
            author: None,
            description: None,
            genre: None,
            status: status::UNKNOWN,
            thumbnail_url: None,
            update_strategy: UpdateStrategy::AlwaysUpdate,
            initialized: false,
        }
    }
}

impl SManga {
    pub fn create() -> Self {
        Self::default()
    }

    pub fn url(&self) -> Result<&str, UninitializedField> {
        self.url.as_deref().ok_or(UninitializedField("url"))
    }

    pub fn title(&self) -> Result<&str, UninitializedField> {
        self.title.as_deref().ok_or(UninitializedField("title"))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SChapter {
    pub url: String,
    pub name: String,
    pub date_upload: i64,
    /// Number declared by the source, -1 when unknown
    pub chapter_number: f32,
    pub scanlator: Option<String>,
}

impl SChapter {
    pub fn create() -> Self {
        Self {
            chapter_number: -1.0,
            ..Self::default()
        }
    }
}

/// One image of a chapter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub index: usize,
    pub url: String,
    pub image_url: Option<String>,
}

impl Page {
    pub fn new(index: usize, url: impl Into<String>, image_url: Option<String>) -> Self {
        Self { index, url: url.into(), image_url }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MangasPage {
    pub mangas: Vec<SManga>,
    pub has_next_page: bool,
}

impl MangasPage {
    pub fn new(mangas: Vec<SManga>, has_next_page: bool) -> Self {
        Self { mangas, has_next_page }
    }
}

pub trait MangaSource: Send + Sync {
    fn id(&self) -> i64;

    fn name(&self) -> &str;

    fn as_catalogue(&self) -> Option<&dyn MangaCatalogueSource> {
        None
    }
}

#[async_trait]
pub trait MangaCatalogueSource: MangaSource {
    fn lang(&self) -> &str;

    fn base_url(&self) -> Option<&str> {
        None
    }

    fn filter_list(&self) -> FilterList {
        FilterList::default()
    }

    async fn get_popular_manga(&self, page: u32) -> anyhow::Result<MangasPage>;

    async fn get_latest_updates(&self, page: u32) -> anyhow::Result<MangasPage>;

    async fn get_search_manga(
        &self,
        page: u32,
        query: &str,
        filters: FilterList,
    ) -> anyhow::Result<MangasPage>;

    async fn get_manga_details(&self, manga: &SManga) -> anyhow::Result<SManga>;

    async fn get_chapter_list(&self, manga: &SManga) -> anyhow::Result<Vec<SChapter>>;

    async fn get_page_list(&self, chapter: &SChapter) -> anyhow::Result<Vec<Page>>;

    fn as_configurable(&self) -> Option<&dyn ConfigurableSource> {
        None
    }
}

pub trait MangaSourceFactory: Send + Sync {
    fn create_sources(&self) -> Vec<Arc<dyn MangaSource>>;
}
