//! Fakes shared by the unit tests: foreign sources, a package registry
//! and a class loader factory that resolves classes by short name.

use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use crate::bridge::ExtensionBridge;
use crate::core::error::{BridgeError, Result};
use crate::extension::class_loader::{
    ClassLoadError, ClassLoader, ClassLoaderFactory, ClassRegistry, LoadedClass,
};
use crate::extension::icon::IconCache;
use crate::extension::loader::{ExtensionLoader, TrustPolicy};
use crate::extension::manager::ExtensionCatalog;
use crate::extension::repository::{IndexFetcher, RepositoryClient};
use crate::extension::package::{ApplicationInfo, MetadataBundle, PackageFilter, PackageInfo, PackageRegistry};
use crate::preference::{MemoryPreferenceStore, Preference, PreferenceScreen, PreferenceStore, PreferenceValue};
use crate::source::anime::{
    self, AnimeCatalogueSource, AnimeSource, AnimeSourceFactory, AnimesPage, Hoster, HosterSource,
    SAnime, SEpisode, Track, Video,
};
use crate::source::filter::FilterList;
use crate::source::manga::{MangaCatalogueSource, MangaSource, MangasPage, Page, SChapter, SManga};
use crate::source::ConfigurableSource;

pub struct FakeAnimeSource {
    id: i64,
    lang: String,
    base_url: Option<String>,
    hosters: bool,
    configurable: bool,
    failing: bool,
}

impl FakeAnimeSource {
    pub fn new(id: i64, lang: &str) -> Self {
        Self {
            id,
            lang: lang.to_string(),
            base_url: Some("https://anime.example".to_string()),
            hosters: false,
            configurable: false,
            failing: false,
        }
    }

    pub fn with_hosters(mut self) -> Self {
        self.hosters = true;
        self
    }

    pub fn configurable(mut self) -> Self {
        self.configurable = true;
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    fn page(&self, url: String, title: String, has_next_page: bool) -> anyhow::Result<AnimesPage> {
        if self.failing {
            anyhow::bail!("upstream returned 503");
        }
        let anime = SAnime {
            url,
            title,
            thumbnail_url: Some("https://anime.example/thumb.jpg".to_string()),
            ..SAnime::create()
        };
        Ok(AnimesPage::new(vec![anime], has_next_page))
    }
}

impl AnimeSource for FakeAnimeSource {
    fn id(&self) -> i64 {
        self.id
    }

    fn name(&self) -> &str {
        "Fake Anime"
    }

    fn as_catalogue(&self) -> Option<&dyn AnimeCatalogueSource> {
        Some(self)
    }
}

#[async_trait]
impl AnimeCatalogueSource for FakeAnimeSource {
    fn lang(&self) -> &str {
        &self.lang
    }

    fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    async fn get_popular_anime(&self, page: u32) -> anyhow::Result<AnimesPage> {
        self.page(format!("/anime/popular-{}", page), format!("Popular {}", page), page < 3)
    }

    async fn get_latest_updates(&self, page: u32) -> anyhow::Result<AnimesPage> {
        self.page(format!("/anime/latest-{}", page), format!("Latest {}", page), false)
    }

    async fn get_search_anime(&self, _page: u32, query: &str, _filters: FilterList) -> anyhow::Result<AnimesPage> {
        self.page("/anime/search".to_string(), query.to_string(), false)
    }

    async fn get_anime_details(&self, anime: &SAnime) -> anyhow::Result<SAnime> {
        Ok(SAnime {
            author: Some("Studio".to_string()),
            description: Some(format!("About {}", anime.title)),
            genre: Some("Action, Comedy".to_string()),
            status: anime::status::ONGOING,
            initialized: true,
            ..anime.clone()
        })
    }

    async fn get_episode_list(&self, anime: &SAnime) -> anyhow::Result<Vec<SEpisode>> {
        Ok(vec![
            SEpisode {
                url: format!("{}/ep-2", anime.url),
                name: "Episode 2".to_string(),
                date_upload: 1_700_000_000_000,
                episode_number: 2.0,
                scanlator: None,
            },
            SEpisode {
                url: format!("{}/ep-1", anime.url),
                name: "Episode 1".to_string(),
                date_upload: 0,
                episode_number: 1.0,
                scanlator: Some("Subs".to_string()),
            },
        ])
    }

    async fn get_video_list(&self, episode: &SEpisode) -> anyhow::Result<Vec<Video>> {
        let mut headers = HashMap::new();
        headers.insert("Referer".to_string(), "https://anime.example/".to_string());
        Ok(vec![Video {
            headers: Some(headers),
            subtitle_tracks: vec![Track::new("https://anime.example/en.vtt", "English")],
            ..Video::new(format!("https://cdn.example{}.m3u8", episode.url), "Main", "1080p")
        }])
    }

    fn as_hoster_source(&self) -> Option<&dyn HosterSource> {
        if self.hosters {
            Some(self)
        } else {
            None
        }
    }

    fn as_configurable(&self) -> Option<&dyn ConfigurableSource> {
        if self.configurable {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl HosterSource for FakeAnimeSource {
    async fn get_hoster_list(&self, _episode: &SEpisode) -> anyhow::Result<Vec<Hoster>> {
        Ok(vec![
            Hoster {
                name: "Alpha".to_string(),
                url: "https://alpha.example/e".to_string(),
            },
            Hoster {
                name: "Beta".to_string(),
                url: "https://beta.example/e".to_string(),
            },
        ])
    }

    async fn get_hoster_videos(&self, hoster: &Hoster) -> anyhow::Result<Vec<Video>> {
        Ok(vec![Video::new(format!("{}/video.mp4", hoster.url), "720p", "720p")])
    }
}

impl ConfigurableSource for FakeAnimeSource {
    fn setup_preference_screen(&self, screen: &mut PreferenceScreen) {
        screen.add_preference(
            Preference::switch("show_dubs", "Show dubs").with_default(PreferenceValue::Bool(false)),
        );
        screen.add_preference(
            Preference::list(
                "quality",
                "Preferred quality",
                vec!["1080p".to_string(), "720p".to_string()],
                vec!["1080".to_string(), "720".to_string()],
            )
            .with_default(PreferenceValue::Text("1080".to_string())),
        );
    }
}

/// Anime source that is not a catalogue
pub struct BareAnime;

impl AnimeSource for BareAnime {
    fn id(&self) -> i64 {
        99
    }

    fn name(&self) -> &str {
        "Bare"
    }
}

pub struct FakeAnimeFactory;

impl AnimeSourceFactory for FakeAnimeFactory {
    fn create_sources(&self) -> Vec<Arc<dyn AnimeSource>> {
        vec![
            Arc::new(FakeAnimeSource::new(10, "en")),
            Arc::new(FakeAnimeSource::new(11, "fr")),
        ]
    }
}

pub struct FakeMangaSource {
    id: i64,
    lang: String,
}

impl FakeMangaSource {
    pub fn new(id: i64, lang: &str) -> Self {
        Self {
            id,
            lang: lang.to_string(),
        }
    }
}

impl MangaSource for FakeMangaSource {
    fn id(&self) -> i64 {
        self.id
    }

    fn name(&self) -> &str {
        "Fake Manga"
    }

    fn as_catalogue(&self) -> Option<&dyn MangaCatalogueSource> {
        Some(self)
    }
}

fn manga(url: &str, title: &str) -> SManga {
    SManga {
        url: Some(url.to_string()),
        title: Some(title.to_string()),
        ..SManga::create()
    }
}

#[async_trait]
impl MangaCatalogueSource for FakeMangaSource {
    fn lang(&self) -> &str {
        &self.lang
    }

    fn base_url(&self) -> Option<&str> {
        Some("https://manga.example")
    }

    async fn get_popular_manga(&self, _page: u32) -> anyhow::Result<MangasPage> {
        let stub = SManga {
            title: Some("Stub".to_string()),
            ..SManga::create()
        };
        Ok(MangasPage::new(vec![manga("/manga/1", "Manga 1"), stub], true))
    }

    async fn get_latest_updates(&self, page: u32) -> anyhow::Result<MangasPage> {
        Ok(MangasPage::new(
            vec![manga(&format!("/manga/latest-{}", page), &format!("Latest {}", page))],
            false,
        ))
    }

    async fn get_search_manga(&self, _page: u32, query: &str, _filters: FilterList) -> anyhow::Result<MangasPage> {
        Ok(MangasPage::new(vec![manga("/manga/search", query)], false))
    }

    async fn get_manga_details(&self, manga: &SManga) -> anyhow::Result<SManga> {
        Ok(SManga {
            description: Some(format!("About {}", manga.title.clone().unwrap_or_default())),
            initialized: true,
            ..manga.clone()
        })
    }

    async fn get_chapter_list(&self, manga: &SManga) -> anyhow::Result<Vec<SChapter>> {
        let base = manga.url.clone().unwrap_or_default();
        let chapter = |suffix: &str, name: &str, number: f32| SChapter {
            url: format!("{}/{}", base, suffix),
            name: name.to_string(),
            chapter_number: number,
            ..SChapter::create()
        };
        Ok(vec![
            chapter("c12", "Chapter 12.5", 12.5),
            chapter("p3", "Part 3", 3.0),
            chapter("v2p3", "Vol 2 Part 3", 7.0),
        ])
    }

    async fn get_page_list(&self, chapter: &SChapter) -> anyhow::Result<Vec<Page>> {
        Ok(vec![
            Page::new(
                0,
                format!("{}#0", chapter.url),
                Some("https://img.example/1.jpg&Referer=https%3A%2F%2Fevil.example&X-Token=a+b".to_string()),
            ),
            Page::new(1, format!("{}#1", chapter.url), Some("https://img.example/2.jpg".to_string())),
        ])
    }
}

/// Classes every test class loader can resolve
pub fn fake_class_registry() -> ClassRegistry {
    let registry = ClassRegistry::new();
    registry.register("eu.kanade.test.FakeAnime", || {
        Ok(LoadedClass::AnimeSource(Arc::new(FakeAnimeSource::new(1, "en"))))
    });
    registry.register("eu.kanade.test.ConfigurableAnime", || {
        Ok(LoadedClass::AnimeSource(Arc::new(
            FakeAnimeSource::new(3, "en").configurable().with_hosters(),
        )))
    });
    registry.register("eu.kanade.test.FakeAnimeFactory", || {
        Ok(LoadedClass::AnimeSourceFactory(Box::new(FakeAnimeFactory)))
    });
    registry.register("eu.kanade.test.BareAnime", || Ok(LoadedClass::AnimeSource(Arc::new(BareAnime))));
    registry.register("eu.kanade.test.FakeManga", || {
        Ok(LoadedClass::MangaSource(Arc::new(FakeMangaSource::new(2, "en"))))
    });
    registry
}

/// Resolves a class by full name, else by its last segment under
/// `eu.kanade.test`, so dot-relative names work for any package
pub struct ShortNameClassLoaderFactory(pub Arc<ClassRegistry>);

struct ShortNameClassLoader(Arc<ClassRegistry>);

impl ClassLoader for ShortNameClassLoader {
    fn instantiate(&self, class_name: &str) -> std::result::Result<LoadedClass, ClassLoadError> {
        if self.0.contains(class_name) {
            return self.0.instantiate(class_name);
        }
        let short = class_name.rsplit('.').next().unwrap_or(class_name);
        self.0.instantiate(&format!("eu.kanade.test.{}", short))
    }
}

impl ClassLoaderFactory for ShortNameClassLoaderFactory {
    fn create(&self, _package_name: &str, _code_path: &Path) -> std::result::Result<Box<dyn ClassLoader>, ClassLoadError> {
        Ok(Box::new(ShortNameClassLoader(self.0.clone())))
    }
}

#[derive(Default)]
pub struct FakePackageRegistry {
    packages: Mutex<Vec<(PackageInfo, ApplicationInfo)>>,
}

impl FakePackageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, package: (PackageInfo, ApplicationInfo)) {
        let mut packages = self.packages.lock().unwrap();
        packages.retain(|(info, _)| info.package_name != package.0.package_name);
        packages.push(package);
    }

    pub fn remove(&self, package_name: &str) {
        self.packages
            .lock()
            .unwrap()
            .retain(|(info, _)| info.package_name != package_name);
    }

    pub fn package(&self, package_name: &str) -> Option<PackageInfo> {
        self.packages
            .lock()
            .unwrap()
            .iter()
            .find(|(info, _)| info.package_name == package_name)
            .map(|(info, _)| info.clone())
    }
}

impl PackageRegistry for FakePackageRegistry {
    fn installed_packages(&self, filter: PackageFilter<'_>) -> Result<Vec<PackageInfo>> {
        Ok(self
            .packages
            .lock()
            .unwrap()
            .iter()
            .map(|(info, _)| info.clone())
            .filter(|info| filter(info))
            .collect())
    }

    fn application_info(&self, package_name: &str) -> Result<ApplicationInfo> {
        self.packages
            .lock()
            .unwrap()
            .iter()
            .find(|(info, _)| info.package_name == package_name)
            .map(|(_, app)| app.clone())
            .ok_or_else(|| BridgeError::ExtensionNotFound(package_name.to_string()))
    }

    fn application_icon(&self, package_name: &str) -> Option<Vec<u8>> {
        self.package(package_name)?;
        let image = image::DynamicImage::ImageRgba8(image::RgbaImage::new(1, 1));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .ok()?;
        Some(bytes)
    }
}

fn package(
    feature: &str,
    label_prefix: &str,
    package_name: &str,
    version_name: &str,
    class_names: &str,
    nsfw: bool,
) -> (PackageInfo, ApplicationInfo) {
    let mut metadata = MetadataBundle::new();
    metadata.insert(format!("{}.class", feature), class_names);
    if nsfw {
        metadata.insert(format!("{}.nsfw", feature), 1);
    }

    (
        PackageInfo {
            package_name: package_name.to_string(),
            version_name: Some(version_name.to_string()),
            version_code: 1,
            required_features: vec![feature.to_string()],
            signatures: vec!["test-signature".to_string()],
        },
        ApplicationInfo {
            label: format!("{}{}", label_prefix, package_name),
            source_dir: PathBuf::from("/ext").join(package_name),
            metadata,
        },
    )
}

pub fn anime_package(package_name: &str, version_name: &str, class_names: &str) -> (PackageInfo, ApplicationInfo) {
    package(
        "tachiyomi.animeextension",
        "Aniyomi: ",
        package_name,
        version_name,
        class_names,
        true,
    )
}

pub fn manga_package(package_name: &str, version_name: &str, class_names: &str) -> (PackageInfo, ApplicationInfo) {
    package(
        "tachiyomi.extension",
        "Tachiyomi: ",
        package_name,
        version_name,
        class_names,
        false,
    )
}

/// Index fetcher for a host without network access
pub struct NoNetwork;

#[async_trait]
impl IndexFetcher for NoNetwork {
    async fn fetch(&self, url: &str) -> Result<String> {
        Err(BridgeError::NetworkError(format!("offline: {}", url)))
    }
}

/// Bridge over one anime package (a configurable hoster source plus a
/// two-language factory) and one manga package, already loaded. The temp
/// dir holds the icon cache and must outlive the bridge.
pub async fn test_bridge() -> (ExtensionBridge, Arc<MemoryPreferenceStore>, TempDir) {
    let registry = Arc::new(FakePackageRegistry::new());
    registry.add(anime_package("eu.kanade.anime", "14.2", ".ConfigurableAnime;.FakeAnimeFactory"));
    registry.add(manga_package("eu.kanade.manga", "1.4.3", ".FakeManga"));

    let icons = TempDir::new().unwrap();
    let loader = ExtensionLoader::new(
        registry,
        Arc::new(ShortNameClassLoaderFactory(Arc::new(fake_class_registry()))),
        Arc::new(IconCache::new(icons.path())),
        Arc::new(TrustPolicy::permissive()),
    );
    let repositories = Arc::new(RepositoryClient::new(Arc::new(NoNetwork), "https://gcore.jsdelivr.net/gh/"));
    let catalog = Arc::new(ExtensionCatalog::new(loader, repositories));
    catalog.load_all().await.unwrap();

    let store = Arc::new(MemoryPreferenceStore::new());
    let shared: Arc<dyn PreferenceStore> = store.clone();
    (ExtensionBridge::new(catalog, shared), store, icons)
}
