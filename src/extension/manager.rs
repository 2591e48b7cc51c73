//! Extension manager
//!
//! One manager per media kind owns the installed, available and untrusted
//! lists. Lists are published as `Arc<Vec<_>>` snapshots and replaced
//! wholesale, so a reader holding a snapshot never sees a partial update.

use std::sync::Arc;

use tokio::sync::RwLock;

use super::loader::ExtensionLoader;
use super::repository::RepositoryClient;
use super::types::{AvailableExtension, ExtensionDescriptor, InstalledExtension, MediaKind, UntrustedExtension};
use crate::core::error::{BridgeError, Result};

pub struct ExtensionManager {
    kind: MediaKind,
    loader: ExtensionLoader,
    repositories: Arc<RepositoryClient>,
    installed: RwLock<Arc<Vec<InstalledExtension>>>,
    available: RwLock<Arc<Vec<AvailableExtension>>>,
    untrusted: RwLock<Arc<Vec<UntrustedExtension>>>,
}

impl ExtensionManager {
    pub fn new(kind: MediaKind, loader: ExtensionLoader, repositories: Arc<RepositoryClient>) -> Self {
        Self {
            kind,
            loader,
            repositories,
            installed: RwLock::new(Arc::new(Vec::new())),
            available: RwLock::new(Arc::new(Vec::new())),
            untrusted: RwLock::new(Arc::new(Vec::new())),
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub async fn installed(&self) -> Arc<Vec<InstalledExtension>> {
        self.installed.read().await.clone()
    }

    pub async fn available(&self) -> Arc<Vec<AvailableExtension>> {
        self.available.read().await.clone()
    }

    pub async fn untrusted(&self) -> Arc<Vec<UntrustedExtension>> {
        self.untrusted.read().await.clone()
    }

    pub async fn find_installed(&self, package_name: &str) -> Option<InstalledExtension> {
        self.installed
            .read()
            .await
            .iter()
            .find(|ext| ext.pkg_name == package_name)
            .cloned()
    }

    /// Rescan and reload every package, replacing the installed and
    /// untrusted lists. Failed packages are logged and left out.
    pub async fn fetch_installed(&self) -> Result<Arc<Vec<InstalledExtension>>> {
        let descriptors = self.loader.load_all(self.kind).await?;

        let mut installed: Vec<InstalledExtension> = Vec::new();
        let mut untrusted = Vec::new();
        let mut failed = 0usize;
        for descriptor in descriptors {
            match descriptor {
                ExtensionDescriptor::Installed(ext) => {
                    if installed.iter().any(|other| other.pkg_name == ext.pkg_name) {
                        tracing::warn!(package = %ext.pkg_name, "Duplicate installed package ignored");
                        continue;
                    }
                    installed.push(ext);
                }
                ExtensionDescriptor::Untrusted(ext) => untrusted.push(ext),
                ExtensionDescriptor::Error { .. } => failed += 1,
                ExtensionDescriptor::Available(ext) => {
                    tracing::warn!(package = %ext.pkg_name, "Loader returned an available descriptor");
                }
            }
        }

        tracing::info!(
            kind = %self.kind,
            installed = installed.len(),
            untrusted = untrusted.len(),
            failed,
            "Installed extensions refreshed"
        );

        // lock order: installed, then available
        let mut published = self.installed.write().await;
        apply_statuses(&mut installed, &self.available.read().await);

        let installed = Arc::new(installed);
        *self.untrusted.write().await = Arc::new(untrusted);
        *published = installed.clone();
        Ok(installed)
    }

    /// Fetch the given repositories and replace the available list
    pub async fn find_available(&self, repositories: &[String]) -> Arc<Vec<AvailableExtension>> {
        let available = Arc::new(self.repositories.find_available(self.kind, repositories).await);

        let mut installed = self.installed.write().await;
        *self.available.write().await = available.clone();
        let mut refreshed = installed.as_ref().clone();
        apply_statuses(&mut refreshed, &available);
        *installed = Arc::new(refreshed);

        available
    }

    /// Add a newly installed extension, replacing any entry with the same
    /// package name
    pub async fn register_new(&self, mut extension: InstalledExtension) {
        let mut installed = self.installed.write().await;
        apply_status(&mut extension, &self.available.read().await);

        let mut next: Vec<InstalledExtension> = installed
            .iter()
            .filter(|ext| ext.pkg_name != extension.pkg_name)
            .cloned()
            .collect();
        tracing::info!(kind = %self.kind, package = %extension.pkg_name, "Extension registered");
        next.push(extension);
        *installed = Arc::new(next);
    }

    /// Remove a package from the installed and untrusted lists
    pub async fn unregister(&self, package_name: &str) -> bool {
        let removed = {
            let mut installed = self.installed.write().await;
            let next: Vec<InstalledExtension> = installed
                .iter()
                .filter(|ext| ext.pkg_name != package_name)
                .cloned()
                .collect();
            let removed = next.len() != installed.len();
            *installed = Arc::new(next);
            removed
        };

        let mut untrusted = self.untrusted.write().await;
        let next: Vec<UntrustedExtension> = untrusted
            .iter()
            .filter(|ext| ext.pkg_name != package_name)
            .cloned()
            .collect();
        *untrusted = Arc::new(next);

        if removed {
            tracing::info!(kind = %self.kind, package = %package_name, "Extension unregistered");
        }
        removed
    }

    /// Replace the entry with the same package name; no-op when absent
    pub async fn update_extension(&self, mut extension: InstalledExtension) -> bool {
        let mut installed = self.installed.write().await;
        apply_status(&mut extension, &self.available.read().await);

        if !installed.iter().any(|ext| ext.pkg_name == extension.pkg_name) {
            tracing::debug!(package = %extension.pkg_name, "Update for unknown extension ignored");
            return false;
        }

        let next: Vec<InstalledExtension> = installed
            .iter()
            .map(|ext| {
                if ext.pkg_name == extension.pkg_name {
                    extension.clone()
                } else {
                    ext.clone()
                }
            })
            .collect();
        *installed = Arc::new(next);
        true
    }

    /// Reload one installed package and register it, e.g. after an
    /// install or update event
    pub async fn reload_package(&self, package_name: &str) -> Result<InstalledExtension> {
        match self.loader.load_package(self.kind, package_name).await? {
            ExtensionDescriptor::Installed(ext) => {
                self.remove_untrusted(package_name).await;
                self.register_new(ext.clone()).await;
                Ok(ext)
            }
            ExtensionDescriptor::Untrusted(ext) => {
                let mut untrusted = self.untrusted.write().await;
                let mut next: Vec<UntrustedExtension> = untrusted
                    .iter()
                    .filter(|other| other.pkg_name != ext.pkg_name)
                    .cloned()
                    .collect();
                next.push(ext);
                *untrusted = Arc::new(next);
                Err(BridgeError::Untrusted(package_name.to_string()))
            }
            ExtensionDescriptor::Error { error, .. } => Err(BridgeError::LoadError(format!(
                "{}: {}",
                package_name, error
            ))),
            ExtensionDescriptor::Available(_) => Err(BridgeError::Internal(format!(
                "Unexpected available descriptor for {}",
                package_name
            ))),
        }
    }

    /// Trust `signature` and promote the package to installed
    pub async fn trust(&self, package_name: &str, signature: &str) -> Result<InstalledExtension> {
        tracing::info!(package = %package_name, "Trusting extension signature");
        self.loader.trust_policy().trust(signature);
        self.reload_package(package_name).await
    }

    async fn remove_untrusted(&self, package_name: &str) {
        let mut untrusted = self.untrusted.write().await;
        if untrusted.iter().any(|ext| ext.pkg_name == package_name) {
            let next: Vec<UntrustedExtension> = untrusted
                .iter()
                .filter(|ext| ext.pkg_name != package_name)
                .cloned()
                .collect();
            *untrusted = Arc::new(next);
        }
    }
}

fn apply_statuses(installed: &mut [InstalledExtension], available: &[AvailableExtension]) {
    for extension in installed.iter_mut() {
        apply_status(extension, available);
    }
}

/// `has_update`: a newer version code is available.
/// `is_obsolete`: the available list is known and no longer has the package.
fn apply_status(extension: &mut InstalledExtension, available: &[AvailableExtension]) {
    let listed = available.iter().find(|a| a.pkg_name == extension.pkg_name);
    extension.has_update = listed.map_or(false, |a| a.version_code > extension.version_code);
    extension.is_obsolete = !available.is_empty() && listed.is_none();
}

/// The anime and manga managers
pub struct ExtensionCatalog {
    anime: Arc<ExtensionManager>,
    manga: Arc<ExtensionManager>,
}

impl ExtensionCatalog {
    pub fn new(loader: ExtensionLoader, repositories: Arc<RepositoryClient>) -> Self {
        Self {
            anime: Arc::new(ExtensionManager::new(MediaKind::Anime, loader.clone(), repositories.clone())),
            manga: Arc::new(ExtensionManager::new(MediaKind::Manga, loader, repositories)),
        }
    }

    pub fn manager(&self, kind: MediaKind) -> &Arc<ExtensionManager> {
        match kind {
            MediaKind::Anime => &self.anime,
            MediaKind::Manga => &self.manga,
        }
    }

    /// Load both kinds concurrently
    pub async fn load_all(&self) -> Result<()> {
        let (anime, manga) = tokio::join!(self.anime.fetch_installed(), self.manga.fetch_installed());
        anime?;
        manga?;
        Ok(())
    }

    /// Installed extension by package name
    pub async fn find_installed(&self, kind: MediaKind, package_name: &str) -> Result<InstalledExtension> {
        self.manager(kind)
            .find_installed(package_name)
            .await
            .ok_or_else(|| BridgeError::ExtensionNotFound(package_name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::icon::IconCache;
    use crate::extension::loader::TrustPolicy;
    use crate::extension::repository::IndexFetcher;
    use crate::test_support::*;
    use async_trait::async_trait;
    use serde_json::json;
    use tempfile::TempDir;

    struct StaticFetcher(String);

    #[async_trait]
    impl IndexFetcher for StaticFetcher {
        async fn fetch(&self, _url: &str) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    struct Fixture {
        registry: Arc<FakePackageRegistry>,
        catalog: ExtensionCatalog,
        _icons: TempDir,
    }

    fn fixture(require_trusted: bool) -> Fixture {
        let registry = Arc::new(FakePackageRegistry::new());
        let icons = TempDir::new().unwrap();
        let loader = ExtensionLoader::new(
            registry.clone(),
            Arc::new(ShortNameClassLoaderFactory(Arc::new(fake_class_registry()))),
            Arc::new(IconCache::new(icons.path())),
            Arc::new(TrustPolicy::new(require_trusted, vec!["test-signature".to_string()])),
        );
        let index = json!([
            { "name": "Aniyomi: A", "pkg": "eu.kanade.a", "apk": "a.apk", "lang": "en", "code": 5, "version": "14.5", "nsfw": 0 },
            { "name": "Aniyomi: C", "pkg": "eu.kanade.c", "apk": "c.apk", "lang": "en", "code": 1, "version": "14.1", "nsfw": 0 }
        ]);
        let repositories = Arc::new(RepositoryClient::new(
            Arc::new(StaticFetcher(index.to_string())),
            "https://gcore.jsdelivr.net/gh/",
        ));
        Fixture {
            registry,
            catalog: ExtensionCatalog::new(loader, repositories),
            _icons: icons,
        }
    }

    #[tokio::test]
    async fn test_fetch_installed_replaces_list() {
        let fixture = fixture(false);
        fixture.registry.add(anime_package("eu.kanade.a", "14.0", ".FakeAnime"));
        fixture.registry.add(anime_package("eu.kanade.broken", "14.0", ".Missing"));
        fixture.registry.add(manga_package("eu.kanade.m", "1.4.0", ".FakeManga"));

        fixture.catalog.load_all().await.unwrap();
        let anime = fixture.catalog.manager(MediaKind::Anime);
        let before = anime.installed().await;
        assert_eq!(before.len(), 1);
        assert_eq!(fixture.catalog.manager(MediaKind::Manga).installed().await.len(), 1);

        fixture.registry.remove("eu.kanade.a");
        anime.fetch_installed().await.unwrap();
        assert!(anime.installed().await.is_empty());
        // snapshots taken earlier are untouched
        assert_eq!(before.len(), 1);
    }

    #[tokio::test]
    async fn test_statuses_follow_available_list() {
        let fixture = fixture(false);
        fixture.registry.add(anime_package("eu.kanade.a", "14.0", ".FakeAnime"));
        fixture.registry.add(anime_package("eu.kanade.b", "14.0", ".FakeAnime"));
        let anime = fixture.catalog.manager(MediaKind::Anime);
        anime.fetch_installed().await.unwrap();

        let available = anime.find_available(&["https://host/o/r".to_string()]).await;
        assert_eq!(available.len(), 2);

        let a = anime.find_installed("eu.kanade.a").await.unwrap();
        assert!(a.has_update);
        assert!(!a.is_obsolete);
        let b = anime.find_installed("eu.kanade.b").await.unwrap();
        assert!(!b.has_update);
        assert!(b.is_obsolete);
    }

    #[tokio::test]
    async fn test_concurrent_rescan_and_fetch_agree_on_statuses() {
        let fixture = fixture(false);
        fixture.registry.add(anime_package("eu.kanade.a", "14.0", ".FakeAnime"));
        fixture.registry.add(anime_package("eu.kanade.b", "14.0", ".FakeAnime"));
        let anime = fixture.catalog.manager(MediaKind::Anime);
        let repositories = vec!["https://host/o/r".to_string()];

        for _ in 0..20 {
            let (installed, available) =
                tokio::join!(anime.fetch_installed(), anime.find_available(&repositories));
            installed.unwrap();
            assert_eq!(available.len(), 2);

            let a = anime.find_installed("eu.kanade.a").await.unwrap();
            assert!(a.has_update);
            let b = anime.find_installed("eu.kanade.b").await.unwrap();
            assert!(b.is_obsolete);
        }
    }

    #[tokio::test]
    async fn test_incremental_mutations_keep_packages_unique() {
        let fixture = fixture(false);
        fixture.registry.add(anime_package("eu.kanade.a", "14.0", ".FakeAnime"));
        let anime = fixture.catalog.manager(MediaKind::Anime);
        let mut ext = anime.fetch_installed().await.unwrap()[0].clone();

        anime.register_new(ext.clone()).await;
        assert_eq!(anime.installed().await.len(), 1);

        ext.version_name = "14.9".to_string();
        assert!(anime.update_extension(ext.clone()).await);
        assert_eq!(anime.installed().await[0].version_name, "14.9");

        let mut unknown = ext.clone();
        unknown.pkg_name = "eu.kanade.unknown".to_string();
        assert!(!anime.update_extension(unknown).await);

        assert!(anime.unregister("eu.kanade.a").await);
        assert!(!anime.unregister("eu.kanade.a").await);
        assert!(anime.installed().await.is_empty());
    }

    #[tokio::test]
    async fn test_trust_promotes_untrusted_package() {
        let fixture = fixture(true);
        let (mut package, app) = anime_package("eu.kanade.new", "14.0", ".FakeAnime");
        package.signatures = vec!["new-signature".to_string()];
        fixture.registry.add((package, app));
        let anime = fixture.catalog.manager(MediaKind::Anime);

        anime.fetch_installed().await.unwrap();
        assert!(anime.installed().await.is_empty());
        assert_eq!(anime.untrusted().await[0].signature_hash, "new-signature");

        let ext = anime.trust("eu.kanade.new", "new-signature").await.unwrap();
        assert_eq!(ext.pkg_name, "eu.kanade.new");
        assert!(anime.untrusted().await.is_empty());
        assert_eq!(anime.installed().await.len(), 1);
    }

    #[tokio::test]
    async fn test_reload_failure_is_reported() {
        let fixture = fixture(false);
        fixture.registry.add(anime_package("eu.kanade.bad", "99.0", ".FakeAnime"));
        let anime = fixture.catalog.manager(MediaKind::Anime);

        assert!(matches!(
            anime.reload_package("eu.kanade.bad").await,
            Err(BridgeError::LoadError(_))
        ));
        assert!(matches!(
            fixture.catalog.find_installed(MediaKind::Anime, "eu.kanade.bad").await,
            Err(BridgeError::ExtensionNotFound(_))
        ));
    }
}
