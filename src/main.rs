//! Extension Bridge - method-channel host for anime/manga extensions

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use extension_bridge::core::{config::CliArgs, Config, Logger};
use extension_bridge::extension::{
    icon::IconCache, native::PackageClassLoaderFactory, ClassRegistry, DirectoryPackageRegistry,
    ExtensionCatalog, ExtensionLoader, HttpIndexFetcher, MediaKind, RepositoryClient, TrustPolicy,
};
use extension_bridge::preference::JsonFilePreferenceStore;
use extension_bridge::{ApiServer, ExtensionBridge};

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();
    let config = match Config::load_with(&cli_args) {
        Ok(cfg) => cfg,
        Err(e) => {
            // Logging isn't initialized yet
            eprintln!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let _logger = Logger::init(&config.logging)?;

    info!("Starting Extension Bridge v{}", env!("CARGO_PKG_VERSION"));
    info!(
        packages_dir = ?config.extensions.packages_dir,
        icon_cache_dir = ?config.extensions.icon_cache_dir,
        require_trusted = config.extensions.require_trusted_signatures,
        "Extension configuration"
    );

    for dir in [
        &config.extensions.packages_dir,
        &config.extensions.icon_cache_dir,
        &config.extensions.preference_dir,
    ] {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create directory {:?}", dir))?;
    }

    let trust = Arc::new(TrustPolicy::new(
        config.extensions.require_trusted_signatures,
        config.extensions.trusted_signatures.clone(),
    ));
    let loader = ExtensionLoader::new(
        Arc::new(DirectoryPackageRegistry::new(&config.extensions.packages_dir)),
        Arc::new(PackageClassLoaderFactory::new(Arc::new(ClassRegistry::new()))),
        Arc::new(IconCache::new(&config.extensions.icon_cache_dir)),
        trust,
    );

    let fetcher = HttpIndexFetcher::new(&config.network)?;
    let repositories = Arc::new(RepositoryClient::new(
        Arc::new(fetcher),
        config.network.mirror_base.clone(),
    ));

    let catalog = Arc::new(ExtensionCatalog::new(loader, repositories));
    catalog.load_all().await?;
    info!(
        anime = catalog.manager(MediaKind::Anime).installed().await.len(),
        manga = catalog.manager(MediaKind::Manga).installed().await.len(),
        "Installed extensions loaded"
    );

    let store = Arc::new(JsonFilePreferenceStore::new(&config.extensions.preference_dir)?);
    let bridge = ExtensionBridge::new(catalog, store);

    let server = ApiServer::new(config.server.clone(), bridge);
    server.serve().await
}
