//! Extension loader
//!
//! Turns one installed package into an [`ExtensionDescriptor`]:
//! - resolves application metadata and the display name
//! - gates the lib version against the media kind's supported range
//! - applies the signature trust policy
//! - instantiates every declared source class through an isolated class
//!   loader, expanding factories; any failure rejects the whole package
//! - derives the extension language and caches its icon
//!
//! Packages are independent, so [`ExtensionLoader::load_all`] loads them
//! concurrently on the blocking pool and joins before returning.

use std::collections::{BTreeSet, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use futures::future::join_all;

use super::class_loader::{ClassLoadError, ClassLoaderFactory, LoadedClass};
use super::icon::IconCache;
use super::package::{self, PackageInfo, PackageRegistry};
use super::types::{
    parse_lib_version, strip_label_prefix, ExtensionDescriptor, InstalledExtension, MediaKind,
    SourceHandle, UntrustedExtension,
};
use crate::core::error::{BridgeError, Result};

const METADATA_SOURCE_CLASS: &str = ".class";
const METADATA_SOURCE_FACTORY: &str = ".factory";
const METADATA_NSFW: &str = ".nsfw";
const METADATA_HAS_README: &str = ".hasReadme";
const METADATA_HAS_CHANGELOG: &str = ".hasChangelog";

/// Why a single package failed to load
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LoadError {
    #[error("Package metadata unavailable: {0}")]
    PackageUnavailable(String),

    #[error("Missing version name")]
    MissingVersion,

    #[error("Lib version {found:?} is outside the supported range {min} to {max}")]
    UnsupportedLibVersion { found: Option<f64>, min: f64, max: f64 },

    #[error("Missing source class metadata")]
    MissingClassMetadata,

    #[error("Class loader creation failed: {0}")]
    ClassLoader(String),

    #[error("Failed to load class {class}: {reason}")]
    ClassInstantiation { class: String, reason: String },

    #[error("Unknown source class type for {class}: {found}")]
    UnexpectedClassType { class: String, found: String },

    #[error("Load task failed: {0}")]
    Task(String),
}

/// Signature trust policy shared by every load pass
pub struct TrustPolicy {
    require_trusted: bool,
    trusted: RwLock<HashSet<String>>,
}

impl TrustPolicy {
    pub fn new(require_trusted: bool, trusted: impl IntoIterator<Item = String>) -> Self {
        Self {
            require_trusted,
            trusted: RwLock::new(trusted.into_iter().collect()),
        }
    }

    /// Every package is trusted
    pub fn permissive() -> Self {
        Self::new(false, Vec::new())
    }

    pub fn is_trusted(&self, package: &PackageInfo) -> bool {
        if !self.require_trusted {
            return true;
        }
        let trusted = self.trusted.read().unwrap_or_else(PoisonError::into_inner);
        package.signatures.iter().any(|signature| trusted.contains(signature))
    }

    pub fn trust(&self, signature: &str) {
        self.trusted
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(signature.to_string());
    }
}

#[derive(Clone)]
pub struct ExtensionLoader {
    registry: Arc<dyn PackageRegistry>,
    class_loaders: Arc<dyn ClassLoaderFactory>,
    icons: Arc<IconCache>,
    trust: Arc<TrustPolicy>,
}

impl ExtensionLoader {
    pub fn new(
        registry: Arc<dyn PackageRegistry>,
        class_loaders: Arc<dyn ClassLoaderFactory>,
        icons: Arc<IconCache>,
        trust: Arc<TrustPolicy>,
    ) -> Self {
        Self {
            registry,
            class_loaders,
            icons,
            trust,
        }
    }

    pub fn trust_policy(&self) -> &Arc<TrustPolicy> {
        &self.trust
    }

    /// Load one package. Never panics on foreign failures; they come back
    /// as `ExtensionDescriptor::Error`.
    pub fn load(&self, kind: MediaKind, package: &PackageInfo) -> ExtensionDescriptor {
        match self.try_load(kind, package) {
            Ok(descriptor) => descriptor,
            Err(error) => {
                tracing::warn!(
                    kind = %kind,
                    package = %package.package_name,
                    error = %error,
                    "Extension load failed"
                );
                ExtensionDescriptor::Error {
                    package: package.package_name.clone(),
                    error,
                }
            }
        }
    }

    fn try_load(&self, kind: MediaKind, package: &PackageInfo) -> std::result::Result<ExtensionDescriptor, LoadError> {
        let pkg_name = package.package_name.as_str();

        let app_info = self
            .registry
            .application_info(pkg_name)
            .map_err(|e| LoadError::PackageUnavailable(e.to_string()))?;

        let name = strip_label_prefix(&app_info.label, kind.label_prefix()).to_string();

        let version_name = match package.version_name.as_deref() {
            Some(version) if !version.is_empty() => version.to_string(),
            _ => return Err(LoadError::MissingVersion),
        };

        let (min, max) = kind.lib_version_range();
        let lib_version = match parse_lib_version(&version_name) {
            Some(lib_version) if kind.supports_lib_version(lib_version) => lib_version,
            found => return Err(LoadError::UnsupportedLibVersion { found, min, max }),
        };

        if !self.trust.is_trusted(package) {
            tracing::info!(package = %pkg_name, "Extension signature is not trusted");
            return Ok(ExtensionDescriptor::Untrusted(UntrustedExtension {
                kind,
                name,
                pkg_name: pkg_name.to_string(),
                version_name,
                version_code: package.version_code,
                lib_version,
                signature_hash: package.signatures.first().cloned().unwrap_or_default(),
            }));
        }

        let metadata = &app_info.metadata;
        let flag = |suffix: &str| metadata.get_int(&kind.metadata_key(suffix), 0) == 1;
        let is_nsfw = flag(METADATA_NSFW);
        let has_readme = flag(METADATA_HAS_README);
        let has_changelog = flag(METADATA_HAS_CHANGELOG);

        let class_loader = self
            .class_loaders
            .create(pkg_name, &app_info.source_dir)
            .map_err(|e| LoadError::ClassLoader(e.to_string()))?;

        let class_names = metadata
            .get_string(&kind.metadata_key(METADATA_SOURCE_CLASS))
            .ok_or(LoadError::MissingClassMetadata)?;

        let mut sources = Vec::new();
        for class_name in resolve_class_names(pkg_name, class_names) {
            let loaded = class_loader
                .instantiate(&class_name)
                .map_err(|e| class_error(&class_name, e))?;
            sources.extend(expand(kind, &class_name, loaded)?);
        }

        let langs: BTreeSet<&str> = sources.iter().filter_map(SourceHandle::lang).collect();
        let lang = match langs.len() {
            0 => String::new(),
            1 => langs.iter().next().copied().unwrap_or_default().to_string(),
            _ => "all".to_string(),
        };

        let icon_path = self.icons.extract(self.registry.as_ref(), pkg_name);

        tracing::info!(
            kind = %kind,
            package = %pkg_name,
            version = %version_name,
            sources = sources.len(),
            lang = %lang,
            "Extension loaded"
        );

        Ok(ExtensionDescriptor::Installed(InstalledExtension {
            kind,
            name,
            pkg_name: pkg_name.to_string(),
            version_name,
            version_code: package.version_code,
            lib_version,
            lang,
            is_nsfw,
            has_readme,
            has_changelog,
            sources,
            pkg_factory: metadata
                .get_string(&kind.metadata_key(METADATA_SOURCE_FACTORY))
                .map(str::to_string),
            icon_path,
            has_update: false,
            is_obsolete: false,
            is_unofficial: true,
        }))
    }

    /// Scan for `kind` packages and load them all concurrently
    pub async fn load_all(&self, kind: MediaKind) -> Result<Vec<ExtensionDescriptor>> {
        let registry = self.registry.clone();
        let packages = tokio::task::spawn_blocking(move || package::scan(registry.as_ref(), kind))
            .await
            .map_err(|e| BridgeError::Internal(format!("Package scan task failed: {}", e)))??;

        if packages.is_empty() {
            return Ok(Vec::new());
        }

        let loads = packages.into_iter().map(|package| self.load_async(kind, package));
        let descriptors = join_all(loads).await;

        tracing::info!(
            kind = %kind,
            total = descriptors.len(),
            installed = descriptors
                .iter()
                .filter(|d| matches!(d, ExtensionDescriptor::Installed(_)))
                .count(),
            "Extension load pass finished"
        );
        Ok(descriptors)
    }

    /// Load a single installed package by name
    pub async fn load_package(&self, kind: MediaKind, package_name: &str) -> Result<ExtensionDescriptor> {
        let registry = self.registry.clone();
        let wanted = package_name.to_string();
        let packages = tokio::task::spawn_blocking(move || {
            registry.installed_packages(&|pkg: &PackageInfo| {
                pkg.package_name == wanted && pkg.declares_feature(kind.feature())
            })
        })
        .await
        .map_err(|e| BridgeError::Internal(format!("Package lookup task failed: {}", e)))??;

        let package = packages
            .into_iter()
            .next()
            .ok_or_else(|| BridgeError::ExtensionNotFound(package_name.to_string()))?;
        Ok(self.load_async(kind, package).await)
    }

    async fn load_async(&self, kind: MediaKind, package: PackageInfo) -> ExtensionDescriptor {
        let loader = self.clone();
        let package_name = package.package_name.clone();
        match tokio::task::spawn_blocking(move || loader.load(kind, &package)).await {
            Ok(descriptor) => descriptor,
            Err(e) => {
                tracing::error!(package = %package_name, error = %e, "Extension load task failed");
                ExtensionDescriptor::Error {
                    package: package_name,
                    error: LoadError::Task(e.to_string()),
                }
            }
        }
    }
}

/// Split the `;` separated class list, resolving `.Relative` names
/// against the package name
pub fn resolve_class_names(package_name: &str, class_names: &str) -> Vec<String> {
    class_names
        .split(';')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| {
            if name.starts_with('.') {
                format!("{}{}", package_name, name)
            } else {
                name.to_string()
            }
        })
        .collect()
}

fn class_error(class_name: &str, error: ClassLoadError) -> LoadError {
    LoadError::ClassInstantiation {
        class: class_name.to_string(),
        reason: error.to_string(),
    }
}

/// Sources provided by one instantiated class
fn expand(
    kind: MediaKind,
    class_name: &str,
    loaded: LoadedClass,
) -> std::result::Result<Vec<SourceHandle>, LoadError> {
    let factory_failed = || LoadError::ClassInstantiation {
        class: class_name.to_string(),
        reason: "source factory panicked".to_string(),
    };

    match (kind, loaded) {
        (MediaKind::Anime, LoadedClass::AnimeSource(source)) => Ok(vec![SourceHandle::Anime(source)]),
        (MediaKind::Anime, LoadedClass::AnimeSourceFactory(factory)) => {
            catch_unwind(AssertUnwindSafe(|| factory.create_sources()))
                .map(|sources| sources.into_iter().map(SourceHandle::Anime).collect())
                .map_err(|_| factory_failed())
        }
        (MediaKind::Manga, LoadedClass::MangaSource(source)) => Ok(vec![SourceHandle::Manga(source)]),
        (MediaKind::Manga, LoadedClass::MangaSourceFactory(factory)) => {
            catch_unwind(AssertUnwindSafe(|| factory.create_sources()))
                .map(|sources| sources.into_iter().map(SourceHandle::Manga).collect())
                .map_err(|_| factory_failed())
        }
        (_, other) => Err(LoadError::UnexpectedClassType {
            class: class_name.to_string(),
            found: other.type_name().to_string(),
        }),
    }
}
