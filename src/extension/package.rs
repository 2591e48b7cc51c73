//! Package manager capability and the package scanner
//!
//! The bridge never installs anything: it asks a [`PackageRegistry`] which
//! packages are present and reads their metadata. [`DirectoryPackageRegistry`]
//! is the implementation used by the binary; it treats every
//! `{packages_dir}/*/package.json` manifest as one installed package.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::MediaKind;
use crate::core::error::{BridgeError, Result};

/// Key/value metadata attached to an application
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataBundle(HashMap<String, Value>);

impl MetadataBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Integer value, `default` when missing or not an integer
    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.0.get(key).and_then(Value::as_i64).unwrap_or(default)
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }
}

/// Installed package as reported by the package manager
#[derive(Debug, Clone, PartialEq)]
pub struct PackageInfo {
    pub package_name: String,
    pub version_name: Option<String>,
    pub version_code: i64,
    pub required_features: Vec<String>,
    /// Signing certificate hashes
    pub signatures: Vec<String>,
}

impl PackageInfo {
    pub fn declares_feature(&self, feature: &str) -> bool {
        self.required_features.iter().any(|f| f == feature)
    }
}

/// Application-level details of a package
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationInfo {
    pub label: String,
    /// Code path handed to the class loader
    pub source_dir: PathBuf,
    pub metadata: MetadataBundle,
}

pub type PackageFilter<'a> = &'a (dyn Fn(&PackageInfo) -> bool + Send + Sync);

/// Package manager capability
pub trait PackageRegistry: Send + Sync {
    /// Installed packages accepted by `filter`, in registry order
    fn installed_packages(&self, filter: PackageFilter<'_>) -> Result<Vec<PackageInfo>>;

    /// Fails with `ExtensionNotFound` when the package is gone
    fn application_info(&self, package_name: &str) -> Result<ApplicationInfo>;

    /// Raw icon bytes, if the package ships one
    fn application_icon(&self, package_name: &str) -> Option<Vec<u8>>;
}

/// Installed packages declaring the extension feature for `kind`, in the
/// order the registry returned them
pub fn scan(registry: &dyn PackageRegistry, kind: MediaKind) -> Result<Vec<PackageInfo>> {
    let feature = kind.feature();
    let packages = registry.installed_packages(&move |pkg: &PackageInfo| pkg.declares_feature(feature))?;

    tracing::debug!(kind = %kind, count = packages.len(), "Scanned installed packages");
    Ok(packages)
}

/// On-disk manifest of a directory package
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    pub package_name: String,
    pub label: String,
    #[serde(default)]
    pub version_name: Option<String>,
    #[serde(default)]
    pub version_code: i64,
    #[serde(default)]
    pub required_features: Vec<String>,
    #[serde(default)]
    pub signatures: Vec<String>,
    #[serde(default)]
    pub metadata: MetadataBundle,
    /// Relative to the package directory; empty means the directory itself
    #[serde(default)]
    pub code_path: String,
    #[serde(default)]
    pub icon: Option<String>,
}

const MANIFEST_FILE: &str = "package.json";

/// Package registry backed by a directory of package folders
pub struct DirectoryPackageRegistry {
    root: PathBuf,
}

impl DirectoryPackageRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All readable manifests with their package directory, sorted by
    /// directory name so scans are repeatable
    fn manifests(&self) -> Result<Vec<(PathBuf, PackageManifest)>> {
        if !self.root.exists() {
            tracing::warn!(path = ?self.root, "Packages directory does not exist");
            return Ok(Vec::new());
        }

        let mut dirs: Vec<PathBuf> = std::fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.join(MANIFEST_FILE).is_file())
            .collect();
        dirs.sort();

        let mut manifests = Vec::with_capacity(dirs.len());
        for dir in dirs {
            match read_manifest(&dir) {
                Ok(manifest) => manifests.push((dir, manifest)),
                Err(e) => tracing::warn!(path = ?dir, error = %e, "Skipping unreadable package manifest"),
            }
        }
        Ok(manifests)
    }

    fn find(&self, package_name: &str) -> Result<(PathBuf, PackageManifest)> {
        self.manifests()?
            .into_iter()
            .find(|(_, manifest)| manifest.package_name == package_name)
            .ok_or_else(|| BridgeError::ExtensionNotFound(package_name.to_string()))
    }
}

fn read_manifest(dir: &Path) -> Result<PackageManifest> {
    let content = std::fs::read_to_string(dir.join(MANIFEST_FILE))?;
    Ok(serde_json::from_str(&content)?)
}

impl PackageRegistry for DirectoryPackageRegistry {
    fn installed_packages(&self, filter: PackageFilter<'_>) -> Result<Vec<PackageInfo>> {
        Ok(self
            .manifests()?
            .into_iter()
            .map(|(_, manifest)| PackageInfo {
                package_name: manifest.package_name,
                version_name: manifest.version_name,
                version_code: manifest.version_code,
                required_features: manifest.required_features,
                signatures: manifest.signatures,
            })
            .filter(|pkg| filter(pkg))
            .collect())
    }

    fn application_info(&self, package_name: &str) -> Result<ApplicationInfo> {
        let (dir, manifest) = self.find(package_name)?;
        let source_dir = if manifest.code_path.is_empty() {
            dir
        } else {
            dir.join(&manifest.code_path)
        };

        Ok(ApplicationInfo {
            label: manifest.label,
            source_dir,
            metadata: manifest.metadata,
        })
    }

    fn application_icon(&self, package_name: &str) -> Option<Vec<u8>> {
        let (dir, manifest) = self.find(package_name).ok()?;
        let icon = manifest.icon?;
        std::fs::read(dir.join(icon)).ok()
    }
}
