//! Extension discovery and loading
//!
//! This module handles:
//! - Scanning installed packages for anime/manga extensions
//! - Loading source classes through isolated class loaders
//! - Lib-version gating and signature trust
//! - Remote repository indexes with mirror fallback
//! - The per-kind installed/available lists

pub mod class_loader;
pub mod icon;
pub mod loader;
pub mod manager;
pub mod native;
pub mod package;
pub mod repository;
pub mod types;

pub use class_loader::{ClassLoader, ClassLoaderFactory, ClassRegistry, LoadedClass};
pub use loader::{ExtensionLoader, LoadError, TrustPolicy};
pub use manager::{ExtensionCatalog, ExtensionManager};
pub use package::{DirectoryPackageRegistry, PackageRegistry};
pub use repository::{HttpIndexFetcher, IndexFetcher, RepositoryClient};
pub use types::{
    AvailableExtension, ExtensionDescriptor, InstalledExtension, MediaKind, SourceHandle,
    UntrustedExtension,
};
