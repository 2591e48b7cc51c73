//! Extension icon cache
//!
//! Icons are decoded from whatever format the package ships and written
//! back as PNG to `{dir}/{package}_icon.png`.

use std::path::PathBuf;

use super::package::PackageRegistry;
use crate::core::error::{BridgeError, Result};

pub struct IconCache {
    dir: PathBuf,
}

impl IconCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn icon_path(&self, package_name: &str) -> PathBuf {
        self.dir.join(format!("{}_icon.png", package_name))
    }

    /// Decode `bytes` and store them as the package's PNG icon
    pub fn store(&self, package_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| BridgeError::Internal(format!("Failed to decode icon: {}", e)))?;

        std::fs::create_dir_all(&self.dir)?;
        let path = self.icon_path(package_name);
        image
            .save_with_format(&path, image::ImageFormat::Png)
            .map_err(|e| BridgeError::Internal(format!("Failed to write icon: {}", e)))?;
        Ok(path)
    }

    /// Extract and cache a package icon; failures leave the icon absent
    pub fn extract(&self, registry: &dyn PackageRegistry, package_name: &str) -> Option<PathBuf> {
        let bytes = match registry.application_icon(package_name) {
            Some(bytes) => bytes,
            None => {
                tracing::debug!(package = %package_name, "Package has no icon");
                return None;
            }
        };

        match self.store(package_name, &bytes) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(package = %package_name, error = %e, "Failed to cache icon");
                None
            }
        }
    }
}
