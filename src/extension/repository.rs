//! Remote extension repositories
//!
//! A repository publishes an `index.min.json` array of extension entries.
//! Each repository is fetched once from its own host; on any failure it is
//! retried exactly once against a CDN mirror derived from the GitHub-style
//! `{host}/{owner}/{repo}[/{branch}]` path. Repositories that fail both
//! attempts, or cannot be mirrored, are dropped without affecting the rest.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::types::{parse_lib_version, strip_label_prefix, AvailableExtension, AvailableSource, MediaKind};
use crate::core::config::NetworkConfig;
use crate::core::error::{BridgeError, Result};

pub const INDEX_FILE: &str = "index.min.json";

/// Fetches a repository index body
#[async_trait]
pub trait IndexFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// `reqwest` backed fetcher; the client timeout bounds every attempt
pub struct HttpIndexFetcher {
    client: reqwest::Client,
}

impl HttpIndexFetcher {
    pub fn new(config: &NetworkConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout())
            .build()
            .map_err(|e| BridgeError::NetworkError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl IndexFetcher for HttpIndexFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BridgeError::NetworkError(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::NetworkError(format!("GET {} returned {}", url, status)));
        }

        response
            .text()
            .await
            .map_err(|e| BridgeError::NetworkError(format!("Failed to read {}: {}", url, e)))
    }
}

/// The repository URL itself when it already names the index file,
/// else `{repository}/index.min.json`
pub fn index_url(repository: &str) -> String {
    if repository.contains(INDEX_FILE) {
        repository.to_string()
    } else {
        format!("{}/{}", repository.trim_end_matches('/'), INDEX_FILE)
    }
}

/// Mirror base for a repository: `{mirror_base}{owner}/{repo}@{branch}`.
///
/// `None` when the path has fewer than three segments after the scheme.
pub fn fallback_repo_url(repository: &str, mirror_base: &str) -> Option<String> {
    let stripped = repository
        .strip_prefix("https://")
        .or_else(|| repository.strip_prefix("http://"))
        .unwrap_or(repository);
    let stripped = stripped.strip_suffix('/').unwrap_or(stripped);
    let stripped = stripped
        .strip_suffix(&format!("/{}", INDEX_FILE))
        .unwrap_or(stripped);

    let parts: Vec<&str> = stripped.split('/').collect();
    if parts.len() < 3 {
        return None;
    }

    let branch = parts.get(3).copied().unwrap_or("main");
    Some(format!(
        "{}/{}/{}@{}",
        mirror_base.trim_end_matches('/'),
        parts[1],
        parts[2],
        branch
    ))
}

pub fn mirror_index_url(repository: &str, mirror_base: &str) -> Option<String> {
    fallback_repo_url(repository, mirror_base)
        .map(|base| format!("{}/{}", base.trim_end_matches('/'), INDEX_FILE))
}

/// `{repository without the index file}/icon/{package}.png`
pub fn icon_url(repository: &str, package_name: &str) -> String {
    let base = repository
        .strip_suffix(&format!("/{}", INDEX_FILE))
        .unwrap_or(repository)
        .trim_end_matches('/');
    format!("{}/icon/{}.png", base, package_name)
}

/// One entry of a repository index
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionJsonObject {
    pub name: String,
    pub pkg: String,
    pub apk: String,
    pub lang: String,
    pub code: i64,
    pub version: String,
    pub nsfw: i32,
    #[serde(default)]
    pub has_readme: i32,
    #[serde(default)]
    pub has_changelog: i32,
    #[serde(default)]
    pub sources: Option<Vec<ExtensionSourceJsonObject>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtensionSourceJsonObject {
    #[serde(deserialize_with = "lenient_id")]
    pub id: i64,
    pub lang: String,
    pub name: String,
    pub base_url: String,
}

/// Source ids exceed the JSON safe-integer range, some indexes quote them
fn lenient_id<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| serde::de::Error::custom(format!("source id out of range: {}", n))),
        Value::String(s) => s.parse().map_err(serde::de::Error::custom),
        other => Err(serde::de::Error::custom(format!("invalid source id: {}", other))),
    }
}

impl ExtensionJsonObject {
    /// Available descriptor, `None` when the lib version is unparsable or
    /// outside the supported range for `kind`
    pub fn into_available(self, kind: MediaKind, repository: &str) -> Option<AvailableExtension> {
        let lib_version = parse_lib_version(&self.version).filter(|v| kind.supports_lib_version(*v))?;

        Some(AvailableExtension {
            kind,
            name: strip_label_prefix(&self.name, kind.label_prefix()).to_string(),
            icon_url: icon_url(repository, &self.pkg),
            pkg_name: self.pkg,
            version_name: self.version,
            version_code: self.code,
            lib_version,
            lang: self.lang,
            is_nsfw: self.nsfw == 1,
            has_readme: self.has_readme == 1,
            has_changelog: self.has_changelog == 1,
            sources: self
                .sources
                .unwrap_or_default()
                .into_iter()
                .map(|source| AvailableSource {
                    id: source.id,
                    lang: source.lang,
                    name: source.name,
                    base_url: source.base_url,
                })
                .collect(),
            apk_name: self.apk,
            repository: repository.to_string(),
        })
    }
}

/// Parse an index body. The body must be a JSON array; malformed entries
/// are skipped individually.
pub fn parse_index(kind: MediaKind, repository: &str, body: &str) -> Result<Vec<AvailableExtension>> {
    let entries: Vec<Value> = serde_json::from_str(body)?;

    let mut extensions = Vec::with_capacity(entries.len());
    for entry in entries {
        match serde_json::from_value::<ExtensionJsonObject>(entry) {
            Ok(entry) => extensions.extend(entry.into_available(kind, repository)),
            Err(e) => tracing::warn!(repository = %repository, error = %e, "Skipping malformed index entry"),
        }
    }
    Ok(extensions)
}

/// Fetches and merges repository indexes for one media kind
pub struct RepositoryClient {
    fetcher: Arc<dyn IndexFetcher>,
    mirror_base: String,
}

impl RepositoryClient {
    pub fn new(fetcher: Arc<dyn IndexFetcher>, mirror_base: impl Into<String>) -> Self {
        Self {
            fetcher,
            mirror_base: mirror_base.into(),
        }
    }

    /// Union of every repository that answered, in repository order.
    /// Entries with an empty package name are dropped.
    pub async fn find_available(&self, kind: MediaKind, repositories: &[String]) -> Vec<AvailableExtension> {
        if repositories.is_empty() {
            return Vec::new();
        }

        let fetches = repositories.iter().map(|repo| self.fetch_repository(kind, repo));
        let extensions: Vec<AvailableExtension> = join_all(fetches)
            .await
            .into_iter()
            .flatten()
            .flatten()
            .filter(|ext| !ext.pkg_name.is_empty())
            .collect();

        tracing::info!(
            kind = %kind,
            repositories = repositories.len(),
            extensions = extensions.len(),
            "Fetched available extensions"
        );
        extensions
    }

    async fn fetch_repository(&self, kind: MediaKind, repository: &str) -> Option<Vec<AvailableExtension>> {
        let body = self.fetch_with_mirror(repository).await?;
        match parse_index(kind, repository, &body) {
            Ok(extensions) => Some(extensions),
            Err(e) => {
                tracing::warn!(repository = %repository, error = %e, "Failed to parse repository index");
                None
            }
        }
    }

    async fn fetch_with_mirror(&self, repository: &str) -> Option<String> {
        let primary = index_url(repository);
        let error = match self.fetcher.fetch(&primary).await {
            Ok(body) => return Some(body),
            Err(e) => e,
        };

        let Some(mirror) = mirror_index_url(repository, &self.mirror_base) else {
            tracing::warn!(
                repository = %repository,
                error = %error,
                "Repository fetch failed and it cannot be mirrored"
            );
            return None;
        };

        tracing::warn!(
            repository = %repository,
            error = %error,
            mirror = %mirror,
            "Repository fetch failed, retrying via mirror"
        );
        match self.fetcher.fetch(&mirror).await {
            Ok(body) => Some(body),
            Err(e) => {
                tracing::warn!(repository = %repository, error = %e, "Mirror fetch failed");
                None
            }
        }
    }
}
