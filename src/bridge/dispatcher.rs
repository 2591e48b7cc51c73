//! Dispatch façade
//!
//! Resolves a named call to an extension manager operation or a source
//! adapter call and converts the result into a channel reply. Every call
//! runs as its own detached task: a caller that goes away does not cancel
//! the foreign code, the result is simply dropped.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use super::call::{non_empty, MethodCall};
use super::codec::{
    episode_from_map, media_from_map, to_value, AvailableSummary, InstalledSummary, MediaDetail,
    MediaPage, PageSummary, VideoSummary,
};
use crate::core::error::{BridgeError, Result};
use crate::extension::manager::ExtensionCatalog;
use crate::extension::types::MediaKind;
use crate::preference::{
    namespace_for, PreferenceAction, PreferenceBridge, PreferenceScreen, PreferenceStore,
    SharedPreferences,
};
use crate::source::methods::{resolve_methods, SourceMethods};

#[derive(Clone)]
pub struct ExtensionBridge {
    catalog: Arc<ExtensionCatalog>,
    preferences: Arc<PreferenceBridge>,
    store: Arc<dyn PreferenceStore>,
}

impl ExtensionBridge {
    pub fn new(catalog: Arc<ExtensionCatalog>, store: Arc<dyn PreferenceStore>) -> Self {
        Self {
            catalog,
            preferences: Arc::new(PreferenceBridge::new()),
            store,
        }
    }

    pub fn catalog(&self) -> &Arc<ExtensionCatalog> {
        &self.catalog
    }

    /// Run one call to completion on its own task
    pub async fn handle(&self, call: MethodCall) -> Result<Value> {
        let bridge = self.clone();
        let method = call.method.clone();
        let started = Instant::now();

        let outcome = tokio::spawn(async move { bridge.dispatch(call).await })
            .await
            .map_err(|e| BridgeError::Internal(format!("Call task for {} failed: {}", method, e)))?;

        match &outcome {
            Ok(_) => tracing::debug!(
                method = %method,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Method call completed"
            ),
            Err(e) => tracing::warn!(
                method = %method,
                code = e.code(),
                error = %e,
                "Method call failed"
            ),
        }
        outcome
    }

    async fn dispatch(&self, call: MethodCall) -> Result<Value> {
        tracing::debug!(method = %call.method, "Method called");

        match call.method.as_str() {
            "getInstalledAnimeExtensions" => self.installed(MediaKind::Anime).await,
            "getInstalledMangaExtensions" => self.installed(MediaKind::Manga).await,
            "fetchAnimeExtensions" => self.fetch_available(MediaKind::Anime, &call).await,
            "fetchMangaExtensions" => self.fetch_available(MediaKind::Manga, &call).await,
            "getPopular" => {
                let page = call.required_page("page")?;
                let methods = self.methods(&call).await?;
                to_value(&MediaPage::from(&methods.get_popular(page).await?))
            }
            "getLatestUpdates" => {
                let page = call.required_page("page")?;
                let methods = self.methods(&call).await?;
                to_value(&MediaPage::from(&methods.get_latest_updates(page).await?))
            }
            "search" => {
                let query = call.required_str("query")?;
                let page = call.required_page("page")?;
                let methods = self.methods(&call).await?;
                to_value(&MediaPage::from(&methods.get_search_results(query, page).await?))
            }
            "getDetail" => self.detail(&call).await,
            "getVideoList" => {
                let episode = episode_from_map(call.required_object("episode")?)?;
                let methods = self.methods(&call).await?;
                let videos = methods.get_video_list(&episode).await?;
                to_value(&videos.iter().map(VideoSummary::from).collect::<Vec<_>>())
            }
            "getPageList" => {
                let chapter = episode_from_map(call.required_object("episode")?)?;
                let methods = self.methods(&call).await?;
                let base_url = methods.base_url();
                let pages = methods.get_page_list(&chapter).await?;
                to_value(
                    &pages
                        .iter()
                        .map(|page| PageSummary::new(page, &base_url))
                        .collect::<Vec<_>>(),
                )
            }
            "getPreference" => self.preference(&call).await,
            "saveSourcePreference" => self.save_preference(&call),
            other => Err(BridgeError::NotImplemented(other.to_string())),
        }
    }

    async fn installed(&self, kind: MediaKind) -> Result<Value> {
        let installed = self.catalog.manager(kind).fetch_installed().await?;
        to_value(&installed.iter().map(InstalledSummary::from).collect::<Vec<_>>())
    }

    async fn fetch_available(&self, kind: MediaKind, call: &MethodCall) -> Result<Value> {
        let repositories = call.string_list();
        let available = self.catalog.manager(kind).find_available(&repositories).await;
        to_value(&available.iter().map(AvailableSummary::from).collect::<Vec<_>>())
    }

    /// Adapter for the call's `sourceId`, `isAnime` and optional `langIndex`
    async fn methods(&self, call: &MethodCall) -> Result<Arc<dyn SourceMethods>> {
        let source_id = call.source_id()?;
        let kind = call.media_kind()?;
        let lang_index = call.optional_index("langIndex")?;

        let extension = self.catalog.find_installed(kind, source_id).await?;
        resolve_methods(&extension, lang_index)
    }

    async fn detail(&self, call: &MethodCall) -> Result<Value> {
        let media = media_from_map(call.required_object("media")?)?;
        let methods = self.methods(call).await?;

        let details = methods.get_details(&media).await?;
        let episodes = match methods.media_kind() {
            MediaKind::Anime => methods.get_episode_list(&media).await?,
            MediaKind::Manga => methods.get_chapter_list(&media).await?,
        };
        to_value(&MediaDetail::new(&media, &details, &episodes))
    }

    /// Descriptor list, or the plain message when the source has no settings
    async fn preference(&self, call: &MethodCall) -> Result<Value> {
        let source_id = call.source_id()?;
        let methods = self.methods(call).await?;

        let shared = SharedPreferences::new(namespace_for(source_id), self.store.clone());
        let mut screen = PreferenceScreen::new(shared);
        match methods.setup_preference_screen(&mut screen) {
            Ok(()) => to_value(&self.preferences.render(source_id, &screen)),
            Err(BridgeError::NoPreferenceScreen(message)) => Ok(Value::String(message)),
            Err(e) => Err(e),
        }
    }

    fn save_preference(&self, call: &MethodCall) -> Result<Value> {
        let source_id = call.source_id()?;
        let key = non_empty(call.required_str("key")?, "key")?;
        let action = PreferenceAction::parse(call.optional_str("action")?);
        let value = call.optional_value("value")?;

        Ok(Value::Bool(self.preferences.apply_action(source_id, key, &action, value)))
    }
}
