//! Conversion between channel payloads and source models

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

use super::call::non_empty;
use crate::core::error::{BridgeError, Result};
use crate::extension::types::{AvailableExtension, InstalledExtension};
use crate::source::anime::{AnimesPage, SAnime, SEpisode, Track, Video};
use crate::source::manga::Page;
use crate::source::page::page_headers;

fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_string)
}

fn url_field(map: &Map<String, Value>) -> Result<String> {
    let url = map
        .get("url")
        .and_then(Value::as_str)
        .ok_or_else(|| BridgeError::EmptyIdentifier("Url can't be empty".to_string()))?;
    Ok(non_empty(url, "url")?.to_string())
}

/// Media record from a `media` argument map
pub fn media_from_map(map: &Map<String, Value>) -> Result<SAnime> {
    Ok(SAnime {
        url: url_field(map)?,
        title: string_field(map, "title").unwrap_or_default(),
        thumbnail_url: string_field(map, "thumbnail_url"),
        description: string_field(map, "description"),
        artist: string_field(map, "artist"),
        author: string_field(map, "author"),
        genre: string_field(map, "genre"),
        ..SAnime::create()
    })
}

/// Episode record from an `episode` argument map
pub fn episode_from_map(map: &Map<String, Value>) -> Result<SEpisode> {
    Ok(SEpisode {
        url: url_field(map)?,
        name: string_field(map, "name").unwrap_or_default(),
        date_upload: map
            .get("date_upload")
            .and_then(Value::as_i64)
            .filter(|d| *d > 0)
            .unwrap_or(0),
        episode_number: map
            .get("episode_number")
            .and_then(Value::as_f64)
            .map(|n| n as f32)
            .unwrap_or(0.0),
        scanlator: string_field(map, "scanlator"),
    })
}

/// Decimal text with at least one fractional digit, `2` becomes `"2.0"`
pub fn float_string(value: f32) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

#[derive(Debug, Serialize)]
pub struct MediaSummary {
    pub title: String,
    pub url: String,
    pub cover: Option<String>,
    pub artist: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub genre: Vec<String>,
    pub status: i32,
}

impl From<&SAnime> for MediaSummary {
    fn from(anime: &SAnime) -> Self {
        Self {
            title: anime.title.clone(),
            url: anime.url.clone(),
            cover: anime.thumbnail_url.clone(),
            artist: anime.artist.clone(),
            author: anime.author.clone(),
            description: anime.description.clone(),
            genre: anime.genres(),
            status: anime.status,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPage {
    pub list: Vec<MediaSummary>,
    pub has_next_page: bool,
}

impl From<&AnimesPage> for MediaPage {
    fn from(page: &AnimesPage) -> Self {
        Self {
            list: page.animes.iter().map(MediaSummary::from).collect(),
            has_next_page: page.has_next_page,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EpisodeSummary {
    pub name: String,
    pub url: String,
    pub date_upload: String,
    pub episode_number: String,
    pub scanlator: Option<String>,
}

impl From<&SEpisode> for EpisodeSummary {
    fn from(episode: &SEpisode) -> Self {
        Self {
            name: episode.name.clone(),
            url: episode.url.clone(),
            date_upload: episode.date_upload.to_string(),
            episode_number: float_string(episode.episode_number),
            scanlator: episode.scanlator.clone(),
        }
    }
}

/// `getDetail` reply. Title and url echo the request; the cover prefers
/// the fetched thumbnail.
#[derive(Debug, Serialize)]
pub struct MediaDetail {
    pub title: String,
    pub url: String,
    pub cover: Option<String>,
    pub artist: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub genre: Vec<String>,
    pub status: i32,
    pub episodes: Vec<EpisodeSummary>,
}

impl MediaDetail {
    pub fn new(request: &SAnime, details: &SAnime, episodes: &[SEpisode]) -> Self {
        Self {
            title: request.title.clone(),
            url: request.url.clone(),
            cover: details
                .thumbnail_url
                .clone()
                .or_else(|| request.thumbnail_url.clone()),
            artist: details.artist.clone(),
            author: details.author.clone(),
            description: details.description.clone(),
            genre: details.genres(),
            status: details.status,
            episodes: episodes.iter().map(EpisodeSummary::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TrackSummary {
    pub file: String,
    pub label: String,
}

impl From<&Track> for TrackSummary {
    fn from(track: &Track) -> Self {
        Self {
            file: track.url.clone(),
            label: track.lang.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VideoSummary {
    pub title: String,
    pub url: String,
    pub quality: String,
    pub headers: Option<HashMap<String, String>>,
    pub subtitles: Vec<TrackSummary>,
    pub audios: Vec<TrackSummary>,
}

impl From<&Video> for VideoSummary {
    fn from(video: &Video) -> Self {
        Self {
            title: video.title.clone(),
            url: video.url.clone(),
            quality: video.quality.clone(),
            headers: video.headers.clone(),
            subtitles: video.subtitle_tracks.iter().map(TrackSummary::from).collect(),
            audios: video.audio_tracks.iter().map(TrackSummary::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PageSummary {
    pub url: String,
    pub headers: HashMap<String, String>,
}

impl PageSummary {
    pub fn new(page: &Page, base_url: &str) -> Self {
        let (url, headers) = page_headers(page, base_url);
        Self { url, headers }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledSummary {
    pub id: String,
    pub name: String,
    pub base_url: String,
    pub lang: String,
    pub is_nsfw: bool,
    pub icon_url: Option<String>,
    pub version: String,
    pub lib_version: f64,
    pub supported_languages: Vec<String>,
    pub item_type: u8,
    pub has_update: bool,
    pub is_obsolete: bool,
    pub is_unofficial: bool,
}

impl From<&InstalledExtension> for InstalledSummary {
    fn from(ext: &InstalledExtension) -> Self {
        Self {
            id: ext.pkg_name.clone(),
            name: ext.name.clone(),
            base_url: ext.base_url(),
            lang: ext.lang.clone(),
            is_nsfw: ext.is_nsfw,
            icon_url: ext.icon_path.as_ref().map(|p| p.display().to_string()),
            version: ext.version_name.clone(),
            lib_version: ext.lib_version,
            supported_languages: ext.supported_languages(),
            item_type: ext.kind.item_type(),
            has_update: ext.has_update,
            is_obsolete: ext.is_obsolete,
            is_unofficial: ext.is_unofficial,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableSummary {
    pub name: String,
    pub id: String,
    pub version: String,
    pub lib_version: f64,
    pub supported_languages: Vec<String>,
    pub lang: String,
    pub is_nsfw: bool,
    pub apk_name: String,
    pub icon_url: String,
    pub item_type: u8,
}

impl From<&AvailableExtension> for AvailableSummary {
    fn from(ext: &AvailableExtension) -> Self {
        Self {
            name: ext.name.clone(),
            id: ext.pkg_name.clone(),
            version: ext.version_name.clone(),
            lib_version: ext.lib_version,
            supported_languages: ext.supported_languages(),
            lang: ext.lang.clone(),
            is_nsfw: ext.is_nsfw,
            apk_name: ext.apk_name.clone(),
            icon_url: ext.icon_url.clone(),
            item_type: ext.kind.item_type(),
        }
    }
}

pub fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::convert::find_chapter_number;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_media_from_map() {
        let media = media_from_map(&map(json!({
            "title": "Frieren",
            "url": "/anime/frieren",
            "thumbnail_url": "https://cdn/f.jpg",
            "genre": "Fantasy, Drama"
        })))
        .unwrap();

        assert_eq!(media.url, "/anime/frieren");
        assert_eq!(media.title, "Frieren");
        assert_eq!(media.thumbnail_url.as_deref(), Some("https://cdn/f.jpg"));
        assert_eq!(media.genres(), vec!["Fantasy", "Drama"]);
    }

    #[test]
    fn test_missing_or_empty_url_is_empty_identifier() {
        assert!(matches!(
            media_from_map(&map(json!({ "title": "x" }))),
            Err(BridgeError::EmptyIdentifier(_))
        ));
        assert!(matches!(
            episode_from_map(&map(json!({ "url": "" }))),
            Err(BridgeError::EmptyIdentifier(_))
        ));
    }

    #[test]
    fn test_episode_from_map_defaults() {
        let episode = episode_from_map(&map(json!({
            "url": "/ep/1",
            "date_upload": -5,
            "episode_number": 3.5
        })))
        .unwrap();

        assert_eq!(episode.name, "");
        assert_eq!(episode.date_upload, 0);
        assert_eq!(episode.episode_number, 3.5);

        let episode = episode_from_map(&map(json!({ "url": "/ep/2", "episode_number": "7" }))).unwrap();
        assert_eq!(episode.episode_number, 0.0);
    }

    #[test]
    fn test_float_string() {
        assert_eq!(float_string(2.0), "2.0");
        assert_eq!(float_string(12.5), "12.5");
        assert_eq!(float_string(10.1), "10.1");
    }

    #[test]
    fn test_fractional_chapter_number_keeps_short_form() {
        let chapter = SEpisode {
            url: "/m/c10".to_string(),
            name: "Chapter 10.1".to_string(),
            date_upload: 0,
            episode_number: find_chapter_number("Chapter 10.1").unwrap(),
            scanlator: None,
        };
        let summary = EpisodeSummary::from(&chapter);
        assert_eq!(summary.episode_number, "10.1");
    }

    #[test]
    fn test_detail_prefers_fetched_cover() {
        let request = SAnime {
            url: "/a".to_string(),
            title: "A".to_string(),
            thumbnail_url: Some("request.jpg".to_string()),
            ..SAnime::create()
        };
        let mut details = request.clone();
        details.thumbnail_url = None;
        details.description = Some("desc".to_string());

        let episode = SEpisode {
            url: "/a/1".to_string(),
            name: "Episode 1".to_string(),
            date_upload: 1700,
            episode_number: 1.0,
            scanlator: None,
        };
        let value = to_value(&MediaDetail::new(&request, &details, &[episode])).unwrap();

        assert_eq!(value["cover"], "request.jpg");
        assert_eq!(value["description"], "desc");
        assert_eq!(value["episodes"][0]["date_upload"], "1700");
        assert_eq!(value["episodes"][0]["episode_number"], "1.0");
    }

    #[test]
    fn test_video_summary_shape() {
        let video = Video {
            subtitle_tracks: vec![Track::new("https://s/en.vtt", "English")],
            ..Video::new("https://v/1.m3u8", "Main", "1080p")
        };
        let value = to_value(&VideoSummary::from(&video)).unwrap();

        assert_eq!(value["quality"], "1080p");
        assert_eq!(value["headers"], Value::Null);
        assert_eq!(value["subtitles"][0], json!({ "file": "https://s/en.vtt", "label": "English" }));
        assert_eq!(value["audios"], json!([]));
    }

    #[test]
    fn test_page_summary_forces_referer_and_origin() {
        let page = Page::new(
            0,
            "/c/1",
            Some("https://img/1.jpg&Referer=https%3A%2F%2Fevil&Origin=evil&X-Key=v".to_string()),
        );
        let summary = PageSummary::new(&page, "https://manga.example");

        assert_eq!(summary.url, "https://img/1.jpg&Referer=https%3A%2F%2Fevil&Origin=evil&X-Key=v");
        assert_eq!(summary.headers["Referer"], "https://manga.example/");
        assert_eq!(summary.headers["Origin"], "https://manga.example");
        assert_eq!(summary.headers["X-Key"], "v");
    }
}
