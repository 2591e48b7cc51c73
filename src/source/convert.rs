//! Converters between the anime-shaped and manga-shaped models
//!
//! Every conversion builds a fresh record. Reading the lazily initialized
//! `url`/`title` of a manga record goes through its `Result` accessors and
//! substitutes the sentinels below instead of failing.

use lazy_static::lazy_static;
use regex::Regex;

use super::anime::{AnimesPage, SAnime, SEpisode};
use super::manga::{MangasPage, SChapter, SManga};

pub const UNINITIALIZED_URL: &str = "[UNINITIALIZED_URL]";
pub const UNINITIALIZED_TITLE: &str = "[UNINITIALIZED_TITLE]";

lazy_static! {
    static ref CHAPTER_NUMBER: Regex =
        Regex::new(r"(?i)(chapter|chap|ch|c)[\s:.\-]*([0-9]+\.?[0-9]*)[\s:.\-]*")
            .expect("chapter number pattern is valid");
    static ref STANDALONE_NUMBER: Regex =
        Regex::new(r"\b([0-9]+)\b").expect("standalone number pattern is valid");
}

pub fn anime_to_manga(anime: &SAnime) -> SManga {
    SManga {
        url: Some(anime.url.clone()),
        title: Some(anime.title.clone()),
        artist: anime.artist.clone(),
        author: anime.author.clone(),
        description: anime.description.clone(),
        genre: anime.genre.clone(),
        status: anime.status,
        thumbnail_url: anime.thumbnail_url.clone(),
        update_strategy: anime.update_strategy,
        initialized: anime.initialized,
    }
}

pub fn manga_to_anime(manga: &SManga) -> SAnime {
    let url = match manga.url() {
        Ok(url) => url.to_string(),
        Err(e) => {
            tracing::debug!(title = ?manga.title, "{}", e);
            UNINITIALIZED_URL.to_string()
        }
    };
    let title = match manga.title() {
        Ok(title) => title.to_string(),
        Err(e) => {
            tracing::debug!(url = ?manga.url, "{}", e);
            UNINITIALIZED_TITLE.to_string()
        }
    };

    SAnime {
        url,
        title,
        artist: manga.artist.clone(),
        author: manga.author.clone(),
        description: manga.description.clone(),
        genre: manga.genre.clone(),
        status: manga.status,
        thumbnail_url: manga.thumbnail_url.clone(),
        update_strategy: manga.update_strategy,
        initialized: manga.initialized,
    }
}

pub fn mangas_page_to_animes_page(page: MangasPage) -> AnimesPage {
    AnimesPage {
        animes: page.mangas.iter().map(manga_to_anime).collect(),
        has_next_page: page.has_next_page,
    }
}

/// Episode view of a chapter. The number is recovered from the chapter
/// name when possible, else the source's declared number is kept.
pub fn chapter_to_episode(chapter: &SChapter) -> SEpisode {
    SEpisode {
        url: chapter.url.clone(),
        name: chapter.name.clone(),
        date_upload: chapter.date_upload,
        episode_number: find_chapter_number(&chapter.name).unwrap_or(chapter.chapter_number),
        scanlator: chapter.scanlator.clone(),
    }
}

pub fn episode_to_chapter(episode: &SEpisode) -> SChapter {
    SChapter {
        url: episode.url.clone(),
        name: episode.name.clone(),
        date_upload: episode.date_upload,
        chapter_number: episode.episode_number,
        scanlator: episode.scanlator.clone(),
    }
}

/// Extract a chapter number from a chapter name.
///
/// Tries, in order: an explicit `chapter|chap|ch|c <n>` token (fractional
/// allowed), the first standalone whole number not directly preceded by
/// `part `, then the whole text as a float.
pub fn find_chapter_number(text: &str) -> Option<f32> {
    if let Some(captures) = CHAPTER_NUMBER.captures(text) {
        return captures.get(2).and_then(|m| m.as_str().parse().ok());
    }

    let standalone = STANDALONE_NUMBER
        .captures_iter(text)
        .filter_map(|captures| captures.get(1))
        .find(|m| !preceded_by_part(text, m.start()));
    if let Some(m) = standalone {
        return m.as_str().parse().ok();
    }

    text.trim().parse::<f32>().ok().filter(|n| n.is_finite())
}

/// True when `text[..start]` ends with the word `part` plus one whitespace
fn preceded_by_part(text: &str, start: usize) -> bool {
    let mut before = text[..start].chars().rev();
    if !before.next().map_or(false, char::is_whitespace) {
        return false;
    }
    let word: Vec<char> = before.take(4).collect();
    word.len() == 4
        && word
            .iter()
            .rev()
            .collect::<String>()
            .eq_ignore_ascii_case("part")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::anime::{status, UpdateStrategy};

    fn full_anime() -> SAnime {
        SAnime {
            url: "/series/42".to_string(),
            title: "Forty Two".to_string(),
            artist: Some("Artist".to_string()),
            author: Some("Author".to_string()),
            description: Some("About".to_string()),
            genre: Some("Action, Drama".to_string()),
            status: status::COMPLETED,
            thumbnail_url: Some("https://cdn.example/42.jpg".to_string()),
            update_strategy: UpdateStrategy::OnlyFetchOnce,
            initialized: true,
        }
    }

    #[test]
    fn test_round_trip_preserves_fields() {
        let anime = full_anime();
        assert_eq!(manga_to_anime(&anime_to_manga(&anime)), anime);
    }

    #[test]
    fn test_uninitialized_fields_become_sentinels() {
        let manga = SManga {
            artist: Some("Someone".to_string()),
            ..SManga::create()
        };
        let anime = manga_to_anime(&manga);

        assert_eq!(anime.url, UNINITIALIZED_URL);
        assert_eq!(anime.title, UNINITIALIZED_TITLE);
        assert_eq!(anime.artist.as_deref(), Some("Someone"));
        assert_eq!(anime.status, status::UNKNOWN);
        assert_eq!(anime.update_strategy, UpdateStrategy::AlwaysUpdate);
        assert!(!anime.initialized);
    }

    #[test]
    fn test_find_chapter_number_explicit_token() {
        assert_eq!(find_chapter_number("Chapter 12.5"), Some(12.5));
        assert_eq!(find_chapter_number("ch.7 - The Return"), Some(7.0));
        assert_eq!(find_chapter_number("Vol.1 CHAP: 3"), Some(3.0));
        assert_eq!(find_chapter_number("c-10"), Some(10.0));
    }

    #[test]
    fn test_find_chapter_number_standalone_number() {
        assert_eq!(find_chapter_number("Vol 2 Part 3"), Some(2.0));
        assert_eq!(find_chapter_number("Episode 9"), Some(9.0));
        assert_eq!(find_chapter_number("Part 3 of 5"), Some(5.0));
    }

    #[test]
    fn test_find_chapter_number_part_and_fallbacks() {
        assert_eq!(find_chapter_number("Part 3"), None);
        assert_eq!(find_chapter_number("part\t4"), None);
        assert_eq!(find_chapter_number("Oneshot"), None);
        // the whole-number rule wins before the float fallback
        assert_eq!(find_chapter_number("14.5"), Some(14.0));
    }

    #[test]
    fn test_chapter_to_episode_uses_declared_number_as_last_resort() {
        let chapter = SChapter {
            url: "/c/3".to_string(),
            name: "Part 3".to_string(),
            chapter_number: 3.0,
            ..SChapter::create()
        };
        assert_eq!(chapter_to_episode(&chapter).episode_number, 3.0);

        let chapter = SChapter {
            name: "Chapter 12.5".to_string(),
            chapter_number: 99.0,
            ..chapter
        };
        assert_eq!(chapter_to_episode(&chapter).episode_number, 12.5);
    }

    #[test]
    fn test_mangas_page_conversion() {
        let page = MangasPage::new(vec![anime_to_manga(&full_anime()), SManga::create()], true);
        let converted = mangas_page_to_animes_page(page);

        assert!(converted.has_next_page);
        assert_eq!(converted.animes.len(), 2);
        assert_eq!(converted.animes[1].url, UNINITIALIZED_URL);
    }
}
