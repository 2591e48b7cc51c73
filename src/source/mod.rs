//! Source capability families and the adapter layer over them

pub mod anime;
pub mod anime_methods;
pub mod convert;
pub mod filter;
pub mod manga;
pub mod manga_methods;
pub mod methods;
pub mod page;

use crate::preference::PreferenceScreen;

/// Sources that expose user settings
pub trait ConfigurableSource: Send + Sync {
    fn setup_preference_screen(&self, screen: &mut PreferenceScreen);
}

pub use anime_methods::AnimeSourceMethods;
pub use manga_methods::MangaSourceMethods;
pub use methods::{resolve_methods, SourceMethods, NO_PREFERENCES_MESSAGE};
