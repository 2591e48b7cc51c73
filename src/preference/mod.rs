//! Source preferences
//!
//! - `screen`: the typed preference tree a configurable source builds
//! - `store`: persistence capability behind preference values
//! - `bridge`: flattening into descriptors and replay of click/change events

pub mod bridge;
pub mod screen;
pub mod store;

pub use bridge::{PreferenceAction, PreferenceBridge, PreferenceDescriptor};
pub use screen::{Preference, PreferenceScreen, PreferenceType, PreferenceValue};
pub use store::{
    namespace_for, JsonFilePreferenceStore, MemoryPreferenceStore, PreferenceStore,
    SharedPreferences,
};
