//! Preference tree built by configurable sources
//!
//! A source fills a [`PreferenceScreen`] with typed [`Preference`] nodes in
//! `setup_preference_screen`. Nodes carry optional click/change listeners
//! that the source installs; the preference bridge replays transport events
//! against them later. Values live in the screen's [`SharedPreferences`]
//! namespace, with the node's default as fallback.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use serde_json::Value;

use super::store::SharedPreferences;
use crate::core::error::{BridgeError, Result};

/// Typed preference value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreferenceValue {
    Bool(bool),
    Text(String),
    Set(BTreeSet<String>),
}

impl PreferenceValue {
    /// Convert a transport value. Arrays become string sets, dropping
    /// non-string items; numbers and nulls have no typed form.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Array(items) => Some(Self::Set(
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect(),
            )),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Text(s) => Value::String(s.clone()),
            Self::Set(items) => Value::Array(items.iter().cloned().map(Value::String).collect()),
        }
    }
}

pub type ClickListener = Arc<dyn Fn(&Preference) -> bool + Send + Sync>;
pub type ChangeListener = Arc<dyn Fn(&Preference, &PreferenceValue) -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferenceType {
    List,
    MultiSelect,
    Switch,
    EditText,
    CheckBox,
    /// Reported with the `other` tag
    Category,
    Other,
}

impl PreferenceType {
    /// Type tag reported to the transport
    pub fn tag(self) -> &'static str {
        match self {
            PreferenceType::List => "list",
            PreferenceType::MultiSelect => "multi_select",
            PreferenceType::Switch => "switch",
            PreferenceType::EditText => "text",
            PreferenceType::CheckBox => "checkbox",
            PreferenceType::Category | PreferenceType::Other => "other",
        }
    }

    fn accepts(self, value: &PreferenceValue) -> bool {
        matches!(
            (self, value),
            (PreferenceType::Switch | PreferenceType::CheckBox, PreferenceValue::Bool(_))
                | (PreferenceType::List | PreferenceType::EditText, PreferenceValue::Text(_))
                | (PreferenceType::MultiSelect, PreferenceValue::Set(_))
        )
    }
}

/// One node of a preference tree
pub struct Preference {
    key: String,
    title: String,
    summary: Option<String>,
    enabled: bool,
    kind: PreferenceType,
    entries: Vec<String>,
    entry_values: Vec<String>,
    default_value: Option<PreferenceValue>,
    value: Mutex<Option<PreferenceValue>>,
    children: Vec<Arc<Preference>>,
    storage: OnceLock<SharedPreferences>,
    on_click: Option<ClickListener>,
    on_change: Option<ChangeListener>,
}

impl Preference {
    fn new(kind: PreferenceType, key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            summary: None,
            enabled: true,
            kind,
            entries: Vec::new(),
            entry_values: Vec::new(),
            default_value: None,
            value: Mutex::new(None),
            children: Vec::new(),
            storage: OnceLock::new(),
            on_click: None,
            on_change: None,
        }
    }

    pub fn list(
        key: impl Into<String>,
        title: impl Into<String>,
        entries: Vec<String>,
        entry_values: Vec<String>,
    ) -> Self {
        Self {
            entries,
            entry_values,
            ..Self::new(PreferenceType::List, key, title)
        }
    }

    pub fn multi_select(
        key: impl Into<String>,
        title: impl Into<String>,
        entries: Vec<String>,
        entry_values: Vec<String>,
    ) -> Self {
        Self {
            entries,
            entry_values,
            ..Self::new(PreferenceType::MultiSelect, key, title)
        }
    }

    pub fn switch(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(PreferenceType::Switch, key, title)
    }

    pub fn edit_text(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(PreferenceType::EditText, key, title)
    }

    pub fn check_box(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(PreferenceType::CheckBox, key, title)
    }

    pub fn category(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(PreferenceType::Category, key, title)
    }

    /// Plain clickable entry with no typed value
    pub fn other(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(PreferenceType::Other, key, title)
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_default(mut self, value: PreferenceValue) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_child(mut self, child: Preference) -> Self {
        self.children.push(Arc::new(child));
        self
    }

    pub fn on_click<F>(mut self, listener: F) -> Self
    where
        F: Fn(&Preference) -> bool + Send + Sync + 'static,
    {
        self.on_click = Some(Arc::new(listener));
        self
    }

    pub fn on_change<F>(mut self, listener: F) -> Self
    where
        F: Fn(&Preference, &PreferenceValue) -> bool + Send + Sync + 'static,
    {
        self.on_change = Some(Arc::new(listener));
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn kind(&self) -> PreferenceType {
        self.kind
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn entry_values(&self) -> &[String] {
        &self.entry_values
    }

    pub fn children(&self) -> &[Arc<Preference>] {
        &self.children
    }

    pub fn click_listener(&self) -> Option<ClickListener> {
        self.on_click.clone()
    }

    pub fn change_listener(&self) -> Option<ChangeListener> {
        self.on_change.clone()
    }

    /// Raw persisted value for this key
    pub fn stored_value(&self) -> Option<Value> {
        self.storage.get().and_then(|storage| storage.get(&self.key))
    }

    /// Current value: last written, else persisted, else the default
    pub fn value(&self) -> Option<PreferenceValue> {
        if let Some(value) = self
            .value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Some(value);
        }

        self.stored_value()
            .as_ref()
            .and_then(PreferenceValue::from_json)
            .filter(|value| self.kind.accepts(value))
            .or_else(|| self.default_value.clone())
    }

    /// Write a value into this preference's typed field and persist it
    pub fn set_value(&self, value: PreferenceValue) -> Result<()> {
        if !self.kind.accepts(&value) {
            return Err(BridgeError::InvalidArguments(format!(
                "Value {:?} does not fit {} preference '{}'",
                value,
                self.kind.tag(),
                self.key
            )));
        }

        if let Some(storage) = self.storage.get() {
            storage.put(&self.key, value.to_json())?;
        }
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
        Ok(())
    }

    fn attach(&self, storage: &SharedPreferences) {
        self.storage.get_or_init(|| storage.clone());
        for child in &self.children {
            child.attach(storage);
        }
    }
}

impl fmt::Debug for Preference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Preference")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("title", &self.title)
            .field("enabled", &self.enabled)
            .field("children", &self.children.len())
            .finish()
    }
}

/// Root of a source's preference tree
pub struct PreferenceScreen {
    preferences: SharedPreferences,
    children: Vec<Arc<Preference>>,
}

impl PreferenceScreen {
    pub fn new(preferences: SharedPreferences) -> Self {
        Self {
            preferences,
            children: Vec::new(),
        }
    }

    pub fn shared_preferences(&self) -> &SharedPreferences {
        &self.preferences
    }

    /// Attach a preference (and its children) to this screen's storage
    pub fn add_preference(&mut self, preference: Preference) -> Arc<Preference> {
        let preference = Arc::new(preference);
        preference.attach(&self.preferences);
        self.children.push(preference.clone());
        preference
    }

    pub fn preferences(&self) -> &[Arc<Preference>] {
        &self.children
    }

    pub fn preference_count(&self) -> usize {
        self.children.len()
    }
}
