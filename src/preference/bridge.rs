//! Preference bridge
//!
//! Flattens a source's preference tree into transport descriptors and keeps
//! a side table of live preference handles, keyed by source id and
//! preference key, so that later click/change events can be replayed
//! against the objects the source created.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use serde_json::Value;

use super::screen::{
    ChangeListener, ClickListener, Preference, PreferenceScreen, PreferenceType, PreferenceValue,
};

/// Flattened, serializable view of one preference node
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceDescriptor {
    pub key: String,
    pub title: String,
    pub summary: Option<String>,
    pub enabled: bool,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_values: Option<Vec<String>>,
    pub value: Value,
}

impl PreferenceDescriptor {
    fn from_preference(preference: &Preference) -> Self {
        let kind = preference.kind();
        let (entries, entry_values) = match kind {
            PreferenceType::List | PreferenceType::MultiSelect => (
                Some(preference.entries().to_vec()),
                Some(preference.entry_values().to_vec()),
            ),
            _ => (None, None),
        };

        let value = match kind {
            PreferenceType::Category | PreferenceType::Other => {
                preference.stored_value().unwrap_or(Value::Null)
            }
            PreferenceType::MultiSelect => preference
                .value()
                .map(|v| v.to_json())
                .unwrap_or_else(|| Value::Array(Vec::new())),
            PreferenceType::Switch | PreferenceType::CheckBox => preference
                .value()
                .map(|v| v.to_json())
                .unwrap_or(Value::Bool(false)),
            _ => preference.value().map(|v| v.to_json()).unwrap_or(Value::Null),
        };

        Self {
            key: preference.key().to_string(),
            title: preference.title().to_string(),
            summary: preference.summary().map(str::to_string),
            enabled: preference.is_enabled(),
            kind: kind.tag().to_string(),
            entries,
            entry_values,
            value,
        }
    }
}

/// Event replayed against a recorded preference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreferenceAction {
    Click,
    Change,
    Unknown(String),
}

impl PreferenceAction {
    /// Parse a transport action; a missing action means `change`
    pub fn parse(action: Option<&str>) -> Self {
        match action {
            None | Some("change") => PreferenceAction::Change,
            Some("click") => PreferenceAction::Click,
            Some(other) => PreferenceAction::Unknown(other.to_string()),
        }
    }
}

#[derive(Clone)]
struct PreferenceHandle {
    preference: Arc<Preference>,
    on_click: Option<ClickListener>,
    on_change: Option<ChangeListener>,
}

/// Side table of live preference handles
#[derive(Default)]
pub struct PreferenceBridge {
    sources: RwLock<HashMap<String, HashMap<String, PreferenceHandle>>>,
}

impl PreferenceBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Walk the tree depth-first, record every node and return the flat
    /// descriptor list (a category is followed by its children).
    ///
    /// The source's previous sub-table is replaced, not merged.
    pub fn render(&self, source_id: &str, screen: &PreferenceScreen) -> Vec<PreferenceDescriptor> {
        let mut handles = HashMap::new();
        let mut descriptors = Vec::new();
        collect(screen.preferences(), &mut handles, &mut descriptors);

        tracing::debug!(
            source_id = %source_id,
            count = descriptors.len(),
            "Recorded preference handles"
        );

        let mut sources = self.sources.write().unwrap_or_else(PoisonError::into_inner);
        sources.insert(source_id.to_string(), handles);
        descriptors
    }

    /// Replay a click or change event. Always acknowledges with `true`;
    /// unknown sources, keys and actions are no-ops.
    pub fn apply_action(
        &self,
        source_id: &str,
        key: &str,
        action: &PreferenceAction,
        value: Option<&Value>,
    ) -> bool {
        let handle = {
            let sources = self.sources.read().unwrap_or_else(PoisonError::into_inner);
            sources.get(source_id).and_then(|table| table.get(key)).cloned()
        };
        let Some(handle) = handle else {
            tracing::debug!(source_id = %source_id, key = %key, "No recorded preference");
            return true;
        };

        match action {
            PreferenceAction::Click => match &handle.on_click {
                Some(listener) => {
                    listener(&handle.preference);
                }
                None => tracing::debug!(key = %key, "Click listener is not set"),
            },
            PreferenceAction::Change => apply_change(&handle, value),
            PreferenceAction::Unknown(name) => {
                tracing::debug!(key = %key, action = %name, "Ignoring unknown preference action");
            }
        }
        true
    }

    /// Keys recorded for a source by the last render
    pub fn recorded_keys(&self, source_id: &str) -> Vec<String> {
        let sources = self.sources.read().unwrap_or_else(PoisonError::into_inner);
        let mut keys: Vec<String> = sources
            .get(source_id)
            .map(|table| table.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

fn collect(
    preferences: &[Arc<Preference>],
    handles: &mut HashMap<String, PreferenceHandle>,
    descriptors: &mut Vec<PreferenceDescriptor>,
) {
    for preference in preferences {
        handles.insert(
            preference.key().to_string(),
            PreferenceHandle {
                preference: preference.clone(),
                on_click: preference.click_listener(),
                on_change: preference.change_listener(),
            },
        );
        descriptors.push(PreferenceDescriptor::from_preference(preference));

        if preference.kind() == PreferenceType::Category {
            collect(preference.children(), handles, descriptors);
        }
    }
}

fn apply_change(handle: &PreferenceHandle, value: Option<&Value>) {
    let preference = &handle.preference;

    let coerced = match preference.kind() {
        PreferenceType::MultiSelect => Some(PreferenceValue::Set(match value {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => BTreeSet::new(),
        })),
        _ => value.and_then(PreferenceValue::from_json),
    };

    let Some(new_value) = coerced else {
        tracing::warn!(
            key = %preference.key(),
            value = ?value,
            "Preference change carries no usable value"
        );
        return;
    };

    if let Some(listener) = &handle.on_change {
        listener(preference, &new_value);
    }

    match preference.kind() {
        PreferenceType::Category | PreferenceType::Other => {}
        _ => {
            if let Err(e) = preference.set_value(new_value) {
                tracing::warn!(key = %preference.key(), error = %e, "Preference value not written");
            }
        }
    }
}
