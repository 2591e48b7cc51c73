//! Preference persistence capability
//!
//! Values are grouped in namespaces (one per source package, `source_{pkg}`)
//! and stored as JSON values. Two implementations ship with the crate: an
//! in-memory store for tests and embedding, and a JSON-file store that keeps
//! one `{namespace}.json` document per namespace.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

use crate::core::error::Result;

type Namespace = HashMap<String, Value>;

/// Persistence backend for source preferences
pub trait PreferenceStore: Send + Sync {
    fn get(&self, namespace: &str, key: &str) -> Option<Value>;

    fn put(&self, namespace: &str, key: &str, value: Value) -> Result<()>;

    fn all(&self, namespace: &str) -> HashMap<String, Value>;
}

/// Preference namespace name for a source package
pub fn namespace_for(package_name: &str) -> String {
    format!("source_{}", package_name)
}

/// Volatile store, lost on restart
#[derive(Default)]
pub struct MemoryPreferenceStore {
    namespaces: RwLock<HashMap<String, Namespace>>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, namespace: &str, key: &str) -> Option<Value> {
        let namespaces = self.namespaces.read().unwrap_or_else(PoisonError::into_inner);
        namespaces.get(namespace).and_then(|ns| ns.get(key)).cloned()
    }

    fn put(&self, namespace: &str, key: &str, value: Value) -> Result<()> {
        let mut namespaces = self.namespaces.write().unwrap_or_else(PoisonError::into_inner);
        namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn all(&self, namespace: &str) -> HashMap<String, Value> {
        let namespaces = self.namespaces.read().unwrap_or_else(PoisonError::into_inner);
        namespaces.get(namespace).cloned().unwrap_or_default()
    }
}

/// Store that writes each namespace to `{dir}/{namespace}.json`
///
/// Namespaces are read lazily on first access and cached; every `put`
/// rewrites the namespace file.
pub struct JsonFilePreferenceStore {
    dir: PathBuf,
    cache: RwLock<HashMap<String, Namespace>>,
}

impl JsonFilePreferenceStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            cache: RwLock::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_for(&self, namespace: &str) -> PathBuf {
        self.dir.join(format!("{}.json", namespace))
    }

    fn read_namespace(&self, namespace: &str) -> Namespace {
        let path = self.file_for(namespace);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(_) => return Namespace::new(),
        };
        match serde_json::from_str(&content) {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!(path = ?path, error = %e, "Ignoring corrupt preference file");
                Namespace::new()
            }
        }
    }

    fn load(&self, namespace: &str) -> Namespace {
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(ns) = cache.get(namespace) {
                return ns.clone();
            }
        }
        let values = self.read_namespace(namespace);
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.entry(namespace.to_string()).or_insert(values).clone()
    }
}

impl PreferenceStore for JsonFilePreferenceStore {
    fn get(&self, namespace: &str, key: &str) -> Option<Value> {
        self.load(namespace).get(key).cloned()
    }

    fn put(&self, namespace: &str, key: &str, value: Value) -> Result<()> {
        let mut values = self.load(namespace);
        values.insert(key.to_string(), value);

        let serialized = serde_json::to_string_pretty(&values)?;
        std::fs::write(self.file_for(namespace), serialized)?;

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.insert(namespace.to_string(), values);
        Ok(())
    }

    fn all(&self, namespace: &str) -> HashMap<String, Value> {
        self.load(namespace)
    }
}

/// Typed view over one namespace of a [`PreferenceStore`]
///
/// This is what sources read their settings through.
#[derive(Clone)]
pub struct SharedPreferences {
    namespace: String,
    store: Arc<dyn PreferenceStore>,
}

impl SharedPreferences {
    pub fn new(namespace: impl Into<String>, store: Arc<dyn PreferenceStore>) -> Self {
        Self {
            namespace: namespace.into(),
            store,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.store.get(&self.namespace, key)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
    }

    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.get(key)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| default.to_string())
    }

    pub fn get_string_set(&self, key: &str) -> BTreeSet<String> {
        match self.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => BTreeSet::new(),
        }
    }

    pub fn put(&self, key: &str, value: Value) -> Result<()> {
        self.store.put(&self.namespace, key, value)
    }

    pub fn all(&self) -> HashMap<String, Value> {
        self.store.all(&self.namespace)
    }
}

impl std::fmt::Debug for SharedPreferences {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedPreferences")
            .field("namespace", &self.namespace)
            .finish()
    }
}
