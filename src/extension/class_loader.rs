//! Class loading capability
//!
//! A package declares its entry points as class names. A [`ClassLoader`]
//! resolves a name to a constructor and runs it, yielding either a source
//! or a source factory. The host [`ClassRegistry`] holds constructors
//! compiled into the host process; package loaders chain to it.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use crate::source::anime::{AnimeSource, AnimeSourceFactory};
use crate::source::manga::{MangaSource, MangaSourceFactory};

/// Object produced by instantiating a declared class
pub enum LoadedClass {
    AnimeSource(Arc<dyn AnimeSource>),
    AnimeSourceFactory(Box<dyn AnimeSourceFactory>),
    MangaSource(Arc<dyn MangaSource>),
    MangaSourceFactory(Box<dyn MangaSourceFactory>),
}

impl LoadedClass {
    pub fn type_name(&self) -> &'static str {
        match self {
            LoadedClass::AnimeSource(_) => "AnimeSource",
            LoadedClass::AnimeSourceFactory(_) => "AnimeSourceFactory",
            LoadedClass::MangaSource(_) => "MangaSource",
            LoadedClass::MangaSourceFactory(_) => "MangaSourceFactory",
        }
    }
}

/// No-argument constructor of a class
pub type ClassConstructor = Arc<dyn Fn() -> anyhow::Result<LoadedClass> + Send + Sync>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ClassLoadError {
    #[error("Class not found: {0}")]
    NotFound(String),

    #[error("Failed to instantiate {class}: {reason}")]
    Instantiation { class: String, reason: String },

    #[error("Failed to open code path {path}: {reason}")]
    CodePath { path: String, reason: String },
}

pub trait ClassLoader: Send + Sync {
    fn instantiate(&self, class_name: &str) -> Result<LoadedClass, ClassLoadError>;
}

impl<T: ClassLoader + ?Sized> ClassLoader for Arc<T> {
    fn instantiate(&self, class_name: &str) -> Result<LoadedClass, ClassLoadError> {
        (**self).instantiate(class_name)
    }
}

/// Builds an isolated loader for one package's code path
pub trait ClassLoaderFactory: Send + Sync {
    fn create(&self, package_name: &str, code_path: &Path) -> Result<Box<dyn ClassLoader>, ClassLoadError>;
}

/// Run a constructor, turning errors and panics into `Instantiation`
pub fn construct(class_name: &str, constructor: &ClassConstructor) -> Result<LoadedClass, ClassLoadError> {
    match catch_unwind(AssertUnwindSafe(|| constructor())) {
        Ok(Ok(class)) => Ok(class),
        Ok(Err(e)) => Err(ClassLoadError::Instantiation {
            class: class_name.to_string(),
            reason: format!("{:#}", e),
        }),
        Err(_) => Err(ClassLoadError::Instantiation {
            class: class_name.to_string(),
            reason: "constructor panicked".to_string(),
        }),
    }
}

/// In-process class table
#[derive(Default)]
pub struct ClassRegistry {
    classes: RwLock<HashMap<String, ClassConstructor>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, class_name: impl Into<String>, constructor: F)
    where
        F: Fn() -> anyhow::Result<LoadedClass> + Send + Sync + 'static,
    {
        let class_name = class_name.into();
        tracing::debug!(class = %class_name, "Registering class");
        self.classes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(class_name, Arc::new(constructor));
    }

    pub fn constructor(&self, class_name: &str) -> Option<ClassConstructor> {
        self.classes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(class_name)
            .cloned()
    }

    pub fn contains(&self, class_name: &str) -> bool {
        self.constructor(class_name).is_some()
    }

    pub fn len(&self) -> usize {
        self.classes.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ClassLoader for ClassRegistry {
    fn instantiate(&self, class_name: &str) -> Result<LoadedClass, ClassLoadError> {
        let constructor = self
            .constructor(class_name)
            .ok_or_else(|| ClassLoadError::NotFound(class_name.to_string()))?;
        construct(class_name, &constructor)
    }
}
