//! Native extension packages
//!
//! A package whose code path is a dynamic library (.so, .dylib, .dll) is
//! opened with `libloading`. The library must export a static
//! `extension_declaration` (see [`export_extension!`]) whose register
//! function adds named class constructors. Lookups that miss the library's
//! table fall through to the host [`ClassRegistry`].
//!
//! Libraries are kept loaded for the rest of the process: sources built
//! from them hold code pointers into the library.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use libloading::Library;

use super::class_loader::{
    construct, ClassConstructor, ClassLoadError, ClassLoader, ClassLoaderFactory, ClassRegistry,
    LoadedClass,
};

/// Host version a native package must have been built against
pub const CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

const DECLARATION_SYMBOL: &[u8] = b"extension_declaration\0";

/// Static exported by native packages
#[derive(Clone, Copy)]
pub struct ExtensionDeclaration {
    pub core_version: &'static str,
    pub register: unsafe fn(&mut dyn ClassRegistrar),
}

/// Sink for the classes a native package declares
pub trait ClassRegistrar {
    fn register_class(&mut self, class_name: &str, constructor: ClassConstructor);
}

/// Export the declaration of a native extension package
#[macro_export]
macro_rules! export_extension {
    ($register:expr) => {
        #[doc(hidden)]
        #[no_mangle]
        pub static extension_declaration: $crate::extension::native::ExtensionDeclaration =
            $crate::extension::native::ExtensionDeclaration {
                core_version: $crate::extension::native::CORE_VERSION,
                register: $register,
            };
    };
}

#[derive(Default)]
struct Registrar {
    classes: HashMap<String, ClassConstructor>,
}

impl ClassRegistrar for Registrar {
    fn register_class(&mut self, class_name: &str, constructor: ClassConstructor) {
        self.classes.insert(class_name.to_string(), constructor);
    }
}

/// Class loader over one native library, chained to the host registry
pub struct NativeClassLoader {
    classes: HashMap<String, ClassConstructor>,
    host: Arc<ClassRegistry>,
    library: Arc<Library>,
}

impl NativeClassLoader {
    /// Open `path` and run its registration function
    ///
    /// # Safety
    /// Loading a library runs arbitrary code. Only packages the trust
    /// policy accepted should reach this point.
    pub fn open(path: &Path, host: Arc<ClassRegistry>) -> Result<Self, ClassLoadError> {
        let code_path_error = |reason: String| ClassLoadError::CodePath {
            path: path.display().to_string(),
            reason,
        };

        let library = unsafe { Library::new(path) }.map_err(|e| code_path_error(e.to_string()))?;

        let declaration = unsafe {
            library
                .get::<*const ExtensionDeclaration>(DECLARATION_SYMBOL)
                .map_err(|e| code_path_error(format!("missing extension_declaration: {}", e)))?
                .read()
        };

        if declaration.core_version != CORE_VERSION {
            return Err(code_path_error(format!(
                "built against core {}, host is {}",
                declaration.core_version, CORE_VERSION
            )));
        }

        let mut registrar = Registrar::default();
        catch_unwind(AssertUnwindSafe(|| unsafe {
            (declaration.register)(&mut registrar)
        }))
        .map_err(|_| code_path_error("register function panicked".to_string()))?;

        tracing::info!(
            path = ?path,
            classes = registrar.classes.len(),
            "Native extension library loaded"
        );

        Ok(Self {
            classes: registrar.classes,
            host,
            library: Arc::new(library),
        })
    }

    fn library(&self) -> Arc<Library> {
        self.library.clone()
    }
}

impl ClassLoader for NativeClassLoader {
    fn instantiate(&self, class_name: &str) -> Result<LoadedClass, ClassLoadError> {
        match self.classes.get(class_name) {
            Some(constructor) => construct(class_name, constructor),
            None => self.host.instantiate(class_name),
        }
    }
}

/// True for the platform's dynamic library extension
pub fn is_library_file(path: &Path) -> bool {
    let extension = path.extension().and_then(|e| e.to_str());

    match extension {
        Some(ext) => {
            #[cfg(target_os = "windows")]
            return ext == "dll";

            #[cfg(target_os = "linux")]
            return ext == "so";

            #[cfg(target_os = "macos")]
            return ext == "dylib";

            #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
            return false;
        }
        None => false,
    }
}

/// Class loader factory used by the binary
///
/// Library code paths get a [`NativeClassLoader`]; any other code path is
/// served by the host registry alone.
pub struct PackageClassLoaderFactory {
    host: Arc<ClassRegistry>,
    libraries: Mutex<Vec<Arc<Library>>>,
}

impl PackageClassLoaderFactory {
    pub fn new(host: Arc<ClassRegistry>) -> Self {
        Self {
            host,
            libraries: Mutex::new(Vec::new()),
        }
    }

    pub fn host(&self) -> &Arc<ClassRegistry> {
        &self.host
    }

    pub fn library_count(&self) -> usize {
        self.libraries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl ClassLoaderFactory for PackageClassLoaderFactory {
    fn create(&self, package_name: &str, code_path: &Path) -> Result<Box<dyn ClassLoader>, ClassLoadError> {
        if !is_library_file(code_path) {
            tracing::debug!(package = %package_name, "Using host class registry");
            return Ok(Box::new(self.host.clone()));
        }

        if !code_path.exists() {
            return Err(ClassLoadError::CodePath {
                path: code_path.display().to_string(),
                reason: "library file not found".to_string(),
            });
        }

        let loader = NativeClassLoader::open(code_path, self.host.clone())?;
        self.libraries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(loader.library());
        Ok(Box::new(loader))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_is_library_file() {
        #[cfg(target_os = "linux")]
        {
            assert!(is_library_file(Path::new("/ext/libsource.so")));
            assert!(!is_library_file(Path::new("/ext/libsource.dll")));
        }
        assert!(!is_library_file(Path::new("/ext/package")));
    }

    #[test]
    fn test_non_library_path_uses_host_registry() {
        let host = Arc::new(ClassRegistry::new());
        let factory = PackageClassLoaderFactory::new(host);

        let loader = factory.create("eu.kanade.test", &PathBuf::from("/ext/eu.kanade.test")).unwrap();
        assert!(matches!(
            loader.instantiate("eu.kanade.test.Missing"),
            Err(ClassLoadError::NotFound(_))
        ));
        assert_eq!(factory.library_count(), 0);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_missing_library_is_code_path_error() {
        let factory = PackageClassLoaderFactory::new(Arc::new(ClassRegistry::new()));
        let result = factory.create("eu.kanade.test", Path::new("/nonexistent/libext.so"));
        assert!(matches!(result, Err(ClassLoadError::CodePath { .. })));
    }

    #[test]
    fn test_registrar_collects_classes() {
        let mut registrar = Registrar::default();
        let constructor: ClassConstructor = Arc::new(|| Err(anyhow::anyhow!("unused")));
        registrar.register_class("a.B", constructor);
        assert!(registrar.classes.contains_key("a.B"));
    }
}
