//! Extension Bridge Library
//!
//! Hosts third-party anime and manga source extensions and exposes them
//! through a named-method channel: extension discovery and loading, remote
//! repository indexes, uniform source adapters and the preference bridge.

pub mod api;
pub mod bridge;
pub mod core;
pub mod extension;
pub mod preference;
pub mod source;

#[cfg(test)]
pub(crate) mod test_support;

pub use api::ApiServer;
pub use bridge::{ExtensionBridge, MethodCall};
pub use crate::core::{BridgeError, Config, Result};
pub use extension::{ExtensionCatalog, MediaKind};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
