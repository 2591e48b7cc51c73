//! Method-channel surface
//!
//! This module provides:
//! - Typed access to call arguments
//! - Payload codecs between channel maps and source models
//! - The dispatch façade that routes a named call to its operation

pub mod call;
pub mod codec;
pub mod dispatcher;

pub use call::MethodCall;
pub use dispatcher::ExtensionBridge;
