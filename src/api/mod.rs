//! HTTP transport for the method channel
//!
//! This module provides:
//! - The `POST /channel/:method` endpoint and health check
//! - Trace ID propagation
//! - Server startup and graceful shutdown

pub mod routes;
pub mod server;
pub mod trace;

pub use server::ApiServer;
pub use trace::{trace_id_middleware, TraceId, TRACE_ID_HEADER};
