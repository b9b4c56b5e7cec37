//! Server-side components of `switchyard`.
//!
//! ## Submodules
//!
//! - [`config`] - CLI/environment configuration, validated once at startup.
//! - [`interceptor`] - Logger, auth and recovery layers applied to every call.
//! - [`service`] - gRPC trait implementations, the record store and the
//!   streaming handlers.
//! - [`streaming`] - Cancellable inbound/outbound halves of streaming calls.
//! - [`telemetry`] - Log output and optional OpenTelemetry export.
//!
//! These components are wired together in the server's `main.rs`.

pub mod config;
pub mod interceptor;
pub mod service;
pub mod streaming;
pub mod telemetry;
