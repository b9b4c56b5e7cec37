//! # `switchyard-core`: shared protocol and types
//!
//! This crate holds everything the `switchyard` server and client agree on:
//!
//! - [`proto`] - Generated gRPC bindings for the `crud.v1` and `stream.v1`
//!   packages, plus the encoded file descriptor set served by reflection.
//! - [`Error`] - The failure taxonomy surfaced to callers and its mapping onto
//!   [`tonic::Status`].
//! - [`types`] - Record identifiers (ULIDs) and protocol constants.

mod common;
pub use common::*;
// Public re-export so downstream crates can reach `ferroid` via
// `switchyard_core::ferroid`
pub use ferroid;

/// gRPC service and message definitions generated from `proto/`.
///
/// ## Services
///
/// - [`crud::v1::crud_service_server::CrudService`] - Unary create, read,
///   update and delete over an in-memory record store.
/// - [`stream::v1::stream_service_server::StreamService`] - Client-streaming
///   file upload and bidirectional direct-message echo.
pub mod proto {
    pub mod crud {
        pub mod v1 {
            tonic::include_proto!("crud.v1");
        }
    }

    pub mod stream {
        pub mod v1 {
            tonic::include_proto!("stream.v1");
        }
    }

    /// Encoded descriptors of every compiled proto file.
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("switchyard_descriptor");
}
