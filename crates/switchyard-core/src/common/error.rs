//! Error types for the record store and streaming services.
//!
//! This module defines the central `Error` enum, which captures every failure
//! a call can end with. It implements `From<Error>` for `tonic::Status` so the
//! classification reaches clients as the matching gRPC status code.
//!
//! ## Error Cases
//! - `Unauthenticated`: The auth token header was missing or wrong.
//! - `NotFound`: No record is stored under the requested identifier.
//! - `Internal`: An unexpected fault, or a transport read/write failure in
//!   the middle of a stream.
//! - `Cancelled`: The caller went away while the call was blocked.
//! - `DeadlineExceeded`: The caller's deadline passed while the call was
//!   blocked.

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for both services.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The request did not carry the configured shared secret.
    #[error("auth token missing or invalid")]
    Unauthenticated,

    /// The identifier is unknown (never issued, or already deleted).
    #[error("record not found: {id}")]
    NotFound { id: String },

    /// Unexpected server-side fault or stream transport failure.
    #[error("internal error: {context}")]
    Internal { context: String },

    /// The client aborted the request.
    #[error("Request cancelled by client")]
    Cancelled,

    /// The deadline supplied by the client has passed.
    #[error("Deadline exceeded")]
    DeadlineExceeded,
}

impl Error {
    /// Shorthand for [`Error::Internal`].
    pub fn internal(context: impl Into<String>) -> Self {
        Self::Internal {
            context: context.into(),
        }
    }
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::Unauthenticated => Status::unauthenticated("auth token missing or invalid"),
            Error::NotFound { .. } => Status::not_found("record not found"),
            Error::Internal { context } => Status::internal(context),
            Error::Cancelled => Status::cancelled("Request was cancelled"),
            Error::DeadlineExceeded => Status::deadline_exceeded("Deadline exceeded"),
        }
    }
}
