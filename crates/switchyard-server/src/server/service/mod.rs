//! Service implementations and the gRPC entry points that run them.
//!
//! ## Structure
//!
//! - [`handler`] - gRPC trait implementations (`Dispatcher`).
//! - [`crud`] - In-memory record store.
//! - [`stream`] - Upload accumulation and bidirectional echo.

pub mod crud;
pub mod handler;
pub mod stream;
