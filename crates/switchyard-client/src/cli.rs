use clap::{Parser, Subcommand};
use core::num::NonZeroUsize;
use std::path::PathBuf;
use switchyard_core::types::DEFAULT_TOKEN_HEADER;

/// Issues calls against a running `switchyard-server`.
///
/// Every call carries the shared secret in the token header.
#[derive(Parser, Debug)]
#[command(name = "switchyard-client", version)]
pub struct Cli {
    /// Base URL of the server.
    ///
    /// Environment variable: `SERVER_URL`
    #[arg(long, env = "SERVER_URL", default_value_t = String::from("http://127.0.0.1:8080"))]
    pub server_url: String,

    /// Shared secret sent with every call.
    ///
    /// Environment variable: `SECRET_TOKEN`
    #[arg(long, env = "SECRET_TOKEN", hide_env_values = true)]
    pub secret_token: String,

    /// Header name carrying the secret.
    ///
    /// Environment variable: `TOKEN_HEADER`
    #[arg(long, env = "TOKEN_HEADER", default_value_t = String::from(DEFAULT_TOKEN_HEADER))]
    pub token_header: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Create a new record.
    CrudCreate { name: String },

    /// Read a record by id.
    CrudRead { id: String },

    /// Replace the name of an existing record.
    CrudUpdate { id: String, name: String },

    /// Delete a record by id.
    CrudDelete { id: String },

    /// Upload a file in chunks. Without a path, a small built-in sample is sent.
    StreamUploadFile {
        path: Option<PathBuf>,

        /// Maximum bytes per message.
        #[arg(long, default_value = "4096")]
        chunk_size: NonZeroUsize,
    },

    /// Send messages one at a time, waiting for each echo before the next.
    StreamDirectMessage {
        #[arg(default_values_t = [String::from("Hello"), String::from("How are you?")])]
        messages: Vec<String>,
    },
}
