//! `switchyard-client`: one subcommand per RPC exposed by `switchyard-server`.
//!
//! ```bash
//! SECRET_TOKEN=s3cr3t cargo run --bin switchyard-client -- crud-create alice
//! SECRET_TOKEN=s3cr3t cargo run --bin switchyard-client -- stream-direct-message Hello Bye
//! ```

mod auth;
mod cli;
mod commands;

use auth::AuthToken;
use clap::Parser;
use cli::{Cli, Command};
use core::time::Duration;
use tonic::transport::Channel;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const CALL_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let auth = AuthToken::new(&cli.token_header, &cli.secret_token)?;
    let channel = Channel::from_shared(cli.server_url.clone())?
        .connect_timeout(CALL_TIMEOUT)
        .timeout(CALL_TIMEOUT)
        .connect()
        .await?;

    match cli.command {
        Command::CrudCreate { name } => {
            commands::crud_create(commands::crud_client(channel, auth), name).await
        }
        Command::CrudRead { id } => commands::crud_read(commands::crud_client(channel, auth), id).await,
        Command::CrudUpdate { id, name } => {
            commands::crud_update(commands::crud_client(channel, auth), id, name).await
        }
        Command::CrudDelete { id } => {
            commands::crud_delete(commands::crud_client(channel, auth), id).await
        }
        Command::StreamUploadFile { path, chunk_size } => {
            commands::stream_upload_file(
                commands::stream_client(channel, auth),
                path.as_deref(),
                chunk_size,
            )
            .await
        }
        Command::StreamDirectMessage { messages } => {
            commands::stream_direct_message(commands::stream_client(channel, auth), messages).await
        }
    }
}
