//! One function per subcommand. Each logs the outcome the way the server
//! reports it.

use crate::auth::AuthToken;
use anyhow::Context;
use bytes::Bytes;
use core::num::NonZeroUsize;
use std::path::Path;
use switchyard_core::proto::{
    crud::v1::{
        CreateRequest, DeleteRequest, ReadRequest, UpdateRequest, crud_service_client::CrudServiceClient,
    },
    stream::v1::{
        DirectMessageRequest, UploadFileRequest, stream_service_client::StreamServiceClient,
    },
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::codec::CompressionEncoding;
use tonic::service::interceptor::InterceptedService;
use tonic::transport::Channel;

type CrudClient = CrudServiceClient<InterceptedService<Channel, AuthToken>>;
type StreamClient = StreamServiceClient<InterceptedService<Channel, AuthToken>>;

/// Messages sent when no file is given: three chunks, the name on the first.
const SAMPLE_FILE_NAME: &str = "smaller.txt";
const SAMPLE_CHUNKS: [&str; 3] = ["Hello, World!", "This is a small file.", "Goodbye!"];

pub fn crud_client(channel: Channel, auth: AuthToken) -> CrudClient {
    CrudServiceClient::with_interceptor(channel, auth)
        .send_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Zstd)
}

pub fn stream_client(channel: Channel, auth: AuthToken) -> StreamClient {
    StreamServiceClient::with_interceptor(channel, auth)
        .send_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Zstd)
}

pub async fn crud_create(mut client: CrudClient, name: String) -> anyhow::Result<()> {
    let response = client
        .create(CreateRequest { name })
        .await
        .context("failed to create resource")?
        .into_inner();
    tracing::info!("Created resource with ID: {}", response.id);
    Ok(())
}

pub async fn crud_read(mut client: CrudClient, id: String) -> anyhow::Result<()> {
    let response = client
        .read(ReadRequest { id })
        .await
        .context("failed to read resource")?
        .into_inner();
    tracing::info!("Read resource with ID: {} - Name: {}", response.id, response.name);
    Ok(())
}

pub async fn crud_update(mut client: CrudClient, id: String, name: String) -> anyhow::Result<()> {
    let response = client
        .update(UpdateRequest {
            id,
            updated_name: name,
        })
        .await
        .context("failed to update resource")?
        .into_inner();
    tracing::info!("Updated resource with ID: {} - Name: {}", response.id, response.name);
    Ok(())
}

pub async fn crud_delete(mut client: CrudClient, id: String) -> anyhow::Result<()> {
    let response = client
        .delete(DeleteRequest { id })
        .await
        .context("failed to delete resource")?
        .into_inner();
    tracing::info!("Deleted resource with ID: {}", response.id);
    Ok(())
}

pub async fn stream_upload_file(
    mut client: StreamClient,
    path: Option<&Path>,
    chunk_size: NonZeroUsize,
) -> anyhow::Result<()> {
    let requests = match path {
        Some(path) => {
            let data = tokio::fs::read(path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            chunk_file(&file_name, Bytes::from(data), chunk_size)
        }
        None => sample_upload(),
    };

    let response = client
        .upload_file(tokio_stream::iter(requests))
        .await
        .context("failed to upload file")?
        .into_inner();
    tracing::info!(
        "File uploaded! Received confirmation: Filename: {} - Size: {}",
        response.file_name,
        response.size
    );
    Ok(())
}

/// Sends each message and waits for its echo before sending the next.
pub async fn stream_direct_message(
    mut client: StreamClient,
    messages: Vec<String>,
) -> anyhow::Result<()> {
    let (tx, rx) = mpsc::channel(1);
    let mut responses = client
        .direct_message(ReceiverStream::new(rx))
        .await
        .context("failed to open direct message stream")?
        .into_inner();

    for message in messages {
        tx.send(DirectMessageRequest { message })
            .await
            .context("failed to stream direct message")?;

        let response = responses
            .message()
            .await
            .context("failed to receive direct message response")?
            .context("server closed the stream early")?;
        tracing::info!("Received direct message response: <{}>", response.message);
    }

    // Closing our side lets the server finish the call.
    drop(tx);
    while responses
        .message()
        .await
        .context("failed to close the stream")?
        .is_some()
    {}
    tracing::info!("Stream closed successfully");
    Ok(())
}

/// Splits `data` into messages of at most `chunk_size` bytes, naming the file
/// on the first one. An empty file still produces one (empty) message.
fn chunk_file(file_name: &str, mut data: Bytes, chunk_size: NonZeroUsize) -> Vec<UploadFileRequest> {
    let mut requests = Vec::with_capacity(data.len() / chunk_size.get() + 1);
    loop {
        let first = requests.is_empty();
        let chunk = data.split_to(data.len().min(chunk_size.get()));
        requests.push(UploadFileRequest {
            file_name: first.then(|| file_name.to_string()),
            chunk,
        });
        if data.is_empty() {
            return requests;
        }
    }
}

fn sample_upload() -> Vec<UploadFileRequest> {
    SAMPLE_CHUNKS
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| UploadFileRequest {
            file_name: (i == 0).then(|| SAMPLE_FILE_NAME.to_string()),
            chunk: Bytes::from_static(chunk.as_bytes()),
        })
        .collect()
}
