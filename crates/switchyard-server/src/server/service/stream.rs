//! Handlers behind the streaming service.
//!
//! Both handlers only see [`Inbound`]/[`Outbound`] halves, never the
//! transport. They run inside the interceptor chain like any unary handler.

use crate::server::streaming::{Duplex, Inbound};
use crate::server::telemetry::increment_uploaded_bytes;
use switchyard_core::Result;
use switchyard_core::proto::stream::v1::{
    DirectMessageRequest, DirectMessageResponse, UploadFileRequest, UploadFileResponse,
};

/// Wraps an inbound direct message into its reply.
pub fn echo(message: &str) -> String {
    format!("Received message: {message}")
}

/// Running state of one upload. Owned by the call that receives the chunks.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct UploadAccumulator {
    file_name: Option<String>,
    size: u64,
}

impl UploadAccumulator {
    /// Folds one message into the running state: the first non-empty file
    /// name sticks, every chunk length is added.
    pub fn absorb(&mut self, request: UploadFileRequest) {
        if self.file_name.is_none() {
            self.file_name = request.file_name.filter(|name| !name.is_empty());
        }
        self.size += request.chunk.len() as u64;
    }

    pub fn finish(self) -> UploadFileResponse {
        UploadFileResponse {
            file_name: self.file_name.unwrap_or_default(),
            size: self.size,
        }
    }
}

/// Receives chunks until the client closes its side, then answers once.
///
/// A failed receive ends the call without a partial response.
pub async fn upload_file(mut inbound: Inbound<UploadFileRequest>) -> Result<UploadFileResponse> {
    let mut upload = UploadAccumulator::default();
    while let Some(request) = inbound.recv().await? {
        increment_uploaded_bytes(request.chunk.len() as u64);
        upload.absorb(request);
    }

    let response = upload.finish();
    tracing::debug!(file_name = %response.file_name, size = response.size, "upload complete");
    Ok(response)
}

/// Answers every inbound message with exactly one echo before reading the
/// next one.
pub async fn direct_message(
    duplex: Duplex<DirectMessageRequest, DirectMessageResponse>,
) -> Result<()> {
    let Duplex {
        mut inbound,
        outbound,
    } = duplex;

    while let Some(request) = inbound.recv().await? {
        outbound
            .send(DirectMessageResponse {
                message: echo(&request.message),
            })
            .await?;
    }
    Ok(())
}
