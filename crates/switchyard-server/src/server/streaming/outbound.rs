use super::until_interrupted;
use crate::server::interceptor::call::CallContext;
use switchyard_core::{Error, Result};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tonic::Status;

pub const SEND_ERROR: &str = "error sending stream";

/// Messages the handler sends back to the client.
///
/// Backed by a bounded channel drained by the transport. `send` waits while
/// the channel is full.
#[derive(Debug)]
pub struct Outbound<T> {
    sender: mpsc::Sender<core::result::Result<T, Status>>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl<T> Outbound<T> {
    pub fn new(sender: mpsc::Sender<core::result::Result<T, Status>>, context: &CallContext) -> Self {
        Self {
            sender,
            cancel: context.cancellation().clone(),
            deadline: context.deadline(),
        }
    }

    /// Queues one message for the client.
    ///
    /// Fails with `Internal` once the client side of the stream is gone.
    pub async fn send(&self, message: T) -> Result<()> {
        until_interrupted(&self.cancel, self.deadline, self.sender.send(Ok(message)))
            .await?
            .map_err(|_| {
                tracing::warn!("{SEND_ERROR}: response stream closed");
                Error::internal(SEND_ERROR)
            })
    }
}
