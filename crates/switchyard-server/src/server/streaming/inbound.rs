use super::until_interrupted;
use crate::server::interceptor::call::CallContext;
use futures::stream::{BoxStream, Stream, StreamExt};
use switchyard_core::{Error, Result};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tonic::Status;

pub const RECV_ERROR: &str = "error receiving stream";

/// Messages sent by the client, in arrival order.
pub struct Inbound<T> {
    stream: BoxStream<'static, core::result::Result<T, Status>>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl<T> core::fmt::Debug for Inbound<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Inbound")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

impl<T> Inbound<T> {
    pub fn new<S>(stream: S, context: &CallContext) -> Self
    where
        S: Stream<Item = core::result::Result<T, Status>> + Send + 'static,
    {
        Self {
            stream: stream.boxed(),
            cancel: context.cancellation().clone(),
            deadline: context.deadline(),
        }
    }

    /// Waits for the next message.
    ///
    /// `Ok(None)` means the client closed its side normally. A transport
    /// failure is logged and reported as `Internal`; the underlying status is
    /// not exposed to the client.
    pub async fn recv(&mut self) -> Result<Option<T>> {
        match until_interrupted(&self.cancel, self.deadline, self.stream.next()).await? {
            Some(Ok(message)) => Ok(Some(message)),
            Some(Err(status)) => {
                tracing::warn!(
                    code = ?status.code(),
                    error = status.message(),
                    "{RECV_ERROR}"
                );
                Err(Error::internal(RECV_ERROR))
            }
            None => Ok(None),
        }
    }
}
