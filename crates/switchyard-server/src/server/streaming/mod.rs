//! Handler-facing halves of a streaming call.
//!
//! [`Inbound`] and [`Outbound`] hide the transport from the stream handlers.
//! Every blocking operation on them races the call's cancellation token and
//! deadline, so a handler stuck waiting on a slow peer is released with
//! [`Error::Cancelled`](switchyard_core::Error::Cancelled) or
//! [`Error::DeadlineExceeded`](switchyard_core::Error::DeadlineExceeded).

pub mod inbound;
pub mod outbound;

pub use inbound::Inbound;
pub use outbound::Outbound;

use switchyard_core::{Error, Result};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Both halves of a bidirectional call.
#[derive(Debug)]
pub struct Duplex<In, Out> {
    pub inbound: Inbound<In>,
    pub outbound: Outbound<Out>,
}

/// Drives `fut` unless the call is cancelled or its deadline passes first.
///
/// Cancellation is checked before the deadline, and both before `fut`.
pub(crate) async fn until_interrupted<F: Future>(
    cancel: &CancellationToken,
    deadline: Option<Instant>,
    fut: F,
) -> Result<F::Output> {
    let expired = async {
        match deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => core::future::pending().await,
        }
    };

    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::Cancelled),
        () = expired => Err(Error::DeadlineExceeded),
        output = fut => Ok(output),
    }
}
