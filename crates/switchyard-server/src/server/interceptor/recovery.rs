use super::call::RpcCall;
use core::panic::AssertUnwindSafe;
use core::task::{Context, Poll};
use futures::future::{BoxFuture, FutureExt};
use std::any::Any;
use switchyard_core::Error;
use tonic::Status;
use tower::{Layer, Service};

pub const PANIC_MESSAGE: &str = "unexpected server error";

/// Innermost interceptor: turns a panic anywhere below it into a single
/// `Internal` status and keeps the process serving.
///
/// Requires the `unwind` panic strategy.
#[derive(Copy, Clone, Debug, Default)]
pub struct RecoveryLayer;

impl<S> Layer<S> for RecoveryLayer {
    type Service = Recovery<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Recovery { inner }
    }
}

#[derive(Clone, Debug)]
pub struct Recovery<S> {
    inner: S,
}

impl<S, T> Service<RpcCall<T>> for Recovery<S>
where
    S: Service<RpcCall<T>, Error = Status> + Clone + Send + 'static,
    S::Future: Send + 'static,
    T: Send + 'static,
{
    type Response = S::Response;
    type Error = Status;
    type Future = BoxFuture<'static, Result<S::Response, Status>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, call: RpcCall<T>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = core::mem::replace(&mut self.inner, clone);
        let procedure = call.context.procedure();

        // `inner.call` runs inside the guarded future so a panic while
        // building the handler future is caught as well.
        let guarded = AssertUnwindSafe(async move { inner.call(call).await }).catch_unwind();

        Box::pin(async move {
            match guarded.await {
                Ok(result) => result,
                Err(payload) => {
                    tracing::error!(
                        procedure,
                        panic = panic_message(payload.as_ref()),
                        "recovered from panic"
                    );
                    Err(Error::internal(PANIC_MESSAGE).into())
                }
            }
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}
