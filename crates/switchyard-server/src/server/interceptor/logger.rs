use super::call::{CallKind, RpcCall};
use crate::server::telemetry::{
    decrement_streams_inflight, increment_call_errors, increment_calls,
    increment_streams_inflight, record_call_duration,
};
use core::task::{Context, Poll};
use futures::future::BoxFuture;
use std::time::Instant;
use tonic::Status;
use tower::{Layer, Service};
use tracing::Instrument;

/// Outermost interceptor: logs every call on the way in and on the way out.
///
/// The outcome of the inner service is returned untouched. Because it sits
/// outside [`Auth`](super::auth::Auth) and [`Recovery`](super::recovery::Recovery),
/// rejected calls and recovered panics are logged with the status code the
/// caller actually receives.
#[derive(Copy, Clone, Debug, Default)]
pub struct LoggerLayer;

impl<S> Layer<S> for LoggerLayer {
    type Service = Logger<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Logger { inner }
    }
}

#[derive(Clone, Debug)]
pub struct Logger<S> {
    inner: S,
}

impl<S, T> Service<RpcCall<T>> for Logger<S>
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
        // Keep the instance that was driven to readiness.
        let clone = self.inner.clone();
        let mut inner = core::mem::replace(&mut self.inner, clone);

        let procedure = call.context.procedure();
        let kind = call.context.kind();
        let span = tracing::info_span!("call", procedure, %kind);

        let logged = async move {
            let start = Instant::now();
            tracing::info!(procedure, "started {kind} request: {procedure}");
            increment_calls(procedure);
            let _inflight = InflightStream::enter(kind);

            let result = inner.call(call).await;

            let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
            record_call_duration(procedure, elapsed_ms);
            match &result {
                Ok(_) => {
                    tracing::info!(procedure, elapsed_ms, "finished {kind} request: {procedure}");
                }
                Err(status) => {
                    increment_call_errors(procedure, status.code());
                    tracing::info!(
                        procedure,
                        elapsed_ms,
                        response_code = ?status.code(),
                        error = status.message(),
                        "finished {kind} request: {procedure}"
                    );
                }
            }
            result
        };
        Box::pin(logged.instrument(span))
    }
}

/// Tracks a streaming call in the in-flight gauge until dropped, which also
/// covers calls whose future is dropped by the transport mid-stream.
struct InflightStream(bool);

impl InflightStream {
    fn enter(kind: CallKind) -> Self {
        if kind.is_streaming() {
            increment_streams_inflight();
        }
        Self(kind.is_streaming())
    }
}

impl Drop for InflightStream {
    fn drop(&mut self) {
        if self.0 {
            decrement_streams_inflight();
        }
    }
}
